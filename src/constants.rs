// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STORE_URL: &str = "memory://";

// Token lifetimes
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

// Argon2id defaults (OWASP minimum profile)
pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19_456;
pub const DEFAULT_ARGON2_ITERATIONS: u32 = 2;
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;

// Request limits
pub const MAX_JSON_BODY_BYTES: u64 = 16 * 1024;
pub const MAX_BEARER_TOKEN_LEN: usize = 8192;

// Refresh sessions kept per user before the oldest is dropped
pub const MAX_SESSIONS_PER_USER: usize = 10;

// Background cleanup cadence
pub const MAINTENANCE_INTERVAL_SECS: u64 = 300;
pub const SECURITY_EVENT_RETENTION_SECS: u64 = 24 * 3600;

// Minimum wall time for a signin attempt
pub const MIN_SIGNIN_MILLIS: u64 = 100;

// Field rules
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_PROJECT_TITLE_LEN: usize = 4;
pub const MIN_PROJECT_CONTENT_LEN: usize = 10;
