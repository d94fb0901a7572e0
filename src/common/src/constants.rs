// Local Store keys
pub const USER_ID_KEY: &str = "errorMonitoring_userId";
pub const USER_INFO_KEY: &str = "errorMonitoring_userInfo";
pub const TAGS_KEY: &str = "errorMonitoring_tags";
/// Generic user id written by the host application, consulted when no
/// monitoring-specific id was set.
pub const FALLBACK_USER_ID_KEY: &str = "userId";

// Session Store keys
pub const SESSION_ID_KEY: &str = "sessionId";

// Sentinels
pub const UNKNOWN_MESSAGE: &str = "Unknown error occurred";
pub const NO_STACK_TRACE: &str = "No stack trace available";
pub const UNKNOWN_ERROR_KIND: &str = "Unknown";
pub const ANONYMOUS_USER: &str = "anonymous";
pub const DEVELOPMENT_BUILD: &str = "development";

// Defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

pub const ENV_PREFIX: &str = "ARCU";
pub const STORE_FILE_NAME: &str = "local_store.json";
