//! Protocol constants
//!
//! Centralized location for the remote service's fixed values: error codes
//! that drive control flow, default endpoints and protocol limits.

// Error codes with control-flow meaning
/// The access token is invalid or expired.
pub const AUTH_EXPIRED: i64 = 5;
/// The server wants an interactive challenge (captcha) solved first.
pub const CAPTCHA_NEEDED: i64 = 14;

// Endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://api.vk.com";
pub const DEFAULT_API_VERSION: &str = "5.131";
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth.vk.com/access_token";

// Request parameter names
pub const PARAM_ACCESS_TOKEN: &str = "access_token";
pub const PARAM_VERSION: &str = "v";
pub const PARAM_CAPTCHA_KEY: &str = "captcha_key";
pub const PARAM_CAPTCHA_SID: &str = "captcha_sid";
/// Reserved argument extracted by the method builder instead of being sent.
pub const PARAM_TIMEOUT: &str = "timeout";

// Execute batching
pub const EXECUTE_METHOD: &str = "execute";
/// Maximum number of API calls the service accepts inside one `execute`.
pub const EXECUTE_CALL_LIMIT: usize = 25;

// Long poll
pub const LONG_POLL_ACT: &str = "a_check";
pub const DEFAULT_LONG_POLL_WAIT_SECS: u64 = 25;
pub const DEFAULT_USER_LONG_POLL_VERSION: u32 = 3;
pub const DEFAULT_GROUP_LONG_POLL_VERSION: u32 = 1;

// Rate limiting (the service allows three calls per second per token)
pub const DEFAULT_REQUESTS_PER_PERIOD: usize = 3;
pub const DEFAULT_RATE_PERIOD_MS: u64 = 1000;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
