/// Maximum number of rows kept before the newest one while the view is bottomed
pub const BACKLOG_LIMIT: usize = 50;

/// Consecutive messages by the same author closer than this collapse together
pub const COLLAPSE_WINDOW_SECS: i64 = 3 * 60;

/// Minimum interval between two backlog requests, in milliseconds
pub const BACKLOG_INTERVAL_MS: u64 = 3_000;

/// How long a highlighted message keeps its highlight, in milliseconds
pub const HIGHLIGHT_MS: u64 = 2_000;

/// Typing indicator re-evaluation period, in milliseconds
pub const TYPING_TICK_MS: u64 = 500;

/// Default typing timeout when the backend does not provide one, in seconds
pub const TYPING_TIMEOUT_SECS: u64 = 10;

/// Member events applied per UI tick when draining the member queue
pub const MEMBER_DRAIN_CHUNK: usize = 25;

/// Timeout for HTTP fetches (images, avatars), in seconds
pub const HTTP_TIMEOUT_SECS: u64 = 15;

/// URI scheme used for synthetic mention links
pub const MENTION_SCHEME: &str = "parlor";

/// Image extensions that open an inline preview instead of a browser
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
