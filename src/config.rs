use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHANNELS: &[&str] = &[
    "https://www.youtube.com/@The_FirstTake",
    "https://www.youtube.com/@aimersmej",
    "https://www.youtube.com/channel/UC5CwaMl1eIgY8h02uZw7u8A",
];

pub const DEFAULT_VIDEOS: &[&str] = &["c2tuxS3Pcto", "kxs9Su_mbpU", "mvkbCZfwWzA"];

pub const DEFAULT_LEDGER_PATH: &str = "processed_videos.txt";
pub const LEDGER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const CHANNEL_OUTPUT_PREFIX: &str = "channel_data";
pub const VIDEO_OUTPUT_PREFIX: &str = "video_data";
pub const OUTPUT_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const CHANNEL_READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const VIDEO_READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const COMMENTS_READY_TIMEOUT: Duration = Duration::from_secs(5);
pub const SCROLL_PASSES: usize = 3;
pub const SCROLL_SETTLE: Duration = Duration::from_secs(1);
pub const COMMENTS_SETTLE: Duration = Duration::from_secs(5);
pub const MAX_COMMENTS: usize = 5;

/// Upper bound on one item's whole navigate → extract sequence.
pub const ITEM_TIMEOUT: Duration = Duration::from_secs(120);

pub const VIEWPORT: (u32, u32) = (1280, 800);

/// How the rendering engine gets launched.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub viewport: (u32, u32),
}

impl BrowserOptions {
    /// Defaults, with `CHROME_PATH` picking the browser binary when set.
    pub fn from_env() -> Self {
        Self {
            headless: true,
            executable: std::env::var_os("CHROME_PATH").map(PathBuf::from),
            viewport: VIEWPORT,
        }
    }
}

pub fn default_channels() -> Vec<String> {
    DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect()
}

pub fn default_videos() -> Vec<String> {
    DEFAULT_VIDEOS.iter().map(|s| s.to_string()).collect()
}
