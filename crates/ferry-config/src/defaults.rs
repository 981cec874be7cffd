//! Policy defaults.

/// Where content is fetched to when nothing else is configured.
pub const DEFAULT_DOWNLOAD_ROOT: &str = "./torrents";
/// Checkpoint namespace, relative to the download root.
pub const RESUME_SUBDIR: &str = ".resume";

/// Seconds to wait for metadata before giving up.
pub const METADATA_TIMEOUT_SECS: u64 = 900;
/// Seconds between metadata polls.
pub const METADATA_POLL_SECS: u64 = 1;
/// Seconds between download progress polls.
pub const DOWNLOAD_POLL_SECS: u64 = 2;
/// Seconds between periodic checkpoints.
pub const CHECKPOINT_INTERVAL_SECS: u64 = 300;
/// Required free space as a multiple of the selected size.
pub const SPACE_MARGIN: f64 = 1.1;
/// Largest accepted margin.
pub const MAX_SPACE_MARGIN: f64 = 10.0;

/// Remote folder uploads land in.
pub const DRIVE_FOLDER: &str = "Torrent";
/// Upload chunk size.
pub const CHUNK_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// Resumable uploads require chunk sizes in multiples of this.
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;
/// Upload progress reporting granularity in percentage points.
pub const PROGRESS_STEP: u8 = 5;
/// Remote API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";

/// Concurrent background jobs.
pub const WORKERS: usize = 2;
/// Largest accepted worker count.
pub const MAX_WORKERS: usize = 16;

/// Log level when neither config nor `RUST_LOG` set one.
pub const LOG_LEVEL: &str = "info";

/// Public trackers unioned into every descriptor unless disabled.
pub const DEFAULT_TRACKERS: [&str; 9] = [
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://exodus.desync.com:6969/announce",
    "udp://tracker.openbittorrent.com:6969/announce",
    "udp://tracker.tiny-vps.com:6969/announce",
    "udp://opentor.org:2710/announce",
    "udp://tracker.cyberia.is:6969/announce",
    "udp://retracker.lanta-net.ru:2710/announce",
];
