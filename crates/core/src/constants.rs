/// Default per-second request ceiling (SEC EDGAR fair-access limit)
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

/// Default per-day request ceiling
pub const DEFAULT_REQUESTS_PER_DAY: u32 = 50_000;

/// Default similarity needed to fold a name into an existing holder
pub const DEFAULT_MERGE_THRESHOLD: f64 = 0.90;

/// Similarity above which an unmerged name is reported for curation
pub const DEFAULT_CANDIDATE_FLOOR: f64 = 0.70;

/// Concentration ratio depths reported in every snapshot
pub const CONCENTRATION_DEPTHS: [usize; 4] = [1, 3, 5, 10];

/// Upper bound of a percentage-point ownership value
pub const MAX_PERCENT: f64 = 100.0;

/// Default number of concurrent ingest workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default fetch retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base backoff between fetch retries, in milliseconds
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_500;
