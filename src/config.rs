//! Static configuration for harvesting and recommendation

use std::time::Duration;

/// Origin of the assessment catalog
pub const DEFAULT_BASE_URL: &str = "https://www.shl.com";

/// Path of the filterable catalog listing, relative to the origin
pub const CATALOG_PATH: &str = "/products/product-catalog/";

/// Browser-like user agent; the catalog serves a reduced page to unknown clients
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Default dataset written by `harvest` and read by the recommender
pub const DEFAULT_JSON_PATH: &str = "shl_products_detailed.json";
pub const DEFAULT_CSV_PATH: &str = "shl_products_detailed.csv";
pub const DEFAULT_HARVEST_LOG: &str = "harvest.log";

/// Worker pool widths for the two harvest phases
pub const FILTER_WORKERS: usize = 20;
pub const CATEGORY_WORKERS: usize = 10;

/// Per-request timeout for catalog and detail pages
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Filter dimensions crossed in the first harvest phase
pub const JOB_FAMILIES: std::ops::RangeInclusive<u32> = 1..=6;
pub const JOB_LEVELS: std::ops::RangeInclusive<u32> = 1..=10;
pub const INDUSTRIES: std::ops::RangeInclusive<u32> = 1..=8;

/// Job categories scraped one by one in the second phase
pub const JOB_CATEGORIES: std::ops::RangeInclusive<u32> = 1..=23;

// ─── Recommendation ─────────────────────────────────────────────

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const LLM_TEMPERATURE: f32 = 0.2;
pub const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Products drawn from the dataset per query
pub const SAMPLE_SIZE: usize = 50;

/// Products rendered into the prompt (out of the sample)
pub const PROMPT_PRODUCT_LIMIT: usize = 30;

/// Upper bound on one product's prompt text, in characters
pub const MAX_PRODUCT_TEXT_CHARS: usize = 1500;

/// Results returned per query when the caller does not choose
pub const DEFAULT_TOP_K: usize = 5;

/// Landing page used by fallback payloads
pub const CONTACT_URL: &str = "https://www.shl.com/contact-us/";

// ─── Presentation ───────────────────────────────────────────────

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Summaries shown per page in the terminal UI
pub const PAGE_SIZE: usize = 10;

/// Follow-up "more" rounds allowed after the first page
pub const MAX_FOLLOW_UPS: usize = 2;

/// Summaries requested from the LLM by the terminal UI
pub const UI_TOP_K: usize = PAGE_SIZE * (MAX_FOLLOW_UPS + 1);
