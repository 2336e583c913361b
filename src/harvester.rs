//! Catalog harvester - fetches listing pages per filter combination in
//! parallel, enriches each row from its detail page, and collects a report

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use reqwest::blocking::Client;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::{
    CATALOG_PATH, CATEGORY_WORKERS, DEFAULT_BASE_URL, FETCH_TIMEOUT, FILTER_WORKERS, INDUSTRIES,
    JOB_CATEGORIES, JOB_FAMILIES, JOB_LEVELS, USER_AGENT,
};
use crate::dataset;
use crate::error::FetchError;
use crate::parser::{self, ProductDetails};
use crate::product::{FilterContext, Product};

/// Source of page bodies
pub trait PageFetcher: Send + Sync {
    fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher with a per-request timeout
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let resp = self.client.get(url).query(query).send().map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(transport)
    }
}

/// What to harvest and how wide to go
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: String,
    pub combinations: Vec<FilterContext>,
    pub categories: Vec<FilterContext>,
    pub filter_workers: usize,
    pub category_workers: usize,
    pub show_progress: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let mut combinations = Vec::new();
        for family in JOB_FAMILIES {
            for level in JOB_LEVELS {
                for industry in INDUSTRIES {
                    combinations.push(FilterContext::combination(family, level, industry));
                }
            }
        }

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            combinations,
            categories: JOB_CATEGORIES.map(FilterContext::category).collect(),
            filter_workers: FILTER_WORKERS,
            category_workers: CATEGORY_WORKERS,
            show_progress: true,
        }
    }
}

/// Result of scraping one filter combination
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The listing was read; it may legitimately hold no rows
    Rows(Vec<Product>),
    /// The listing could not be fetched; contributes nothing
    Empty { reason: String },
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub filter: FilterContext,
    pub outcome: TaskOutcome,
}

/// Counters for one harvest phase
#[derive(Debug, Clone, Default)]
pub struct PhaseReport {
    pub name: String,
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub products: usize,
    pub detail_errors: usize,
    pub elapsed: Duration,
}

/// A listing task that contributed nothing
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub filter: String,
    pub reason: String,
}

/// Summary of a whole harvest run
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub phases: Vec<PhaseReport>,
    pub failures: Vec<TaskFailure>,
    pub total_products: usize,
    pub elapsed: Duration,
}

/// Products plus the report describing how they were obtained
pub struct Harvest {
    pub products: Vec<Product>,
    pub report: HarvestReport,
}

/// Catalog harvester
pub struct Harvester<F: PageFetcher> {
    fetcher: F,
    config: HarvestConfig,
}

impl Harvester<HttpFetcher> {
    /// Harvester over the live catalog with the default request timeout
    pub fn http(config: HarvestConfig, timeout: Option<Duration>) -> Result<Self> {
        let fetcher = HttpFetcher::new(timeout.unwrap_or(FETCH_TIMEOUT))
            .context("Failed to build HTTP client")?;
        Ok(Self::new(fetcher, config))
    }
}

impl<F: PageFetcher> Harvester<F> {
    pub fn new(fetcher: F, config: HarvestConfig) -> Self {
        Self { fetcher, config }
    }

    fn catalog_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), CATALOG_PATH)
    }

    /// Run both phases. Individual task failures never abort the run.
    pub fn run(&self) -> Result<Harvest> {
        let start = Instant::now();
        let mut products = Vec::new();
        let mut report = HarvestReport::default();

        let phases = [
            ("filters", &self.config.combinations, self.config.filter_workers),
            ("job categories", &self.config.categories, self.config.category_workers),
        ];

        for (name, filters, workers) in phases {
            tracing::info!("Scraping {} {}...", filters.len(), name);
            let (phase, results) = self.run_phase(name, filters, workers)?;

            for result in results {
                match result.outcome {
                    TaskOutcome::Rows(rows) => products.extend(rows),
                    TaskOutcome::Empty { reason } => report.failures.push(TaskFailure {
                        filter: result.filter.label(),
                        reason,
                    }),
                }
            }
            report.phases.push(phase);
        }

        report.total_products = products.len();
        report.elapsed = start.elapsed();
        tracing::info!(
            "Harvest finished: {} products, {} failed tasks in {:.2}s",
            report.total_products,
            report.failures.len(),
            report.elapsed.as_secs_f64()
        );

        Ok(Harvest { products, report })
    }

    fn run_phase(
        &self,
        name: &str,
        filters: &[FilterContext],
        workers: usize,
    ) -> Result<(PhaseReport, Vec<TaskResult>)> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .with_context(|| format!("Failed to build {} worker pool", name))?;

        let pb = if self.config.show_progress {
            let pb = ProgressBar::new(filters.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("█▓░"),
            );
            pb.set_message(format!("Scraping {}", name));
            pb
        } else {
            ProgressBar::hidden()
        };

        let results: Vec<TaskResult> = pool.install(|| {
            filters
                .par_iter()
                .map(|filter| {
                    let result = self.scrape_filter(filter);
                    pb.inc(1);
                    result
                })
                .collect()
        });
        pb.finish_with_message(format!("✓ {} done", name));

        let mut phase = PhaseReport {
            name: name.to_string(),
            tasks: filters.len(),
            elapsed: start.elapsed(),
            ..PhaseReport::default()
        };
        for result in &results {
            match &result.outcome {
                TaskOutcome::Rows(rows) => {
                    phase.succeeded += 1;
                    phase.products += rows.len();
                    phase.detail_errors += rows.iter().filter(|p| p.detail_error.is_some()).count();
                }
                TaskOutcome::Empty { .. } => phase.failed += 1,
            }
        }

        Ok((phase, results))
    }

    /// Scrape one listing page and enrich each of its rows
    pub fn scrape_filter(&self, filter: &FilterContext) -> TaskResult {
        let label = filter.label();
        let html = match self.fetcher.get(&self.catalog_url(), &filter.query_params()) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Error in {}: {}", label, e);
                return TaskResult {
                    filter: *filter,
                    outcome: TaskOutcome::Empty { reason: e.to_string() },
                };
            }
        };

        let rows = parser::parse_listing(&html, &self.config.base_url);
        let products: Vec<Product> = rows
            .into_iter()
            .map(|row| {
                let mut product = row.into_product().with_filter(filter);
                match self.fetch_details(&product.link) {
                    Ok(details) => {
                        product.description = details.description;
                        product.sections = details.sections;
                    }
                    Err(e) => {
                        tracing::debug!("Detail page {} unavailable: {}", product.link, e);
                        product.detail_error = Some(e.to_string());
                    }
                }
                product
            })
            .collect();

        tracing::info!("Scraped {} with {} products", label, products.len());
        TaskResult {
            filter: *filter,
            outcome: TaskOutcome::Rows(products),
        }
    }

    fn fetch_details(&self, link: &str) -> Result<ProductDetails, FetchError> {
        let html = self.fetcher.get(link, &[])?;
        Ok(parser::parse_details(&html))
    }
}

/// Write the harvested snapshot as JSON and CSV, replacing previous files
pub fn save(products: &[Product], json_path: &Path, csv_path: &Path) -> Result<()> {
    // JSON is the file queries read; CSV is only written once it succeeded
    dataset::write_json(json_path, products)?;
    dataset::write_csv(csv_path, products)?;
    tracing::info!(
        "Saved {} products to {:?} and {:?}",
        products.len(),
        json_path,
        csv_path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::{DETAIL_HTML, LISTING_HTML};
    use crate::product::ProductType;
    use tempfile::tempdir;

    const JAVA_LINK: &str = "https://www.shl.com/products/product-catalog/view/java-8-new/";

    /// Serves the listing fixture except for filters marked as failing
    struct ScriptedFetcher;

    impl PageFetcher for ScriptedFetcher {
        fn get(&self, url: &str, query: &[(&'static str, String)]) -> Result<String, FetchError> {
            let has = |key: &str, value: &str| query.iter().any(|(k, v)| *k == key && v == value);

            if url == JAVA_LINK {
                return Ok(DETAIL_HTML.to_string());
            }
            if query.is_empty() {
                return Err(FetchError::Status { url: url.to_string(), status: 404 });
            }
            if has("job_category", "2") {
                return Err(FetchError::Timeout { url: url.to_string() });
            }
            if has("industry", "2") {
                return Err(FetchError::Status { url: url.to_string(), status: 500 });
            }
            if has("job_category", "3") {
                return Ok("<html><body>No products</body></html>".to_string());
            }
            Ok(LISTING_HTML.to_string())
        }
    }

    fn config() -> HarvestConfig {
        HarvestConfig {
            base_url: "https://www.shl.com".to_string(),
            combinations: vec![
                FilterContext::combination(1, 1, 1),
                FilterContext::combination(1, 1, 2),
            ],
            categories: vec![
                FilterContext::category(1),
                FilterContext::category(2),
                FilterContext::category(3),
            ],
            filter_workers: 2,
            category_workers: 2,
            show_progress: false,
        }
    }

    #[test]
    fn test_default_config_covers_all_filters() {
        let config = HarvestConfig::default();
        assert_eq!(config.combinations.len(), 6 * 10 * 8);
        assert_eq!(config.categories.len(), 23);
        assert_eq!(config.filter_workers, 20);
        assert_eq!(config.category_workers, 10);
    }

    #[test]
    fn test_failed_tasks_do_not_abort_siblings() {
        let harvest = Harvester::new(ScriptedFetcher, config()).run().unwrap();

        // Two rows from combination (1,1,1) and two from category 1
        assert_eq!(harvest.products.len(), 4);
        assert_eq!(harvest.report.total_products, 4);
        assert_eq!(harvest.report.failures.len(), 2);
        assert!(harvest
            .report
            .failures
            .iter()
            .any(|f| f.filter == "job_category=2" && f.reason.contains("timed out")));

        let filters = &harvest.report.phases[0];
        assert_eq!(filters.tasks, 2);
        assert_eq!(filters.succeeded, 1);
        assert_eq!(filters.failed, 1);

        let categories = &harvest.report.phases[1];
        assert_eq!(categories.tasks, 3);
        assert_eq!(categories.succeeded, 2);
        assert_eq!(categories.products, 2);
    }

    #[test]
    fn test_rows_carry_provenance_and_details() {
        let harvest = Harvester::new(ScriptedFetcher, config()).run().unwrap();

        let java: Vec<&Product> = harvest
            .products
            .iter()
            .filter(|p| p.link == JAVA_LINK)
            .collect();
        // Same product under two filters, kept twice
        assert_eq!(java.len(), 2);
        assert!(java.iter().any(|p| p.industry == Some(1) && p.job_category.is_none()));
        assert!(java.iter().any(|p| p.job_category == Some(1) && p.job_family.is_none()));
        assert_eq!(java[0].sections.len(), 3);
        assert!(java[0].detail_error.is_none());

        let bundle = harvest
            .products
            .iter()
            .find(|p| p.product_type == ProductType::PrePackaged)
            .unwrap();
        assert!(bundle.description.is_empty());
        assert!(bundle.detail_error.as_deref().unwrap().contains("404"));
        assert_eq!(harvest.report.phases[0].detail_errors, 1);
    }

    #[test]
    fn test_save_writes_both_files() {
        let harvest = Harvester::new(ScriptedFetcher, config()).run().unwrap();
        let dir = tempdir().unwrap();
        let json = dir.path().join("out.json");
        let csv = dir.path().join("out.csv");

        save(&harvest.products, &json, &csv).unwrap();

        let reloaded = dataset::read_json(&json).unwrap();
        assert_eq!(reloaded, harvest.products);
        let csv_lines = std::fs::read_to_string(&csv).unwrap().lines().count();
        assert_eq!(csv_lines, harvest.products.len() + 1);
    }

    #[test]
    fn test_failed_json_write_leaves_csv_untouched() {
        let harvest = Harvester::new(ScriptedFetcher, config()).run().unwrap();
        let dir = tempdir().unwrap();
        // A directory in place of the JSON file makes the write fail
        let json = dir.path().join("out.json");
        std::fs::create_dir(&json).unwrap();
        let csv = dir.path().join("out.csv");
        std::fs::write(&csv, "previous harvest\n").unwrap();

        assert!(save(&harvest.products, &json, &csv).is_err());
        assert_eq!(std::fs::read_to_string(&csv).unwrap(), "previous harvest\n");
    }
}
