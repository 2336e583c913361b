//! Assessment Recommender CLI - harvest the catalog, serve or ask for recommendations

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assessment_recommender::config::{
    CATEGORY_WORKERS, DEFAULT_BASE_URL, DEFAULT_BIND, DEFAULT_CSV_PATH, DEFAULT_HARVEST_LOG,
    DEFAULT_JSON_PATH, DEFAULT_LLM_BASE_URL, DEFAULT_MODEL, DEFAULT_TOP_K, FILTER_WORKERS,
    UI_TOP_K,
};
use assessment_recommender::harvester::{self, HarvestConfig, HarvestReport, Harvester};
use assessment_recommender::server::{self, AppState};
use assessment_recommender::session::{is_more_request, Conversation, MoreResponse};
use assessment_recommender::{
    DatasetStore, GeminiClient, GeminiConfig, Recommender, Sampler, Summary,
};

#[derive(Parser)]
#[command(name = "assessment-recommender")]
#[command(about = "Harvest the assessment catalog and recommend assessments with an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the catalog into JSON and CSV datasets
    Harvest {
        /// Catalog origin
        #[arg(long, env = "CATALOG_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// JSON dataset output
        #[arg(long, default_value = DEFAULT_JSON_PATH)]
        json_out: PathBuf,

        /// CSV dataset output
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv_out: PathBuf,

        /// Workers for the job family x level x industry phase
        #[arg(long, default_value_t = FILTER_WORKERS)]
        filter_workers: usize,

        /// Workers for the job category phase
        #[arg(long, default_value_t = CATEGORY_WORKERS)]
        category_workers: usize,

        /// Seconds before a page request times out
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: u64,

        /// Run log, overwritten on each harvest
        #[arg(long, default_value = DEFAULT_HARVEST_LOG)]
        log_file: PathBuf,
    },

    /// Run the HTTP API
    Serve {
        /// Address to bind (host:port)
        #[arg(long, env = "RECOMMENDER_BIND", default_value = DEFAULT_BIND)]
        bind: String,

        /// Port override for the bind address
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Recommend assessments for a single query
    Recommend {
        /// Free-text description of the role or skills
        query: String,

        /// Number of results
        #[arg(short, default_value_t = DEFAULT_TOP_K as u64, value_parser = clap::value_parser!(u64).range(1..))]
        k: u64,

        /// Result shape
        #[arg(long, value_enum, default_value_t = Shape::Summary)]
        shape: Shape,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Seed for the product sample
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Interactive recommendation session
    Ask {
        /// Seed for the product sample
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        llm: LlmArgs,
    },
}

#[derive(Args)]
struct DatasetArgs {
    /// Harvested JSON dataset
    #[arg(long, env = "DATASET_PATH", default_value = DEFAULT_JSON_PATH)]
    dataset: PathBuf,
}

#[derive(Args)]
struct LlmArgs {
    /// Generative Language API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model identifier
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// API origin
    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,

    /// Seconds before an LLM request times out
    #[arg(long, default_value_t = 30)]
    llm_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    /// Name and URL
    Summary,
    /// Full API record
    Assessment,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Harvest { log_file, .. } => Some(log_file.as_path()),
        _ => None,
    };
    init_logging(cli.verbose, log_file)?;

    match cli.command {
        Commands::Harvest {
            base_url,
            json_out,
            csv_out,
            filter_workers,
            category_workers,
            timeout_secs,
            ..
        } => {
            let config = HarvestConfig {
                base_url,
                filter_workers,
                category_workers,
                ..HarvestConfig::default()
            };
            run_harvest(config, Duration::from_secs(timeout_secs.max(1)), &json_out, &csv_out)?;
        }

        Commands::Serve {
            bind,
            port,
            dataset,
            llm,
        } => {
            let mut addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address {}", bind))?;
            if let Some(port) = port {
                addr.set_port(port);
            }

            // Load eagerly so a missing dataset fails at startup, not per request
            let store = DatasetStore::load(&dataset.dataset)?;
            let recommender = build_recommender(store, &llm, None)?;
            let state = AppState::new(Arc::new(recommender));

            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(server::serve(addr, state))?;
        }

        Commands::Recommend {
            query,
            k,
            shape,
            format,
            seed,
            dataset,
            llm,
        } => {
            let recommender =
                build_recommender(DatasetStore::new(&dataset.dataset), &llm, seed)?;
            run_recommend(&recommender, &query, k as usize, shape, format)?;
        }

        Commands::Ask { seed, dataset, llm } => {
            let recommender =
                build_recommender(DatasetStore::new(&dataset.dataset), &llm, seed)?;
            run_ask(&recommender)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn build_recommender(store: DatasetStore, llm: &LlmArgs, seed: Option<u64>) -> Result<Recommender> {
    let config = GeminiConfig {
        api_key: llm.api_key.clone(),
        model: llm.model.clone(),
        base_url: llm.llm_base_url.clone(),
        timeout: Duration::from_secs(llm.llm_timeout_secs.max(1)),
    };
    let client = GeminiClient::new(config).context("Failed to create LLM client")?;
    let sampler = match seed {
        Some(seed) => Sampler::seeded(seed),
        None => Sampler::from_entropy(),
    };
    Ok(Recommender::new(Arc::new(store), Arc::new(client)).with_sampler(sampler))
}

fn run_harvest(config: HarvestConfig, timeout: Duration, json_out: &Path, csv_out: &Path) -> Result<()> {
    println!("🔄 Harvesting {}", config.base_url);
    println!(
        "   {} filter combinations, {} job categories\n",
        config.combinations.len(),
        config.categories.len()
    );

    let harvester = Harvester::http(config, Some(timeout))?;
    let harvest = harvester.run()?;

    harvester::save(&harvest.products, json_out, csv_out)?;
    print_report(&harvest.report);
    println!("\n📄 JSON: {:?}", json_out);
    println!("📄 CSV:  {:?}", csv_out);

    Ok(())
}

fn print_report(report: &HarvestReport) {
    println!("\n=== Harvest Report ===\n");
    for phase in &report.phases {
        println!("{}:", phase.name);
        println!("  Tasks:          {}", phase.tasks);
        println!("  Succeeded:      {}", phase.succeeded);
        println!("  Failed:         {}", phase.failed);
        println!("  Products:       {}", phase.products);
        println!("  Detail errors:  {}", phase.detail_errors);
        println!("  Time:           {:.2}s", phase.elapsed.as_secs_f64());
    }
    println!("\nTotal products: {}", report.total_products);
    if !report.failures.is_empty() {
        println!("{}", format!("Failed tasks: {}", report.failures.len()).yellow());
        for failure in report.failures.iter().take(10) {
            println!("  ✗ {} ({})", failure.filter, failure.reason);
        }
    }
    println!("✅ Done. Total time: {:.2} seconds", report.elapsed.as_secs_f64());
}

fn run_recommend(
    recommender: &Recommender,
    query: &str,
    k: usize,
    shape: Shape,
    format: OutputFormat,
) -> Result<()> {
    match (shape, format) {
        (Shape::Summary, OutputFormat::Json) => {
            let rec = recommender.recommend_summaries(query, k);
            println!("{}", serde_json::to_string_pretty(&rec)?);
        }
        (Shape::Assessment, OutputFormat::Json) => {
            let rec = recommender.recommend_assessments(query, k);
            println!("{}", serde_json::to_string_pretty(&rec)?);
        }
        (Shape::Summary, OutputFormat::Text) => {
            let rec = recommender.recommend_summaries(query, k);
            println!("\n=== Recommendations for: \"{}\" ({}) ===\n", query, rec.outcome.label());
            print_summaries(&rec.items, 1);
        }
        (Shape::Assessment, OutputFormat::Text) => {
            let rec = recommender.recommend_assessments(query, k);
            println!("\n=== Recommendations for: \"{}\" ({}) ===\n", query, rec.outcome.label());
            for (i, item) in rec.items.iter().enumerate() {
                println!("{}. {}", i + 1, item.url.bold());
                println!("   Duration: {} min", item.duration);
                println!(
                    "   Remote: {}  Adaptive: {}",
                    item.remote_support, item.adaptive_support
                );
                println!("   Test types: {}", item.test_type.join(", "));
                if !item.description.is_empty() {
                    println!("   {}", item.description);
                }
                println!();
            }
        }
    }
    Ok(())
}

fn print_summaries(items: &[Summary], first_number: usize) {
    for (i, item) in items.iter().enumerate() {
        println!("{}. {}", first_number + i, item.name.bold());
        println!("   {}", item.url.cyan());
    }
}

fn run_ask(recommender: &Recommender) -> Result<()> {
    println!("{}", "Assessment Recommender".bold());
    println!("Describe the role or skills you are hiring for. Type \"more\" for more results,");
    println!("\"history\" to review earlier answers, \"quit\" to leave.\n");

    let mut conversation = Conversation::new();
    let mut shown = 0;
    let stdin = io::stdin();

    loop {
        print!("{} ", ">".green());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "history" => {
                for turn in conversation.history() {
                    println!("Query: {}", turn.query.italic());
                    for item in &turn.results {
                        println!("  • {} ({})", item.name, item.url);
                    }
                    println!("---");
                }
                continue;
            }
            _ => {}
        }

        if is_more_request(input) {
            match conversation.more() {
                MoreResponse::Page(page) => {
                    println!("\n### More Recommendations");
                    print_summaries(&page, shown + 1);
                    shown += page.len();
                }
                MoreResponse::NoPreviousResults => {
                    println!("{}", "No previous results found to continue from.".yellow())
                }
                MoreResponse::Exhausted => println!("No more assessments found."),
                MoreResponse::LimitReached => println!(
                    "{}",
                    "You've reached the maximum number of follow-ups for this query.".yellow()
                ),
            }
        } else {
            println!("Searching for relevant assessments...");
            let rec = recommender.recommend_summaries(input, UI_TOP_K);
            if !rec.is_matched() {
                tracing::warn!("Showing {} result for \"{}\"", rec.outcome.label(), input);
            }
            let page = conversation.start(input, rec.items);
            println!("\n## Recommended Assessments");
            print_summaries(&page, 1);
            shown = page.len();
        }

        if conversation.can_show_more() {
            println!("\n(type \"more\" for more options)");
        }
        println!();
    }

    Ok(())
}
