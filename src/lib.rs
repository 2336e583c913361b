//! Assessment Recommender - catalog harvester and LLM-backed recommendations
//!
//! Harvests the assessment catalog into a JSON/CSV dataset, then answers
//! free-text queries by letting a language model pick from a sample of it.

pub mod config;
pub mod dataset;
pub mod error;
pub mod formatter;
pub mod harvester;
pub mod llm;
pub mod parser;
pub mod product;
pub mod recommender;
pub mod sampling;
pub mod server;
pub mod session;

pub use dataset::DatasetStore;
pub use error::{DatasetError, FetchError, LlmError};
pub use formatter::{AssessmentRecord, Summary};
pub use harvester::{HarvestConfig, HarvestReport, Harvester, HttpFetcher, PageFetcher};
pub use llm::{Completion, GeminiClient, GeminiConfig};
pub use product::{FilterContext, Product, ProductType, Section};
pub use recommender::{Outcome, Recommendation, Recommender};
pub use sampling::Sampler;
