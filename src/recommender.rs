//! LLM-backed assessment recommendation
//!
//! Each query draws a fresh random sample from the dataset, renders it into a
//! prompt and lets the model choose. Two reply contracts are used: the summary
//! prompt asks for a JSON array of `{name, url}`, the assessment prompt asks
//! for the 1-based numbers of the chosen products. Failures never surface as
//! errors; they produce a substitute payload tagged with an [`Outcome`].

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::config::{CONTACT_URL, LLM_TEMPERATURE, SAMPLE_SIZE};
use crate::dataset::DatasetStore;
use crate::formatter::{
    self, AssessmentRecord, Summary, DEFAULT_DURATION_MINUTES, DEFAULT_TEST_TYPE,
};
use crate::llm::Completion;
use crate::product::Product;
use crate::sampling::Sampler;

pub const NO_MATCH_NAME: &str = "No suitable assessments found";
pub const ERROR_NAME: &str = "Error retrieving recommendations";

const SUMMARY_PROMPT: &str = r#"You are an AI assistant for SHL, a company that offers assessments for hiring and employee development.

TASK: Based on the user query, identify the {k} most relevant assessment products from the list below.

USER QUERY: "{query}"

AVAILABLE ASSESSMENTS:
{products}

Select the {k} most relevant assessments for the user's needs, considering:
1. Job role or industry mentioned in the query
2. Skills being assessed
3. Time constraints mentioned
4. Experience level requirements

RESPOND ONLY with a JSON array of the selected assessments in exactly this format:
[
  {"name": "Assessment Name 1", "url": "https://link-to-assessment-1"},
  {"name": "Assessment Name 2", "url": "https://link-to-assessment-2"}
]

Each assessment must have only the two fields "name" and "url".
Do not add any other fields, commentary or markup.
"#;

const INDEX_PROMPT: &str = r#"You are an SHL assessment recommendation expert.

USER QUERY: "{query}"

TASK: Review the assessments below and select EXACTLY {k} assessments that best match this query.

AVAILABLE ASSESSMENTS:
{products}

SELECTION CRITERIA:
1. Match assessment content to skills or topics in the query (highest priority)
2. Match the job role or industry if mentioned
3. Consider experience level requirements if mentioned
4. Consider time constraints if mentioned

For programming or technical assessments, match the EXACT language or technology mentioned.

Output ONLY the NUMBERS of the selected assessments, separated by commas.
For example, if assessments 7, 12, 15, 22 and 31 are most relevant, respond with:
7, 12, 15, 22, 31

Do not include any explanation.
"#;

/// How a recommendation was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Items were chosen by the model
    Matched,
    /// The model answered but nothing usable could be read from it
    Fallback { reason: String },
    /// The dataset or the model call failed
    Failed { reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Fallback { .. } => "fallback",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Result list plus how it was obtained; `items` is never empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation<T> {
    pub outcome: Outcome,
    pub items: Vec<T>,
}

impl<T> Recommendation<T> {
    fn matched(items: Vec<T>) -> Self {
        Self {
            outcome: Outcome::Matched,
            items,
        }
    }

    fn fallback(reason: impl Into<String>, items: Vec<T>) -> Self {
        let reason = reason.into();
        tracing::warn!("Recommendation fallback: {}", reason);
        Self {
            outcome: Outcome::Fallback { reason },
            items,
        }
    }

    fn failed(reason: impl Into<String>, items: Vec<T>) -> Self {
        let reason = reason.into();
        tracing::warn!("Recommendation failed: {}", reason);
        Self {
            outcome: Outcome::Failed { reason },
            items,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.outcome == Outcome::Matched
    }
}

/// Why a JSON-array reply could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// No `[` ... `]` span in the reply
    NoArray,
    /// The bracketed span is not a JSON array
    Malformed(String),
}

/// Summaries from a reply that should contain a JSON array.
///
/// The span from the first `[` to the last `]` is parsed; entries without a
/// string `name` and `url` are dropped and extra fields are ignored.
pub fn parse_summary_reply(reply: &str) -> Result<Vec<Summary>, ReplyError> {
    let start = reply.find('[').ok_or(ReplyError::NoArray)?;
    let end = reply.rfind(']').ok_or(ReplyError::NoArray)?;
    if end <= start {
        return Err(ReplyError::NoArray);
    }

    let value: Value = serde_json::from_str(&reply[start..=end])
        .map_err(|e| ReplyError::Malformed(e.to_string()))?;
    let entries = value
        .as_array()
        .ok_or_else(|| ReplyError::Malformed("bracketed value is not an array".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let url = entry.get("url")?.as_str()?;
            Some(Summary {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect())
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+)\b").unwrap())
}

/// 0-based sample positions named by a reply of 1-based numbers.
///
/// Numbers outside `1..=sample_len` are discarded; at most `k` are kept, in
/// reply order.
pub fn parse_index_reply(reply: &str, sample_len: usize, k: usize) -> Vec<usize> {
    number_re()
        .captures_iter(reply)
        .filter_map(|cap| cap[1].parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= sample_len)
        .map(|n| n - 1)
        .take(k)
        .collect()
}

fn no_match_summary() -> Summary {
    Summary {
        name: NO_MATCH_NAME.to_string(),
        url: CONTACT_URL.to_string(),
    }
}

fn error_summary() -> Summary {
    Summary {
        name: ERROR_NAME.to_string(),
        url: CONTACT_URL.to_string(),
    }
}

fn no_match_record() -> AssessmentRecord {
    AssessmentRecord {
        url: CONTACT_URL.to_string(),
        adaptive_support: "No".to_string(),
        description: NO_MATCH_NAME.to_string(),
        duration: DEFAULT_DURATION_MINUTES,
        remote_support: "Yes".to_string(),
        test_type: vec![DEFAULT_TEST_TYPE.to_string()],
    }
}

fn error_record(reason: &str) -> AssessmentRecord {
    AssessmentRecord {
        url: CONTACT_URL.to_string(),
        adaptive_support: "No".to_string(),
        description: format!("{}: {}", ERROR_NAME, reason),
        duration: DEFAULT_DURATION_MINUTES,
        remote_support: "Yes".to_string(),
        test_type: vec!["Error".to_string()],
    }
}

/// Query goes in last so placeholders typed by the user stay literal
fn render_prompt(template: &str, query: &str, k: usize, sample: &[Product]) -> String {
    template
        .replace("{k}", &k.to_string())
        .replace("{products}", &formatter::format_sample(sample))
        .replace("{query}", query)
}

/// Recommendation service over a dataset and a language model
pub struct Recommender {
    dataset: Arc<DatasetStore>,
    llm: Arc<dyn Completion>,
    sampler: Sampler,
    sample_size: usize,
    temperature: f32,
}

impl Recommender {
    pub fn new(dataset: Arc<DatasetStore>, llm: Arc<dyn Completion>) -> Self {
        Self {
            dataset,
            llm,
            sampler: Sampler::from_entropy(),
            sample_size: SAMPLE_SIZE,
            temperature: LLM_TEMPERATURE,
        }
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Draw the per-query sample, or explain why there is nothing to draw from
    fn draw_sample(&self) -> Result<Vec<Product>, SampleError> {
        let products = self
            .dataset
            .products()
            .map_err(|e| SampleError::Dataset(e.to_string()))?;
        tracing::debug!("Knowledge base holds {} products", products.len());
        if products.is_empty() {
            return Err(SampleError::Empty);
        }
        Ok(self.sampler.sample(&products, self.sample_size))
    }

    /// Name/URL recommendations chosen by the model from a JSON-array reply
    pub fn recommend_summaries(&self, query: &str, k: usize) -> Recommendation<Summary> {
        tracing::info!("Processing query: {}", query);

        let sample = match self.draw_sample() {
            Ok(sample) => sample,
            Err(SampleError::Empty) => {
                return Recommendation::fallback("dataset is empty", vec![no_match_summary()])
            }
            Err(SampleError::Dataset(e)) => {
                return Recommendation::failed(e, vec![error_summary()])
            }
        };

        let prompt = render_prompt(SUMMARY_PROMPT, query, k, &sample);
        let reply = match self.llm.complete(&prompt, self.temperature) {
            Ok(reply) => reply,
            Err(e) => return Recommendation::failed(e.to_string(), vec![error_summary()]),
        };
        tracing::debug!("LLM reply: {}", reply);

        match parse_summary_reply(&reply) {
            Ok(mut items) if !items.is_empty() => {
                items.truncate(k.max(1));
                Recommendation::matched(items)
            }
            Ok(_) => Recommendation::fallback(
                "reply array had no entries with name and url",
                vec![no_match_summary()],
            ),
            Err(ReplyError::NoArray) => Recommendation::fallback(
                "no JSON array found in reply",
                vec![no_match_summary()],
            ),
            Err(ReplyError::Malformed(e)) => {
                Recommendation::failed(format!("malformed JSON in reply: {}", e), vec![error_summary()])
            }
        }
    }

    /// Expanded records for the products whose numbers the model replied with
    pub fn recommend_assessments(&self, query: &str, k: usize) -> Recommendation<AssessmentRecord> {
        tracing::info!("Processing API query: {}", query);

        let sample = match self.draw_sample() {
            Ok(sample) => sample,
            Err(SampleError::Empty) => {
                return Recommendation::fallback("dataset is empty", vec![no_match_record()])
            }
            Err(SampleError::Dataset(e)) => {
                let record = error_record(&e);
                return Recommendation::failed(e, vec![record]);
            }
        };

        let prompt = render_prompt(INDEX_PROMPT, query, k, &sample);
        let reply = match self.llm.complete(&prompt, self.temperature) {
            Ok(reply) => reply,
            Err(e) => {
                let reason = e.to_string();
                let record = error_record(&reason);
                return Recommendation::failed(reason, vec![record]);
            }
        };
        tracing::debug!("LLM reply: {}", reply);

        let indices = parse_index_reply(&reply, sample.len(), k);
        tracing::debug!("Selected indices: {:?}", indices);

        if indices.is_empty() {
            let items = sample
                .iter()
                .take(k.max(1))
                .map(formatter::assessment_record)
                .collect();
            return Recommendation::fallback("no valid product numbers in reply", items);
        }

        Recommendation::matched(
            indices
                .into_iter()
                .map(|i| formatter::assessment_record(&sample[i]))
                .collect(),
        )
    }
}

enum SampleError {
    Empty,
    Dataset(String),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::product::{ProductType, Section};
    use std::sync::Mutex;

    /// Completion stub replaying a fixed reply and recording prompts
    pub(crate) struct ScriptedLlm {
        reply: Result<String, String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Completion for ScriptedLlm {
        fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(LlmError::Api)
        }
    }

    pub(crate) fn catalog(n: usize) -> Vec<Product> {
        (1..=n)
            .map(|i| {
                let mut p = Product::new(
                    ProductType::Individual,
                    format!("Assessment {}", i),
                    format!("https://www.shl.com/products/product-catalog/view/a-{}/", i),
                );
                p.description = format!("Description {}", i);
                p.sections = vec![Section::new("Assessment length", format!("minutes = {}", i * 5))];
                p
            })
            .collect()
    }

    fn recommender(products: Vec<Product>, llm: Arc<ScriptedLlm>, seed: u64) -> Recommender {
        Recommender::new(Arc::new(DatasetStore::from_products(products)), llm)
            .with_sampler(Sampler::seeded(seed))
    }

    #[test]
    fn test_parse_summary_reply_strips_extra_fields() {
        let reply = r#"Sure! Here you go:
[
  {"name": "Java 8 (New)", "url": "https://x/java", "score": 0.9},
  {"name": "Missing url"},
  {"name": "Core Java", "url": "https://x/core-java", "why": "matches"}
]
Hope that helps."#;
        let items = parse_summary_reply(reply).unwrap();
        assert_eq!(
            items,
            vec![
                Summary { name: "Java 8 (New)".into(), url: "https://x/java".into() },
                Summary { name: "Core Java".into(), url: "https://x/core-java".into() },
            ]
        );
    }

    #[test]
    fn test_parse_summary_reply_errors() {
        assert_eq!(parse_summary_reply("no list here"), Err(ReplyError::NoArray));
        assert_eq!(parse_summary_reply("] backwards ["), Err(ReplyError::NoArray));
        assert!(matches!(
            parse_summary_reply("[{\"name\": }]"),
            Err(ReplyError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_index_reply() {
        assert_eq!(parse_index_reply("3, 1, 99, 2", 5, 5), vec![2, 0, 1]);
        assert_eq!(parse_index_reply("0, 4, 5, 1", 5, 2), vec![3, 4]);
        assert!(parse_index_reply("none of them", 5, 5).is_empty());
        assert_eq!(parse_index_reply("Assessments: 2,3", 5, 5), vec![1, 2]);
    }

    #[test]
    fn test_summaries_matched() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"[{"name": "Assessment 2", "url": "https://x/2", "extra": 1}]"#,
        ));
        let rec = recommender(catalog(5), llm.clone(), 1).recommend_summaries("java dev", 5);
        assert!(rec.is_matched());
        assert_eq!(rec.items, vec![Summary { name: "Assessment 2".into(), url: "https://x/2".into() }]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("USER QUERY: \"java dev\""));
        assert!(prompts[0].contains("PRODUCT 5:"));
    }

    #[test]
    fn test_summaries_truncated_to_k() {
        let reply = r#"[
            {"name": "Assessment 1", "url": "https://x/1"},
            {"name": "Assessment 2", "url": "https://x/2"},
            {"name": "Assessment 3", "url": "https://x/3"}
        ]"#;
        let llm = Arc::new(ScriptedLlm::replying(reply));
        let rec = recommender(catalog(5), llm, 1).recommend_summaries("java dev", 2);
        assert!(rec.is_matched());
        let names: Vec<&str> = rec.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Assessment 1", "Assessment 2"]);
    }

    #[test]
    fn test_summaries_zero_k_still_returns_an_item() {
        let llm = Arc::new(ScriptedLlm::replying(r#"[{"name": "A", "url": "u"}]"#));
        let rec = recommender(catalog(5), llm, 1).recommend_summaries("java", 0);
        assert!(rec.is_matched());
        assert_eq!(rec.items, vec![Summary { name: "A".into(), url: "u".into() }]);
    }

    #[test]
    fn test_query_placeholders_are_not_expanded() {
        let llm = Arc::new(ScriptedLlm::replying("1"));
        recommender(catalog(3), llm.clone(), 1).recommend_assessments("pick {k} of {products}", 5);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("USER QUERY: \"pick {k} of {products}\""));
        assert_eq!(prompts[0].matches("PRODUCT 1:").count(), 1);
    }

    #[test]
    fn test_summaries_without_array_fall_back() {
        let llm = Arc::new(ScriptedLlm::replying("I could not decide."));
        let rec = recommender(catalog(5), llm, 1).recommend_summaries("anything", 5);
        assert_eq!(rec.outcome.label(), "fallback");
        assert_eq!(rec.items.len(), 1);
        assert_eq!(rec.items[0].name, NO_MATCH_NAME);
    }

    #[test]
    fn test_summaries_llm_error_is_failed_outcome() {
        let llm = Arc::new(ScriptedLlm::failing("quota exceeded"));
        let rec = recommender(catalog(5), llm, 1).recommend_summaries("anything", 5);
        match &rec.outcome {
            Outcome::Failed { reason } => assert!(reason.contains("quota exceeded")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(rec.items[0].name, ERROR_NAME);
    }

    #[test]
    fn test_assessments_resolve_indices_against_sample() {
        let products = catalog(5);
        let expected_sample = Sampler::seeded(7).sample(&products, SAMPLE_SIZE);

        let llm = Arc::new(ScriptedLlm::replying("3, 1, 99, 2"));
        let rec = recommender(products, llm, 7).recommend_assessments("Java developer, 30 minutes", 5);

        assert!(rec.is_matched());
        let urls: Vec<&str> = rec.items.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                expected_sample[2].link.as_str(),
                expected_sample[0].link.as_str(),
                expected_sample[1].link.as_str(),
            ]
        );
        assert_eq!(rec.items[0].duration, formatter::duration_minutes(&expected_sample[2]));
    }

    #[test]
    fn test_assessments_without_numbers_take_first_k() {
        let products = catalog(8);
        let expected_sample = Sampler::seeded(3).sample(&products, SAMPLE_SIZE);

        let llm = Arc::new(ScriptedLlm::replying("no idea"));
        let rec = recommender(products, llm, 3).recommend_assessments("sales", 3);

        assert_eq!(rec.outcome.label(), "fallback");
        assert_eq!(rec.items.len(), 3);
        assert_eq!(rec.items[0].url, expected_sample[0].link);
    }

    #[test]
    fn test_assessments_llm_error_record() {
        let llm = Arc::new(ScriptedLlm::failing("timeout"));
        let rec = recommender(catalog(5), llm, 1).recommend_assessments("sales", 5);
        assert_eq!(rec.outcome.label(), "failed");
        assert_eq!(rec.items.len(), 1);
        assert_eq!(rec.items[0].test_type, vec!["Error"]);
        assert!(rec.items[0].description.starts_with(ERROR_NAME));
    }

    #[test]
    fn test_empty_dataset_skips_llm() {
        let llm = Arc::new(ScriptedLlm::replying("1"));
        let rec = recommender(Vec::new(), llm.clone(), 1).recommend_assessments("sales", 5);
        assert_eq!(rec.outcome.label(), "fallback");
        assert_eq!(rec.items.len(), 1);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_prompt_renders_at_most_thirty_products() {
        let llm = Arc::new(ScriptedLlm::replying("1"));
        recommender(catalog(60), llm.clone(), 9).recommend_assessments("x", 5);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("PRODUCT 30:"));
        assert!(!prompts[0].contains("PRODUCT 31:"));
    }
}
