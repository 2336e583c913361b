//! Product rendering for prompts and API responses

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::{MAX_PRODUCT_TEXT_CHARS, PROMPT_PRODUCT_LIMIT};
use crate::product::Product;

/// Heading of the detail section that states the completion time
pub const DURATION_HEADING: &str = "Assessment length";

/// Minutes assumed when a product does not state its length
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Category assumed when the catalog lists no test type
pub const DEFAULT_TEST_TYPE: &str = "Knowledge & Skills";

/// Name/URL pair shown in the terminal UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub name: String,
    pub url: String,
}

/// Expanded record returned by the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub url: String,
    pub adaptive_support: String,
    pub description: String,
    pub duration: u32,
    pub remote_support: String,
    pub test_type: Vec<String>,
}

/// Text block describing one product to the model, capped at `max_chars`
pub fn product_text(product: &Product, max_chars: usize) -> String {
    let mut text = format!(
        "Name: {}\nDescription: {}\n",
        product.name, product.description
    );
    for section in &product.sections {
        if !section.heading.is_empty() && !section.text.is_empty() {
            text.push_str(&format!("{}: {}\n", section.heading, section.text));
        }
    }
    truncate_chars(text, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

/// Numbered product list embedded in the prompt.
///
/// Only the first `limit` products are rendered; numbering is 1-based and
/// matches the position in `products`.
pub fn format_for_prompt(products: &[Product], limit: usize) -> String {
    products
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| {
            format!(
                "PRODUCT {}:\n{}\nLink: {}\n",
                i + 1,
                product_text(p, MAX_PRODUCT_TEXT_CHARS),
                p.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt list with the default limit
pub fn format_sample(products: &[Product]) -> String {
    format_for_prompt(products, PROMPT_PRODUCT_LIMIT)
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// Completion time in minutes, from the first number in the length section
pub fn duration_minutes(product: &Product) -> u32 {
    product
        .sections
        .iter()
        .filter(|s| s.heading == DURATION_HEADING)
        .find_map(|s| digits_re().find(&s.text)?.as_str().parse().ok())
        .unwrap_or(DEFAULT_DURATION_MINUTES)
}

pub fn test_types(product: &Product) -> Vec<String> {
    if product.test_types.is_empty() {
        vec![DEFAULT_TEST_TYPE.to_string()]
    } else {
        product.test_types.clone()
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn summary(product: &Product) -> Summary {
    Summary {
        name: product.name.clone(),
        url: product.link.clone(),
    }
}

pub fn assessment_record(product: &Product) -> AssessmentRecord {
    AssessmentRecord {
        url: product.link.clone(),
        adaptive_support: yes_no(product.adaptive).to_string(),
        description: product.description.clone(),
        duration: duration_minutes(product),
        remote_support: yes_no(product.remote_testing).to_string(),
        test_type: test_types(product),
    }
}
