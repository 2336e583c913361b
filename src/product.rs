//! Catalog product record as stored in the dataset file

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which kind of row the catalog listed the product under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Pre-packaged")]
    PrePackaged,
    #[serde(rename = "Individual")]
    Individual,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrePackaged => "Pre-packaged",
            Self::Individual => "Individual",
        }
    }
}

/// A labeled block of text from a product detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub text: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            text: text.into(),
        }
    }
}

/// The filter values whose listing page produced a row.
///
/// Phase one sets family, level and industry; phase two sets only the
/// category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterContext {
    pub job_family: Option<u32>,
    pub job_level: Option<u32>,
    pub industry: Option<u32>,
    pub job_category: Option<u32>,
}

impl FilterContext {
    pub fn combination(job_family: u32, job_level: u32, industry: u32) -> Self {
        Self {
            job_family: Some(job_family),
            job_level: Some(job_level),
            industry: Some(industry),
            job_category: None,
        }
    }

    pub fn category(job_category: u32) -> Self {
        Self {
            job_category: Some(job_category),
            ..Self::default()
        }
    }

    /// Query parameters sent to the catalog listing
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        if let Some(v) = self.job_family {
            params.push(("job_family", v.to_string()));
        }
        if let Some(v) = self.job_level {
            params.push(("job_level", v.to_string()));
        }
        if let Some(v) = self.industry {
            params.push(("industry", v.to_string()));
        }
        if let Some(v) = self.job_category {
            params.push(("job_category", v.to_string()));
        }
        params.push(("action_doFilteringForm", "Search".to_string()));
        params.push(("f", "1".to_string()));
        params
    }

    /// Short label for logs and reports
    pub fn label(&self) -> String {
        match self.job_category {
            Some(jc) => format!("job_category={}", jc),
            None => format!(
                "job_family={} job_level={} industry={}",
                opt(self.job_family),
                opt(self.job_level),
                opt(self.industry)
            ),
        }
    }
}

fn opt(v: Option<u32>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "Product Type")]
    pub product_type: ProductType,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Link")]
    pub link: String,

    #[serde(rename = "Remote Testing", with = "yes_no_flag", default)]
    pub remote_testing: bool,

    #[serde(rename = "Adaptive", with = "yes_no_flag", default)]
    pub adaptive: bool,

    #[serde(rename = "Test Types", default)]
    pub test_types: Vec<String>,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Sections", default)]
    pub sections: Vec<Section>,

    #[serde(rename = "Job Family", default)]
    pub job_family: Option<u32>,

    #[serde(rename = "Job Level", default)]
    pub job_level: Option<u32>,

    #[serde(rename = "Industry", default)]
    pub industry: Option<u32>,

    #[serde(rename = "Job Category", default)]
    pub job_category: Option<u32>,

    #[serde(rename = "Detail Error", default, skip_serializing_if = "Option::is_none")]
    pub detail_error: Option<String>,
}

impl Product {
    /// Minimal product with the identity fields set; used by the parser and tests
    pub fn new(product_type: ProductType, name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            product_type,
            name: name.into(),
            link: link.into(),
            remote_testing: false,
            adaptive: false,
            test_types: Vec::new(),
            description: String::new(),
            sections: Vec::new(),
            job_family: None,
            job_level: None,
            industry: None,
            job_category: None,
            detail_error: None,
        }
    }

    pub fn with_filter(mut self, filter: &FilterContext) -> Self {
        self.job_family = filter.job_family;
        self.job_level = filter.job_level;
        self.industry = filter.industry;
        self.job_category = filter.job_category;
        self
    }

    /// Look up a section body by its exact heading
    pub fn section(&self, heading: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.heading == heading)
            .map(|s| s.text.as_str())
    }
}

/// Boolean facets are stored as "Yes"/"No". Older harvests wrote check marks.
mod yes_no_flag {
    use super::*;
    use serde_json::Value;

    pub fn serialize<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *flag { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::String(s) => matches!(s.trim(), "Yes" | "yes" | "✅" | "true"),
            _ => false,
        })
    }
}
