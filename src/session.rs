//! Conversation state for the interactive terminal UI
//!
//! A new query shows the first page of results; "more" pages through the
//! rest, with a bounded number of follow-ups per query.

use crate::config::{MAX_FOLLOW_UPS, PAGE_SIZE};
use crate::formatter::Summary;

/// One answered query, as shown in the history
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub query: String,
    pub results: Vec<Summary>,
}

/// What the UI should show after a "more" request
#[derive(Debug, Clone, PartialEq)]
pub enum MoreResponse {
    Page(Vec<Summary>),
    NoPreviousResults,
    Exhausted,
    LimitReached,
}

/// Whether the input asks for more results of the previous query
pub fn is_more_request(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "more" | "more options" | "more assessments"
    )
}

#[derive(Debug, Default)]
pub struct Conversation {
    history: Vec<Turn>,
    last_results: Vec<Summary>,
    next_index: usize,
    follow_ups: usize,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the results of a new query and return its first page
    pub fn start(&mut self, query: &str, results: Vec<Summary>) -> Vec<Summary> {
        let first_page: Vec<Summary> = results.iter().take(PAGE_SIZE).cloned().collect();
        self.follow_ups = 0;
        self.next_index = PAGE_SIZE;
        if !results.is_empty() {
            self.history.push(Turn {
                query: query.to_string(),
                results: first_page.clone(),
            });
            self.last_results = results;
        }
        first_page
    }

    /// Next page of the previous query's results
    pub fn more(&mut self) -> MoreResponse {
        if self.last_results.is_empty() {
            return MoreResponse::NoPreviousResults;
        }
        if self.follow_ups >= MAX_FOLLOW_UPS {
            return MoreResponse::LimitReached;
        }
        self.follow_ups += 1;

        let start = self.next_index.min(self.last_results.len());
        let end = (start + PAGE_SIZE).min(self.last_results.len());
        if start == end {
            return MoreResponse::Exhausted;
        }
        self.next_index = start + PAGE_SIZE;
        MoreResponse::Page(self.last_results[start..end].to_vec())
    }

    /// Whether a "more" prompt should be offered
    pub fn can_show_more(&self) -> bool {
        !self.last_results.is_empty()
            && self.follow_ups < MAX_FOLLOW_UPS
            && self.next_index < self.last_results.len()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}
