//! Normalized envelope returned for text replies.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grammar::{LessonDetail, strip_bullet};
use crate::parser::{SearchCategory, header_label, parse_response};
use crate::records::CategorizedResults;

/// Summary used when a call failed and was absorbed.
pub const FAILED_SUMMARY: &str = "failed";

/// `{results, summary, raw_response}` built from a text reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchEnvelope {
    /// Records grouped by kind
    #[serde(default)]
    pub results: CategorizedResults,
    /// First free-text paragraph of the reply, or a result count
    #[serde(default)]
    pub summary: String,
    /// The reply as received
    #[serde(default)]
    pub raw_response: String,
}

impl SearchEnvelope {
    /// Parse a text reply using `category` as the grammar hint.
    pub fn from_text(text: &str, category: SearchCategory) -> Self {
        let parsed = parse_response(text, category);
        debug!(
            category = %category,
            matched = parsed.report.matched,
            fallbacks = parsed.report.fallbacks,
            sections = parsed.report.sections,
            "Parsed text reply"
        );
        let summary = summarize(text, parsed.results.total());
        Self {
            results: parsed.results,
            summary,
            raw_response: text.to_string(),
        }
    }

    /// Safe default for a failed call
    pub fn failed() -> Self {
        Self {
            summary: FAILED_SUMMARY.to_string(),
            ..Default::default()
        }
    }

    /// Whether this is the [`SearchEnvelope::failed`] default
    pub fn is_failed(&self) -> bool {
        self.summary == FAILED_SUMMARY && self.results.is_empty() && self.raw_response.is_empty()
    }
}

/// First paragraph made only of prose lines, else `Found N results`.
fn summarize(text: &str, total: usize) -> String {
    let mut paragraph: Vec<&str> = Vec::new();
    let mut prose = true;

    for line in text.lines().chain(std::iter::once("")) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if prose && !paragraph.is_empty() {
                return paragraph.join(" ");
            }
            paragraph.clear();
            prose = true;
            continue;
        }
        let structural = header_label(trimmed).is_some()
            || strip_bullet(trimmed).is_some()
            || LessonDetail::is_detail_line(trimmed);
        if structural {
            prose = false;
        } else {
            paragraph.push(trimmed);
        }
    }

    format!("Found {total} results")
}
