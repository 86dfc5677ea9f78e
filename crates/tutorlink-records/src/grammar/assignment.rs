use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineGrammar, capture};
use crate::records::Assignment;

/// `{title} - Due: {date}` with an optional trailing `({status})`
static ASSIGNMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)\s+-\s+Due:\s*(?P<due>.+?)(?:\s+\((?P<status>[^()]+)\))?\s*$")
        .expect("Invalid assignment line regex")
});

/// Assignment lines. Lines without an explicit status take the status of
/// the section they appear in.
#[derive(Debug, Clone, Default)]
pub struct AssignmentGrammar {
    default_status: Option<String>,
}

impl AssignmentGrammar {
    /// Grammar stamping `status` on lines that do not state one
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            default_status: Some(status.into()),
        }
    }
}

impl LineGrammar for AssignmentGrammar {
    type Record = Assignment;

    const NAME: &'static str = "assignment";
    const VERSION: u32 = 1;

    fn parse(&self, body: &str) -> Option<Assignment> {
        let caps = ASSIGNMENT_LINE.captures(body)?;
        Some(Assignment {
            title: capture(&caps, "title")?,
            due_date: capture(&caps, "due"),
            status: capture(&caps, "status")
                .map(|status| status.to_lowercase())
                .or_else(|| self.default_status.clone()),
        })
    }

    fn fallback(&self, title: &str) -> Assignment {
        Assignment {
            title: title.to_string(),
            ..Default::default()
        }
    }
}
