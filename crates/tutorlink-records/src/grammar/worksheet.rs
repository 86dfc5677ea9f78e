use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineGrammar, capture};
use crate::records::Worksheet;

/// `{title}[ ({subject})][ - Due: {date}][ | Lesson: {lesson}]`
static WORKSHEET_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.+?)(?:\s+\((?P<subject>[^()]+)\))?(?:\s+-\s+Due:\s*(?P<due>.+?))?(?:\s*\|\s*Lesson:\s*(?P<lesson>.+?))?\s*$",
    )
    .expect("Invalid worksheet line regex")
});

/// Worksheet lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorksheetGrammar;

impl LineGrammar for WorksheetGrammar {
    type Record = Worksheet;

    const NAME: &'static str = "worksheet";
    const VERSION: u32 = 1;

    fn parse(&self, body: &str) -> Option<Worksheet> {
        let caps = WORKSHEET_LINE.captures(body)?;
        Some(Worksheet {
            title: capture(&caps, "title")?,
            subject: capture(&caps, "subject"),
            due_date: capture(&caps, "due"),
            related_lesson: capture(&caps, "lesson"),
        })
    }

    fn fallback(&self, title: &str) -> Worksheet {
        Worksheet {
            title: title.to_string(),
            ..Default::default()
        }
    }
}
