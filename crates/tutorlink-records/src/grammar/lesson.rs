use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineGrammar, capture};
use crate::records::Lesson;

/// `{title}[ ({subject})][ [{type}]][ - Due: {date}]`
static LESSON_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?P<title>.+?)(?:\s+\((?P<subject>[^()]+)\))?(?:\s+\[(?P<kind>[^\]]+)\])?(?:\s+-\s+Due:\s*(?P<due>.+?))?\s*$",
    )
    .expect("Invalid lesson line regex")
});

/// `Objectives: ...`, `Focus: ...`, `Keywords: ...`, `Difficulty: ...`,
/// optionally indented or bulleted.
static LESSON_DETAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*•]\s+)?(?P<field>objectives?|focus|keywords?|difficulty(?:\s+level)?)\s*:\s*(?P<value>.*?)\s*$")
        .expect("Invalid lesson detail regex")
});

/// A detail line belonging to the lesson above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LessonDetail {
    /// `;`-separated objectives
    Objectives(Vec<String>),
    /// Focus area
    Focus(String),
    /// `,`-separated keywords
    Keywords(Vec<String>),
    /// Difficulty level
    Difficulty(String),
}

impl LessonDetail {
    /// Recognize a detail line; `None` for anything else.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = LESSON_DETAIL.captures(line)?;
        let value = caps.name("value")?.as_str();
        if value.is_empty() {
            return None;
        }
        let field = caps.name("field")?.as_str().to_ascii_lowercase();
        let detail = if field.starts_with("objective") {
            Self::Objectives(split_list(value, ';'))
        } else if field == "focus" {
            Self::Focus(value.to_string())
        } else if field.starts_with("keyword") {
            Self::Keywords(split_list(value, ','))
        } else {
            Self::Difficulty(value.to_string())
        };
        Some(detail)
    }

    /// Whether `line` has the shape of a detail line, even with nothing
    /// after the colon.
    pub fn is_detail_line(line: &str) -> bool {
        LESSON_DETAIL.is_match(line)
    }

    /// Fold this detail into `lesson`.
    pub fn apply(self, lesson: &mut Lesson) {
        match self {
            Self::Objectives(items) => lesson.objectives.extend(items),
            Self::Focus(focus) => lesson.focus = Some(focus),
            Self::Keywords(items) => lesson.keywords.extend(items),
            Self::Difficulty(level) => lesson.difficulty_level = Some(level),
        }
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lesson header lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LessonGrammar;

impl LineGrammar for LessonGrammar {
    type Record = Lesson;

    const NAME: &'static str = "lesson";
    const VERSION: u32 = 1;

    fn parse(&self, body: &str) -> Option<Lesson> {
        let caps = LESSON_LINE.captures(body)?;
        Some(Lesson {
            title: capture(&caps, "title")?,
            subject: capture(&caps, "subject"),
            content_type: capture(&caps, "kind"),
            due_date: capture(&caps, "due"),
            ..Default::default()
        })
    }

    fn fallback(&self, title: &str) -> Lesson {
        Lesson {
            title: title.to_string(),
            ..Default::default()
        }
    }
}
