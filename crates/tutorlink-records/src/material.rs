//! Material content, question lookup and access checks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `N. ` or `N) ` at the start of a question entry
static NUMBERED_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?P<number>\d+)[.)]\s").expect("Invalid numbered entry regex"));

/// Verbs that mark a line as an instruction for the questions below it
static ACTION_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(solve|write|shade|round|draw|circle|find|complete|answer|calculate|match|fill|choose|label|show|explain|read|use|add|subtract|multiply|divide|compare|estimate|simplify|identify|list|order)\b",
    )
    .expect("Invalid action verb regex")
});

/// A material's content as returned by `get_material_content`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialContent {
    /// Identifier the caller asked for
    pub identifier: String,
    /// Material title; the identifier when the server gives none
    pub title: String,
    /// Subject name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Material kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Question list in order, instructions included
    #[serde(default)]
    pub questions: Vec<String>,
    /// Free-form body text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl MaterialContent {
    /// Build from a structured reply.
    ///
    /// Accepts `questions` at the top level or under `content`, as plain
    /// strings or objects with a `text`/`question` field. A string
    /// `content` is split into lines.
    pub fn from_json(identifier: &str, value: &Value) -> Option<Self> {
        let root = value.get("material").unwrap_or(value);
        if !root.is_object() {
            return None;
        }

        let text_field = |key: &str| {
            root.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut questions = root
            .get("questions")
            .or_else(|| root.get("content").and_then(|c| c.get("questions")))
            .map(question_list)
            .unwrap_or_default();

        let body = root
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);
        if questions.is_empty()
            && let Some(body) = &body
        {
            questions = non_empty_lines(body);
        }

        Some(Self {
            identifier: identifier.to_string(),
            title: text_field("title").unwrap_or_else(|| identifier.to_string()),
            subject: text_field("subject"),
            content_type: text_field("content_type").or_else(|| text_field("type")),
            questions,
            body,
        })
    }

    /// Build from a text reply: optional `Title:`, `Subject:` and `Type:`
    /// header lines, then one entry per non-empty line.
    pub fn from_text(identifier: &str, text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }

        let mut material = Self {
            identifier: identifier.to_string(),
            title: identifier.to_string(),
            ..Default::default()
        };
        let mut body_lines = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                let value = value.trim().trim_matches('*').trim();
                match key.trim().trim_matches('*').to_ascii_lowercase().as_str() {
                    "title" if !value.is_empty() => {
                        material.title = value.to_string();
                        continue;
                    }
                    "subject" if !value.is_empty() => {
                        material.subject = Some(value.to_string());
                        continue;
                    }
                    "type" | "content type" if !value.is_empty() => {
                        material.content_type = Some(value.to_string());
                        continue;
                    }
                    _ => {}
                }
            }
            body_lines.push(trimmed.to_string());
        }

        material.body = Some(body_lines.join("\n"));
        material.questions = body_lines;
        Some(material)
    }

    /// Number of numbered question entries
    pub fn question_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|entry| NUMBERED_ENTRY.is_match(entry))
            .count()
    }
}

fn question_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.trim().to_string()),
                    Value::Object(_) => item
                        .get("text")
                        .or_else(|| item.get("question"))
                        .and_then(Value::as_str)
                        .map(|text| text.trim().to_string()),
                    _ => None,
                })
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A located question and the instruction that applies to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionMatch {
    /// Position in the question list
    pub index: usize,
    /// Question number
    pub number: u32,
    /// The full numbered entry
    pub text: String,
    /// Nearest preceding instruction line
    pub instruction: Option<String>,
}

fn entry_number(entry: &str) -> Option<u32> {
    NUMBERED_ENTRY
        .captures(entry)
        .and_then(|caps| caps.name("number"))
        .and_then(|m| m.as_str().parse().ok())
}

/// Find question `number` and the instruction heading it.
///
/// The instruction is the nearest non-numbered line above the question that
/// contains an action verb; numbered entries in between are skipped, so one
/// instruction covers a whole run of questions. Returns `None` when no entry
/// carries that number.
pub fn find_question(questions: &[String], number: u32) -> Option<QuestionMatch> {
    let index = questions
        .iter()
        .position(|entry| entry_number(entry) == Some(number))?;

    let instruction = questions[..index]
        .iter()
        .rev()
        .filter(|entry| !NUMBERED_ENTRY.is_match(entry))
        .find(|entry| ACTION_VERB.is_match(entry))
        .map(|entry| entry.trim().to_string());

    Some(QuestionMatch {
        index,
        number,
        text: questions[index].trim().to_string(),
        instruction,
    })
}

/// The question part of a [`SpecificQuestion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRef {
    /// Question number
    pub number: u32,
    /// The full numbered entry
    pub text: String,
}

/// One question out of a material, with its instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificQuestion {
    /// Title of the material the question belongs to
    pub material_title: String,
    /// The question itself
    pub question: QuestionRef,
    /// Instruction heading the question, when one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    /// Number of numbered questions in the material
    pub total_questions: usize,
}

impl SpecificQuestion {
    /// Look up question `number` in `material`.
    pub fn locate(material: &MaterialContent, number: u32) -> Option<Self> {
        let found = find_question(&material.questions, number)?;
        Some(Self {
            material_title: material.title.clone(),
            question: QuestionRef {
                number: found.number,
                text: found.text,
            },
            instruction: found.instruction,
            total_questions: material.question_count(),
        })
    }
}

/// Whether a learner may open a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAccess {
    /// Access granted
    pub has_access: bool,
    /// Why access was denied, or why the answer is unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Material title, when the server echoes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_title: Option<String>,
}

impl MaterialAccess {
    /// Access refused with `reason`; also the safe default on failure.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            has_access: false,
            reason: Some(reason.into()),
            material_title: None,
        }
    }

    /// Build from a structured reply (`has_access`/`hasAccess`/`access`).
    pub fn from_json(value: &Value) -> Option<Self> {
        let has_access = ["has_access", "hasAccess", "access", "allowed"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_bool))?;
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        };
        Some(Self {
            has_access,
            reason: text(&["reason", "message"]),
            material_title: text(&["title", "material_title"]),
        })
    }

    /// Build from a text reply; anything not clearly granting access is a
    /// denial carrying the text as its reason.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        let denied = [
            "no access",
            "not have access",
            "access denied",
            "denied",
            "not available",
            "not assigned",
        ]
        .iter()
        .any(|needle| lower.contains(needle));
        let granted = ["has access", "access granted", "can access", "is available"]
            .iter()
            .any(|needle| lower.contains(needle));

        if granted && !denied {
            Self {
                has_access: true,
                reason: None,
                material_title: None,
            }
        } else {
            Self::denied(text.trim())
        }
    }
}
