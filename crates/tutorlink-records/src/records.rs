//! Typed records extracted from capability server replies.
//!
//! Every record has a non-empty `title`; all other fields are optional so a
//! line that only partially matches its grammar still yields a value.

use serde::{Deserialize, Serialize};

/// A piece of assigned work with a due date.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assignment {
    /// Assignment title
    pub title: String,
    /// Due date as printed by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// `overdue`, `upcoming`, `pending`, or whatever the line states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A graded piece of work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grade {
    /// Title of the graded item
    pub title: String,
    /// Kind of item (quiz, worksheet, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Points earned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_value: Option<f64>,
    /// Points possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_max_value: Option<f64>,
    /// Percentage as printed, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// A lesson, with its optional detail lines folded in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson title
    pub title: String,
    /// Kind of lesson content (video, reading, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Subject name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Due date as printed by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Learning objectives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objectives: Vec<String>,
    /// Focus area
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    /// Keywords
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Difficulty level as printed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
}

/// A worksheet, possibly tied to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Worksheet {
    /// Worksheet title
    pub title: String,
    /// Subject name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Due date as printed by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Title of the lesson this worksheet belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_lesson: Option<String>,
}

/// Any other study material.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudyMaterial {
    /// Material kind, e.g. `Worksheet`, `Notes`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub material_type: Option<String>,
    /// Material title
    pub title: String,
    /// Subject name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Records grouped by kind, in the order they appeared.
///
/// Records are not deduplicated across sections: an item listed both as
/// overdue and as graded shows up in both arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategorizedResults {
    /// Assignments from every assignment section
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
    /// Grades
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grades: Vec<Grade>,
    /// Lessons
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lessons: Vec<Lesson>,
    /// Worksheets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worksheets: Vec<Worksheet>,
    /// Study materials
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<StudyMaterial>,
    /// Enrolled subject names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,
}

impl CategorizedResults {
    /// Total number of records across all categories
    pub fn total(&self) -> usize {
        self.assignments.len()
            + self.grades.len()
            + self.lessons.len()
            + self.worksheets.len()
            + self.materials.len()
            + self.subjects.len()
    }

    /// Whether no category holds anything
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_material_type_serializes_as_type() {
        let material = StudyMaterial {
            material_type: Some("Worksheet".to_string()),
            title: "Fractions".to_string(),
            subject: None,
        };
        assert_eq!(
            serde_json::to_value(&material).unwrap(),
            json!({"type": "Worksheet", "title": "Fractions"})
        );
    }

    #[test]
    fn test_empty_categories_are_omitted() {
        let results = CategorizedResults {
            subjects: vec!["Math".to_string()],
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&results).unwrap(), json!({"subjects": ["Math"]}));
        assert_eq!(results.total(), 1);
        assert!(CategorizedResults::default().is_empty());
    }
}
