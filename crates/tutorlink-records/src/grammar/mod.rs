//! Line grammars.
//!
//! Each grammar recognizes one bullet line shape and is versioned on its
//! own, so a change in the server's wording only touches one unit. Bullet
//! markers are stripped before a grammar sees the line.

mod assignment;
mod grade;
mod lesson;
mod material;
mod worksheet;

pub use assignment::AssignmentGrammar;
pub use grade::GradeGrammar;
pub use lesson::{LessonDetail, LessonGrammar};
pub use material::MaterialGrammar;
pub use worksheet::WorksheetGrammar;

/// A fixed-shape, anchored pattern for one kind of bullet line.
pub trait LineGrammar {
    /// Record produced for each line
    type Record;

    /// Grammar name, used in logs
    const NAME: &'static str;

    /// Bumped whenever the accepted line shape changes
    const VERSION: u32;

    /// Parse a bullet body (marker already stripped).
    fn parse(&self, body: &str) -> Option<Self::Record>;

    /// Title-only record for a line this grammar could not match.
    fn fallback(&self, title: &str) -> Self::Record;
}

/// Strip a leading `- `, `* ` or `• ` marker, returning the trimmed body.
///
/// Returns `None` for lines that are not bullets.
pub fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map(str::trim)
        .filter(|body| !body.is_empty())
}

/// Flat list of names, one per bullet or comma separated on one line.
pub fn parse_name_list(line: &str) -> Vec<String> {
    let body = strip_bullet(line).unwrap_or_else(|| line.trim());
    body.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trimmed, non-empty capture group.
pub(crate) fn capture(caps: &regex::Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("- Algebra Quiz"), Some("Algebra Quiz"));
        assert_eq!(strip_bullet("  * Reading Log  "), Some("Reading Log"));
        assert_eq!(strip_bullet("• Notes"), Some("Notes"));
        assert_eq!(strip_bullet("Algebra Quiz"), None);
        assert_eq!(strip_bullet("- "), None);
        assert_eq!(strip_bullet("-5 degrees"), None);
    }

    #[test]
    fn test_name_list() {
        assert_eq!(parse_name_list("- Math"), vec!["Math"]);
        assert_eq!(
            parse_name_list("Math, Science, Reading"),
            vec!["Math", "Science", "Reading"]
        );
        assert!(parse_name_list("  ").is_empty());
    }

    #[test]
    fn test_grammar_versions() {
        assert_eq!(AssignmentGrammar::VERSION, 1);
        assert_eq!(GradeGrammar::VERSION, 1);
        assert_eq!(LessonGrammar::VERSION, 1);
        assert_eq!(WorksheetGrammar::VERSION, 1);
        assert_eq!(MaterialGrammar::VERSION, 1);
    }
}
