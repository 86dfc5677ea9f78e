use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineGrammar, capture};
use crate::records::Grade;

/// `{title}[ [{type}]] - {earned}/{possible} ({percent}%)`
static GRADE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<title>.+?)(?:\s+\[(?P<kind>[^\]]+)\])?\s+-\s+(?P<earned>\d+(?:\.\d+)?)\s*/\s*(?P<possible>\d+(?:\.\d+)?)\s*\(\s*(?P<percent>\d+(?:\.\d+)?)\s*%\s*\)\s*$",
    )
    .expect("Invalid grade line regex")
});

/// Grade lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeGrammar;

impl LineGrammar for GradeGrammar {
    type Record = Grade;

    const NAME: &'static str = "grade";
    const VERSION: u32 = 1;

    fn parse(&self, body: &str) -> Option<Grade> {
        let caps = GRADE_LINE.captures(body)?;
        let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<f64>().ok());
        Some(Grade {
            title: capture(&caps, "title")?,
            content_type: capture(&caps, "kind"),
            grade_value: number("earned"),
            grade_max_value: number("possible"),
            percentage: number("percent"),
        })
    }

    fn fallback(&self, title: &str) -> Grade {
        Grade {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_grade_line() {
        assert_eq!(
            GradeGrammar.parse("Algebra Quiz - 85/100 (85%)"),
            Some(Grade {
                title: "Algebra Quiz".to_string(),
                content_type: None,
                grade_value: Some(85.0),
                grade_max_value: Some(100.0),
                percentage: Some(85.0),
            })
        );
    }

    #[test]
    fn test_grade_with_type_and_decimals() {
        let grade = GradeGrammar
            .parse("Fractions Check [Worksheet] - 17.5/20 (87.5%)")
            .unwrap();
        assert_eq!(grade.title, "Fractions Check");
        assert_eq!(grade.content_type.as_deref(), Some("Worksheet"));
        assert_eq!(grade.grade_value, Some(17.5));
        assert_eq!(grade.percentage, Some(87.5));
    }

    #[test]
    fn test_missing_score_does_not_match() {
        assert_eq!(GradeGrammar.parse("Algebra Quiz - pending"), None);
    }
}
