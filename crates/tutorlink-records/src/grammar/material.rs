use once_cell::sync::Lazy;
use regex::Regex;

use super::{LineGrammar, capture};
use crate::records::StudyMaterial;

/// `[{type}] {title}[ ({subject})]`
static MATERIAL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<kind>[^\]]+)\]\s*(?P<title>.+?)(?:\s+\((?P<subject>[^()]+)\))?\s*$")
        .expect("Invalid material line regex")
});

/// Study material lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialGrammar;

impl LineGrammar for MaterialGrammar {
    type Record = StudyMaterial;

    const NAME: &'static str = "material";
    const VERSION: u32 = 1;

    fn parse(&self, body: &str) -> Option<StudyMaterial> {
        let caps = MATERIAL_LINE.captures(body)?;
        Some(StudyMaterial {
            material_type: capture(&caps, "kind"),
            title: capture(&caps, "title")?,
            subject: capture(&caps, "subject"),
        })
    }

    fn fallback(&self, title: &str) -> StudyMaterial {
        StudyMaterial {
            title: title.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_line() {
        assert_eq!(
            MaterialGrammar.parse("[Notes] Water Cycle Diagram (Science)"),
            Some(StudyMaterial {
                material_type: Some("Notes".to_string()),
                title: "Water Cycle Diagram".to_string(),
                subject: Some("Science".to_string()),
            })
        );
    }

    #[test]
    fn test_untyped_line_does_not_match() {
        assert_eq!(MaterialGrammar.parse("Water Cycle Diagram"), None);
    }
}
