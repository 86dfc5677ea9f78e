//! Section-scoped parsing of the server's formatted replies.
//!
//! Replies are blocks of prose: a header line (`**Recent Grades:**` or
//! `Upcoming Lessons:`) followed by `- ` bullet lines. The header picks the
//! grammar; a bullet that does not fit its grammar still yields a
//! title-only record.

use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::grammar::{
    AssignmentGrammar, GradeGrammar, LessonDetail, LessonGrammar, LineGrammar, MaterialGrammar,
    WorksheetGrammar, parse_name_list, strip_bullet,
};
use crate::records::CategorizedResults;

/// Category requested by the caller; used as a grammar hint when the reply
/// has no recognizable section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchCategory {
    /// Everything (dashboard-style reply)
    #[default]
    All,
    /// Assignments
    Assignments,
    /// Grades
    Grades,
    /// Lessons
    Lessons,
    /// Worksheets
    Worksheets,
    /// Study materials
    Materials,
    /// Enrolled subjects
    Subjects,
}

impl SearchCategory {
    /// Wire name sent to the server
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Assignments => "assignments",
            Self::Grades => "grades",
            Self::Lessons => "lessons",
            Self::Worksheets => "worksheets",
            Self::Materials => "materials",
            Self::Subjects => "subjects",
        }
    }
}

impl fmt::Display for SearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "general" => Ok(Self::All),
            "assignment" | "assignments" => Ok(Self::Assignments),
            "grade" | "grades" => Ok(Self::Grades),
            "lesson" | "lessons" => Ok(Self::Lessons),
            "worksheet" | "worksheets" => Ok(Self::Worksheets),
            "material" | "materials" | "study_materials" => Ok(Self::Materials),
            "subject" | "subjects" => Ok(Self::Subjects),
            other => Err(format!("unknown search category '{other}'")),
        }
    }
}

/// Grammar chosen for a section.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SectionKind {
    Assignments(Option<&'static str>),
    Grades,
    Lessons,
    Worksheets,
    Materials,
    Subjects,
}

impl SectionKind {
    /// Case-insensitive substring dispatch on a header label.
    fn from_header(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        let kind = if label.contains("assignment") {
            if label.contains("overdue") {
                Self::Assignments(Some("overdue"))
            } else if label.contains("upcoming") {
                Self::Assignments(Some("upcoming"))
            } else {
                Self::Assignments(Some("pending"))
            }
        } else if label.contains("grade") {
            Self::Grades
        } else if label.contains("subject") {
            Self::Subjects
        } else if label.contains("worksheet") {
            Self::Worksheets
        } else if label.contains("material") {
            Self::Materials
        } else if label.contains("lesson") {
            Self::Lessons
        } else {
            return None;
        };
        Some(kind)
    }

    fn from_category(category: SearchCategory) -> Option<Self> {
        match category {
            SearchCategory::All => None,
            SearchCategory::Assignments => Some(Self::Assignments(None)),
            SearchCategory::Grades => Some(Self::Grades),
            SearchCategory::Lessons => Some(Self::Lessons),
            SearchCategory::Worksheets => Some(Self::Worksheets),
            SearchCategory::Materials => Some(Self::Materials),
            SearchCategory::Subjects => Some(Self::Subjects),
        }
    }
}

/// Counters describing how well a reply fit the grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseReport {
    /// Sections whose header was recognized
    pub sections: usize,
    /// Sections skipped because their header was not recognized
    pub skipped_sections: usize,
    /// Lines that matched their grammar
    pub matched: usize,
    /// Bullet lines that fell back to a title-only record
    pub fallbacks: usize,
}

/// Parse outcome: the records and how they were obtained.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedResponse {
    /// Records grouped by kind
    pub results: CategorizedResults,
    /// Match statistics
    pub report: ParseReport,
}

/// Label of a section header line, if `line` is one.
///
/// Headers are `**Label**` (colon inside or outside the stars) or a
/// non-bullet line ending in `:`.
pub fn header_label(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || strip_bullet(trimmed).is_some() {
        return None;
    }
    if let Some(inner) = trimmed.strip_prefix("**") {
        let inner = inner.strip_suffix(':').unwrap_or(inner);
        if let Some(label) = inner.strip_suffix("**") {
            let label = label.trim().trim_end_matches(':').trim();
            return (!label.is_empty()).then_some(label);
        }
    }
    if let Some(label) = trimmed.strip_suffix(':') {
        let label = label.trim();
        return (!label.is_empty() && !label.contains(':')).then_some(label);
    }
    None
}

/// Parse a whole reply.
///
/// Never fails; text nothing can be made of yields empty results.
pub fn parse_response(text: &str, category: SearchCategory) -> ParsedResponse {
    let mut parser = SectionParser::default();
    let has_headers = text
        .lines()
        .filter_map(header_label)
        .any(|label| SectionKind::from_header(label).is_some());

    if !has_headers {
        if let Some(kind) = SectionKind::from_category(category) {
            parser.hinted = true;
            parser.enter(Some(kind));
            for line in text.lines() {
                parser.line(line);
            }
        }
        return parser.finish();
    }

    for line in text.lines() {
        if let Some(label) = header_label(line)
            && !LessonDetail::is_detail_line(line)
        {
            let kind = SectionKind::from_header(label);
            if kind.is_none() {
                debug!(header = %label, "Skipping unrecognized section");
            }
            parser.enter(kind);
            continue;
        }
        parser.line(line);
    }
    parser.finish()
}

#[derive(Default)]
struct SectionParser {
    current: Option<SectionKind>,
    // Grammar picked from the category because the reply has no headers
    hinted: bool,
    results: CategorizedResults,
    report: ParseReport,
}

impl SectionParser {
    fn enter(&mut self, kind: Option<SectionKind>) {
        match kind {
            Some(_) => self.report.sections += 1,
            None => self.report.skipped_sections += 1,
        }
        self.current = kind;
    }

    fn line(&mut self, line: &str) {
        let Some(kind) = self.current.clone() else {
            return;
        };

        match kind {
            SectionKind::Assignments(status) => {
                let grammar = status.map(AssignmentGrammar::with_status).unwrap_or_default();
                if let Some(record) = self.bullet(&grammar, line) {
                    self.results.assignments.push(record);
                }
            }
            SectionKind::Grades => {
                if let Some(record) = self.bullet(&GradeGrammar, line) {
                    self.results.grades.push(record);
                }
            }
            SectionKind::Lessons => {
                if LessonDetail::is_detail_line(line) {
                    if let Some(detail) = LessonDetail::parse(line)
                        && let Some(lesson) = self.results.lessons.last_mut()
                    {
                        detail.apply(lesson);
                    }
                    return;
                }
                if let Some(record) = self.bullet(&LessonGrammar, line) {
                    self.results.lessons.push(record);
                }
            }
            SectionKind::Worksheets => {
                if let Some(record) = self.bullet(&WorksheetGrammar, line) {
                    self.results.worksheets.push(record);
                }
            }
            SectionKind::Materials => {
                if let Some(record) = self.bullet(&MaterialGrammar, line) {
                    self.results.materials.push(record);
                }
            }
            SectionKind::Subjects => {
                // Under a header only bullets are subjects. Without one, a
                // bare comma list counts too, but not a prose sentence.
                let is_list = strip_bullet(line).is_some()
                    || (self.hinted && line.contains(',') && !line.trim_end().ends_with('.'));
                let names = if is_list {
                    parse_name_list(line)
                } else {
                    Vec::new()
                };
                self.report.matched += usize::from(!names.is_empty());
                self.results.subjects.extend(names);
            }
        }
    }

    /// Run a bullet line through `grammar`, falling back to a title-only
    /// record. Non-bullet lines are ignored.
    fn bullet<G: LineGrammar>(&mut self, grammar: &G, line: &str) -> Option<G::Record> {
        let body = strip_bullet(line)?;
        match grammar.parse(body) {
            Some(record) => {
                self.report.matched += 1;
                Some(record)
            }
            None => {
                self.report.fallbacks += 1;
                debug!(
                    grammar = G::NAME,
                    version = G::VERSION,
                    line = %body,
                    "Line did not match its grammar, keeping title only"
                );
                Some(grammar.fallback(body))
            }
        }
    }

    fn finish(self) -> ParsedResponse {
        ParsedResponse {
            results: self.results,
            report: self.report,
        }
    }
}
