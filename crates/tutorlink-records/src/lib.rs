//! # Tutorlink Records
//!
//! Turns the capability server's formatted text replies into typed records.
//!
//! Replies are sections of bullet lines under bold headers. Each kind of
//! line has its own versioned [`LineGrammar`]; a line that does not fit
//! still yields a title-only record, so parsing never fails.
//!
//! ```rust
//! use tutorlink_records::{SearchCategory, SearchEnvelope};
//!
//! let reply = "**Recent Grades:**\n- Algebra Quiz - 85/100 (85%)";
//! let envelope = SearchEnvelope::from_text(reply, SearchCategory::All);
//! assert_eq!(envelope.results.grades[0].percentage, Some(85.0));
//! assert_eq!(envelope.summary, "Found 1 results");
//! ```

#![warn(missing_docs)]

pub mod envelope;
pub mod grammar;
pub mod material;
pub mod parser;
pub mod records;

pub use envelope::{FAILED_SUMMARY, SearchEnvelope};
pub use grammar::LineGrammar;
pub use material::{
    MaterialAccess, MaterialContent, QuestionMatch, QuestionRef, SpecificQuestion, find_question,
};
pub use parser::{ParseReport, ParsedResponse, SearchCategory, parse_response};
pub use records::{Assignment, CategorizedResults, Grade, Lesson, StudyMaterial, Worksheet};
