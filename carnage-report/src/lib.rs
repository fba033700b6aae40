//! Carnage report parsing.
//!
//! Turns the XML report the game client writes at the end of a match into a
//! [`carnage_core::MatchRecord`], resolving a display name for the map along
//! the way.

pub mod error;
pub mod maps;
pub mod parser;
pub mod timestamp;

pub use error::ReportError;
pub use maps::{MapSource, lookup_token, resolve_map_name, resolve_with_source};
pub use parser::{parse_report, parse_report_at, parse_report_file};
pub use timestamp::parse_filename_timestamp;
