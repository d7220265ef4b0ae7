//! benchlens Output Protocol
//!
//! The text protocol between a running benchmark binary and the executor:
//! one result record per recognized line. Supports batch parsing of a
//! complete blob and streaming over a live pipe with an optional per-result
//! callback and raw-line passthrough.

mod parser;

pub use parser::{OutputParser, ParseError, TAIL_LINES, parse_line, parse_output};
