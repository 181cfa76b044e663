//! Shared text pipeline for pi-monitor.
//!
//! Turns the semi-structured output of modem diagnostic tools into typed,
//! nested key-value data. Nothing in this crate performs I/O.
//!
//! # Pipeline
//!
//! - [`normalize`]: ordered substitutions that strip vendor prose and markers
//! - [`parse_structured`]: indentation-nested `key: value` text → [`Mapping`]
//! - [`leading_number`]: pulls the numeric part out of `"<number> <unit>"` fields

pub mod normalize;
pub mod parser;
pub mod value;

pub use normalize::{normalize, Normalizer};
pub use parser::{parse_structured, render, ParseError};
pub use value::{leading_number, Mapping, Value};
