//! Sedflow experiment scripts (canonical dialect)
//!
//! This crate defines the line-oriented experiment-description language that
//! sedflow compiles experiments into, as typed statements plus a deterministic
//! formatter. An external converter turns the formatted text into a
//! machine-executable simulation description.
//!
//! There is intentionally no parser here: the language is only ever emitted.

pub mod lexical;
pub mod script_v1;
