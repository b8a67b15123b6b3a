//! Heuristic credential field parser.
//!
//! Raw OCR or text-layer output is matched against ordered, per-field
//! pattern lists. The first candidate that survives cleaning and validation
//! wins; later patterns are never consulted for a field that already has a
//! value. Two cross-field passes run afterwards: a broader institution scan
//! when nothing matched, and splitting a trailing "in X" / "of X" clause off
//! the degree into the specialization.

pub mod clean;
pub mod parser;
pub mod patterns;

pub use clean::{clean_value, validate_candidate};
pub use parser::FieldParser;
