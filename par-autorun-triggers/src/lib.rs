//! Regex trigger matrix for par-autorun shell output.
//!
//! Output arrives in arbitrary chunks. The [`TriggerMatrix`] buffers those
//! chunks into complete lines and evaluates every row of
//! [`NamedRegexSearch`]es against each line. [`OutputCensor`] builds on the
//! matrix to hide individual lines or whole blocks of output.

pub mod censor;
pub mod matrix;
pub mod search;

pub use censor::{CENSOR_LINE_ROW, DISABLE_OUTPUT_ROW, ENABLE_OUTPUT_ROW, OutputCensor};
pub use matrix::{TriggerCallback, TriggerHit, TriggerMatrix, TriggerRow};
pub use search::{NamedRegexSearch, ReadLogic};
