//! Validation gates for inputs and outputs.
//!
//! Validators are swappable strategy objects behind [`Validate`]: the
//! format gate screens raw OCR text before extraction runs, and the
//! record validator audits the finished record.

pub mod format;
pub mod record;

pub use format::FormatValidator;
pub use record::RecordValidator;

/// A validation strategy over inputs of type `T`.
pub trait Validate<T: ?Sized> {
    /// Every problem found with the input. An empty list means valid.
    fn problems(&self, input: &T) -> Vec<String>;

    fn is_valid(&self, input: &T) -> bool {
        self.problems(input).is_empty()
    }
}
