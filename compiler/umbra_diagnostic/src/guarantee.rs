//! Proof that an error was reported.

use std::fmt;

/// Zero-sized witness that at least one error diagnostic was emitted.
///
/// Only the diagnostic queue can create one, so a function returning
/// `Result<T, ErrorGuaranteed>` cannot fail silently.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) fn new() -> Self {
        ErrorGuaranteed(())
    }

    /// `Some` if `count` errors have been emitted and `count > 0`.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then(Self::new)
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error(s) emitted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_nonzero_counts_give_proof() {
        assert!(ErrorGuaranteed::from_error_count(0).is_none());
        assert_eq!(
            ErrorGuaranteed::from_error_count(3).map(|g| g.to_string()),
            Some("error(s) emitted".to_string())
        );
    }
}
