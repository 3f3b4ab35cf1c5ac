//! Error types.

/// Why a non-blocking transfer between two cells did not happen.
///
/// Returned by [`GuardedCell::try_transfer_from`](crate::GuardedCell::try_transfer_from).
/// Neither cell is modified when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The destination cell is held by a guard.
    #[error("destination cell is locked")]
    DestinationBusy,
    /// The source cell is held by a guard.
    #[error("source cell is locked")]
    SourceBusy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_busy_side() {
        assert_eq!(
            TransferError::DestinationBusy.to_string(),
            "destination cell is locked"
        );
        assert_eq!(TransferError::SourceBusy.to_string(), "source cell is locked");
    }
}
