use crate::TransferError;
use crate::source::ByteSource;

/// Validates that a payload can be transferred.
///
/// An empty payload is rejected here, before anything divides by its
/// length.
pub fn validate_payload(source: &dyn ByteSource) -> Result<(), TransferError> {
    if source.is_empty() {
        return Err(TransferError::DegenerateInput);
    }
    Ok(())
}

/// Validates the chunk size reported by a connection.
///
/// A zero chunk size means the link could not tell how much one write
/// may carry.
pub fn validate_chunk_size(chunk_size: usize) -> Result<(), TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::ConnectionSetup(
            "connection did not report a usable chunk size".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_payload() {
        let empty: Vec<u8> = Vec::new();
        assert!(matches!(
            validate_payload(&empty),
            Err(TransferError::DegenerateInput)
        ));
    }

    #[test]
    fn accepts_single_byte_payload() {
        assert!(validate_payload(&vec![0u8]).is_ok());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        assert!(matches!(
            validate_chunk_size(0),
            Err(TransferError::ConnectionSetup(_))
        ));
    }

    #[test]
    fn accepts_minimal_chunk_size() {
        assert!(validate_chunk_size(1).is_ok());
    }
}
