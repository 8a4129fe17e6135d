//! Checksum helpers
//!
//! CRC32 over page payloads and over the index file envelope. A mismatch is
//! always reported, never repaired.
//!
//! ```ignore
//! use pagedb::storage::checksum::Checksum;
//!
//! let checksum = Checksum::compute(b"payload");
//! Checksum::verify(b"payload", checksum)?;
//! ```

use crc32fast::Hasher;

/// Checksum calculator
pub struct Checksum;

impl Checksum {
    /// CRC32 of `data`
    pub fn compute(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Verify `data` against a stored checksum
    pub fn verify(data: &[u8], expected: u32) -> Result<(), ChecksumError> {
        let actual = Self::compute(data);
        if actual != expected {
            return Err(ChecksumError::Mismatch {
                expected,
                actual,
                data_len: data.len(),
            });
        }
        Ok(())
    }

    /// Frame a blob with its length and checksum
    ///
    /// Format: [data_len: u32][data: [u8]][checksum: u32]
    pub fn encode_with_checksum(data: &[u8]) -> Vec<u8> {
        let checksum = Self::compute(data);
        let mut encoded = Vec::with_capacity(4 + data.len() + 4);
        encoded.extend_from_slice(&(data.len() as u32).to_le_bytes());
        encoded.extend_from_slice(data);
        encoded.extend_from_slice(&checksum.to_le_bytes());
        encoded
    }

    /// Unframe and verify a blob written by `encode_with_checksum`
    pub fn decode_with_checksum(encoded: &[u8]) -> Result<Vec<u8>, ChecksumError> {
        if encoded.len() < 8 {
            return Err(ChecksumError::InvalidFormat("Data too short".to_string()));
        }

        let data_len = u32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        if encoded.len() != 4 + data_len + 4 {
            return Err(ChecksumError::InvalidFormat(format!(
                "Expected {} bytes, got {}",
                4 + data_len + 4,
                encoded.len()
            )));
        }

        let data = &encoded[4..4 + data_len];
        let expected = u32::from_le_bytes([
            encoded[4 + data_len],
            encoded[4 + data_len + 1],
            encoded[4 + data_len + 2],
            encoded[4 + data_len + 3],
        ]);

        Self::verify(data, expected)?;
        Ok(data.to_vec())
    }
}

/// Checksum error type
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x} (data_len={data_len})")]
    Mismatch {
        expected: u32,
        actual: u32,
        data_len: usize,
    },

    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_basic() {
        let data = b"1,anon$2,bob$";
        let checksum = Checksum::compute(data);

        assert!(Checksum::verify(data, checksum).is_ok());
        assert!(Checksum::verify(data, checksum.wrapping_add(1)).is_err());
        assert!(Checksum::verify(b"1,anon$2,bob#", checksum).is_err());
    }

    #[test]
    fn test_checksum_decode_corrupted() {
        let mut encoded = Checksum::encode_with_checksum(b"serialized tree");
        encoded[10] ^= 0xFF;

        let result = Checksum::decode_with_checksum(&encoded);
        assert!(matches!(result.unwrap_err(), ChecksumError::Mismatch { .. }));
    }

    #[test]
    fn test_checksum_decode_invalid_format() {
        assert!(Checksum::decode_with_checksum(b"abc").is_err());

        // claims 100 bytes of data, only has 20
        let mut invalid = vec![0u8; 20];
        invalid[0] = 100;
        assert!(matches!(
            Checksum::decode_with_checksum(&invalid).unwrap_err(),
            ChecksumError::InvalidFormat(_)
        ));
    }

    #[test]
    fn test_checksum_envelope() {
        let encoded = Checksum::encode_with_checksum(b"tree bytes");
        assert_eq!(Checksum::decode_with_checksum(&encoded).unwrap(), b"tree bytes");
    }
}
