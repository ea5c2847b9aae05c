//! Embedding blob codec: float32 little-endian, one value per dimension.

use ndarray::Array1;

use reqmind_core::{Error, Result};

/// Encode an embedding as a little-endian f32 blob.
pub fn encode_f32(embedding: &Array1<f32>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a blob written by [`encode_f32`].
pub fn decode_f32(bytes: &[u8]) -> Result<Array1<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Index(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bit_exact() {
        let original = array![0.1f32, -0.0, f32::MIN_POSITIVE, 3.5e7, -1.25];
        let restored = decode_f32(&encode_f32(&original)).unwrap();
        for (a, b) in original.iter().zip(restored.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_truncated_blob() {
        assert!(decode_f32(&[0, 0, 128]).is_err());
    }
}
