//! CBOR encoding of headers and payloads.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Monster {
        name: String,
        hp: u32,
    }

    #[test]
    fn roundtrip_struct() {
        let orc = Monster {
            name: "orc".into(),
            hp: 12,
        };
        let bytes = encode(&orc).unwrap();
        assert_eq!(decode::<Monster>(&bytes).unwrap(), orc);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode::<Monster>(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }

    #[test]
    fn decode_wrong_shape_fails() {
        let bytes = encode(&42u64).unwrap();
        assert!(decode::<Monster>(&bytes).is_err());
    }
}
