//! Typed cache of locked objects.
//!
//! A locked payload is read as raw bytes and decoded on first typed access.
//! From then on every `lock::<T>` returns the same in-memory `T`, and commit
//! encodes it back.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any};
use tso_dataspace::ObjectId;

/// Types that can be stored in the object store.
///
/// Implemented for every `Serialize + DeserializeOwned + Send + 'static` type.
pub trait Persistent: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Persistent for T where T: Serialize + DeserializeOwned + Send + 'static {}

trait StoredValue: Send {
    fn encode(&self) -> CoreResult<Vec<u8>>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Persistent> StoredValue for T {
    fn encode(&self) -> CoreResult<Vec<u8>> {
        codec::encode(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum Slot {
    Raw(Vec<u8>),
    Typed(Box<dyn StoredValue>),
}

/// A payload held by a transaction.
pub(crate) struct CachedObject {
    pub(crate) payload_id: ObjectId,
    slot: Slot,
}

impl CachedObject {
    pub(crate) fn raw(payload_id: ObjectId, bytes: Vec<u8>) -> Self {
        Self {
            payload_id,
            slot: Slot::Raw(bytes),
        }
    }

    pub(crate) fn typed<T: Persistent>(payload_id: ObjectId, value: T) -> Self {
        Self {
            payload_id,
            slot: Slot::Typed(Box::new(value)),
        }
    }

    /// Returns the cached value as `T`, decoding it on first access.
    pub(crate) fn get_mut<T: Persistent>(&mut self, id: ObjectId) -> CoreResult<&mut T> {
        if let Slot::Raw(bytes) = &self.slot {
            let value: T = codec::decode(bytes)?;
            self.slot = Slot::Typed(Box::new(value));
        }
        let Slot::Typed(value) = &mut self.slot else {
            return Err(CoreError::codec(format!("payload of {id} not decoded")));
        };
        let value: &mut dyn StoredValue = &mut **value;
        value
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(CoreError::TypeMismatch {
                id,
                expected: type_name::<T>(),
            })
    }

    /// Returns the current value encoded, decoded or not.
    pub(crate) fn encoded(&self) -> CoreResult<Vec<u8>> {
        match &self.slot {
            Slot::Raw(bytes) => Ok(bytes.clone()),
            Slot::Typed(value) => (**value).encode(),
        }
    }

    /// Returns the bytes to write back at commit, or `None` if the payload
    /// was never decoded and so cannot have changed.
    pub(crate) fn write_back(&self) -> CoreResult<Option<Vec<u8>>> {
        match &self.slot {
            Slot::Raw(_) => Ok(None),
            Slot::Typed(value) => (**value).encode().map(Some),
        }
    }
}

impl std::fmt::Debug for CachedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let decoded = matches!(self.slot, Slot::Typed(_));
        f.debug_struct("CachedObject")
            .field("payload_id", &self.payload_id)
            .field("decoded", &decoded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: ObjectId = ObjectId::new(1);

    #[test]
    fn raw_payload_decodes_once() {
        let bytes = codec::encode(&vec![1u8, 2, 3]).unwrap();
        let mut cached = CachedObject::raw(ObjectId::new(2), bytes);
        assert!(cached.write_back().unwrap().is_none());

        cached.get_mut::<Vec<u8>>(OID).unwrap().push(4);
        assert_eq!(cached.get_mut::<Vec<u8>>(OID).unwrap(), &vec![1, 2, 3, 4]);

        let written = cached.write_back().unwrap().unwrap();
        assert_eq!(codec::decode::<Vec<u8>>(&written).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn typed_access_with_wrong_type_fails() {
        let mut cached = CachedObject::typed(ObjectId::new(2), String::from("axe"));
        let err = cached.get_mut::<u64>(OID).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
        assert_eq!(cached.get_mut::<String>(OID).unwrap(), "axe");
    }

    #[test]
    fn encoded_reflects_in_memory_changes() {
        let mut cached = CachedObject::raw(ObjectId::new(2), codec::encode(&5u32).unwrap());
        assert_eq!(codec::decode::<u32>(&cached.encoded().unwrap()).unwrap(), 5);
        *cached.get_mut::<u32>(OID).unwrap() = 6;
        assert_eq!(codec::decode::<u32>(&cached.encoded().unwrap()).unwrap(), 6);
    }

    #[test]
    fn undecodable_payload_stays_raw() {
        let mut cached = CachedObject::raw(ObjectId::new(2), vec![0xff]);
        assert!(cached.get_mut::<String>(OID).is_err());
        assert!(cached.write_back().unwrap().is_none());
    }
}
