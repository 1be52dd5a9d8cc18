//! Property-based test generators using proptest.
//!
//! Provides strategies for priorities, identities, names and payloads, plus
//! a small operation language for checking the store against a plain map.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tso_core::{CoreResult, ObjectId, ObjectStore, Priority, TransactionId};
use uuid::Uuid;

/// Strategy for generating priorities.
pub fn priority_strategy() -> impl Strategy<Value = Priority> {
    (any::<u64>(), any::<i64>()).prop_map(|(timestamp, tiebreak)| Priority::new(timestamp, tiebreak))
}

/// Strategy for generating priorities that often collide.
pub fn colliding_priority_strategy() -> impl Strategy<Value = Priority> {
    (0u64..3, -2i64..2).prop_map(|(timestamp, tiebreak)| Priority::new(timestamp, tiebreak))
}

/// Strategy for generating transaction identities.
pub fn transaction_id_strategy() -> impl Strategy<Value = TransactionId> {
    any::<u128>().prop_map(|n| TransactionId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating valid object names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_:]{0,31}").expect("Invalid regex")
}

/// A game-like payload used by generated workloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Display name.
    pub label: String,
    /// Quantity held.
    pub count: u32,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Strategy for generating items.
pub fn item_strategy() -> impl Strategy<Value = Item> {
    (
        "[a-zA-Z ]{0,16}",
        any::<u32>(),
        prop::collection::vec("[a-z]{1,8}", 0..4),
    )
        .prop_map(|(label, count, tags)| Item { label, count, tags })
}

/// One step of a generated workload. Indices select among live objects.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Create an object.
    Create(Item),
    /// Replace the value of an object.
    Update(usize, Item),
    /// Destroy an object.
    Destroy(usize),
    /// Start a change and abort it.
    AbortedUpdate(usize, Item),
}

/// Strategy for generating workload steps.
pub fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => item_strategy().prop_map(StoreOp::Create),
        3 => (any::<usize>(), item_strategy()).prop_map(|(i, item)| StoreOp::Update(i, item)),
        1 => any::<usize>().prop_map(StoreOp::Destroy),
        1 => (any::<usize>(), item_strategy()).prop_map(|(i, item)| StoreOp::AbortedUpdate(i, item)),
    ]
}

fn pick(model: &BTreeMap<ObjectId, Item>, index: usize) -> Option<ObjectId> {
    if model.is_empty() {
        return None;
    }
    model.keys().nth(index % model.len()).copied()
}

/// Applies `ops` one transaction each and returns the expected contents.
pub fn apply_ops(store: &ObjectStore, ops: &[StoreOp]) -> CoreResult<BTreeMap<ObjectId, Item>> {
    let mut model = BTreeMap::new();
    for op in ops {
        let mut txn = store.new_transaction()?;
        match op {
            StoreOp::Create(item) => {
                let id = txn.create(item.clone(), None)?;
                txn.commit()?;
                model.insert(id, item.clone());
            }
            StoreOp::Update(i, item) => {
                if let Some(id) = pick(&model, *i) {
                    *txn.lock::<Item>(id)? = item.clone();
                    txn.commit()?;
                    model.insert(id, item.clone());
                }
            }
            StoreOp::Destroy(i) => {
                if let Some(id) = pick(&model, *i) {
                    txn.lock::<Item>(id)?;
                    txn.destroy(id)?;
                    txn.commit()?;
                    model.remove(&id);
                }
            }
            StoreOp::AbortedUpdate(i, item) => {
                if let Some(id) = pick(&model, *i) {
                    *txn.lock::<Item>(id)? = item.clone();
                    txn.abort()?;
                }
            }
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tso_core::is_older;
    use tso_dataspace::InMemoryDataSpace;

    proptest! {
        #[test]
        fn older_is_a_strict_total_order(
            p in colliding_priority_strategy(),
            q in colliding_priority_strategy(),
            a in transaction_id_strategy(),
            b in transaction_id_strategy(),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(is_older(p, a, q, b), is_older(q, b, p, a));
            prop_assert!(!is_older(p, a, p, a));
        }

        #[test]
        fn store_matches_model(ops in prop::collection::vec(store_op_strategy(), 1..24)) {
            let space = InMemoryDataSpace::new();
            let store = ObjectStore::new(space.clone());
            let model = apply_ops(&store, &ops).unwrap();

            let mut reader = store.new_transaction().unwrap();
            for (id, item) in &model {
                prop_assert_eq!(&reader.peek::<Item>(*id).unwrap(), item);
            }
            prop_assert_eq!(space.len(), model.len() * 2);
            prop_assert_eq!(space.locked_count(), 0);
            prop_assert_eq!(store.active_count(), 1);
        }

        #[test]
        fn names_roundtrip(name in name_strategy(), item in item_strategy()) {
            let store = ObjectStore::new(InMemoryDataSpace::new());
            let mut txn = store.new_transaction().unwrap();
            let id = txn.create(item.clone(), Some(&name)).unwrap();
            txn.commit().unwrap();

            let mut txn = store.new_transaction().unwrap();
            prop_assert_eq!(txn.lookup(&name).unwrap(), Some(id));
            prop_assert_eq!(txn.peek::<Item>(id).unwrap(), item);
        }
    }
}
