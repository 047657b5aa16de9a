//! Proptest strategies
#![allow(dead_code)]

use proptest::prelude::*;

#[derive(Debug, Clone)]
pub enum StoreOp {
    Put(u8, u32),
    PutIfAbsent(u8, u32),
    Remove(u8),
    Increment(u8),
    Clear,
}

/// Small key space so operations collide often
pub fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => (any::<u8>().prop_map(|k| k % 16), any::<u32>()).prop_map(|(k, v)| StoreOp::Put(k, v)),
        3 => (any::<u8>().prop_map(|k| k % 16), any::<u32>()).prop_map(|(k, v)| StoreOp::PutIfAbsent(k, v)),
        2 => any::<u8>().prop_map(|k| StoreOp::Remove(k % 16)),
        3 => any::<u8>().prop_map(|k| StoreOp::Increment(k % 16)),
        1 => Just(StoreOp::Clear),
    ]
}

pub fn device_id_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}
