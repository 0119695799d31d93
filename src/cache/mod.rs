// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Expiring key/value cache with cooperative locks
//!
//! One `KvCache` is created per broker and shared by reference (`Arc`) with
//! every component that needs it. Data entries and lock entries live in
//! separate namespaces, so a lock named `"nonce"` never shadows the value
//! stored under `"nonce"`.
//!
//! Expiry is lazy: an expired entry is treated as absent on read and is only
//! physically dropped when the key is written again or `purge_expired` runs.
//! There is no background eviction task.

pub mod lock;
pub mod store;

pub use lock::LockGuard;
pub use store::{CacheEntry, KvCache, ValueKind};
