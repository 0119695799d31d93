// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable per-provider key material
//!
//! Settlement keys must outlive the TTL cache, so they go through a separate
//! key/value storage capability. Two backends exist (process memory and a
//! directory on disk); the backend is chosen once at construction and callers
//! only ever see `MetadataStore`.

pub mod backend;
pub mod store;

pub use backend::{FileStorage, KeyValueStorage, MemoryStorage, StorageBackend};
pub use store::MetadataStore;
