// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod broker;
pub mod thresholds;

pub use broker::BrokerConfig;
pub use thresholds::AccountThresholds;
