// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant resource ceilings for calculated fields.

use crate::id::TenantId;
use serde::{Deserialize, Serialize};

/// Per-tenant limits read once when a ctx is built. Zero disables a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantLimits {
    pub max_data_points_per_rolling_arg: usize,
    pub max_state_size_in_kbytes: usize,
    pub max_single_value_argument_size_in_kbytes: usize,
}

impl Default for TenantLimits {
    fn default() -> Self {
        Self {
            max_data_points_per_rolling_arg: 1000,
            max_state_size_in_kbytes: 32,
            max_single_value_argument_size_in_kbytes: 2,
        }
    }
}

impl TenantLimits {
    pub fn unlimited() -> Self {
        Self {
            max_data_points_per_rolling_arg: 0,
            max_state_size_in_kbytes: 0,
            max_single_value_argument_size_in_kbytes: 0,
        }
    }

    pub fn max_state_size_bytes(&self) -> usize {
        self.max_state_size_in_kbytes.saturating_mul(1024)
    }

    pub fn max_single_value_bytes(&self) -> usize {
        self.max_single_value_argument_size_in_kbytes.saturating_mul(1024)
    }

    /// Effective window size for a rolling argument.
    ///
    /// The argument's own limit is capped by the tenant ceiling. With neither
    /// set the window is only age bounded.
    pub fn rolling_limit(&self, argument_limit: Option<usize>) -> usize {
        let tenant = match self.max_data_points_per_rolling_arg {
            0 => usize::MAX,
            n => n,
        };
        match argument_limit {
            Some(n) if n > 0 => n.min(tenant),
            _ => tenant,
        }
    }
}

/// Source of tenant limits.
pub trait LimitsProvider: Send + Sync {
    fn limits(&self, tenant_id: &TenantId) -> TenantLimits;
}

/// Same limits for every tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLimits(pub TenantLimits);

impl LimitsProvider for StaticLimits {
    fn limits(&self, _tenant_id: &TenantId) -> TenantLimits {
        self.0
    }
}

/// Policy for a single argument over the size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizedArgumentPolicy {
    /// Fail the whole update
    #[default]
    Reject,
    /// Drop the oversized argument and apply the rest
    Skip,
}

#[cfg(test)]
#[path = "limits_tests.rs"]
mod tests;
