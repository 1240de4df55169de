// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform identifiers.
//!
//! Tenants, calculated fields, and entities (devices, assets, zones) are all
//! UUID-keyed on the platform. Each gets its own newtype so a zone id can't be
//! passed where a tenant id is expected.

/// Define a UUID-backed newtype identifier.
///
/// Generates `new()` for random ids, `from_uuid()`, `as_uuid()`, `Display`,
/// `FromStr`, and `From<Uuid>`. Serializes as the bare hyphenated UUID.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct TenantId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generate a new random ID
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub const fn from_uuid(id: uuid::Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Tenant owning calculated fields and their state.
    pub struct TenantId;
}

define_id! {
    /// Calculated field definition.
    pub struct CalculatedFieldId;
}

define_id! {
    /// Any platform entity: the owner of a field, a linked argument source,
    /// or a geofencing zone.
    pub struct EntityId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
