// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local durable backend.

mod service;
mod store;

pub use service::EmbeddedStateService;
pub use store::EmbeddedStore;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
