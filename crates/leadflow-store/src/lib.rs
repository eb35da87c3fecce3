//! The optimistic lead store.
//!
//! `state` is the pure reducer, `runtime` the single task that owns it, and
//! `api` the seam to the backend. Status moves are applied before the server
//! confirms them; creates, edits, deletes and re-qualification wait for it.

pub mod api;
pub mod runtime;
pub mod state;

pub use api::LeadApi;
pub use runtime::{spawn_store, spawn_store_with, StoreError, StoreHandle, StoreResult};
pub use state::{dedupe_by_id, Action, LeadSnapshot, LeadState};
