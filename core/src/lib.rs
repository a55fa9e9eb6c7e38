//! Synchronization engine for a remote, schema-less task-list service.
//!
//! # Overview
//! Keeps a local snapshot of remote task lists in sync over a paginated
//! REST API that has no first-class description, completion or due-date
//! fields — only dynamically-named custom fields whose semantics are
//! inferred from naming conventions and value shape.
//!
//! # Design
//! - `ZenkitClient` speaks the wire protocol: auth, workspace/list
//!   discovery, paginated entry listing, two-phase create, single-field
//!   update and batch soft-delete. I/O goes through the `Transport` trait
//!   so the client is fully unit-testable.
//! - `fields` holds the pure heuristics that turn an ordered key-value
//!   `Record` into a typed `NormalizedItem`.
//! - `Coordinator` owns the cache: lists are discovered once per process,
//!   entries are rebuilt wholesale on every successful poll, and a failed
//!   cycle leaves the last known good snapshot untouched. Refreshes are
//!   single-flight; a `Poller` drives them on a fixed interval.
//! - Mutations (`create_item` / `update_item` / `delete_items`) go through
//!   the client and force a refresh; the cache itself is never edited.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod fields;
pub mod http;
pub mod mutate;
pub mod types;

pub use client::{ZenkitClient, API_URL, ENTRIES_LIMIT};
pub use coordinator::{Coordinator, Poller, Snapshot, UPDATE_INTERVAL};
pub use error::Error;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{
    EntryPatch, Identity, ItemStatus, List, NewItem, NormalizedItem, Record, Workspace,
};
