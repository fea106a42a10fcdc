//! # Vellum
//!
//! A multi-tenant, schema-less document platform core: organizations own
//! projects, projects own collections, collections own documents whose data
//! records are free-form. Every operation is permission-scoped and keeps
//! per-collection attribute usage in step with the documents it stores.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! vellum = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vellum::service::AppState;
//! use vellum::store::{SqliteStore, Store};
//! use vellum::types::{NewDocument, Principal, ServiceLimits, record_from_json};
//!
//! let store = SqliteStore::new("./data/vellum.db")?;
//! store.initialize()?;
//! let state = AppState::new(Arc::new(store));
//!
//! let alice = Principal::new("alice");
//! let org = state.hierarchy().create_organization(&alice, "acme", "Acme", ServiceLimits::default())?;
//! state.hierarchy().create_project(&alice, &org.id, "crm", "CRM")?;
//! let ws = state.hierarchy().resolve_workspace(&alice, "acme", "crm", None)?;
//! let contacts = state.hierarchy().create_collection(&ws, "contacts", "Contacts")?;
//! state.documents().create(
//!     &ws,
//!     &contacts.id,
//!     NewDocument::new(record_from_json(serde_json::json!({"name": "Ada"}))),
//! )?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod access;
pub mod attachments;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod constraint;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod service;
pub mod store;
pub mod types;
pub mod workspace;
