//! Airtable proxy - REST front for an Airtable base
//!
//! Exposes record CRUD, filter search, batch upsert and denormalized order
//! views under `/airtable`.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod services;

pub use app::{AppState, build_app};
pub use error::{ProxyError, ProxyResult};
