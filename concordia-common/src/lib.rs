//! # Concordia Common Library
//!
//! Shared code for the Concordia transcription services:
//! - Error type
//! - Configuration loading and root folder resolution
//! - SQLite schema, catalog records (campaigns, projects, items, assets, users)
//! - The transcription ledger: supersession chains and derived review status
//! - Pagination helpers

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod pagination;

pub use error::{Error, Result};
pub use ledger::{Ledger, ReviewAction, TranscriptionStatus};
pub use pagination::{Page, PageInfo, PageRequest};
