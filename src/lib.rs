//! Helpers for scraping jobs: duplicate-aware record reconciliation, delimited
//! file adapters, and the small text, HTML, date and URL utilities that scraped
//! data usually needs before it is saved.

pub mod config;
pub mod date;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod html;
pub mod lines;
pub mod logging;
pub mod models;
pub mod table_io;
pub mod text;
pub mod urls;

pub use dedup::{DedupRequest, Deduplicated, Deduplicator, OutputOrder, remove_duplicates};
pub use error::{AppError, Result};
pub use models::{Extracted, Record, Table, Value};
pub use table_io::TableIo;
