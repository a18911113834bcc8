//! Core data models for fetch requests, provider entities and fetch results.

mod export;
mod publication;
mod request;
mod scholar;
mod search;

pub use export::{AuthMaterial, EidPage, ExportChunk, ExportFileType, FieldGroup};
pub use publication::{ExportPublication, EXPORT_COLUMNS};
pub use request::{FetchPayload, FetchRequest, FetchResult};
pub use scholar::{DetailEntry, ListingEntry, MergedEntry};
pub use search::{SearchEntry, SearchResults};
