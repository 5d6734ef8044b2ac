//! File-identity data model: entries and indexed listings.

pub mod entry;
pub mod listing;

pub use entry::FileEntry;
pub use listing::{DuplicatePath, Listing, Query};
