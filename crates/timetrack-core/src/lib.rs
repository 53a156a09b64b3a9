//! Core domain logic for the team time tracker.
//!
//! This crate contains:
//! - Time entries and validated tracking inputs
//! - The entry repository contract and an in-memory implementation
//! - The tracking engine (start, stop, status, list)
//! - JSON and CSV renderings of entry lists

mod engine;
pub mod entry;
pub mod export;
mod memory;
mod repository;
pub mod types;

pub use engine::{ErrorKind, TrackingEngine, TrackingError, elapsed_minutes};
pub use entry::{EntryFilter, EntryId, NewEntry, TimeEntry, TrackingStatus};
pub use export::{ExportError, ExportFormat};
pub use memory::MemoryRepository;
pub use repository::{EntryRepository, RepositoryError};
pub use types::{Description, ItemUrl, Username, ValidationError};
