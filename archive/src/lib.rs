//! The immutable block archive: an append-only, on-disk store for the
//! settled prefix of the chain.
//!
//! Each epoch is kept as a triple of files: the raw concatenated blocks, a
//! secondary index with one fixed-width record per stored block, and a
//! primary index mapping every relative slot of the epoch to its secondary
//! record in O(1), with empty slots sharing their successor's offset. The
//! archive is single-writer, multi-reader: appends and truncations serialise
//! on the state lock while readers work from cheap snapshots.

#[macro_use]
extern crate log;

pub use archive::Archive;
pub use component::{BlockComponent, ComponentValue};
pub use config::{ArchiveConfig, CacheConfig, ValidationPolicy};
pub use error::{ArchiveError, RangeViolation};
pub use events::ArchiveEvent;
pub use iterator::ArchiveIterator;
pub use parse::{EpochFileParser, ParseOutcome, ParsedBlock};

mod archive;
mod cache;
mod component;
mod config;
mod error;
mod events;
mod index;
mod iterator;
mod layout;
mod parse;
mod state;
mod validation;
