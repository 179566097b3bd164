//! Merge-conflict marker detection and resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- classifying marker lines and splitting a document into
//!    text and conflict blocks.
//! 2. **Resolution** -- collapsing each block into a single side until no
//!    markers remain.

pub mod detector;
pub mod resolver;

pub use detector::{has_conflict_markers, ConflictBlock, MarkerKind, Segment};
pub use resolver::{resolve, Resolution, ResolveOptions, Resolver, Side};
