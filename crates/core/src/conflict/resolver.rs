//! Mechanical conflict resolution.
//!
//! The [`Resolver`] collapses every conflict block in a document into one
//! side, repeating until no well-formed block remains, then deletes any
//! marker line still left over. It is a pure text transformation; callers
//! handle I/O.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::detector::{self, ConflictBlock, Segment};

/// Default bound on fixed-point passes over one document.
pub const DEFAULT_MAX_PASSES: usize = 8;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which segment of a conflict block survives.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The first segment, between the start marker and the separator.
    Ours,
    /// The second segment, between the separator and the end marker.
    #[default]
    Theirs,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ours" => Ok(Self::Ours),
            "theirs" => Ok(Self::Theirs),
            other => Err(format!("unknown side '{other}' (expected 'ours' or 'theirs')")),
        }
    }
}

/// Tuning for a [`Resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Segment kept when the two sides differ.
    pub prefer: Side,
    /// Upper bound on resolution passes before giving up on a fixed point.
    pub max_passes: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            prefer: Side::default(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of resolving one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved text, free of marker lines.
    pub content: String,
    /// Blocks collapsed across all passes.
    pub blocks_resolved: usize,
    /// Passes that resolved at least one block.
    pub passes: usize,
    /// Unpaired marker lines deleted by the final sweep.
    pub stray_markers_removed: usize,
    /// `false` when the pass bound was hit while blocks were still being
    /// found; the sweep still ran, but the result may be partial.
    pub converged: bool,
}

impl Resolution {
    /// Whether resolution changed anything at all.
    pub fn changed(&self) -> bool {
        self.blocks_resolved > 0 || self.stray_markers_removed > 0
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Stateless conflict resolver parameterised by [`ResolveOptions`].
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve every conflict block in `content`.
    ///
    /// Each pass collapses the innermost well-formed blocks. Passes repeat
    /// until one finds nothing, or until `max_passes` productive passes have
    /// run. Afterwards every remaining marker line is deleted.
    pub fn resolve(&self, content: &str) -> Resolution {
        let max_passes = self.options.max_passes.max(1);
        let mut current = content.to_string();
        let mut blocks_resolved = 0;
        let mut passes = 0;

        let converged = loop {
            let (next, resolved) = self.resolve_pass(&current);
            if resolved == 0 {
                break true;
            }
            current = next;
            blocks_resolved += resolved;
            passes += 1;
            debug!(pass = passes, resolved, "resolution pass complete");

            if passes == max_passes {
                break detector::find_blocks(&current).is_empty();
            }
        };

        if !converged {
            warn!(
                max_passes,
                blocks_resolved,
                "conflict resolution did not reach a fixed point; sweeping remaining markers"
            );
        }

        let (content, stray_markers_removed) = sweep_markers(&current);
        if stray_markers_removed > 0 {
            debug!(stray_markers_removed, "removed unpaired marker lines");
        }

        Resolution {
            content,
            blocks_resolved,
            passes,
            stray_markers_removed,
            converged,
        }
    }

    /// One left-to-right pass. Returns the new text and the number of blocks
    /// collapsed.
    fn resolve_pass(&self, content: &str) -> (String, usize) {
        let mut out = String::with_capacity(content.len());
        let mut resolved = 0;

        for segment in detector::segments(content) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Block(block) => {
                    out.push_str(self.pick(&block));
                    resolved += 1;
                }
            }
        }

        (out, resolved)
    }

    /// The text that replaces `block`.
    fn pick<'a>(&self, block: &ConflictBlock<'a>) -> &'a str {
        let chosen = if block.sides_equal() {
            block.ours
        } else {
            match self.options.prefer {
                Side::Ours => block.ours,
                Side::Theirs => block.theirs,
            }
        };

        // A block closing the file without a newline leaves the file without
        // one too.
        if block.ends_without_newline {
            let chosen = chosen.strip_suffix('\n').unwrap_or(chosen);
            chosen.strip_suffix('\r').unwrap_or(chosen)
        } else {
            chosen
        }
    }
}

/// Resolve `content` with the default options (second segment wins).
pub fn resolve(content: &str) -> String {
    Resolver::default().resolve(content).content
}

/// Delete every marker line, returning the swept text and how many lines
/// went.
pub fn sweep_markers(content: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut removed = 0;

    for line in content.split_inclusive('\n') {
        if detector::classify_line(line).is_some() {
            removed += 1;
        } else {
            out.push_str(line);
        }
    }

    (out, removed)
}
