//! Conflict-marker detection.
//!
//! Classifies individual lines as merge-conflict markers and splits a
//! document into verbatim text and [`ConflictBlock`]s with a single
//! left-to-right scan. No regular expressions are involved; the scan is a
//! small state machine over the four marker kinds.

use tracing::debug;

/// Opens a conflict block (`<<<<<<< HEAD`).
pub const START_MARKER: &str = "<<<<<<<";
/// Introduces the common-ancestor section in diff3-style conflicts.
pub const BASE_MARKER: &str = "|||||||";
/// Divides the two conflicting segments.
pub const SEPARATOR_MARKER: &str = "=======";
/// Closes a conflict block (`>>>>>>> 1a2b3c4`).
pub const END_MARKER: &str = ">>>>>>>";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of conflict-marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    Base,
    Separator,
    End,
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Base => write!(f, "base"),
            Self::Separator => write!(f, "separator"),
            Self::End => write!(f, "end"),
        }
    }
}

/// A well-formed conflict block found in a document.
///
/// Segments borrow from the scanned text and keep their line terminators, so
/// `ours` for `"<<<<<<< HEAD\nA\n=======\n..."` is `"A\n"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictBlock<'a> {
    /// Text after the start marker, usually a branch name.
    pub start_label: &'a str,
    /// Lines between the start marker and the separator (or base marker).
    pub ours: &'a str,
    /// Lines between a diff3 base marker and the separator, if present.
    pub base: Option<&'a str>,
    /// Lines between the separator and the end marker.
    pub theirs: &'a str,
    /// Text after the end marker, usually a revision identifier.
    pub trailing_label: &'a str,
    /// 1-indexed line of the start marker.
    pub start_line: usize,
    /// 1-indexed line of the end marker.
    pub end_line: usize,
    /// The end marker is the last line and has no terminator.
    pub ends_without_newline: bool,
}

impl ConflictBlock<'_> {
    /// Whether both segments carry the same text, ignoring surrounding
    /// whitespace.
    pub fn sides_equal(&self) -> bool {
        self.ours.trim() == self.theirs.trim()
    }
}

/// A piece of a scanned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any well-formed block, including stray markers.
    Text(&'a str),
    /// A complete conflict block.
    Block(ConflictBlock<'a>),
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Classify a single line (with or without its terminator).
///
/// `<<<<<<<`, `|||||||` and `>>>>>>>` must be followed by end of line or
/// whitespace; `=======` must stand alone apart from trailing whitespace.
/// A trailing `\r` is ignored so CRLF files classify the same way.
pub fn classify_line(line: &str) -> Option<MarkerKind> {
    let line = strip_terminator(line);

    if line.trim_end() == SEPARATOR_MARKER {
        return Some(MarkerKind::Separator);
    }
    if labeled_marker(line, START_MARKER).is_some() {
        return Some(MarkerKind::Start);
    }
    if labeled_marker(line, END_MARKER).is_some() {
        return Some(MarkerKind::End);
    }
    if labeled_marker(line, BASE_MARKER).is_some() {
        return Some(MarkerKind::Base);
    }
    None
}

/// Quick pre-check: does `content` contain a start or end marker line?
///
/// A lone separator is not enough, since `=======` is also a Markdown
/// heading underline.
pub fn has_conflict_markers(content: &str) -> bool {
    content.split_inclusive('\n').any(|line| {
        matches!(
            classify_line(line),
            Some(MarkerKind::Start | MarkerKind::End)
        )
    })
}

/// Count every marker line in `content`, paired or not.
pub fn count_marker_lines(content: &str) -> usize {
    content
        .split_inclusive('\n')
        .filter(|line| classify_line(line).is_some())
        .count()
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Return the label following `marker`, or `None` if the line is not that
/// marker.
fn labeled_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    if rest.is_empty() {
        return Some("");
    }
    if rest.starts_with([' ', '\t']) {
        return Some(rest.trim());
    }
    None
}

// ---------------------------------------------------------------------------
// Block scanning
// ---------------------------------------------------------------------------

/// An open candidate block: where it started and where its body begins.
#[derive(Clone, Copy)]
struct Open<'a> {
    start_line: usize,
    block_from: usize,
    label: &'a str,
    body_from: usize,
}

#[derive(Clone, Copy)]
enum State<'a> {
    Outside,
    InOurs(Open<'a>),
    InBase {
        open: Open<'a>,
        ours_to: usize,
        base_from: usize,
    },
    InTheirs {
        open: Open<'a>,
        ours_to: usize,
        base: Option<(usize, usize)>,
        theirs_from: usize,
    },
}

/// Split `content` into verbatim text and well-formed conflict blocks.
///
/// A start marker always (re)opens a block, abandoning any unfinished
/// candidate, so a single scan yields the innermost blocks of nested
/// conflicts. Markers that never complete a block stay inside
/// [`Segment::Text`]. Concatenating every `Text` with every block's original
/// span reproduces `content` exactly.
pub fn segments(content: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut text_from = 0;
    let mut offset = 0;
    let mut state = State::Outside;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let line_from = offset;
        let line_to = offset + line.len();
        offset = line_to;

        let kind = classify_line(line);
        state = match (state, kind) {
            (_, Some(MarkerKind::Start)) => State::InOurs(Open {
                start_line: idx + 1,
                block_from: line_from,
                label: labeled_marker(strip_terminator(line), START_MARKER).unwrap_or(""),
                body_from: line_to,
            }),
            (State::InOurs(open), Some(MarkerKind::Base)) => State::InBase {
                open,
                ours_to: line_from,
                base_from: line_to,
            },
            (State::InOurs(open), Some(MarkerKind::Separator)) => State::InTheirs {
                open,
                ours_to: line_from,
                base: None,
                theirs_from: line_to,
            },
            (
                State::InBase {
                    open,
                    ours_to,
                    base_from,
                },
                Some(MarkerKind::Separator),
            ) => State::InTheirs {
                open,
                ours_to,
                base: Some((base_from, line_from)),
                theirs_from: line_to,
            },
            (
                State::InTheirs {
                    open,
                    ours_to,
                    base,
                    theirs_from,
                },
                Some(MarkerKind::End),
            ) => {
                let block = ConflictBlock {
                    start_label: open.label,
                    ours: &content[open.body_from..ours_to],
                    base: base.map(|(from, to)| &content[from..to]),
                    theirs: &content[theirs_from..line_from],
                    trailing_label: labeled_marker(strip_terminator(line), END_MARKER)
                        .unwrap_or(""),
                    start_line: open.start_line,
                    end_line: idx + 1,
                    ends_without_newline: !line.ends_with('\n'),
                };
                debug!(
                    start_line = block.start_line,
                    end_line = block.end_line,
                    label = block.trailing_label,
                    "conflict block found"
                );

                if open.block_from > text_from {
                    out.push(Segment::Text(&content[text_from..open.block_from]));
                }
                out.push(Segment::Block(block));
                text_from = line_to;
                State::Outside
            }
            // Anything else is either plain content of the current segment
            // or a stray marker outside a block.
            (state, _) => state,
        };
    }

    if text_from < content.len() {
        out.push(Segment::Text(&content[text_from..]));
    }
    out
}

/// All well-formed blocks found by a single scan of `content`.
pub fn find_blocks(content: &str) -> Vec<ConflictBlock<'_>> {
    segments(content)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Block(block) => Some(block),
            Segment::Text(_) => None,
        })
        .collect()
}
