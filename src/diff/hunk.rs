use super::expand::DEFAULT_EXPANSION_STEP;
use super::header::HunkHeader;
use super::line::{DiffLine, DiffLineKind};
use std::ops::Range;

/// Which directions a hunk can reveal more context in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HunkExpansionType {
    /// Already at the top of the file, nothing to reveal
    None,
    /// First hunk with hidden lines above it
    Up,
    /// The bottom dummy hunk
    Down,
    /// Gap to the previous hunk is larger than one expansion step
    Both,
    /// Gap to the previous hunk fits in one expansion step
    Short,
}

/// A contiguous block of changes.
///
/// `lines[0]` is always the [`DiffLineKind::Hunk`] marker line.
/// `unified_diff_start..unified_diff_end` locates `lines` within the flattened
/// line sequence of the whole file's diff, which is the index space used by
/// [`DiffSelection`](crate::selection::DiffSelection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub header: HunkHeader,
    pub lines: Vec<DiffLine>,
    pub unified_diff_start: usize,
    pub unified_diff_end: usize,
    pub expansion_type: HunkExpansionType,
}

impl Hunk {
    pub fn new(
        header: HunkHeader,
        lines: Vec<DiffLine>,
        unified_diff_start: usize,
        expansion_type: HunkExpansionType,
    ) -> Self {
        let unified_diff_end = unified_diff_start + lines.len();
        Self {
            header,
            lines,
            unified_diff_start,
            unified_diff_end,
            expansion_type,
        }
    }

    /// Flat index range of this hunk's lines
    pub fn range(&self) -> Range<usize> {
        self.unified_diff_start..self.unified_diff_end
    }

    /// Lines paired with their flat index
    pub fn indexed_lines(&self) -> impl Iterator<Item = (usize, &DiffLine)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (self.unified_diff_start + i, line))
    }

    /// Whether this is the synthetic marker-only hunk that stands in for the
    /// hidden tail of the file.
    pub fn is_dummy(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].kind == DiffLineKind::Hunk
    }

    /// Whether any line in the hunk is an addition or deletion
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(DiffLine::is_change)
    }

    /// Copy of this hunk moved `offset` flat lines down
    #[must_use]
    pub fn shifted(&self, offset: usize) -> Self {
        Self {
            unified_diff_start: self.unified_diff_start + offset,
            unified_diff_end: self.unified_diff_end + offset,
            ..self.clone()
        }
    }
}

/// Decide how the hunk at `hunk_index` can be expanded.
///
/// Only the first hunk can expand exclusively up and only the bottom dummy
/// hunk exclusively down. Every other hunk expands both ways unless the gap
/// above it is short enough that any expansion would reach the previous hunk.
pub fn expansion_type_for(
    hunk_index: usize,
    header: &HunkHeader,
    previous: Option<&Hunk>,
) -> HunkExpansionType {
    if hunk_index == 0 {
        return if header.old_start > 1 && header.new_start > 1 {
            HunkExpansionType::Up
        } else {
            HunkExpansionType::None
        };
    }

    let distance_to_previous = previous.map(|p| {
        i64::from(header.old_start) - i64::from(p.header.old_start) - i64::from(p.header.old_count)
    });

    match distance_to_previous {
        Some(distance) if distance <= i64::from(DEFAULT_EXPANSION_STEP) => {
            HunkExpansionType::Short
        }
        _ => HunkExpansionType::Both,
    }
}
