//! Revealing hidden context around hunks.
//!
//! Expansion works on the full content of the new side of the file. A hunk is
//! grown by up to [`DEFAULT_EXPANSION_STEP`] lines, never past its neighbour;
//! when the revealed window touches the neighbour the two hunks become one.

use super::Diff;
use super::header::HunkHeader;
use super::hunk::{Hunk, HunkExpansionType, expansion_type_for};
use super::line::DiffLine;
use std::iter;
use tracing::debug;

/// How many lines a single expansion reveals
pub const DEFAULT_EXPANSION_STEP: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionDirection {
    Up,
    Down,
}

/// Expand the hunk at `hunk_index` by [`DEFAULT_EXPANSION_STEP`] lines.
///
/// See [`expand_hunk_by`].
pub fn expand_hunk<S: AsRef<str>>(
    diff: &Diff,
    hunk_index: usize,
    direction: ExpansionDirection,
    new_content_lines: &[S],
) -> Option<Diff> {
    expand_hunk_by(
        diff,
        hunk_index,
        direction,
        new_content_lines,
        DEFAULT_EXPANSION_STEP as usize,
    )
}

/// Expand the hunk at `hunk_index` by up to `step` lines of context taken
/// from `new_content_lines`, the complete new version of the file.
///
/// Returns `None` when the index is out of range or there is nothing left
/// to reveal in that direction.
pub fn expand_hunk_by<S: AsRef<str>>(
    diff: &Diff,
    hunk_index: usize,
    direction: ExpansionDirection,
    new_content_lines: &[S],
    step: usize,
) -> Option<Diff> {
    let hunk = diff.hunks.get(hunk_index)?;
    let header = hunk.header;
    let last_index = diff.hunks.len() - 1;

    let adjacent_index = match direction {
        ExpansionDirection::Up => hunk_index.checked_sub(1),
        ExpansionDirection::Down => Some(hunk_index + 1).filter(|&i| i <= last_index),
    };
    let adjacent = adjacent_index.and_then(|i| diff.hunks.get(i));

    let step = i64::try_from(step).unwrap_or(i64::MAX);
    let new_start = i64::from(header.new_start);
    let new_end = i64::from(header.new_end());
    let (mut from, mut to) = match direction {
        ExpansionDirection::Up => (new_start.saturating_sub(step), new_start),
        ExpansionDirection::Down => (new_end, new_end.saturating_add(step)),
    };

    let mut merge_with_adjacent = false;
    if let Some(adjacent) = adjacent {
        match direction {
            ExpansionDirection::Up => {
                let limit = i64::from(adjacent.header.new_end());
                from = from.max(limit);
                merge_with_adjacent = from == limit;
            }
            // The dummy hunk covers the whole hidden tail and never clips
            ExpansionDirection::Down if adjacent_index == Some(last_index) && adjacent.is_dummy() => {}
            ExpansionDirection::Down => {
                let limit = i64::from(adjacent.header.new_start);
                to = to.min(limit);
                merge_with_adjacent = to == limit;
            }
        }
    }

    let content_len = i64::try_from(new_content_lines.len()).unwrap_or(i64::MAX);
    let window_start = usize::try_from((from - 1).max(0)).ok()?;
    let window_end = usize::try_from((to - 1).min(content_len)).ok()?;
    let revealed = new_content_lines.get(window_start..window_end)?;
    if revealed.is_empty() {
        return None;
    }
    let count = u32::try_from(revealed.len()).ok()?;

    let context = (0u32..).zip(revealed).map(|(i, line)| {
        let (old_line, new_line) = match direction {
            ExpansionDirection::Up => (
                header.old_start.saturating_sub(count - i),
                header.new_start.saturating_sub(count - i),
            ),
            ExpansionDirection::Down => (header.old_end() + i, header.new_end() + i),
        };
        DiffLine::context(format!(" {}", line.as_ref()), old_line, new_line)
    });

    let expanded_header = match direction {
        ExpansionDirection::Up => HunkHeader::new(
            header.old_start.saturating_sub(count),
            header.old_count + count,
            header.new_start.saturating_sub(count),
            header.new_count + count,
        ),
        ExpansionDirection::Down => HunkHeader::new(
            header.old_start,
            header.old_count + count,
            header.new_start,
            header.new_count + count,
        ),
    };

    let marker = DiffLine::hunk(expanded_header.to_string())
        .with_no_trailing_newline(hunk.lines[0].no_trailing_newline);
    let body = hunk.lines.iter().skip(1).cloned();
    let lines: Vec<DiffLine> = match direction {
        ExpansionDirection::Up => iter::once(marker).chain(context).chain(body).collect(),
        ExpansionDirection::Down => iter::once(marker).chain(body).chain(context).collect(),
    };

    let previous = hunk_index.checked_sub(1).and_then(|i| diff.hunks.get(i));
    let expanded = Hunk::new(
        expanded_header,
        lines,
        hunk.unified_diff_start,
        expansion_type_for(hunk_index, &expanded_header, previous),
    );

    // One marker line disappears when two hunks merge
    let (expanded, previous_end, following_start, added) = match adjacent {
        Some(adjacent) if merge_with_adjacent && direction == ExpansionDirection::Up => (
            merge_hunks(adjacent, &expanded),
            hunk_index - 1,
            hunk_index + 1,
            revealed.len() - 1,
        ),
        Some(adjacent) if merge_with_adjacent => (
            merge_hunks(&expanded, adjacent),
            hunk_index,
            hunk_index + 2,
            revealed.len() - 1,
        ),
        _ => (expanded, hunk_index, hunk_index + 1, revealed.len()),
    };

    let reaches_end = i64::from(expanded_header.new_end()) - 1 >= content_len;
    let following: Vec<Hunk> = if reaches_end {
        Vec::new()
    } else {
        diff.hunks
            .iter()
            .enumerate()
            .skip(following_start)
            .map(|(i, following)| {
                let mut shifted = following.shifted(added);
                let is_last_dummy = i == last_index && following.is_dummy();
                if i == following_start && !is_last_dummy {
                    shifted.expansion_type =
                        expansion_type_for(following_start, &following.header, Some(&expanded));
                }
                shifted
            })
            .collect()
    };

    debug!(
        hunk_index,
        ?direction,
        revealed = revealed.len(),
        merged = merge_with_adjacent,
        reaches_end,
        "expanded hunk"
    );

    let hunks = diff.hunks[..previous_end]
        .iter()
        .cloned()
        .chain(iter::once(expanded))
        .chain(following)
        .collect();
    Some(diff.with_hunks(hunks))
}

/// Join two consecutive hunks behind a single marker line.
///
/// The merged hunk starts where `first` starts and keeps its expansion type.
pub fn merge_hunks(first: &Hunk, second: &Hunk) -> Hunk {
    let header = HunkHeader::new(
        first.header.old_start,
        first.header.old_count + second.header.old_count,
        first.header.new_start,
        first.header.new_count + second.header.new_count,
    );
    let lines = iter::once(DiffLine::hunk(header.to_string()))
        .chain(first.lines.iter().skip(1).cloned())
        .chain(second.lines.iter().skip(1).cloned())
        .collect();
    Hunk::new(
        header,
        lines,
        first.unified_diff_start,
        first.expansion_type,
    )
}

impl Diff {
    /// Append a marker-only hunk covering everything below the last hunk so
    /// the end of the file can be expanded into.
    ///
    /// Returns `None` when there are no hunks or the last one already
    /// reaches the end of the new file.
    pub fn with_bottom_dummy_hunk(&self, old_line_count: u32, new_line_count: u32) -> Option<Diff> {
        let last = self.hunks.last()?;
        if last.header.new_end() >= new_line_count {
            return None;
        }

        let old_start = last.header.old_end();
        let new_start = last.header.new_end();
        let header = HunkHeader::new(
            old_start,
            (old_line_count + 1).saturating_sub(old_start),
            new_start,
            new_line_count + 1 - new_start,
        );
        let dummy = Hunk::new(
            header,
            vec![DiffLine::hunk("")],
            last.unified_diff_end,
            HunkExpansionType::Down,
        );

        let hunks = self.hunks.iter().cloned().chain(iter::once(dummy)).collect();
        Some(self.with_hunks(hunks))
    }
}

/// Expand the first hunk again and again until it covers the whole file.
///
/// Returns `None` if any single expansion fails.
pub fn expand_whole_diff<S: AsRef<str>>(diff: &Diff, new_content_lines: &[S]) -> Option<Diff> {
    let mut result = diff.clone();

    loop {
        let direction = match result.hunks.as_slice() {
            [] => break,
            [only] if only.expansion_type != HunkExpansionType::Up => break,
            [first, ..] if first.expansion_type == HunkExpansionType::Up => ExpansionDirection::Up,
            _ => ExpansionDirection::Down,
        };
        result = expand_hunk_by(
            &result,
            0,
            direction,
            new_content_lines,
            new_content_lines.len(),
        )?;
    }

    Some(result)
}
