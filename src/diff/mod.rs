pub mod expand;
pub mod header;
pub mod hunk;
pub mod line;
pub mod line_endings;
pub mod parse;

pub use expand::{
    DEFAULT_EXPANSION_STEP, ExpansionDirection, expand_hunk, expand_hunk_by, expand_whole_diff,
    merge_hunks,
};
pub use header::HunkHeader;
pub use hunk::{Hunk, HunkExpansionType};
pub use line::{DiffLine, DiffLineKind};
pub use line_endings::{LineEnding, LineEndingsChange, parse_line_endings_warning};
pub use parse::{ParseError, diff_from_raw_output, parse};

use std::collections::BTreeSet;

/// The parsed diff of a single file.
///
/// Never modified in place: expansion and line ending metadata produce a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diff {
    /// File header lines (`diff --git`, `index`, `---`, `+++`)
    pub header: String,
    /// Hunk lines joined by `\n`
    pub text: String,
    pub hunks: Vec<Hunk>,
    pub is_binary: bool,
    /// Largest old or new line number appearing in any hunk
    pub max_line_number: u32,
    pub has_hidden_bidi_chars: bool,
    pub line_endings_change: Option<LineEndingsChange>,
}

impl Diff {
    /// Build a text diff from parsed hunks, deriving the summary fields
    pub fn from_hunks(header: String, hunks: Vec<Hunk>) -> Self {
        let lines = || hunks.iter().flat_map(|hunk| hunk.lines.iter());
        let text = lines()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let max_line_number = lines()
            .flat_map(|line| [line.old_line_number, line.new_line_number])
            .flatten()
            .max()
            .unwrap_or(0);
        let has_hidden_bidi_chars = lines().any(|line| line::has_hidden_bidi_chars(&line.text));

        Self {
            header,
            text,
            hunks,
            is_binary: false,
            max_line_number,
            has_hidden_bidi_chars,
            line_endings_change: None,
        }
    }

    /// A diff git reported as binary; it has no hunks
    pub fn binary(header: String) -> Self {
        Self {
            header,
            is_binary: true,
            ..Self::default()
        }
    }

    /// Same file header and metadata with a different set of hunks
    #[must_use]
    pub fn with_hunks(&self, hunks: Vec<Hunk>) -> Self {
        Self {
            line_endings_change: self.line_endings_change,
            ..Self::from_hunks(self.header.clone(), hunks)
        }
    }

    #[must_use]
    pub fn with_line_endings_change(self, change: Option<LineEndingsChange>) -> Self {
        Self {
            line_endings_change: change,
            ..self
        }
    }

    /// Flat indices of every addition and deletion, the only lines a
    /// selection may include
    pub fn selectable_lines(&self) -> BTreeSet<usize> {
        self.hunks
            .iter()
            .flat_map(Hunk::indexed_lines)
            .filter(|(_, line)| line.is_change())
            .map(|(index, _)| index)
            .collect()
    }

    /// Total number of flat lines across all hunks
    pub fn line_count(&self) -> usize {
        self.hunks.last().map_or(0, |hunk| hunk.unified_diff_end)
    }

    /// The line at flat index `index`
    pub fn line(&self, index: usize) -> Option<&DiffLine> {
        self.hunks
            .iter()
            .find(|hunk| hunk.range().contains(&index))
            .and_then(|hunk| hunk.lines.get(index - hunk.unified_diff_start))
    }
}

/// Format a file's diff for user display with explicit line numbers.
///
/// Deletions are listed by old line number as `-N`, additions by new line
/// number as `+N`, which is the numbering `file:refs` arguments use.
pub fn format_diff(path: &str, diff: &Diff) -> String {
    let mut result = String::new();
    result.push_str(path);
    result.push_str(":\n");

    if diff.is_binary {
        result.push_str("  binary file\n");
        return result;
    }

    for hunk in diff.hunks.iter().filter(|hunk| hunk.has_changes()) {
        for line in &hunk.lines {
            match (line.kind, line.old_line_number, line.new_line_number) {
                (DiffLineKind::Delete, Some(n), _) => {
                    result.push_str(&format!("  -{}:\t{}\n", n, line.content()));
                }
                (DiffLineKind::Add, _, Some(n)) => {
                    result.push_str(&format!("  +{}:\t{}\n", n, line.content()));
                }
                _ => {}
            }
        }
        result.push('\n');
    }

    // Remove trailing newline if present
    if result.ends_with("\n\n") {
        result.pop();
    }

    result
}
