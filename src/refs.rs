//! `file:refs` arguments naming lines of a diff.
//!
//! Lets the command line pick lines by the numbers [`format_diff`] prints,
//! instead of by flat index.
//!
//! # Syntax
//!
//! `FILE:REFS` where `REFS` is a comma separated list of
//! - `N` or `+N` - addition at new line N
//! - `-N` - deletion of old line N
//! - `N..M` - additions at new lines N through M
//! - `-N..-M` - deletions of old lines N through M
//!
//! ```
//! use git_hunks::refs::{LineRef, parse_file_refs};
//! use std::num::NonZeroU32;
//!
//! let refs = parse_file_refs("src/main.rs:-10,12..14").unwrap();
//! assert_eq!(refs.file, "src/main.rs");
//! assert_eq!(refs.refs, vec![
//!     LineRef::Delete(NonZeroU32::new(10).unwrap()),
//!     LineRef::AddRange(NonZeroU32::new(12).unwrap(), NonZeroU32::new(14).unwrap()),
//! ]);
//! ```
//!
//! [`format_diff`]: crate::diff::format_diff

use crate::diff::{Diff, DiffLine, DiffLineKind, Hunk};
use crate::selection::DiffSelection;
use error_set::error_set;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::{all_consuming, opt},
    sequence::{preceded, separated_pair},
};
use std::num::NonZeroU32;
use std::str::FromStr;

error_set! {
    /// Errors from parsing or resolving file:refs arguments
    RefError := {
        /// Input string does not contain a colon separator
        #[display("Invalid format '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid format '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// No line references provided after the colon
        #[display("No line references provided")]
        EmptyRefs,
        /// A reference that is not `N`, `-N`, `N..M` or `-N..-M`
        #[display("Invalid line reference '{value}'")]
        InvalidRef { value: String },
        /// Line numbers start at one
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// None of the references name a changed line
        #[display("No changed lines in {file} match the given references")]
        NoMatchingLines { file: String },
    }
}

/// Reference to changed lines by their line number on one side of the diff.
///
/// Additions are numbered in the new file, deletions in the old file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRef {
    Add(NonZeroU32),
    /// Inclusive
    AddRange(NonZeroU32, NonZeroU32),
    Delete(NonZeroU32),
    /// Inclusive
    DeleteRange(NonZeroU32, NonZeroU32),
}

impl LineRef {
    /// Whether `line` is a change this reference names
    pub fn matches(&self, line: &DiffLine) -> bool {
        let (number, first, last) = match (self, line.kind) {
            (LineRef::Add(n), DiffLineKind::Add) => (line.new_line_number, *n, *n),
            (LineRef::AddRange(s, e), DiffLineKind::Add) => (line.new_line_number, *s, *e),
            (LineRef::Delete(n), DiffLineKind::Delete) => (line.old_line_number, *n, *n),
            (LineRef::DeleteRange(s, e), DiffLineKind::Delete) => (line.old_line_number, *s, *e),
            _ => return false,
        };
        number.is_some_and(|n| (first.get()..=last.get()).contains(&n))
    }
}

/// A file and the lines picked from its diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLineRefs {
    pub file: String,
    pub refs: Vec<LineRef>,
}

impl FileLineRefs {
    /// Selection containing exactly the referenced changes of `diff`.
    ///
    /// The selection is restricted to the diff's changed lines, so
    /// references never pick up context.
    pub fn to_selection(&self, diff: &Diff) -> Result<DiffSelection, RefError> {
        let matching: Vec<usize> = diff
            .hunks
            .iter()
            .flat_map(Hunk::indexed_lines)
            .filter(|(_, line)| self.refs.iter().any(|r| r.matches(line)))
            .map(|(index, _)| index)
            .collect();

        if matching.is_empty() {
            return Err(RefError::NoMatchingLines {
                file: self.file.clone(),
            });
        }

        let base = DiffSelection::none().with_selectable_lines(diff.selectable_lines());
        Ok(matching
            .into_iter()
            .fold(base, |selection, index| selection.with_line_selection(index, true)))
    }
}

impl FromStr for FileLineRefs {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_file_refs(s)
    }
}

/// Parse a `file:refs` argument
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, RefError> {
    let Some((file, refs)) = input.split_once(':') else {
        return Err(RefError::InvalidFormat {
            input: input.to_string(),
        });
    };

    let file = file.trim();
    if file.is_empty() {
        return Err(RefError::EmptyFileName {
            input: input.to_string(),
        });
    }

    let refs = refs
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_line_ref)
        .collect::<Result<Vec<_>, _>>()?;

    if refs.is_empty() {
        return Err(RefError::EmptyRefs);
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs,
    })
}

/// Which side a reference numbers lines on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Old,
    New,
}

/// `(side, first, last)` before validation
fn raw_ref(input: &str) -> IResult<&str, (Side, u32, Option<u32>)> {
    all_consuming(alt((
        separated_pair(preceded(char('-'), number), tag(".."), preceded(char('-'), number))
            .map(|(start, end)| (Side::Old, start, Some(end))),
        preceded(char('-'), number).map(|n| (Side::Old, n, None)),
        separated_pair(added, tag(".."), added).map(|(start, end)| (Side::New, start, Some(end))),
        added.map(|n| (Side::New, n, None)),
    )))
    .parse(input)
}

/// New side numbers may carry the `+` that `format_diff` prints
fn added(input: &str) -> IResult<&str, u32> {
    preceded(opt(char('+')), number).parse(input)
}

fn parse_line_ref(input: &str) -> Result<LineRef, RefError> {
    let (_, (side, start, end)) = raw_ref(input).map_err(|_| RefError::InvalidRef {
        value: input.to_string(),
    })?;

    let non_zero = |n: u32| {
        NonZeroU32::new(n).ok_or_else(|| RefError::InvalidLineNumber {
            value: input.to_string(),
        })
    };
    let start = non_zero(start)?;

    match (side, end.map(non_zero).transpose()?) {
        (_, Some(end)) if start > end => Err(RefError::InvalidRange {
            start: start.get(),
            end: end.get(),
        }),
        (Side::Old, Some(end)) => Ok(LineRef::DeleteRange(start, end)),
        (Side::New, Some(end)) => Ok(LineRef::AddRange(start, end)),
        (Side::Old, None) => Ok(LineRef::Delete(start)),
        (Side::New, None) => Ok(LineRef::Add(start)),
    }
}
