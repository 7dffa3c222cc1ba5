//! Hunk header codec.
//!
//! Converts between [`HunkHeader`] and its textual form:
//!
//! ```text
//! @@ -old_start[,old_count] +new_start[,new_count] @@ optional section heading
//! ```
//!
//! A count of exactly one is written without the `,count` suffix, as git does.
//! When parsing, an omitted count defaults to one.

use super::parse::ParseError;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::opt,
    sequence::preceded,
};
use std::fmt;
use std::str::FromStr;

/// Line ranges covered by a hunk on both sides of the diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

impl HunkHeader {
    pub fn new(old_start: u32, old_count: u32, new_start: u32, new_count: u32) -> Self {
        Self {
            old_start,
            old_count,
            new_start,
            new_count,
        }
    }

    /// Parse a header at the start of `line`.
    ///
    /// Returns the header and the section heading that follows the closing
    /// `@@` (empty when there is none). Anything that does not match the
    /// header grammar from the first byte on is rejected, so content lines
    /// that merely contain `@@` are never mistaken for headers.
    ///
    /// ```
    /// use git_hunks::diff::HunkHeader;
    ///
    /// let (header, heading) = HunkHeader::parse("@@ -18,6 +18,7 @@ fn main() {").unwrap();
    /// assert_eq!(header, HunkHeader::new(18, 6, 18, 7));
    /// assert_eq!(heading, " fn main() {");
    /// ```
    pub fn parse(line: &str) -> Result<(Self, &str), ParseError> {
        match header(line) {
            Ok((heading, header)) if header.fits() => Ok((header, heading)),
            _ => Err(ParseError::InvalidHunkHeader {
                line: line.to_string(),
            }),
        }
    }

    /// First old line number after this hunk
    pub fn old_end(&self) -> u32 {
        self.old_start.saturating_add(self.old_count)
    }

    /// First new line number after this hunk
    pub fn new_end(&self) -> u32 {
        self.new_start.saturating_add(self.new_count)
    }

    /// Both ranges end within `u32`
    fn fits(&self) -> bool {
        self.old_start.checked_add(self.old_count).is_some()
            && self.new_start.checked_add(self.new_count).is_some()
    }
}

impl FromStr for HunkHeader {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).map(|(header, _)| header)
    }
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{} +{} @@",
            format_range(self.old_start, self.old_count),
            format_range(self.new_start, self.new_count)
        )
    }
}

fn format_range(start: u32, count: u32) -> String {
    match count {
        1 => format!("{}", start),
        n => format!("{},{}", start, n),
    }
}

/// `start[,count]`, count defaulting to 1
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn header(input: &str) -> IResult<&str, HunkHeader> {
    (tag("@@ -"), range, tag(" +"), range, tag(" @@"))
        .map(
            |(_, (old_start, old_count), _, (new_start, new_count), _)| HunkHeader {
                old_start,
                old_count,
                new_start,
                new_count,
            },
        )
        .parse(input)
}
