//! Line ending conversion warnings.
//!
//! With `core.autocrlf` set, git warns on stderr when diffing a file whose
//! line endings will be rewritten:
//!
//! ```text
//! warning: in the working copy of 'notes.txt', LF will be replaced by CRLF the next time Git touches it
//! ```

use nom::{IResult, Parser, branch::alt, bytes::complete::tag, combinator::value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineEnding {
    Cr,
    Lf,
    Crlf,
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineEnding::Cr => "CR",
            LineEnding::Lf => "LF",
            LineEnding::Crlf => "CRLF",
        };
        f.write_str(name)
    }
}

/// Line endings git will convert on its next write of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineEndingsChange {
    pub from: LineEnding,
    pub to: LineEnding,
}

impl fmt::Display for LineEndingsChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} will be replaced by {}", self.from, self.to)
    }
}

/// Find a line ending conversion warning in git's stderr output
pub fn parse_line_endings_warning(stderr: &str) -> Option<LineEndingsChange> {
    stderr
        .match_indices("', ")
        .find_map(|(at, _)| warning(&stderr[at..]).ok().map(|(_, change)| change))
}

fn line_ending(input: &str) -> IResult<&str, LineEnding> {
    alt((
        value(LineEnding::Crlf, tag("CRLF")),
        value(LineEnding::Cr, tag("CR")),
        value(LineEnding::Lf, tag("LF")),
    ))
    .parse(input)
}

fn warning(input: &str) -> IResult<&str, LineEndingsChange> {
    (
        tag("', "),
        line_ending,
        tag(" will be replaced by "),
        line_ending,
        tag(" the "),
    )
        .map(|(_, from, _, to, _)| LineEndingsChange { from, to })
        .parse(input)
}
