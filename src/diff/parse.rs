//! Unified diff parser.
//!
//! Turns the text git prints for a single file into a [`Diff`]. The scan is a
//! small state machine over the raw lines: everything before the first hunk
//! marker is the file header, after that every line either opens a new hunk
//! or belongs to the current one.

use super::header::HunkHeader;
use super::hunk::{Hunk, expansion_type_for};
use super::line::{DiffLine, DiffLineKind};
use super::Diff;
use error_set::error_set;
use tracing::{debug, trace};

/// Shortest legal `\ No newline at end of file` marker line
const MIN_NO_NEWLINE_MARKER_LEN: usize = 12;

error_set! {
    /// Errors from parsing unified diff text
    ParseError := {
        /// A line in hunk position does not match `@@ -a,b +c,d @@`
        #[display("Invalid hunk header '{line}'")]
        InvalidHunkHeader { line: String },
        /// A hunk marker with no lines after it
        #[display("Hunk {index} has no content lines")]
        EmptyHunk { index: usize },
        /// A hunk body line that starts with an unknown marker
        #[display("Unexpected line {line_number} in hunk body: '{text}'")]
        UnexpectedLine { line_number: usize, text: String },
        /// Line numbers past `u32::MAX`
        #[display("Line {line_number} numbers past the largest supported line")]
        LineNumberOverflow { line_number: usize },
        /// A `\` line too short to be a no-newline marker
        #[display("Malformed no-newline marker '{text}'")]
        MalformedNoNewlineMarker { text: String },
    }
}

/// Hunk under construction
struct HunkBuilder {
    header: HunkHeader,
    lines: Vec<DiffLine>,
    start: usize,
    old_line: u32,
    new_line: u32,
}

impl HunkBuilder {
    fn new(header: HunkHeader, marker: &str, start: usize) -> Self {
        Self {
            header,
            lines: vec![DiffLine::hunk(marker)],
            start,
            old_line: header.old_start,
            new_line: header.new_start,
        }
    }

    fn push_body_line(&mut self, line_number: usize, text: &str) -> Result<(), ParseError> {
        match text.as_bytes().first() {
            Some(b'+') => {
                self.lines.push(DiffLine::add(text, self.new_line));
                self.new_line = next_line(self.new_line, line_number)?;
            }
            Some(b'-') => {
                self.lines.push(DiffLine::delete(text, self.old_line));
                self.old_line = next_line(self.old_line, line_number)?;
            }
            Some(b' ') | None => {
                self.lines
                    .push(DiffLine::context(text, self.old_line, self.new_line));
                self.old_line = next_line(self.old_line, line_number)?;
                self.new_line = next_line(self.new_line, line_number)?;
            }
            Some(b'\\') => {
                if text.len() < MIN_NO_NEWLINE_MARKER_LEN {
                    return Err(ParseError::MalformedNoNewlineMarker {
                        text: text.to_string(),
                    });
                }
                match self.lines.last_mut() {
                    Some(previous) if previous.kind != DiffLineKind::Hunk => {
                        previous.no_trailing_newline = true;
                    }
                    _ => {
                        return Err(ParseError::UnexpectedLine {
                            line_number,
                            text: text.to_string(),
                        });
                    }
                }
            }
            Some(_) => {
                return Err(ParseError::UnexpectedLine {
                    line_number,
                    text: text.to_string(),
                });
            }
        }
        Ok(())
    }

    fn finish(self, index: usize, previous: Option<&Hunk>) -> Result<Hunk, ParseError> {
        if self.lines.len() < 2 {
            return Err(ParseError::EmptyHunk { index });
        }
        let expansion_type = expansion_type_for(index, &self.header, previous);
        Ok(Hunk::new(self.header, self.lines, self.start, expansion_type))
    }
}

fn next_line(current: u32, line_number: usize) -> Result<u32, ParseError> {
    current
        .checked_add(1)
        .ok_or(ParseError::LineNumberOverflow { line_number })
}

/// Where the scanner currently is
enum ScanState {
    /// In the file header, waiting for the first hunk marker.
    /// `past_file_header` is set once the `+++` line has been seen, after
    /// which only a hunk marker may follow.
    ScanningForMarker { past_file_header: bool },
    InHunkBody(HunkBuilder),
}

/// Parse the unified diff of a single file.
///
/// Lines are split on `\n` only, so a `\r` from CRLF content stays part of
/// the line text. Binary diffs and diffs without any hunk produce a [`Diff`]
/// with no hunks rather than an error.
pub fn parse(raw: &str) -> Result<Diff, ParseError> {
    let body = raw.strip_suffix('\n').unwrap_or(raw);
    let mut header_lines: Vec<&str> = Vec::new();
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut state = ScanState::ScanningForMarker {
        past_file_header: false,
    };

    let lines = body.split('\n').filter(|_| !raw.is_empty());
    for (i, line) in lines.enumerate() {
        let line_number = i + 1;
        state = match state {
            ScanState::ScanningForMarker { past_file_header } => {
                if is_binary_marker(line) {
                    header_lines.push(line);
                    debug!("binary diff");
                    return Ok(Diff::binary(header_lines.join("\n")));
                }
                // No file header line starts with `@@`, so a bad one is fatal
                if line.starts_with("@@") || (past_file_header && line.starts_with('@')) {
                    let (header, _) = HunkHeader::parse(line)?;
                    ScanState::InHunkBody(HunkBuilder::new(header, line, 0))
                } else if past_file_header {
                    return Err(ParseError::UnexpectedLine {
                        line_number,
                        text: line.to_string(),
                    });
                } else {
                    header_lines.push(line);
                    ScanState::ScanningForMarker {
                        past_file_header: line.starts_with("+++"),
                    }
                }
            }
            ScanState::InHunkBody(mut builder) => {
                if line.starts_with('@') {
                    let (header, _) = HunkHeader::parse(line)?;
                    let hunk = builder.finish(hunks.len(), hunks.last())?;
                    let start = hunk.unified_diff_end;
                    hunks.push(hunk);
                    ScanState::InHunkBody(HunkBuilder::new(header, line, start))
                } else {
                    builder.push_body_line(line_number, line)?;
                    ScanState::InHunkBody(builder)
                }
            }
        };
    }

    if let ScanState::InHunkBody(builder) = state {
        let hunk = builder.finish(hunks.len(), hunks.last())?;
        hunks.push(hunk);
    }

    trace!(hunks = hunks.len(), "parsed diff");
    Ok(Diff::from_hunks(header_lines.join("\n"), hunks))
}

/// Parse the final record of NUL-delimited `git diff -z --patch-with-raw`
/// output, skipping the raw status and path records before it.
pub fn diff_from_raw_output(output: &str) -> Result<Diff, ParseError> {
    let patch = output.rsplit('\0').next().unwrap_or("");
    parse(patch)
}

fn is_binary_marker(line: &str) -> bool {
    line.starts_with("Binary files ") && line.ends_with("differ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::HunkExpansionType;
    use similar_asserts::assert_eq;

    const TWO_HUNKS: &str = r"diff --git a/src/lib.rs b/src/lib.rs
index 1f2e3d4..5a6b7c8 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -18,6 +18,7 @@ pub fn run() {
 line 18
 line 19
 line 20
+inserted after 20
 line 21
 line 22
 line 23
@@ -71,12 +72,13 @@ fn helper() {
 line 71
 line 72
 line 73
 line 74
 line 75
-line 76
-line 77
+line 76 changed
+line 77 changed
+line 77 extra
 line 78
 line 79
 line 80
 line 81
 line 82
";

    #[test]
    fn parses_two_hunks() {
        let diff = parse(TWO_HUNKS).unwrap();

        assert_eq!(diff.hunks.len(), 2);
        assert!(!diff.is_binary);
        assert_eq!(diff.header.lines().count(), 4);

        let first = &diff.hunks[0];
        assert_eq!(first.header, HunkHeader::new(18, 6, 18, 7));
        assert_eq!(first.unified_diff_start, 0);
        assert_eq!(first.unified_diff_end, 8);
        assert_eq!(first.expansion_type, HunkExpansionType::Up);

        let added = &first.lines[4];
        assert_eq!(added.kind, DiffLineKind::Add);
        assert_eq!(added.old_line_number, None);
        assert_eq!(added.new_line_number, Some(first.header.old_start + 3));

        let second = &diff.hunks[1];
        assert_eq!(second.header, HunkHeader::new(71, 12, 72, 13));
        assert_eq!(second.unified_diff_start, 8);
        assert_eq!(second.unified_diff_end, 24);
        assert_eq!(second.expansion_type, HunkExpansionType::Both);
        assert_eq!(second.lines[0].text, "@@ -71,12 +72,13 @@ fn helper() {");
        assert_eq!(diff.max_line_number, 84);
    }

    #[test]
    fn assigns_independent_line_numbers() {
        let diff = parse(TWO_HUNKS).unwrap();
        let second = &diff.hunks[1];

        let deleted = &second.lines[6];
        assert_eq!(deleted.text, "-line 76");
        assert_eq!(deleted.old_line_number, Some(76));
        assert_eq!(deleted.new_line_number, None);

        let added = &second.lines[8];
        assert_eq!(added.text, "+line 76 changed");
        assert_eq!(added.new_line_number, Some(77));

        let context = &second.lines[11];
        assert_eq!(context.text, " line 78");
        assert_eq!(context.old_line_number, Some(78));
        assert_eq!(context.new_line_number, Some(80));
    }

    #[test]
    fn parses_new_file() {
        let raw = "diff --git a/new.txt b/new.txt\n\
                   new file mode 100644\n\
                   index 0000000..ce01362\n\
                   --- /dev/null\n\
                   +++ b/new.txt\n\
                   @@ -0,0 +1 @@\n\
                   +hello\n";
        let diff = parse(raw).unwrap();

        assert_eq!(diff.hunks.len(), 1);
        let hunk = &diff.hunks[0];
        assert_eq!(hunk.header, HunkHeader::new(0, 0, 1, 1));
        assert_eq!(hunk.lines.len(), 2);
        assert_eq!(hunk.expansion_type, HunkExpansionType::None);

        let line = &hunk.lines[1];
        assert_eq!(line.kind, DiffLineKind::Add);
        assert_eq!(line.old_line_number, None);
        assert_eq!(line.new_line_number, Some(1));
    }

    #[test]
    fn markers_inside_content_are_not_headers() {
        let raw = "@@ -1,2 +1,2 @@\n\
                   -let marker = \"@@\";\n\
                   +let marker = \"@@ -1 +1 @@\";\n \
                   unchanged\n";
        let diff = parse(raw).unwrap();

        assert_eq!(diff.hunks.len(), 1);
        let kinds: Vec<_> = diff.hunks[0].lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineKind::Hunk,
                DiffLineKind::Delete,
                DiffLineKind::Add,
                DiffLineKind::Context
            ]
        );
    }

    #[test]
    fn no_newline_marker_flags_previous_line() {
        let raw = "--- a/file.txt\n\
                   +++ b/file.txt\n\
                   @@ -1 +1 @@\n\
                   -old\n\
                   \\ No newline at end of file\n\
                   +new\n\
                   \\ No newline at end of file\n";
        let diff = parse(raw).unwrap();
        let lines = &diff.hunks[0].lines;

        assert_eq!(lines.len(), 3);
        assert!(lines[1].no_trailing_newline);
        assert!(lines[2].no_trailing_newline);
        assert_eq!(diff.text, "@@ -1 +1 @@\n-old\n+new");
    }

    #[test]
    fn no_newline_marker_on_new_side_only() {
        let raw = "@@ -1,2 +1,2 @@\n \
                   first\n\
                   -second\n\
                   +second\n\
                   \\ No newline at end of file\n";
        let diff = parse(raw).unwrap();
        let lines = &diff.hunks[0].lines;

        assert!(!lines[2].no_trailing_newline);
        assert!(lines[3].no_trailing_newline);
    }

    #[test]
    fn binary_diff_has_no_hunks() {
        let raw = "diff --git a/logo.png b/logo.png\n\
                   index 1a2b3c4..5d6e7f8 100644\n\
                   Binary files a/logo.png and b/logo.png differ\n";
        let diff = parse(raw).unwrap();

        assert!(diff.is_binary);
        assert!(diff.hunks.is_empty());
    }

    #[test]
    fn empty_inputs_have_no_hunks() {
        let diff = parse("").unwrap();
        assert!(diff.hunks.is_empty());
        assert!(!diff.is_binary);

        let diff = parse(
            "diff --git a/empty b/empty\n\
             new file mode 100644\n\
             index 0000000..e69de29\n",
        )
        .unwrap();
        assert!(diff.hunks.is_empty());
        assert_eq!(diff.max_line_number, 0);
    }

    #[test]
    fn blank_body_lines_are_context() {
        let raw = "@@ -1,3 +1,3 @@\n \
                   one\n\
                   \n\
                   -three\n\
                   +THREE\n";
        let diff = parse(raw).unwrap();
        let blank = &diff.hunks[0].lines[2];

        assert_eq!(blank.kind, DiffLineKind::Context);
        assert_eq!(blank.old_line_number, Some(2));
        assert_eq!(blank.new_line_number, Some(2));
    }

    #[test]
    fn keeps_carriage_returns() {
        let raw = "@@ -1 +1 @@\n-old\r\n+new\r\n";
        let diff = parse(raw).unwrap();

        assert_eq!(diff.hunks[0].lines[1].text, "-old\r");
        assert_eq!(diff.hunks[0].lines[2].content(), "new\r");
    }

    #[test]
    fn flags_hidden_bidi_characters() {
        let raw = "@@ -1 +1 @@\n-plain\n+if access \u{202E}nimda\u{2066}\n";
        assert!(parse(raw).unwrap().has_hidden_bidi_chars);
        assert!(!parse("@@ -1 +1 @@\n-a\n+b\n").unwrap().has_hidden_bidi_chars);
    }

    #[test]
    fn raw_output_uses_last_record() {
        let output = ":100644 100644 1f2e3d4 5a6b7c8 M\0file.txt\0\
                      diff --git a/file.txt b/file.txt\n\
                      --- a/file.txt\n\
                      +++ b/file.txt\n\
                      @@ -3 +3 @@\n\
                      -before\n\
                      +after\n";
        let diff = diff_from_raw_output(output).unwrap();

        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].header, HunkHeader::new(3, 1, 3, 1));
    }

    #[test]
    fn hunk_without_lines_is_rejected() {
        let result = parse("@@ -1 +1 @@\n@@ -5 +5 @@\n-a\n+b\n");
        assert!(matches!(result, Err(ParseError::EmptyHunk { index: 0 })));

        let result = parse("+++ b/file\n@@ -1 +1 @@\n");
        assert!(matches!(result, Err(ParseError::EmptyHunk { index: 0 })));
    }

    #[test]
    fn unknown_body_line_is_rejected() {
        let result = parse("@@ -1 +1 @@\n-a\n*b\n");
        assert!(matches!(
            result,
            Err(ParseError::UnexpectedLine { line_number: 3, .. })
        ));
    }

    #[test]
    fn malformed_marker_in_body_is_rejected() {
        let result = parse("@@ -1 +1 @@\n-a\n+b\n@@ -x +1 @@\n");
        assert!(matches!(result, Err(ParseError::InvalidHunkHeader { .. })));

        let result = parse("--- a/f\n+++ b/f\n@@ broken\n");
        assert!(matches!(result, Err(ParseError::InvalidHunkHeader { .. })));

        let result = parse("@@ -x +1 @@\n-a\n+b\n");
        assert!(matches!(result, Err(ParseError::InvalidHunkHeader { .. })));
    }

    #[test]
    fn line_numbers_past_u32_are_rejected() {
        let result = parse("@@ -1 +4294967295,2 @@\n+a\n+b\n");
        assert!(matches!(result, Err(ParseError::InvalidHunkHeader { .. })));

        let result = parse("@@ -1,0 +4294967295,0 @@\n+a\n+b\n");
        assert!(matches!(
            result,
            Err(ParseError::LineNumberOverflow { line_number: 2 })
        ));
    }

    #[test]
    fn short_no_newline_marker_is_rejected() {
        let result = parse("@@ -1 +1 @@\n-a\n\\ No\n+b\n");
        assert!(matches!(
            result,
            Err(ParseError::MalformedNoNewlineMarker { .. })
        ));
    }
}
