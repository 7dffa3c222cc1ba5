//! Patch synthesis from a partial line selection.
//!
//! Both directions walk the hunks of a [`Diff`] and rewrite each line
//! according to whether it is selected, then rebuild every hunk header from
//! the lines actually emitted. Output is meant for
//! `git apply --unidiff-zero`, so counts and start lines are exact.
//!
//! | line            | commit (index)      | discard (working tree) |
//! |-----------------|---------------------|------------------------|
//! | context         | context             | context                |
//! | selected `+`    | `+` kept            | `-` removed            |
//! | unselected `+`  | dropped             | context (kept)         |
//! | selected `-`    | `-` kept            | `+` restored           |
//! | unselected `-`  | context             | dropped                |

use crate::diff::{Diff, DiffLine, DiffLineKind, Hunk, HunkHeader};
use crate::selection::DiffSelection;
use crate::status::{FileChange, FileStatus};
use error_set::error_set;
use tracing::{debug, trace};

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

error_set! {
    /// Errors from building a patch out of a selection
    PatchError := {
        /// Nothing selected produces a change
        #[display("Selection contains no changes")]
        NoChanges,
        /// Binary files have no lines to select
        #[display("Cannot build a patch for binary file {path}")]
        BinaryDiff { path: String },
    }
}

/// What a diff line becomes in the patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Context,
    Remove,
    Insert,
    /// A line lacking a trailing newline that gets one: emitted as removal,
    /// no-newline marker, then insertion of the same content
    Bridge,
    Skip,
}

/// Which side of the diff the patch applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Old side to new side, applied to the index
    Commit,
    /// New side back towards old, applied to the working tree
    Discard,
}

impl Direction {
    fn emit(self, line: &DiffLine, selected: bool) -> Emit {
        match (self, line.kind, selected) {
            (_, DiffLineKind::Hunk, _) => Emit::Skip,
            (_, DiffLineKind::Context, _) => Emit::Context,
            (Direction::Commit, DiffLineKind::Add, true) => Emit::Insert,
            (Direction::Commit, DiffLineKind::Add, false) => Emit::Skip,
            (Direction::Commit, DiffLineKind::Delete, true) => Emit::Remove,
            (Direction::Commit, DiffLineKind::Delete, false) => Emit::Context,
            (Direction::Discard, DiffLineKind::Add, true) => Emit::Remove,
            (Direction::Discard, DiffLineKind::Add, false) => Emit::Context,
            (Direction::Discard, DiffLineKind::Delete, true) => Emit::Insert,
            (Direction::Discard, DiffLineKind::Delete, false) => Emit::Skip,
        }
    }

    /// First line of the hunk on the side the patch is applied to
    fn from_start(self, header: &HunkHeader) -> u32 {
        match self {
            Direction::Commit => header.old_start,
            Direction::Discard => header.new_start,
        }
    }
}

/// Emitted lines of one hunk and their counts
struct HunkBody {
    text: String,
    from_count: u32,
    to_count: u32,
    has_changes: bool,
}

/// Build the patch that stages the selected lines of `diff`.
///
/// Unselected deletions stay in the file as context and unselected additions
/// are left out, so applying the patch to the index reproduces the old file
/// plus exactly the selected changes. Renamed and copied files are patched
/// from their original path.
pub fn create_patch(
    file: &FileChange,
    diff: &Diff,
    selection: &DiffSelection,
) -> Result<String, PatchError> {
    if diff.is_binary {
        return Err(PatchError::BinaryDiff {
            path: file.path.clone(),
        });
    }

    let from_path = match &file.status {
        FileStatus::New | FileStatus::Untracked => None,
        FileStatus::Renamed { old_path } | FileStatus::Copied { old_path } => {
            Some(old_path.as_str())
        }
        FileStatus::Modified | FileStatus::Deleted | FileStatus::Conflicted => {
            Some(file.path.as_str())
        }
    };

    let hunks = format_hunks(diff, selection, Direction::Commit)?;
    debug!(path = %file.path, status = %file.status, "built patch for selection");
    Ok(file_header(from_path, &file.path) + &hunks)
}

/// Build the patch that removes the selected lines from the working tree.
///
/// Selected additions are removed and selected deletions restored, while
/// every unselected change stays as it currently is in the working tree.
/// The patch is applied forward with `git apply`.
pub fn format_patch_to_discard_changes(
    path: &str,
    diff: &Diff,
    selection: &DiffSelection,
) -> Result<String, PatchError> {
    if diff.is_binary {
        return Err(PatchError::BinaryDiff {
            path: path.to_string(),
        });
    }

    let hunks = format_hunks(diff, selection, Direction::Discard)?;
    debug!(path, "built discard patch for selection");
    Ok(file_header(Some(path), path) + &hunks)
}

fn file_header(from: Option<&str>, to: &str) -> String {
    let from = match from {
        Some(path) => format!("a/{}", path),
        None => "/dev/null".to_string(),
    };
    format!("--- {}\n+++ b/{}\n", from, to)
}

fn format_hunks(
    diff: &Diff,
    selection: &DiffSelection,
    direction: Direction,
) -> Result<String, PatchError> {
    let mut patch = String::new();
    // Net lines added by the hunks emitted so far
    let mut delta: i64 = 0;

    for (index, hunk) in diff.hunks.iter().enumerate() {
        if hunk.is_dummy() {
            continue;
        }

        let body = hunk_body(hunk, selection, direction);
        if !body.has_changes {
            trace!(index, "skipping hunk without selected changes");
            continue;
        }

        let header = rebuild_header(
            direction.from_start(&hunk.header),
            body.from_count,
            body.to_count,
            &mut delta,
        );
        trace!(index, %header, "emitting hunk");
        patch.push_str(&header.to_string());
        patch.push('\n');
        patch.push_str(&body.text);
    }

    if patch.is_empty() {
        return Err(PatchError::NoChanges);
    }
    Ok(patch)
}

fn hunk_body(hunk: &Hunk, selection: &DiffSelection, direction: Direction) -> HunkBody {
    let emits: Vec<Emit> = hunk
        .indexed_lines()
        .map(|(index, line)| direction.emit(line, selection.is_selected(index)))
        .collect();

    let mut body = HunkBody {
        text: String::new(),
        from_count: 0,
        to_count: 0,
        has_changes: false,
    };

    for (i, (line, &emit)) in hunk.lines.iter().zip(&emits).enumerate() {
        // Content inserted after a kept last line needs that line terminated
        let emit = if emit == Emit::Context
            && line.is_change()
            && line.no_trailing_newline
            && emits[i + 1..].contains(&Emit::Insert)
        {
            Emit::Bridge
        } else {
            emit
        };

        let content = line.content();
        match emit {
            Emit::Skip => {}
            Emit::Context => {
                push_line(&mut body.text, ' ', content, line.no_trailing_newline);
                body.from_count += 1;
                body.to_count += 1;
            }
            Emit::Remove => {
                push_line(&mut body.text, '-', content, line.no_trailing_newline);
                body.from_count += 1;
                body.has_changes = true;
            }
            Emit::Insert => {
                push_line(&mut body.text, '+', content, line.no_trailing_newline);
                body.to_count += 1;
                body.has_changes = true;
            }
            Emit::Bridge => {
                push_line(&mut body.text, '-', content, true);
                push_line(&mut body.text, '+', content, false);
                body.from_count += 1;
                body.to_count += 1;
                body.has_changes = true;
            }
        }
    }

    body
}

fn push_line(text: &mut String, marker: char, content: &str, no_trailing_newline: bool) {
    text.push(marker);
    text.push_str(content);
    text.push('\n');
    if no_trailing_newline {
        text.push_str(NO_NEWLINE_MARKER);
        text.push('\n');
    }
}

/// Header for a rewritten hunk.
///
/// The target start is the source start shifted by the lines earlier hunks
/// added or removed. A zero count names the line before the change, as in
/// git's own output.
fn rebuild_header(from_start: u32, from_count: u32, to_count: u32, delta: &mut i64) -> HunkHeader {
    let from_first = match from_count {
        0 => i64::from(from_start) + 1,
        _ => i64::from(from_start),
    };
    let to_first = from_first + *delta;
    let to_start = match to_count {
        0 => to_first - 1,
        _ => to_first,
    };
    *delta += i64::from(to_count) - i64::from(from_count);

    HunkHeader::new(
        from_start,
        from_count,
        u32::try_from(to_start.max(0)).unwrap_or(u32::MAX),
        to_count,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diff::parse;
    use similar_asserts::assert_eq;

    const THREE_HUNKS: &str = "diff --git a/notes.md b/notes.md\n\
                               index 3b18e51..a9c2f4e 100644\n\
                               --- a/notes.md\n\
                               +++ b/notes.md\n\
                               @@ -1,4 +1,5 @@\n \
                               # Notes\n\
                               +\n \
                               first paragraph\n\
                               -old second line\n\
                               +new second line\n \
                               trailing context\n\
                               @@ -20,3 +21,2 @@\n \
                               alpha\n\
                               -beta\n \
                               gamma\n\
                               @@ -40,3 +40,4 @@\n \
                               one\n\
                               +two\n\
                               +three\n\
                               -four\n \
                               five\n";

    fn modified(path: &str) -> FileChange {
        FileChange::new(path, FileStatus::Modified)
    }

    fn notes() -> Diff {
        parse(THREE_HUNKS).unwrap()
    }

    #[test]
    fn whole_selection_reproduces_diff() {
        let patch = create_patch(&modified("notes.md"), &notes(), &DiffSelection::all()).unwrap();
        let expected = THREE_HUNKS
            .lines()
            .skip(2)
            .map(|line| format!("{}\n", line))
            .collect::<String>();
        assert_eq!(patch, expected);
    }

    #[test]
    fn only_first_hunk_selected() {
        let diff = notes();
        let first = &diff.hunks[0];
        let selection = DiffSelection::none().with_range_selection(
            first.unified_diff_start,
            first.unified_diff_end - first.unified_diff_start,
            true,
        );

        let patch = create_patch(&modified("notes.md"), &diff, &selection).unwrap();

        assert_eq!(patch.matches("@@ -").count(), 1);
        assert!(patch.contains(&format!("+1,{} @@", first.header.new_count)));
        assert!(!patch.contains("alpha"));
        assert!(!patch.contains("three"));
        insta::assert_snapshot!(patch, @r"
        --- a/notes.md
        +++ b/notes.md
        @@ -1,4 +1,5 @@
         # Notes
        +
         first paragraph
        -old second line
        +new second line
         trailing context
        ");
    }

    #[test]
    fn unselected_deletion_becomes_context() {
        let selection = DiffSelection::all().with_line_selection(15, false);
        let patch = create_patch(&modified("notes.md"), &notes(), &selection).unwrap();

        insta::assert_snapshot!(patch, @r"
        --- a/notes.md
        +++ b/notes.md
        @@ -1,4 +1,5 @@
         # Notes
        +
         first paragraph
        -old second line
        +new second line
         trailing context
        @@ -20,3 +21,2 @@
         alpha
        -beta
         gamma
        @@ -40,3 +40,5 @@
         one
        +two
        +three
         four
         five
        ");
    }

    #[test]
    fn new_start_follows_emitted_hunks() {
        let diff = notes();
        let second = &diff.hunks[1];
        let selection = DiffSelection::none().with_range_selection(
            second.unified_diff_start,
            second.unified_diff_end - second.unified_diff_start,
            true,
        );

        let patch = create_patch(&modified("notes.md"), &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/notes.md\n+++ b/notes.md\n@@ -20,3 +20,2 @@\n alpha\n-beta\n gamma\n"
        );
    }

    #[test]
    fn unselected_additions_are_not_context() {
        let raw = "--- a/file.md\n\
                   +++ b/file.md\n\
                   @@ -10,2 +10,4 @@\n \
                   context\n\
                   +added line 1\n\
                   +added line 2\n \
                   context\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::none().with_line_selection(3, true);

        let patch = create_patch(&modified("file.md"), &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/file.md\n+++ b/file.md\n@@ -10,2 +10,3 @@\n context\n+added line 2\n context\n"
        );
    }

    #[test]
    fn new_file_header_is_rebuilt() {
        let raw = "--- /dev/null\n\
                   +++ b/file.md\n\
                   @@ -0,0 +1,2 @@\n\
                   +added line 1\n\
                   +added line 2\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::none().with_line_selection(2, true);
        let file = FileChange::new("file.md", FileStatus::New);

        let patch = create_patch(&file, &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- /dev/null\n+++ b/file.md\n@@ -0,0 +1 @@\n+added line 2\n"
        );
    }

    #[test]
    fn keeps_empty_context_lines() {
        let raw = "--- a/file.md\n+++ b/file.md\n@@ -1 +1,2 @@\n \n+added line 2\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::none().with_line_selection(2, true);

        let patch = create_patch(&modified("file.md"), &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/file.md\n+++ b/file.md\n@@ -1 +1,2 @@\n \n+added line 2\n"
        );
    }

    #[test]
    fn missing_newline_is_bridged_for_appended_content() {
        let raw = "--- a/file.md\n\
                   +++ b/file.md\n\
                   @@ -23,5 +23,5 @@ and more stuff\n \
                   \n \
                   \n \
                   \n\
                   -\n\
                   -and fun stuff? I dnno\n\
                   \\ No newline at end of file\n\
                   +and fun stuff? I dnno\n\
                   +it could be,\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::none().with_line_selection(7, true);

        let patch = create_patch(&modified("file.md"), &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/file.md\n\
             +++ b/file.md\n\
             @@ -23,5 +23,6 @@\n \n \n \n \n\
             -and fun stuff? I dnno\n\
             \\ No newline at end of file\n\
             +and fun stuff? I dnno\n\
             +it could be,\n"
        );
    }

    #[test]
    fn missing_newline_marker_follows_kept_line() {
        let raw = "@@ -1,2 +1,2 @@\n \
                   first\n\
                   -second\n\
                   \\ No newline at end of file\n\
                   +changed\n\
                   \\ No newline at end of file\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::all().with_line_selection(3, false);

        let patch = create_patch(&modified("f"), &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/f\n+++ b/f\n@@ -1,2 +1 @@\n first\n-second\n\\ No newline at end of file\n"
        );
    }

    #[test]
    fn renamed_file_patches_from_old_path() {
        let raw = "@@ -3 +3 @@\n-before\n+after\n";
        let diff = parse(raw).unwrap();
        let file = FileChange::new(
            "docs/new.md",
            FileStatus::Renamed {
                old_path: "docs/old.md".to_string(),
            },
        );

        let patch = create_patch(&file, &diff, &DiffSelection::all()).unwrap();
        assert!(patch.starts_with("--- a/docs/old.md\n+++ b/docs/new.md\n"));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let result = create_patch(&modified("notes.md"), &notes(), &DiffSelection::none());
        assert!(matches!(result, Err(PatchError::NoChanges)));

        let result = create_patch(&modified("notes.md"), &Diff::default(), &DiffSelection::all());
        assert!(matches!(result, Err(PatchError::NoChanges)));
    }

    #[test]
    fn binary_diff_is_an_error() {
        let diff = Diff::binary("Binary files a/x.png and b/x.png differ".to_string());
        let result = create_patch(&modified("x.png"), &diff, &DiffSelection::all());
        assert!(matches!(result, Err(PatchError::BinaryDiff { .. })));
    }

    #[test]
    fn dummy_hunk_is_never_emitted() {
        let diff = notes();
        let with_dummy = diff.with_bottom_dummy_hunk(60, 60).unwrap();
        let selection = DiffSelection::all();

        assert_eq!(
            create_patch(&modified("notes.md"), &with_dummy, &selection).unwrap(),
            create_patch(&modified("notes.md"), &diff, &selection).unwrap()
        );
    }

    #[test]
    fn discard_restores_selected_deletion() {
        let selection = DiffSelection::none().with_line_selection(9, true);
        let patch = format_patch_to_discard_changes("notes.md", &notes(), &selection).unwrap();

        assert_eq!(
            patch,
            "--- a/notes.md\n+++ b/notes.md\n@@ -21,2 +21,3 @@\n alpha\n+beta\n gamma\n"
        );
    }

    #[test]
    fn discard_removes_selected_addition() {
        let selection = DiffSelection::none().with_line_selection(13, true);
        let patch = format_patch_to_discard_changes("notes.md", &notes(), &selection).unwrap();

        insta::assert_snapshot!(patch, @r"
        --- a/notes.md
        +++ b/notes.md
        @@ -40,4 +40,3 @@
         one
        -two
         three
         five
        ");
    }

    #[test]
    fn discard_shifts_later_hunks() {
        let selection = DiffSelection::none()
            .with_line_selection(2, true)
            .with_line_selection(9, true);
        let patch = format_patch_to_discard_changes("notes.md", &notes(), &selection).unwrap();

        assert_eq!(
            patch,
            "--- a/notes.md\n+++ b/notes.md\n\
             @@ -1,5 +1,4 @@\n \
             # Notes\n\
             -\n \
             first paragraph\n \
             new second line\n \
             trailing context\n\
             @@ -21,2 +20,3 @@\n \
             alpha\n\
             +beta\n \
             gamma\n"
        );
    }

    #[test]
    fn discard_bridges_kept_line_without_newline() {
        let raw = "@@ -1 +1 @@\n\
                   +kept\n\
                   \\ No newline at end of file\n\
                   -restored\n";
        let diff = parse(raw).unwrap();
        let selection = DiffSelection::none().with_line_selection(2, true);

        let patch = format_patch_to_discard_changes("f", &diff, &selection).unwrap();
        assert_eq!(
            patch,
            "--- a/f\n+++ b/f\n@@ -1 +1,2 @@\n\
             -kept\n\
             \\ No newline at end of file\n\
             +kept\n\
             +restored\n"
        );
    }

    #[test]
    fn discard_without_selection_is_an_error() {
        let result =
            format_patch_to_discard_changes("notes.md", &notes(), &DiffSelection::none());
        assert!(matches!(result, Err(PatchError::NoChanges)));
    }
}
