/// What a line in a parsed diff represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffLineKind {
    /// The `@@ ... @@` marker that opens a hunk
    Hunk,
    /// Unchanged line present on both sides
    Context,
    /// Line only present in the new version
    Add,
    /// Line only present in the old version
    Delete,
}

/// A single line of a parsed diff.
///
/// `text` is the raw line including its `+`, `-` or space marker (or the full
/// header text for [`DiffLineKind::Hunk`] lines). Line numbers are `None`
/// exactly when the line does not exist on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub text: String,
    pub kind: DiffLineKind,
    pub old_line_number: Option<u32>,
    pub new_line_number: Option<u32>,
    pub no_trailing_newline: bool,
}

impl DiffLine {
    pub fn hunk(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: DiffLineKind::Hunk,
            old_line_number: None,
            new_line_number: None,
            no_trailing_newline: false,
        }
    }

    pub fn context(text: impl Into<String>, old_line: u32, new_line: u32) -> Self {
        Self {
            text: text.into(),
            kind: DiffLineKind::Context,
            old_line_number: Some(old_line),
            new_line_number: Some(new_line),
            no_trailing_newline: false,
        }
    }

    pub fn add(text: impl Into<String>, new_line: u32) -> Self {
        Self {
            text: text.into(),
            kind: DiffLineKind::Add,
            old_line_number: None,
            new_line_number: Some(new_line),
            no_trailing_newline: false,
        }
    }

    pub fn delete(text: impl Into<String>, old_line: u32) -> Self {
        Self {
            text: text.into(),
            kind: DiffLineKind::Delete,
            old_line_number: Some(old_line),
            new_line_number: None,
            no_trailing_newline: false,
        }
    }

    #[must_use]
    pub fn with_no_trailing_newline(self, no_trailing_newline: bool) -> Self {
        Self {
            no_trailing_newline,
            ..self
        }
    }

    /// Line content without the leading diff marker
    pub fn content(&self) -> &str {
        match self.kind {
            DiffLineKind::Hunk => &self.text,
            DiffLineKind::Context | DiffLineKind::Add | DiffLineKind::Delete => {
                self.text.get(1..).unwrap_or("")
            }
        }
    }

    /// Whether this line is an addition or a deletion
    pub fn is_change(&self) -> bool {
        matches!(self.kind, DiffLineKind::Add | DiffLineKind::Delete)
    }
}

/// Whether `text` contains bidirectional control characters that render
/// invisibly but can reorder the displayed source.
pub fn has_hidden_bidi_chars(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'))
}
