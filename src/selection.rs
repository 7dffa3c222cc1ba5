//! Which lines of a diff are included in a commit or discard.
//!
//! A [`DiffSelection`] stores a default state plus the set of flat line
//! indices that differ from it, so the common "everything" and "nothing"
//! cases cost no memory regardless of file size. Indices refer to the flat
//! line numbering of a [`Diff`](crate::diff::Diff), see
//! [`Hunk::unified_diff_start`](crate::diff::Hunk::unified_diff_start).

use std::collections::BTreeSet;
use std::sync::Arc;

/// Aggregate selection state of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffSelectionType {
    All,
    Partial,
    None,
}

/// State every line starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitialSelection {
    All,
    None,
}

impl InitialSelection {
    fn includes(self, selected: bool) -> bool {
        match self {
            InitialSelection::All => selected,
            InitialSelection::None => !selected,
        }
    }

    fn inverse(self) -> Self {
        match self {
            InitialSelection::All => InitialSelection::None,
            InitialSelection::None => InitialSelection::All,
        }
    }
}

impl From<InitialSelection> for DiffSelectionType {
    fn from(initial: InitialSelection) -> Self {
        match initial {
            InitialSelection::All => DiffSelectionType::All,
            InitialSelection::None => DiffSelectionType::None,
        }
    }
}

/// Immutable set of selected lines.
///
/// Every mutator returns a new selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSelection {
    default_selection: InitialSelection,
    diverging_lines: BTreeSet<usize>,
    selectable_lines: Option<Arc<BTreeSet<usize>>>,
}

impl Default for DiffSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl DiffSelection {
    pub fn from_initial_selection(initial: InitialSelection) -> Self {
        Self {
            default_selection: initial,
            diverging_lines: BTreeSet::new(),
            selectable_lines: None,
        }
    }

    pub fn all() -> Self {
        Self::from_initial_selection(InitialSelection::All)
    }

    pub fn none() -> Self {
        Self::from_initial_selection(InitialSelection::None)
    }

    /// Indices whose state differs from the default
    pub fn diverging_lines(&self) -> &BTreeSet<usize> {
        &self.diverging_lines
    }

    pub fn default_selection(&self) -> InitialSelection {
        self.default_selection
    }

    /// Whether all, none or some of the lines are selected.
    ///
    /// When every selectable line diverges from the default, the selection is
    /// reported as the opposite of the default rather than as partial.
    pub fn selection_type(&self) -> DiffSelectionType {
        if self.diverging_lines.is_empty() {
            return self.default_selection.into();
        }

        if let Some(selectable) = &self.selectable_lines {
            if selectable.len() == self.diverging_lines.len()
                && selectable.iter().all(|i| self.diverging_lines.contains(i))
            {
                return self.default_selection.inverse().into();
            }
        }

        DiffSelectionType::Partial
    }

    pub fn is_selected(&self, index: usize) -> bool {
        let diverges = self.diverging_lines.contains(&index);
        match self.default_selection {
            InitialSelection::All => !diverges,
            InitialSelection::None => diverges,
        }
    }

    /// Lines outside the allow-list can never be selected; without an
    /// allow-list every line is selectable.
    pub fn is_selectable(&self, index: usize) -> bool {
        self.selectable_lines
            .as_ref()
            .is_none_or(|selectable| selectable.contains(&index))
    }

    #[must_use]
    pub fn with_line_selection(&self, index: usize, selected: bool) -> Self {
        self.with_range_selection(index, 1, selected)
    }

    /// Select or deselect the `length` lines starting at `from`
    #[must_use]
    pub fn with_range_selection(&self, from: usize, length: usize, selected: bool) -> Self {
        let range = from..from.saturating_add(length);

        // A uniform selection is rebased on its effective state
        let default_selection = match self.selection_type() {
            DiffSelectionType::All if selected => return self.clone(),
            DiffSelectionType::None if !selected => return self.clone(),
            DiffSelectionType::All => InitialSelection::All,
            DiffSelectionType::None => InitialSelection::None,
            DiffSelectionType::Partial => {
                let mut diverging_lines = self.diverging_lines.clone();
                if self.default_selection.includes(selected) {
                    diverging_lines.retain(|i| !range.contains(i));
                } else {
                    diverging_lines.extend(range.filter(|&i| self.is_selectable(i)));
                }
                return Self {
                    diverging_lines,
                    ..self.clone()
                };
            }
        };

        Self {
            default_selection,
            diverging_lines: range.filter(|&i| self.is_selectable(i)).collect(),
            selectable_lines: self.selectable_lines.clone(),
        }
    }

    #[must_use]
    pub fn with_toggle_line_selection(&self, index: usize) -> Self {
        self.with_line_selection(index, !self.is_selected(index))
    }

    #[must_use]
    pub fn with_select_all(&self) -> Self {
        Self {
            default_selection: InitialSelection::All,
            diverging_lines: BTreeSet::new(),
            selectable_lines: self.selectable_lines.clone(),
        }
    }

    #[must_use]
    pub fn with_select_none(&self) -> Self {
        Self {
            default_selection: InitialSelection::None,
            diverging_lines: BTreeSet::new(),
            selectable_lines: self.selectable_lines.clone(),
        }
    }

    /// Replace the allow-list, dropping divergence on lines outside it
    #[must_use]
    pub fn with_selectable_lines(&self, selectable: BTreeSet<usize>) -> Self {
        let diverging_lines = self
            .diverging_lines
            .intersection(&selectable)
            .copied()
            .collect();
        Self {
            default_selection: self.default_selection,
            diverging_lines,
            selectable_lines: Some(Arc::new(selectable)),
        }
    }
}
