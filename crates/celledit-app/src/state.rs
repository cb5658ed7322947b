// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{CellRef, EditMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    TextEditing,
    ChoiceOpen,
    DateOpen,
    Committing,
}

impl EditState {
    pub const fn for_mode(mode: EditMode) -> Self {
        match mode {
            EditMode::Text => Self::TextEditing,
            EditMode::Choice => Self::ChoiceOpen,
            EditMode::Date => Self::DateOpen,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TextEditing => "text",
            Self::ChoiceOpen => "choice",
            Self::DateOpen => "date",
            Self::Committing => "committing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
    Opened {
        cell: CellRef,
        mode: EditMode,
    },
    Displaced {
        cell: CellRef,
    },
    Cancelled {
        cell: CellRef,
    },
    Unchanged {
        cell: CellRef,
    },
    CommitStarted {
        cell: CellRef,
    },
    Committed {
        cell: CellRef,
        value: Option<String>,
        text: String,
    },
    Discarded {
        cell: CellRef,
    },
    Moved {
        from: CellRef,
        to: CellRef,
    },
}

#[cfg(test)]
mod tests {
    use super::EditState;
    use crate::EditMode;

    #[test]
    fn open_states_come_from_modes() {
        assert_eq!(EditState::for_mode(EditMode::Text), EditState::TextEditing);
        assert_eq!(EditState::for_mode(EditMode::Choice), EditState::ChoiceOpen);
        assert_eq!(EditState::for_mode(EditMode::Date), EditState::DateOpen);
    }

    #[test]
    fn state_names_match_the_status_line() {
        let names: Vec<&str> = [
            EditState::Idle,
            EditState::TextEditing,
            EditState::ChoiceOpen,
            EditState::DateOpen,
            EditState::Committing,
        ]
        .into_iter()
        .map(EditState::as_str)
        .collect();
        assert_eq!(names, vec!["idle", "text", "choice", "date", "committing"]);
    }
}
