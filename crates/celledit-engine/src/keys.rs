// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub const fn plain(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub const fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// Where the edit cursor goes after a committed text edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
    Down,
    Up,
}

impl Direction {
    pub const fn after(press: KeyPress) -> Option<Self> {
        match (press.key, press.shift) {
            (Key::Tab, false) => Some(Self::Next),
            (Key::Tab, true) => Some(Self::Previous),
            (Key::Enter, false) => Some(Self::Down),
            (Key::Enter, true) => Some(Self::Up),
            _ => None,
        }
    }

    /// Row and column of the neighbour, or `None` past the top/left edge.
    pub fn step(self, row: usize, column: usize) -> Option<(usize, usize)> {
        match self {
            Self::Next => Some((row, column + 1)),
            Self::Previous => Some((row, column.checked_sub(1)?)),
            Self::Down => Some((row + 1, column)),
            Self::Up => Some((row.checked_sub(1)?, column)),
        }
    }
}
