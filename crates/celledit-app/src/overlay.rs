// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{CellRef, CellSnapshot, Placement, Point, Rect, TableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Choice,
    Date,
}

impl OverlayKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Choice => "choice",
            Self::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveEditor {
    Text,
    Overlay(OverlayKind),
}

/// The one cell on the page that currently owns an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCell {
    pub cell: CellRef,
    pub snapshot: CellSnapshot,
    pub editor: ActiveEditor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    CommitPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Granted,
    Denied(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerOutcome {
    Inside,
    Dismissed(Option<ActiveCell>),
}

/// Page-wide register of the active cell and the two shared flyouts.
///
/// Every open/close goes through here; nothing else flips overlay
/// visibility.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayArbiter {
    active: Option<ActiveCell>,
    choice: Option<Placement>,
    date: Option<Placement>,
    pending: BTreeSet<CellRef>,
}

impl OverlayArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&ActiveCell> {
        self.active.as_ref()
    }

    /// Plain register write. Overlays are left as they are.
    pub fn set_active(&mut self, active: ActiveCell) -> Option<ActiveCell> {
        self.active.replace(active)
    }

    pub fn clear_active(&mut self) -> Option<ActiveCell> {
        self.active.take()
    }

    pub fn acquire(&self, cell: &CellRef) -> Acquire {
        if self.pending.contains(cell) {
            return Acquire::Denied(DenyReason::CommitPending);
        }
        Acquire::Granted
    }

    /// Hands the page's single editor slot to `active`, closing both
    /// overlays first. Returns whoever held the slot before.
    pub fn activate(&mut self, active: ActiveCell) -> Result<Option<ActiveCell>, DenyReason> {
        if let Acquire::Denied(reason) = self.acquire(&active.cell) {
            return Err(reason);
        }
        self.hide_choice();
        self.hide_date();
        Ok(self.active.replace(active))
    }

    pub fn open(&mut self, kind: OverlayKind, placement: Placement) {
        match kind {
            OverlayKind::Choice => {
                self.hide_date();
                self.choice = Some(placement);
            }
            OverlayKind::Date => {
                self.hide_choice();
                self.date = Some(placement);
            }
        }
    }

    pub fn hide_choice(&mut self) {
        self.choice = None;
    }

    pub fn hide_date(&mut self) {
        self.date = None;
    }

    pub fn is_visible(&self, kind: OverlayKind) -> bool {
        self.placement(kind).is_some()
    }

    pub fn placement(&self, kind: OverlayKind) -> Option<&Placement> {
        match kind {
            OverlayKind::Choice => self.choice.as_ref(),
            OverlayKind::Date => self.date.as_ref(),
        }
    }

    pub fn visible_count(&self) -> usize {
        usize::from(self.choice.is_some()) + usize::from(self.date.is_some())
    }

    /// Click-away handling. `active_rect` is the active cell's box in page
    /// coordinates, when there is one.
    pub fn pointer_down(&mut self, point: Point, active_rect: Option<Rect>) -> PointerOutcome {
        let inside_cell = active_rect.is_some_and(|rect| rect.contains(point));
        let inside_overlay = [self.choice, self.date]
            .iter()
            .flatten()
            .any(|placement| placement.rect().contains(point));
        if inside_cell || inside_overlay {
            return PointerOutcome::Inside;
        }

        self.hide_choice();
        self.hide_date();
        PointerOutcome::Dismissed(self.active.take())
    }

    pub fn begin_pending(&mut self, cell: CellRef) -> bool {
        self.pending.insert(cell)
    }

    pub fn end_pending(&mut self, cell: &CellRef) -> bool {
        self.pending.remove(cell)
    }

    pub fn is_pending(&self, cell: &CellRef) -> bool {
        self.pending.contains(cell)
    }

    pub fn pending_in(&self, table: TableId) -> usize {
        self.pending.iter().filter(|cell| cell.table == table).count()
    }
}
