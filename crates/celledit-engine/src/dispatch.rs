// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use celledit_app::{CellRef, CellSnapshot, ColorHints, PatchPayload};

use crate::{Direction, PatchAck, Persistence};

/// A validated edit that has been painted optimistically and is waiting on
/// the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommit {
    pub cell: CellRef,
    pub payload: PatchPayload,
    pub previous: CellSnapshot,
    pub text: String,
    pub hints: ColorHints,
    pub follow: Option<Direction>,
}

#[derive(Debug)]
pub enum Dispatch {
    Done(Result<PatchAck>),
    InFlight,
}

/// Decides when a pending commit reaches the adapter. The caller owns
/// delivering an in-flight result back through `TableEditor::finish_commit`.
pub trait Dispatcher {
    fn dispatch(&mut self, pending: &PendingCommit) -> Dispatch;
}

/// Calls the adapter on the spot.
#[derive(Debug)]
pub struct Immediate<'a, P: ?Sized>(pub &'a P);

impl<P: Persistence + ?Sized> Dispatcher for Immediate<'_, P> {
    fn dispatch(&mut self, pending: &PendingCommit) -> Dispatch {
        Dispatch::Done(self.0.patch(&pending.payload))
    }
}
