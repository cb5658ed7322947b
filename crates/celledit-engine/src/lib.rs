// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod cache;
pub mod choice;
pub mod context;
pub mod date;
pub mod dispatch;
pub mod editor;
pub mod error;
pub mod feedback;
pub mod keys;

pub use cache::*;
pub use choice::*;
pub use context::*;
pub use date::*;
pub use dispatch::*;
pub use editor::*;
pub use error::*;
pub use feedback::*;
pub use keys::*;

use anyhow::{Result, bail};
use celledit_app::{OptionEntry, PatchPayload, QuerySpec};
use std::sync::Arc;

/// What the server said about one `PATCH /inline/edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchAck {
    pub success: bool,
    pub message: Option<String>,
}

impl PatchAck {
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Single-field, idempotent update of one row.
pub trait Persistence {
    fn patch(&self, payload: &PatchPayload) -> Result<PatchAck>;
}

/// Source of lazily loaded choice lists.
pub trait OptionQuery {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>>;
}

impl<T: Persistence + ?Sized> Persistence for Arc<T> {
    fn patch(&self, payload: &PatchPayload) -> Result<PatchAck> {
        (**self).patch(payload)
    }
}

impl<T: OptionQuery + ?Sized> OptionQuery for Arc<T> {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        (**self).query(spec)
    }
}

/// For tables whose choice columns are all static.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoQueries;

impl OptionQuery for NoQueries {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        bail!(
            "column {:?} needs an option query but no query source is configured",
            spec.key
        )
    }
}
