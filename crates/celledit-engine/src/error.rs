// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use celledit_app::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("save failed: {0}")]
    Transient(String),
    #[error("table was re-rendered before the edit finished")]
    Stale,
}

impl EditError {
    /// Whether the user gets an inline banner for this failure.
    pub const fn is_visible(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

pub type EditResult<T> = std::result::Result<T, EditError>;
