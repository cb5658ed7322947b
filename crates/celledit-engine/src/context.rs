// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use celledit_app::{Page, Point, PointerOutcome};
use std::time::{Duration, Instant};
use time::{Date, OffsetDateTime};

use crate::{ChoiceFlyout, DateFlyout, DateInputKind, Feedback, QueryCache};

pub const DEFAULT_BANNER_TTL: Duration = Duration::from_millis(3500);
pub const DEFAULT_FLASH_TTL: Duration = Duration::from_millis(600);

/// Sizes used to measure a flyout before it is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyoutMetrics {
    pub row_height: f64,
    pub max_rows: usize,
    pub date_width: f64,
    pub date_height: f64,
}

impl Default for FlyoutMetrics {
    fn default() -> Self {
        Self {
            row_height: 32.0,
            max_rows: 8,
            date_width: 240.0,
            date_height: 40.0,
        }
    }
}

impl FlyoutMetrics {
    pub fn choice_height(&self, items: usize) -> f64 {
        items.min(self.max_rows) as f64 * self.row_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditorSettings {
    pub banner_ttl: Duration,
    pub flash_ttl: Duration,
    pub metrics: FlyoutMetrics,
    pub date_input: DateInputKind,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            banner_ttl: DEFAULT_BANNER_TTL,
            flash_ttl: DEFAULT_FLASH_TTL,
            metrics: FlyoutMetrics::default(),
            date_input: DateInputKind::Calendar,
        }
    }
}

/// Shared state handed to every table editor on the page.
#[derive(Debug, Clone)]
pub struct EditContext {
    pub page: Page,
    pub choice: ChoiceFlyout,
    pub date: DateFlyout,
    pub cache: QueryCache,
    pub feedback: Feedback,
    pub settings: EditorSettings,
}

impl EditContext {
    pub fn new(page: Page, settings: EditorSettings) -> Self {
        Self {
            page,
            choice: ChoiceFlyout::new(),
            date: DateFlyout::new(settings.date_input),
            cache: QueryCache::new(),
            feedback: Feedback::new(),
            settings,
        }
    }

    /// Document-level pointer-down: anything outside the active cell and
    /// both flyouts cancels the open editor.
    pub fn pointer_down(&mut self, point: Point) -> PointerOutcome {
        let outcome = self.page.pointer_down(point);
        if matches!(outcome, PointerOutcome::Dismissed(_)) {
            self.choice.reset();
            self.date.reset();
        }
        outcome
    }

    pub fn tick(&mut self, now: Instant) {
        self.feedback.tick(&mut self.page, now);
    }

    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }
}
