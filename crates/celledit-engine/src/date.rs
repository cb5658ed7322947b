// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use celledit_app::{
    CellRef, OverlayKind, Page, Placement, ValidationResult, WidthPolicy, format_date,
    parse_optional_date, place_overlay,
};
use time::{Date, Month};

use crate::FlyoutMetrics;

/// What backs the shared date input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInputKind {
    /// Calendar picker with keyboard stepping.
    Calendar,
    /// Bare `YYYY-MM-DD` text entry.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStep {
    Days(i64),
    Months(i32),
    Years(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePick {
    pub value: Option<String>,
    pub text: String,
}

/// The page's single date flyout.
#[derive(Debug, Clone)]
pub struct DateFlyout {
    kind: DateInputKind,
    anchor: Option<CellRef>,
    input: String,
    selected: Option<Date>,
}

impl DateFlyout {
    pub fn new(kind: DateInputKind) -> Self {
        Self {
            kind,
            anchor: None,
            input: String::new(),
            selected: None,
        }
    }

    pub fn kind(&self) -> DateInputKind {
        self.kind
    }

    pub fn anchor(&self) -> Option<CellRef> {
        self.anchor
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn selected(&self) -> Option<Date> {
        self.selected
    }

    /// Loads the cell's date and opens the flyout under it. A blank cell
    /// opens the calendar on `today`.
    pub fn show(
        &mut self,
        page: &mut Page,
        cell: CellRef,
        metrics: &FlyoutMetrics,
        today: Date,
    ) -> Option<Placement> {
        self.reset();
        let current = page.cell(&cell)?.current_value().trim().to_owned();
        let parsed = parse_optional_date(&current).ok().flatten();
        match self.kind {
            DateInputKind::Calendar => {
                let selected = parsed.unwrap_or(today);
                self.selected = Some(selected);
                self.input = format_date(selected);
            }
            DateInputKind::Plain => {
                self.selected = parsed;
                self.input = current;
            }
        }

        let target = page.viewport_rect(&cell)?;
        let placement = place_overlay(
            target,
            metrics.date_height,
            &page.viewport,
            WidthPolicy::Fixed(metrics.date_width),
        );
        page.overlays.open(OverlayKind::Date, placement);
        self.anchor = Some(cell);
        Some(placement)
    }

    /// Moves the calendar selection. Plain inputs ignore stepping.
    pub fn step(&mut self, step: DateStep) -> bool {
        if self.kind != DateInputKind::Calendar {
            return false;
        }
        let Some(current) = self.selected else {
            return false;
        };
        let next = match step {
            DateStep::Days(days) => shift_date_by_days(current, days),
            DateStep::Months(months) => shift_date_by_months(current, months),
            DateStep::Years(years) => shift_date_by_years(current, years),
        };
        match next {
            Some(date) => {
                self.select(date);
                true
            }
            None => false,
        }
    }

    pub fn select(&mut self, date: Date) {
        self.selected = Some(date);
        self.input = format_date(date);
    }

    pub fn type_char(&mut self, ch: char) {
        self.input.push(ch);
        self.selected = parse_optional_date(&self.input).ok().flatten();
    }

    pub fn backspace(&mut self) {
        self.input.pop();
        self.selected = parse_optional_date(&self.input).ok().flatten();
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_owned();
        self.selected = parse_optional_date(&self.input).ok().flatten();
    }

    /// The input's change event: validates, then writes the ISO date into
    /// the anchored cell as both value and text, closes the flyout and
    /// releases the active cell.
    ///
    /// Invalid input returns the validation error and touches nothing, so
    /// the caller decides how to unwind; the editor closes the flyout and
    /// restores the cell.
    pub fn pick(&mut self, page: &mut Page) -> Option<ValidationResult<DatePick>> {
        let anchor = self.anchor?;
        let pick = match parse_optional_date(&self.input) {
            Ok(Some(date)) => {
                let iso = format_date(date);
                DatePick {
                    value: Some(iso.clone()),
                    text: iso,
                }
            }
            Ok(None) => DatePick {
                value: None,
                text: String::new(),
            },
            Err(error) => return Some(Err(error)),
        };

        if let Some(cell) = page.cell_mut(&anchor) {
            cell.value = pick.value.clone();
            cell.text = pick.text.clone();
        }
        self.close(page);
        if page.overlays.active().map(|active| active.cell) == Some(anchor) {
            page.overlays.clear_active();
        }
        Some(Ok(pick))
    }

    pub fn close(&mut self, page: &mut Page) {
        page.overlays.hide_date();
        self.reset();
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.input.clear();
        self.selected = None;
    }
}

fn shift_date_by_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(time::Duration::days(days))
}

fn shift_date_by_years(date: Date, years: i32) -> Option<Date> {
    shift_date_by_months(date, years.saturating_mul(12))
}

fn shift_date_by_months(date: Date, months: i32) -> Option<Date> {
    let base_month = i32::from(u8::from(date.month()));
    let total_month = base_month - 1 + months;
    let year = date.year() + total_month.div_euclid(12);
    let month = Month::try_from((total_month.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(last_day_of_month(year, month)?);
    Date::from_calendar_date(year, month, day).ok()
}

fn last_day_of_month(year: i32, month: Month) -> Option<u8> {
    let (next_year, next_month) = if month == Month::December {
        (year + 1, Month::January)
    } else {
        (year, month.next())
    };
    let first_next_month = Date::from_calendar_date(next_year, next_month, 1).ok()?;
    first_next_month.previous_day().map(|last| last.day())
}
