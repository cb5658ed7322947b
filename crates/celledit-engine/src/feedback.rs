// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use celledit_app::{CellRef, Flash, Page};
use std::time::{Duration, Instant};

/// Auto-dismissing error message pinned to a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub cell: CellRef,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FlashMark {
    cell: CellRef,
    expires_at: Instant,
}

/// Transient visual cues: error banners and the success flash.
#[derive(Debug, Clone, Default)]
pub struct Feedback {
    banners: Vec<Banner>,
    flashes: Vec<FlashMark>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, cell: CellRef, message: impl Into<String>, now: Instant, ttl: Duration) {
        self.banners.retain(|banner| banner.cell != cell);
        self.banners.push(Banner {
            cell,
            message: message.into(),
            expires_at: now + ttl,
        });
    }

    pub fn flash(&mut self, page: &mut Page, cell: CellRef, now: Instant, ttl: Duration) {
        let Some(target) = page.cell_mut(&cell) else {
            return;
        };
        target.style.flash = Some(Flash::Success);
        self.flashes.retain(|mark| mark.cell != cell);
        self.flashes.push(FlashMark {
            cell,
            expires_at: now + ttl,
        });
    }

    /// Drops everything that has expired by `now`.
    pub fn tick(&mut self, page: &mut Page, now: Instant) {
        self.banners.retain(|banner| banner.expires_at > now);
        self.flashes.retain(|mark| {
            if mark.expires_at > now {
                return true;
            }
            if let Some(cell) = page.cell_mut(&mark.cell) {
                cell.style.flash = None;
            }
            false
        });
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    pub fn banner_for(&self, cell: &CellRef) -> Option<&Banner> {
        self.banners.iter().find(|banner| &banner.cell == cell)
    }

    pub fn is_empty(&self) -> bool {
        self.banners.is_empty() && self.flashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Feedback;
    use celledit_app::{Cell, Flash, Page, Row, TableDocument, TableId, Viewport};
    use std::time::{Duration, Instant};

    fn page() -> Page {
        let mut page = Page::new(Viewport::new(80.0, 24.0));
        let mut document = TableDocument::new(TableId::new(1));
        document.render(vec![Row::new(vec![
            Cell::keyed("id", "1"),
            Cell::keyed("title", "Gutters"),
        ])]);
        page.insert_table(document);
        page
    }

    #[test]
    fn banners_expire_after_their_ttl() {
        let mut page = page();
        let cell = page
            .document(TableId::new(1))
            .and_then(|document| document.cell_ref(0, 1))
            .expect("cell");
        let mut feedback = Feedback::new();
        let now = Instant::now();

        feedback.error(cell, "save failed", now, Duration::from_millis(3500));
        feedback.error(cell, "save failed again", now, Duration::from_millis(3500));
        assert_eq!(feedback.banners().len(), 1);
        assert_eq!(
            feedback.banner_for(&cell).map(|banner| banner.message.as_str()),
            Some("save failed again")
        );

        feedback.tick(&mut page, now + Duration::from_millis(3499));
        assert_eq!(feedback.banners().len(), 1);
        feedback.tick(&mut page, now + Duration::from_millis(3500));
        assert!(feedback.banners().is_empty());
    }

    #[test]
    fn flash_is_cleared_on_expiry() {
        let mut page = page();
        let cell = page
            .document(TableId::new(1))
            .and_then(|document| document.cell_ref(0, 1))
            .expect("cell");
        let mut feedback = Feedback::new();
        let now = Instant::now();

        feedback.flash(&mut page, cell, now, Duration::from_millis(600));
        assert_eq!(
            page.cell(&cell).and_then(|cell| cell.style.flash),
            Some(Flash::Success)
        );

        feedback.tick(&mut page, now + Duration::from_secs(1));
        assert_eq!(page.cell(&cell).and_then(|cell| cell.style.flash), None);
        assert!(feedback.is_empty());
    }
}
