// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use celledit_app::{
    CellRef, ColorHints, OptionEntry, OverlayKind, Page, Placement, Point, WidthPolicy,
    place_overlay,
};

use crate::FlyoutMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceItem {
    pub entry: OptionEntry,
    pub selected: bool,
}

/// What a click on a choice row commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePick {
    pub value: Option<String>,
    pub text: String,
    pub hints: ColorHints,
}

impl ChoicePick {
    fn from_entry(entry: &OptionEntry) -> Self {
        if entry.is_clear() {
            return Self {
                value: None,
                text: String::new(),
                hints: ColorHints::none(),
            };
        }
        Self {
            value: Some(entry.id.clone()),
            text: entry.label.clone(),
            hints: entry.color_hints(),
        }
    }
}

/// The page's single option list flyout.
#[derive(Debug, Clone, Default)]
pub struct ChoiceFlyout {
    anchor: Option<CellRef>,
    items: Vec<ChoiceItem>,
    highlighted: usize,
    row_height: f64,
}

impl ChoiceFlyout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the list for `cell` and opens it beside the cell. The caller
    /// must already hold the page's editor slot for `cell`.
    pub fn show(
        &mut self,
        page: &mut Page,
        cell: CellRef,
        options: Vec<OptionEntry>,
        metrics: &FlyoutMetrics,
    ) -> Option<Placement> {
        self.reset();
        let current = page.cell(&cell)?.value.clone().unwrap_or_default();
        self.items = options
            .into_iter()
            .map(|entry| ChoiceItem {
                selected: entry.id == current,
                entry,
            })
            .collect();
        self.highlighted = self
            .items
            .iter()
            .position(|item| item.selected)
            .unwrap_or(0);
        self.row_height = metrics.row_height;

        let target = page.viewport_rect(&cell)?;
        let height = metrics.choice_height(self.items.len());
        let placement = place_overlay(target, height, &page.viewport, WidthPolicy::MatchCell);
        page.overlays.open(OverlayKind::Choice, placement);
        self.anchor = Some(cell);
        Some(placement)
    }

    pub fn anchor(&self) -> Option<CellRef> {
        self.anchor
    }

    pub fn items(&self) -> &[ChoiceItem] {
        &self.items
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    pub fn move_highlight(&mut self, delta: isize) {
        if self.items.is_empty() {
            return;
        }
        let len = self.items.len() as isize;
        self.highlighted = (self.highlighted as isize + delta).rem_euclid(len) as usize;
    }

    /// Row under a viewport-space point, when the flyout is open.
    pub fn item_at(&self, page: &Page, point: Point) -> Option<usize> {
        let placement = page.overlays.placement(OverlayKind::Choice)?;
        let point = page.viewport.to_page(point);
        if !placement.rect().contains(point) || self.row_height <= 0.0 {
            return None;
        }
        let index = ((point.y - placement.top) / self.row_height).floor() as usize;
        (index < self.items.len()).then_some(index)
    }

    /// Paints the anchored cell with the chosen option, then closes the
    /// flyout and releases the active cell.
    pub fn pick(&mut self, page: &mut Page, index: usize) -> Option<ChoicePick> {
        let anchor = self.anchor?;
        let pick = ChoicePick::from_entry(&self.items.get(index)?.entry);
        if let Some(cell) = page.cell_mut(&anchor) {
            cell.paint(pick.value.as_deref(), &pick.text, &pick.hints);
        }
        self.close(page);
        if page.overlays.active().map(|active| active.cell) == Some(anchor) {
            page.overlays.clear_active();
        }
        Some(pick)
    }

    pub fn close(&mut self, page: &mut Page) {
        page.overlays.hide_choice();
        self.reset();
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.items.clear();
        self.highlighted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::ChoiceFlyout;
    use crate::FlyoutMetrics;
    use celledit_app::{
        ActiveCell, ActiveEditor, Cell, CellRef, OptionEntry, OverlayKind, Page, Point, Rect,
        Row, Side, TableDocument, TableId, Viewport,
    };

    fn metrics() -> FlyoutMetrics {
        FlyoutMetrics {
            row_height: 1.0,
            max_rows: 4,
            date_width: 12.0,
            date_height: 3.0,
        }
    }

    fn options() -> Vec<OptionEntry> {
        vec![
            OptionEntry::clear(),
            OptionEntry::new("low", "Low"),
            OptionEntry::new("high", "High").with_colors("#ff4863", "white"),
        ]
    }

    fn page_with_cell(y: f64) -> (Page, CellRef) {
        let mut page = Page::new(Viewport::new(80.0, 20.0));
        let mut document = TableDocument::new(TableId::new(1));
        document.render(vec![Row::new(vec![
            Cell::keyed("id", "4").with_rect(Rect::new(0.0, y, 4.0, 1.0)),
            Cell::new(Some("priority"), Some("low"), "Low").with_rect(Rect::new(4.0, y, 10.0, 1.0)),
        ])]);
        let cell = document.cell_ref(0, 1).expect("cell");
        page.insert_table(document);
        (page, cell)
    }

    fn claim(page: &mut Page, cell: CellRef) {
        let snapshot = page.cell(&cell).expect("cell").snapshot();
        page.activate(ActiveCell {
            cell,
            snapshot,
            editor: ActiveEditor::Overlay(OverlayKind::Choice),
        })
        .expect("granted");
    }

    #[test]
    fn show_marks_current_value_and_pins_width() {
        let (mut page, cell) = page_with_cell(2.0);
        claim(&mut page, cell);
        let mut flyout = ChoiceFlyout::new();

        let placement = flyout
            .show(&mut page, cell, options(), &metrics())
            .expect("shown");
        assert_eq!(placement.width, 10.0);
        assert_eq!(placement.height, 3.0);
        assert_eq!(placement.side, Side::Below);
        assert_eq!(flyout.highlighted(), 1);
        assert!(flyout.items()[1].selected);
        assert!(page.overlays.is_visible(OverlayKind::Choice));
    }

    #[test]
    fn show_flips_above_near_the_bottom() {
        let (mut page, cell) = page_with_cell(18.0);
        claim(&mut page, cell);
        let mut flyout = ChoiceFlyout::new();

        let placement = flyout
            .show(&mut page, cell, options(), &metrics())
            .expect("shown");
        assert_eq!(placement.side, Side::Above);
        assert_eq!(placement.top, 15.0);
    }

    #[test]
    fn pick_paints_cell_and_releases_editor() {
        let (mut page, cell) = page_with_cell(2.0);
        claim(&mut page, cell);
        let mut flyout = ChoiceFlyout::new();
        flyout.show(&mut page, cell, options(), &metrics());

        let index = flyout.item_at(&page, Point::new(5.0, 5.5)).expect("row");
        assert_eq!(index, 2);
        let pick = flyout.pick(&mut page, index).expect("picked");
        assert_eq!(pick.value.as_deref(), Some("high"));

        let painted = page.cell(&cell).expect("cell");
        assert_eq!(painted.value.as_deref(), Some("high"));
        assert_eq!(painted.text, "High");
        assert_eq!(painted.style.background.as_deref(), Some("#ff4863"));
        assert_eq!(painted.style.color.as_deref(), Some("white"));
        assert!(page.overlays.active().is_none());
        assert_eq!(page.overlays.visible_count(), 0);
    }

    #[test]
    fn clear_option_commits_null() {
        let (mut page, cell) = page_with_cell(2.0);
        claim(&mut page, cell);
        let mut flyout = ChoiceFlyout::new();
        flyout.show(&mut page, cell, options(), &metrics());

        let pick = flyout.pick(&mut page, 0).expect("picked");
        assert_eq!(pick.value, None);
        assert_eq!(pick.text, "");
        assert!(pick.hints.is_empty());
    }

    #[test]
    fn highlight_wraps() {
        let (mut page, cell) = page_with_cell(2.0);
        claim(&mut page, cell);
        let mut flyout = ChoiceFlyout::new();
        flyout.show(&mut page, cell, options(), &metrics());

        flyout.move_highlight(2);
        assert_eq!(flyout.highlighted(), 0);
        flyout.move_highlight(-1);
        assert_eq!(flyout.highlighted(), 2);
    }
}
