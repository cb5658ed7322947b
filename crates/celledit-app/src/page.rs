// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    ActiveCell, Cell, CellRef, DenyReason, OverlayArbiter, OverlayKind, Point, PointerOutcome,
    Rect, TableDocument, TableId, Viewport,
};

/// Everything on screen that more than one table editor touches: the tables
/// themselves, the scroll position and the overlay arbiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub viewport: Viewport,
    pub overlays: OverlayArbiter,
    tables: Vec<TableDocument>,
}

impl Page {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            overlays: OverlayArbiter::new(),
            tables: Vec::new(),
        }
    }

    pub fn insert_table(&mut self, document: TableDocument) {
        let id = document.id();
        match self.tables.iter_mut().find(|table| table.id() == id) {
            Some(existing) => *existing = document,
            None => self.tables.push(document),
        }
    }

    pub fn document(&self, id: TableId) -> Option<&TableDocument> {
        self.tables.iter().find(|table| table.id() == id)
    }

    pub fn document_mut(&mut self, id: TableId) -> Option<&mut TableDocument> {
        self.tables.iter_mut().find(|table| table.id() == id)
    }

    pub fn cell(&self, cell: &CellRef) -> Option<&Cell> {
        self.document(cell.table)?.cell(cell)
    }

    pub fn cell_mut(&mut self, cell: &CellRef) -> Option<&mut Cell> {
        self.document_mut(cell.table)?.cell_mut(cell)
    }

    pub fn is_attached(&self, cell: &CellRef) -> bool {
        self.cell(cell).is_some()
    }

    /// Puts a displaced editor's cell back the way it was before editing.
    /// Detached cells are skipped.
    pub fn restore(&mut self, active: &ActiveCell) -> bool {
        match self.cell_mut(&active.cell) {
            Some(cell) => {
                cell.restore(&active.snapshot);
                true
            }
            None => false,
        }
    }

    /// Claims the editor slot for `active`, restoring whichever cell held it.
    pub fn activate(&mut self, active: ActiveCell) -> Result<Option<CellRef>, DenyReason> {
        let displaced = self.overlays.activate(active)?;
        Ok(displaced.map(|previous| {
            self.restore(&previous);
            previous.cell
        }))
    }

    /// Pointer-down in viewport coordinates.
    pub fn pointer_down(&mut self, point: Point) -> PointerOutcome {
        let page_point = self.viewport.to_page(point);
        let active_rect = self
            .overlays
            .active()
            .and_then(|active| self.cell(&active.cell))
            .map(|cell| cell.rect);
        let outcome = self.overlays.pointer_down(page_point, active_rect);
        if let PointerOutcome::Dismissed(Some(previous)) = &outcome {
            self.restore(previous);
        }
        outcome
    }

    /// The visible flyout drawn over a viewport point, if any. Flyouts sit
    /// above the tables, so a hit here shadows the cell underneath.
    pub fn overlay_at(&self, point: Point) -> Option<OverlayKind> {
        let page_point = self.viewport.to_page(point);
        [OverlayKind::Choice, OverlayKind::Date]
            .into_iter()
            .find(|kind| {
                self.overlays
                    .placement(*kind)
                    .is_some_and(|placement| placement.rect().contains(page_point))
            })
    }

    pub fn hit_test(&self, point: Point) -> Option<CellRef> {
        let page_point = self.viewport.to_page(point);
        self.tables
            .iter()
            .find_map(|table| table.hit_test(page_point))
    }

    pub fn viewport_rect(&self, cell: &CellRef) -> Option<Rect> {
        self.cell(cell).map(|cell| self.viewport.to_viewport(cell.rect))
    }

    pub fn scroll_into_view(&mut self, cell: &CellRef) {
        if let Some(rect) = self.cell(cell).map(|cell| cell.rect) {
            self.viewport.scroll_into_view(rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Page;
    use crate::{
        ActiveCell, ActiveEditor, Cell, OverlayKind, Point, PointerOutcome, Rect, Row,
        TableDocument, TableId, Viewport, WidthPolicy, place_overlay,
    };

    fn page() -> Page {
        let mut page = Page::new(Viewport::new(80.0, 10.0));
        for id in [1, 2] {
            let mut document = TableDocument::new(TableId::new(id));
            let top = (id as f64 - 1.0) * 5.0;
            document.render(vec![Row::new(vec![
                Cell::keyed("id", "1").with_rect(Rect::new(0.0, top, 4.0, 1.0)),
                Cell::keyed("title", "Gutters").with_rect(Rect::new(4.0, top, 20.0, 1.0)),
            ])]);
            page.insert_table(document);
        }
        page
    }

    fn text_editor_on(page: &mut Page, table: u64) -> ActiveCell {
        let cell = page
            .document(TableId::new(table))
            .and_then(|document| document.cell_ref(0, 1))
            .expect("cell exists");
        let target = page.cell_mut(&cell).expect("attached");
        let snapshot = target.snapshot();
        target.content_editable = true;
        target.text = "typed".to_owned();
        ActiveCell {
            cell,
            snapshot,
            editor: ActiveEditor::Text,
        }
    }

    #[test]
    fn activating_across_tables_restores_the_previous_cell() {
        let mut page = page();
        let first = text_editor_on(&mut page, 1);
        let first_cell = first.cell;
        assert_eq!(page.activate(first), Ok(None));

        let second = ActiveCell {
            cell: page
                .document(TableId::new(2))
                .and_then(|document| document.cell_ref(0, 1))
                .expect("cell"),
            snapshot: page
                .document(TableId::new(2))
                .and_then(|document| document.rows()[0].cells.get(1))
                .expect("cell")
                .snapshot(),
            editor: ActiveEditor::Overlay(OverlayKind::Choice),
        };
        assert_eq!(page.activate(second), Ok(Some(first_cell)));

        let restored = page.cell(&first_cell).expect("attached");
        assert_eq!(restored.text, "Gutters");
        assert!(!restored.content_editable);
    }

    #[test]
    fn pointer_down_outside_restores_text_editor() {
        let mut page = page();
        let active = text_editor_on(&mut page, 1);
        let cell = active.cell;
        page.activate(active).expect("granted");

        assert_eq!(page.pointer_down(Point::new(6.0, 0.5)), PointerOutcome::Inside);
        let outcome = page.pointer_down(Point::new(60.0, 8.0));
        assert!(matches!(outcome, PointerOutcome::Dismissed(Some(_))));
        assert_eq!(page.cell(&cell).map(|c| c.text.as_str()), Some("Gutters"));
    }

    #[test]
    fn overlay_at_finds_the_visible_flyout_only() {
        let mut page = page();
        let placement = place_overlay(
            Rect::new(4.0, 0.0, 20.0, 1.0),
            3.0,
            &page.viewport,
            WidthPolicy::Fixed(26.0),
        );
        page.overlays.open(OverlayKind::Date, placement);

        assert_eq!(page.overlay_at(Point::new(6.0, 2.0)), Some(OverlayKind::Date));
        assert_eq!(page.overlay_at(Point::new(60.0, 2.0)), None);
        assert_eq!(page.overlay_at(Point::new(6.0, 0.5)), None);

        page.overlays.hide_date();
        assert_eq!(page.overlay_at(Point::new(6.0, 2.0)), None);
    }

    #[test]
    fn hit_test_accounts_for_scroll() {
        let mut page = page();
        page.viewport.scroll_y = 5.0;
        let hit = page.hit_test(Point::new(6.0, 0.5)).expect("hit");
        assert_eq!(hit.table, TableId::new(2));
    }
}
