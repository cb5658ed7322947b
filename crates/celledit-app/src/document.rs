// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{CellRef, ColorHints, Generation, RowId, TableId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub background: Option<String>,
    pub color: Option<String>,
    pub flash: Option<Flash>,
}

/// The parts of a cell an edit may change and a rollback must put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSnapshot {
    pub value: Option<String>,
    pub text: String,
    pub background: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// `data-key`
    pub key: Option<String>,
    /// `data-value`
    pub value: Option<String>,
    pub text: String,
    pub style: CellStyle,
    pub content_editable: bool,
    /// `data-options`
    pub options_override: Option<String>,
    /// Layout box in page coordinates.
    pub rect: Rect,
}

impl Cell {
    pub fn new(key: Option<&str>, value: Option<&str>, text: &str) -> Self {
        Self {
            key: key.map(str::to_owned),
            value: value.map(str::to_owned),
            text: text.to_owned(),
            style: CellStyle::default(),
            content_editable: false,
            options_override: None,
            rect: Rect::default(),
        }
    }

    pub fn keyed(key: &str, value: &str) -> Self {
        Self::new(Some(key), Some(value), value)
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_options(mut self, raw: &str) -> Self {
        self.options_override = Some(raw.to_owned());
        self
    }

    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            value: self.value.clone(),
            text: self.text.clone(),
            background: self.style.background.clone(),
            color: self.style.color.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &CellSnapshot) {
        self.value = snapshot.value.clone();
        self.text = snapshot.text.clone();
        self.style.background = snapshot.background.clone();
        self.style.color = snapshot.color.clone();
        self.content_editable = false;
    }

    /// Shared repaint used by every editor once a value is chosen.
    pub fn paint(&mut self, value: Option<&str>, text: &str, hints: &ColorHints) {
        self.value = value.map(str::to_owned);
        self.text = text.to_owned();
        self.style.background = hints.background.clone();
        self.style.color = hints.text.clone();
    }

    /// The recorded value, falling back to visible text for cells rendered
    /// without a `data-value`.
    pub fn current_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }
}

/// Live markup of one rendered table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDocument {
    id: TableId,
    generation: Generation,
    rows: Vec<Row>,
}

impl TableDocument {
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            generation: Generation::new(0),
            rows: Vec::new(),
        }
    }

    pub const fn id(&self) -> TableId {
        self.id
    }

    pub const fn generation(&self) -> Generation {
        self.generation
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Replaces the markup wholesale. Refs taken before this call go stale.
    pub fn render(&mut self, rows: Vec<Row>) -> Generation {
        self.rows = rows;
        self.generation = self.generation.next();
        self.generation
    }

    pub fn cell_ref(&self, row: usize, column: usize) -> Option<CellRef> {
        self.rows.get(row)?.cells.get(column)?;
        Some(CellRef {
            table: self.id,
            generation: self.generation,
            row,
            column,
        })
    }

    pub fn is_attached(&self, cell: &CellRef) -> bool {
        self.cell(cell).is_some()
    }

    pub fn cell(&self, cell: &CellRef) -> Option<&Cell> {
        if cell.table != self.id || cell.generation != self.generation {
            return None;
        }
        self.rows.get(cell.row)?.cells.get(cell.column)
    }

    pub fn cell_mut(&mut self, cell: &CellRef) -> Option<&mut Cell> {
        if cell.table != self.id || cell.generation != self.generation {
            return None;
        }
        self.rows.get_mut(cell.row)?.cells.get_mut(cell.column)
    }

    /// Reads the row's identifier cell.
    pub fn row_id(&self, row: usize, id_key: &str) -> Option<RowId> {
        let cells = &self.rows.get(row)?.cells;
        let id_cell = cells
            .iter()
            .find(|cell| cell.key.as_deref() == Some(id_key))?;
        RowId::parse(id_cell.current_value())
    }

    pub fn hit_test(&self, point: Point) -> Option<CellRef> {
        self.rows.iter().enumerate().find_map(|(row_index, row)| {
            row.cells
                .iter()
                .position(|cell| cell.rect.contains(point))
                .and_then(|column| self.cell_ref(row_index, column))
        })
    }
}
