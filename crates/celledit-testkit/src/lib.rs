// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use celledit_app::{
    Cell, CellRef, EditableColumn, OptionEntry, Page, PatchPayload, QuerySpec, Rect, Row,
    TableConfig, TableDocument, TableId, Viewport,
};
use celledit_engine::{
    EditContext, EditorSettings, FlyoutMetrics, OptionQuery, PatchAck, Persistence,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use time::{Date, Month};

pub const TASKS: TableId = TableId::new(1);
pub const CHORES: TableId = TableId::new(2);

pub const COLUMN_WIDTH: f64 = 12.0;
/// First row of the chores table, in page rows.
pub const CHORES_TOP: f64 = 10.0;

pub const ID: usize = 0;
pub const TITLE: usize = 1;
pub const NOTES: usize = 2;
pub const LOCATION: usize = 3;
pub const PRIORITY: usize = 4;
pub const DUE_DATE: usize = 5;
pub const OWNER: usize = 6;
pub const REVIEWER: usize = 7;

pub const OWNERS_QUERY: &str = "SELECT id, name FROM owners ORDER BY name";

#[derive(Debug, Clone, Copy)]
pub struct SampleTask {
    pub id: i64,
    pub title: &'static str,
    pub notes: &'static str,
    pub location: &'static str,
    pub priority: Option<&'static str>,
    pub due_date: Option<&'static str>,
    pub owner: Option<(i64, &'static str)>,
}

const SAMPLE_TASKS: [SampleTask; 4] = [
    SampleTask {
        id: 11,
        title: "Clean gutters",
        notes: "north side first",
        location: "Exterior",
        priority: Some("low"),
        due_date: Some("2026-03-14"),
        owner: Some((1, "Avery")),
    },
    SampleTask {
        id: 12,
        title: "Replace furnace filter",
        notes: "",
        location: "Basement",
        priority: Some("high"),
        due_date: None,
        owner: None,
    },
    SampleTask {
        id: 13,
        title: "Test smoke detectors",
        notes: "two need batteries",
        location: "Hallway",
        priority: None,
        due_date: Some("2026-01-31"),
        owner: Some((2, "Jordan")),
    },
    SampleTask {
        id: 14,
        title: "Reseal deck",
        notes: "",
        location: "Backyard",
        priority: Some("medium"),
        due_date: Some("2024-02-29"),
        owner: Some((1, "Avery")),
    },
];

pub fn sample_tasks() -> &'static [SampleTask] {
    &SAMPLE_TASKS
}

pub fn priority_options() -> Vec<OptionEntry> {
    vec![
        OptionEntry::new("low", "Low").with_colors("#d8f3dc", "black"),
        OptionEntry::new("medium", "Medium").with_colors("#ffe8a3", "black"),
        OptionEntry::new("high", "High").with_colors("#ff4863", "white"),
    ]
}

pub fn priority_option(id: &str) -> Option<OptionEntry> {
    priority_options().into_iter().find(|entry| entry.id == id)
}

pub fn owners_query(key: &str) -> QuerySpec {
    QuerySpec::new(key, OWNERS_QUERY)
}

/// Mirrors the columns produced by [`task_row`]. `title` must never be
/// blank.
pub fn tasks_config() -> TableConfig {
    TableConfig::new("tasks", "id")
        .column(EditableColumn::text("title"))
        .column(EditableColumn::text("notes"))
        .column(EditableColumn::text("location"))
        .column(EditableColumn::choice("priority", priority_options()))
        .column(EditableColumn::date("due_date"))
        .column(EditableColumn::query("owner_id", owners_query("owner_id")))
        .column(
            EditableColumn::query("reviewer_id", owners_query("reviewer_id"))
                .without_blank_option(),
        )
        .check_null_keys(["title"])
}

/// A second table sharing the page, for cross-table behaviour.
pub fn chores_config() -> TableConfig {
    TableConfig::new("chores", "id")
        .column(EditableColumn::text("name"))
        .column(EditableColumn::choice("priority", priority_options()).non_nullable())
        .column(EditableColumn::date("done_on"))
}

fn cell_rect(top: f64, row: usize, column: usize) -> Rect {
    Rect::new(column as f64 * COLUMN_WIDTH, top + row as f64, COLUMN_WIDTH, 1.0)
}

fn choice_cell(key: &str, entry: Option<OptionEntry>) -> Cell {
    match entry {
        Some(entry) => {
            let mut cell = Cell::new(Some(key), Some(&entry.id), &entry.label);
            cell.style.background = entry.bg_color;
            cell.style.color = entry.text_color;
            cell
        }
        None => Cell::new(Some(key), None, ""),
    }
}

pub fn task_row(index: usize, task: &SampleTask) -> Row {
    let owner = task.owner.map(|(id, name)| OptionEntry::new(id.to_string(), name));
    let cells = vec![
        Cell::keyed("id", &task.id.to_string()),
        Cell::keyed("title", task.title),
        Cell::keyed("notes", task.notes),
        Cell::keyed("location", task.location),
        choice_cell("priority", task.priority.and_then(priority_option)),
        Cell::new(Some("due_date"), task.due_date, task.due_date.unwrap_or_default()),
        choice_cell("owner_id", owner.clone()),
        choice_cell("reviewer_id", owner),
    ];
    Row::new(
        cells
            .into_iter()
            .enumerate()
            .map(|(column, cell)| cell.with_rect(cell_rect(0.0, index, column)))
            .collect(),
    )
}

pub fn task_rows() -> Vec<Row> {
    SAMPLE_TASKS
        .iter()
        .enumerate()
        .map(|(index, task)| task_row(index, task))
        .collect()
}

pub fn chore_rows() -> Vec<Row> {
    [
        (1, "Water plants", Some("medium"), Some("2026-02-01")),
        (2, "Take out recycling", Some("low"), None),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (id, name, priority, done_on))| {
        let cells = vec![
            Cell::keyed("id", &id.to_string()),
            Cell::keyed("name", name),
            choice_cell("priority", priority.and_then(priority_option)),
            Cell::new(Some("done_on"), done_on, done_on.unwrap_or_default()),
        ];
        Row::new(
            cells
                .into_iter()
                .enumerate()
                .map(|(column, cell)| cell.with_rect(cell_rect(CHORES_TOP, index, column)))
                .collect(),
        )
    })
    .collect()
}

pub fn sample_page() -> Page {
    let mut page = Page::new(Viewport::new(120.0, 20.0));
    let mut tasks = TableDocument::new(TASKS);
    tasks.render(task_rows());
    page.insert_table(tasks);

    let mut chores = TableDocument::new(CHORES);
    chores.render(chore_rows());
    page.insert_table(chores);
    page
}

pub fn sample_context() -> EditContext {
    // One row per option; the date flyout is one column wide.
    let settings = EditorSettings {
        metrics: FlyoutMetrics {
            row_height: 1.0,
            max_rows: 6,
            date_width: COLUMN_WIDTH,
            date_height: 3.0,
        },
        ..EditorSettings::default()
    };
    EditContext::new(sample_page(), settings)
}

pub fn cell_at(page: &Page, table: TableId, row: usize, column: usize) -> Result<CellRef> {
    page.document(table)
        .and_then(|document| document.cell_ref(row, column))
        .with_context(|| format!("no cell at row {row}, column {column} of table {}", table.get()))
}

pub fn fixture_today() -> Date {
    Date::from_calendar_date(2026, Month::February, 19).unwrap_or(Date::MIN)
}

#[derive(Debug, Clone)]
enum Reply {
    Ack(PatchAck),
    Fail(String),
}

/// Persistence mock that records every payload and answers from a script.
/// An empty script accepts.
#[derive(Debug, Default)]
pub struct ScriptedPersistence {
    replies: Mutex<VecDeque<Reply>>,
    sent: Mutex<Vec<PatchPayload>>,
}

impl ScriptedPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_accept(self) -> Self {
        self.push(Reply::Ack(PatchAck::ok()));
        self
    }

    pub fn then_reject(self, message: &str) -> Self {
        self.push(Reply::Ack(PatchAck::rejected(message)));
        self
    }

    /// Transport failure, as if the request never got a response.
    pub fn then_fail(self, message: &str) -> Self {
        self.push(Reply::Fail(message.to_owned()));
        self
    }

    fn push(&self, reply: Reply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn sent(&self) -> Vec<PatchPayload> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Persistence for ScriptedPersistence {
    fn patch(&self, payload: &PatchPayload) -> Result<PatchAck> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match reply {
            None => Ok(PatchAck::ok()),
            Some(Reply::Ack(ack)) => Ok(ack),
            Some(Reply::Fail(message)) => bail!("{message}"),
        }
    }
}

/// Option source that counts how often it is asked.
#[derive(Debug)]
pub struct CountingQuery {
    entries: Vec<OptionEntry>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingQuery {
    pub fn new(entries: Vec<OptionEntry>) -> Self {
        Self {
            entries,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn owners() -> Self {
        Self::new(vec![
            OptionEntry::new("1", "Avery"),
            OptionEntry::new("2", "Jordan"),
            OptionEntry::new("3", "Sam"),
        ])
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OptionQuery for CountingQuery {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("query {:?} failed: connection refused", spec.qry);
        }
        Ok(self.entries.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.get(self.int_n(items.len()))
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("celledit.db");
    Ok((dir, db_path))
}
