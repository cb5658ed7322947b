// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use celledit_app::{
    Cell, EditableColumn, OptionEntry, PatchPayload, QuerySpec, Row, TableConfig, TableId,
};
use celledit_db::Store;
use celledit_engine::{CommitRecord, OptionQuery, PatchAck, Persistence, TableEditor};
use celledit_tui::{GridColumn, GridRuntime};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub const TASKS_TABLE: TableId = TableId::new(1);

const OWNERS_QUERY: &str = "SELECT id, name FROM owners ORDER BY name";
const TASK_FIELDS: [&str; 7] = [
    "title",
    "notes",
    "location",
    "priority",
    "due_date",
    "owner_id",
    "reviewer_id",
];

pub fn priority_options() -> Vec<OptionEntry> {
    vec![
        OptionEntry::new("low", "Low").with_colors("#d8f3dc", "black"),
        OptionEntry::new("medium", "Medium").with_colors("#ffe8a3", "black"),
        OptionEntry::new("high", "High").with_colors("#ff4863", "white"),
    ]
}

pub fn tasks_config() -> TableConfig {
    TableConfig::new("tasks", "id")
        .column(EditableColumn::text("title"))
        .column(EditableColumn::text("notes"))
        .column(EditableColumn::text("location"))
        .column(EditableColumn::choice("priority", priority_options()))
        .column(EditableColumn::date("due_date"))
        .column(EditableColumn::query(
            "owner_id",
            QuerySpec::new("owner_id", OWNERS_QUERY),
        ))
        .column(
            EditableColumn::query("reviewer_id", QuerySpec::new("reviewer_id", OWNERS_QUERY))
                .without_blank_option(),
        )
        .check_null_keys(["title"])
}

pub fn task_columns() -> Vec<GridColumn> {
    vec![
        GridColumn::new("id", "#", 4),
        GridColumn::new("title", "Title", 26),
        GridColumn::new("notes", "Notes", 22),
        GridColumn::new("location", "Location", 14),
        GridColumn::new("priority", "Priority", 10),
        GridColumn::new("due_date", "Due", 12),
        GridColumn::new("owner_id", "Owner", 10),
        GridColumn::new("reviewer_id", "Reviewer", 10),
    ]
}

pub fn tasks_editor() -> Result<TableEditor> {
    let editor = TableEditor::new(TASKS_TABLE, tasks_config())?.on_commit(|record: &CommitRecord| {
        info!(
            table = %record.payload.table,
            field = %record.payload.field,
            row = %record.payload.id,
            text = %record.text,
            "edit committed"
        );
    });
    Ok(editor)
}

/// Applies edits and answers option queries straight from a local store.
pub struct LocalBackend {
    store: Mutex<Store>,
}

impl LocalBackend {
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Task rows as the grid shows them: choice cells carry their option id
    /// as value and the option label as text.
    pub fn task_rows(&self) -> Result<Vec<Row>> {
        let store = self.store();
        let owners: BTreeMap<String, String> = store
            .advance_query(&QuerySpec::new("owner_id", OWNERS_QUERY))?
            .into_iter()
            .map(|row| (row.id, row.value))
            .collect();
        let priorities = priority_options();
        let records = store.load_table("tasks", "id", &TASK_FIELDS)?;

        let rows = records
            .into_iter()
            .map(|record| {
                let mut values = record.into_iter();
                let id = values.next().flatten().unwrap_or_default();
                let mut cells = vec![Cell::keyed("id", &id)];
                for (key, value) in TASK_FIELDS.iter().zip(values) {
                    cells.push(task_cell(key, value.as_deref(), &owners, &priorities));
                }
                Row::new(cells)
            })
            .collect();
        Ok(rows)
    }
}

fn task_cell(
    key: &str,
    value: Option<&str>,
    owners: &BTreeMap<String, String>,
    priorities: &[OptionEntry],
) -> Cell {
    match (key, value) {
        ("priority", Some(value)) => match priorities.iter().find(|entry| entry.id == value) {
            Some(entry) => {
                let mut cell = Cell::new(Some(key), Some(value), &entry.label);
                cell.style.background = entry.bg_color.clone();
                cell.style.color = entry.text_color.clone();
                cell
            }
            None => Cell::new(Some(key), Some(value), value),
        },
        ("owner_id" | "reviewer_id", Some(value)) => {
            let name = owners.get(value).map_or(value, String::as_str);
            Cell::new(Some(key), Some(value), name)
        }
        (_, value) => Cell::new(Some(key), value, value.unwrap_or_default()),
    }
}

impl Persistence for LocalBackend {
    fn patch(&self, payload: &PatchPayload) -> Result<PatchAck> {
        if self.store().inline_edit(payload)? {
            Ok(PatchAck::ok())
        } else {
            Ok(PatchAck::rejected(format!(
                "no {} row has {} = {}",
                payload.table, payload.id_key, payload.id
            )))
        }
    }
}

impl OptionQuery for LocalBackend {
    fn query(&self, spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
        Ok(self
            .store()
            .advance_query(spec)?
            .iter()
            .map(|row| row.to_option_entry())
            .collect())
    }
}

/// Rows always come from the store at `storage.db_path`; edits and option
/// queries go either to the same store or to the configured server.
pub struct TasksRuntime {
    rows: Arc<LocalBackend>,
    persistence: Arc<dyn Persistence + Send + Sync>,
    queries: Arc<dyn OptionQuery + Send + Sync>,
}

impl TasksRuntime {
    pub fn local(backend: Arc<LocalBackend>) -> Self {
        Self {
            persistence: backend.clone(),
            queries: backend.clone(),
            rows: backend,
        }
    }

    pub fn remote(rows: Arc<LocalBackend>, client: celledit_http::Client) -> Self {
        let client = Arc::new(client);
        Self {
            rows,
            persistence: client.clone(),
            queries: client,
        }
    }
}

impl GridRuntime for TasksRuntime {
    fn load_rows(&mut self) -> Result<Vec<Row>> {
        self.rows.task_rows()
    }

    fn persistence(&self) -> Arc<dyn Persistence + Send + Sync> {
        Arc::clone(&self.persistence)
    }

    fn queries(&self) -> &dyn OptionQuery {
        self.queries.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalBackend, TASKS_TABLE, TasksRuntime, task_columns, tasks_editor};
    use anyhow::Result;
    use celledit_app::{EditEvent, Page, PatchPayload, QuerySpec, RowId, TableDocument, Viewport};
    use celledit_db::Store;
    use celledit_engine::{
        EditContext, EditorSettings, Immediate, OptionQuery, Persistence,
    };
    use celledit_tui::{GridRuntime, layout_rows};
    use std::sync::Arc;

    fn demo_backend() -> Result<Arc<LocalBackend>> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        store.seed_demo_data()?;
        Ok(Arc::new(LocalBackend::new(store)))
    }

    #[test]
    fn task_rows_show_labels_and_keep_ids() -> Result<()> {
        let backend = demo_backend()?;
        let rows = backend.task_rows()?;
        assert_eq!(rows.len(), 8);

        let first = &rows[0].cells;
        assert_eq!(first.len(), 8);
        assert_eq!(first[0].value.as_deref(), Some("1"));
        assert_eq!(first[1].text, "Clean gutters");
        assert_eq!(first[4].value.as_deref(), Some("low"));
        assert_eq!(first[4].text, "Low");
        assert_eq!(first[4].style.background.as_deref(), Some("#d8f3dc"));
        assert_eq!(first[6].value.as_deref(), Some("1"));
        assert_eq!(first[6].text, "Avery");

        let second = &rows[1].cells;
        assert_eq!(second[5].value, None);
        assert_eq!(second[6].text, "");
        Ok(())
    }

    #[test]
    fn local_patch_reports_missing_rows_as_rejections() -> Result<()> {
        let backend = demo_backend()?;
        let payload = PatchPayload {
            table: "tasks".to_owned(),
            field: "location".to_owned(),
            id_key: "id".to_owned(),
            id: RowId::Number(404),
            value: Some("Attic".to_owned()),
        };
        let ack = backend.patch(&payload)?;
        assert!(!ack.success);
        assert_eq!(ack.message.as_deref(), Some("no tasks row has id = 404"));

        let applied = backend.patch(&PatchPayload {
            id: RowId::Number(2),
            ..payload
        })?;
        assert!(applied.success);
        Ok(())
    }

    #[test]
    fn local_query_returns_owner_options() -> Result<()> {
        let backend = demo_backend()?;
        let options = backend.query(&QuerySpec::new(
            "owner_id",
            "SELECT id, name FROM owners ORDER BY name",
        ))?;
        let labels: Vec<&str> = options.iter().map(|entry| entry.label.as_str()).collect();
        assert_eq!(labels, vec!["Avery", "Jordan", "Riley", "Sam"]);
        Ok(())
    }

    #[test]
    fn choice_edit_lands_in_the_store() -> Result<()> {
        let backend = demo_backend()?;
        let mut runtime = TasksRuntime::local(backend.clone());
        let rows = layout_rows(&task_columns(), runtime.load_rows()?);

        let mut page = Page::new(Viewport::new(110.0, 10.0));
        let mut document = TableDocument::new(TASKS_TABLE);
        document.render(rows);
        page.insert_table(document);
        let mut ctx = EditContext::new(page, EditorSettings::default());
        let mut editor = tasks_editor()?;

        let cell = ctx
            .page
            .document(TASKS_TABLE)
            .and_then(|document| document.cell_ref(2, 6))
            .expect("owner cell");
        let persistence = runtime.persistence();
        editor.click(&mut ctx, cell, runtime.queries())?;
        let events = editor.choose(
            &mut ctx,
            "4",
            &mut Immediate(persistence.as_ref()),
            runtime.queries(),
        )?;
        assert!(events.iter().any(|event| matches!(
            event,
            EditEvent::Committed { text, .. } if text == "Riley"
        )));

        let reloaded = backend.task_rows()?;
        assert_eq!(reloaded[2].cells[6].value.as_deref(), Some("4"));
        assert_eq!(reloaded[2].cells[6].text, "Riley");
        Ok(())
    }
}
