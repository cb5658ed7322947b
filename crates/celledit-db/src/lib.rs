// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use celledit_app::{OptionEntry, PatchPayload, QuerySpec, RowId};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, params, params_from_iter};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const APP_NAME: &str = "celledit";

const MAX_QUERY_ROWS: usize = 500;

const REQUIRED_SCHEMA: [(&str, &[&str]); 2] = [
    ("owners", &["id", "name"]),
    (
        "tasks",
        &[
            "id",
            "title",
            "notes",
            "location",
            "priority",
            "due_date",
            "owner_id",
            "reviewer_id",
        ],
    ),
];

const DEMO_OWNERS: [&str; 4] = ["Avery", "Jordan", "Sam", "Riley"];

type DemoTask = (
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<&'static str>,
    Option<i64>,
);

const DEMO_TASKS: [DemoTask; 8] = [
    (
        "Clean gutters",
        "north side first",
        "Exterior",
        Some("low"),
        Some("2026-03-14"),
        Some(1),
    ),
    (
        "Replace furnace filter",
        "",
        "Basement",
        Some("high"),
        None,
        None,
    ),
    (
        "Test smoke detectors",
        "two need batteries",
        "Hallway",
        None,
        Some("2026-01-31"),
        Some(2),
    ),
    ("Reseal deck", "", "Backyard", Some("medium"), None, Some(1)),
    (
        "Flush water heater",
        "drain sediment",
        "Garage",
        Some("medium"),
        Some("2026-04-01"),
        Some(3),
    ),
    (
        "Caulk bathroom tub",
        "",
        "Upstairs bath",
        Some("low"),
        None,
        None,
    ),
    (
        "Service AC unit",
        "book before June",
        "Exterior",
        Some("high"),
        Some("2026-05-15"),
        Some(4),
    ),
    (
        "Clear dryer vent",
        "",
        "Laundry",
        None,
        Some("2026-02-28"),
        Some(2),
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaColumn {
    pub cid: i32,
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: i32,
}

/// One row of an option query: first column is the id, second the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub id: String,
    pub value: String,
}

impl QueryRow {
    pub fn to_option_entry(&self) -> OptionEntry {
        OptionEntry::new(self.id.clone(), self.value.clone())
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the demo schema in an empty database, or checks that an
    /// existing one has the columns the demo tables need.
    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }
        Ok(())
    }

    /// Fills empty demo tables. Existing rows are left alone.
    pub fn seed_demo_data(&self) -> Result<()> {
        let owners: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM owners", [], |row| row.get(0))
            .context("count owners")?;
        if owners == 0 {
            for name in DEMO_OWNERS {
                self.conn
                    .execute("INSERT INTO owners (name) VALUES (?)", params![name])
                    .with_context(|| format!("insert demo owner {name}"))?;
            }
        }

        let tasks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .context("count tasks")?;
        if tasks == 0 {
            for (title, notes, location, priority, due_date, owner_id) in DEMO_TASKS {
                self.conn
                    .execute(
                        "
                        INSERT INTO tasks
                          (title, notes, location, priority, due_date, owner_id, reviewer_id)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        ",
                        params![title, notes, location, priority, due_date, owner_id, owner_id],
                    )
                    .with_context(|| format!("insert demo task {title}"))?;
            }
        }
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT name
                FROM sqlite_master
                WHERE type = 'table'
                  AND name NOT LIKE 'sqlite_%'
                ORDER BY name ASC
                ",
            )
            .context("prepare table names query")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("query table names")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect table names")
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<PragmaColumn>> {
        if !is_safe_identifier(table) {
            bail!("invalid table name: {table:?}");
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .with_context(|| format!("inspect columns for {table}"))?;
        let rows = stmt
            .query_map([], |row| {
                let not_null: i32 = row.get(3)?;
                let primary_key: i32 = row.get(5)?;
                Ok(PragmaColumn {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    column_type: row.get(2)?,
                    not_null: not_null != 0,
                    default_value: row.get(4)?,
                    primary_key,
                })
            })
            .with_context(|| format!("query column info for {table}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect columns for {table}"))
    }

    /// Applies one `PATCH /inline/edit`: sets `field` on the row whose
    /// `idkey` column equals `id`. Returns whether a row changed.
    pub fn inline_edit(&self, payload: &PatchPayload) -> Result<bool> {
        let table = payload.table.as_str();
        let field = payload.field.as_str();
        let id_key = payload.id_key.as_str();
        for (label, identifier) in [("table", table), ("field", field), ("idkey", id_key)] {
            if !is_safe_identifier(identifier) {
                bail!("invalid {label} {identifier:?}; use letters, digits and underscores only");
            }
        }
        if field == id_key {
            bail!("column `{field}` identifies rows in `{table}` and cannot be edited");
        }
        if !table_exists(&self.conn, table)? {
            bail!("table `{table}` does not exist");
        }
        let columns = table_columns(&self.conn, table)?;
        for column in [field, id_key] {
            if !columns.contains(column) {
                bail!("table `{table}` has no column `{column}`");
            }
        }

        let id = match &payload.id {
            RowId::Number(value) => Value::Integer(*value),
            RowId::Text(value) => Value::Text(value.clone()),
        };
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin inline edit")?;
        let changed = tx
            .execute(
                &format!("UPDATE {table} SET {field} = ?1 WHERE {id_key} = ?2"),
                params![payload.value, id],
            )
            .with_context(|| format!("update {table}.{field} for {id_key} = {}", payload.id))?;
        if changed > 1 {
            bail!(
                "{id_key} = {} matches {changed} rows in `{table}`; edits need a unique id column",
                payload.id
            );
        }
        tx.commit().context("commit inline edit")?;

        if changed == 0 {
            debug!(table, field, row = %payload.id, "inline edit matched no row");
        } else {
            info!(table, field, row = %payload.id, "inline edit applied");
        }
        Ok(changed == 1)
    }

    /// Answers `POST /advance/query`. Only single `SELECT` statements run;
    /// `values` bind to positional parameters in order.
    pub fn advance_query(&self, spec: &QuerySpec) -> Result<Vec<QueryRow>> {
        let trimmed = spec.qry.trim();
        validate_select(trimmed)?;

        let mut stmt = self
            .conn
            .prepare(trimmed)
            .with_context(|| format!("prepare option query for {:?}", spec.key))?;
        let expected = stmt.parameter_count();
        if expected != spec.values.len() {
            bail!(
                "option query for {:?} takes {expected} values but {} were given",
                spec.key,
                spec.values.len()
            );
        }
        let column_count = stmt.column_count();
        if column_count == 0 {
            bail!("option query for {:?} returns no columns", spec.key);
        }

        let mut rows = stmt
            .query(params_from_iter(spec.values.iter()))
            .with_context(|| format!("run option query for {:?}", spec.key))?;
        let mut output = Vec::new();
        while let Some(row) = rows.next().context("scan option query rows")? {
            if output.len() >= MAX_QUERY_ROWS {
                break;
            }
            let id = row
                .get_ref(0)
                .map(value_ref_to_string)
                .context("read id column from option query")?;
            let value = if column_count > 1 {
                row.get_ref(1)
                    .map(value_ref_to_string)
                    .context("read value column from option query")?
            } else {
                id.clone()
            };
            output.push(QueryRow { id, value });
        }
        debug!(column = %spec.key, rows = output.len(), "option query answered");
        Ok(output)
    }

    /// Rows of `table` as `[id_key, columns...]`, ordered by id. `NULL`
    /// comes back as `None`.
    pub fn load_table(
        &self,
        table: &str,
        id_key: &str,
        columns: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>> {
        if !is_safe_identifier(table) {
            bail!("invalid table name: {table:?}");
        }
        if !table_exists(&self.conn, table)? {
            bail!("table `{table}` does not exist");
        }
        let known = table_columns(&self.conn, table)?;
        let mut selected = Vec::with_capacity(columns.len() + 1);
        for column in std::iter::once(&id_key).chain(columns) {
            if !is_safe_identifier(column) || !known.contains(*column) {
                bail!("table `{table}` has no column `{column}`");
            }
            selected.push(*column);
        }

        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM {table} ORDER BY {id_key} ASC",
                selected.join(", ")
            ))
            .with_context(|| format!("prepare load of {table}"))?;
        let mut rows = stmt.query([]).with_context(|| format!("load {table}"))?;
        let mut output = Vec::new();
        while let Some(row) = rows.next().with_context(|| format!("scan {table} rows"))? {
            let mut values = Vec::with_capacity(selected.len());
            for index in 0..selected.len() {
                let value = row
                    .get_ref(index)
                    .map(nullable_text)
                    .with_context(|| format!("read column {index} of {table}"))?;
                values.push(value);
            }
            output.push(values);
        }
        Ok(output)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("CELLEDIT_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set CELLEDIT_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("celledit.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn validate_select(query: &str) -> Result<()> {
    if query.is_empty() {
        bail!("empty query");
    }
    if query.contains(';') {
        bail!("multiple statements are not allowed");
    }

    let upper = query.to_ascii_uppercase();
    if !upper.starts_with("SELECT") {
        bail!("only SELECT queries are allowed");
    }

    const DISALLOWED_KEYWORDS: &[&str] = &[
        "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "DETACH", "PRAGMA",
        "REINDEX", "VACUUM", "REPLACE",
    ];
    for keyword in DISALLOWED_KEYWORDS {
        if contains_word(&upper, keyword) {
            bail!("query contains disallowed keyword: {keyword}");
        }
    }
    Ok(())
}

fn value_ref_to_string(value: ValueRef<'_>) -> String {
    nullable_text(value).unwrap_or_default()
}

fn nullable_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(value) => Some(String::from_utf8_lossy(value).into_owned()),
        ValueRef::Blob(value) => Some(format!("{value:?}")),
    }
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn contains_word(source: &str, keyword: &str) -> bool {
    let bytes = source.as_bytes();
    let keyword_len = keyword.len();
    if keyword_len == 0 || keyword_len > bytes.len() {
        return false;
    }

    let mut index = 0usize;
    while let Some(offset) = source[index..].find(keyword) {
        let start = index + offset;
        let end = start + keyword_len;
        let left_ok = start == 0 || !is_identifier_char(bytes[start - 1]);
        let right_ok = end >= bytes.len() || !is_identifier_char(bytes[end]);
        if left_ok && right_ok {
            return true;
        }
        index = start + 1;
    }
    false
}

fn is_identifier_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point storage.db_path at a celledit database or an empty file"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; recreate the database to use the demo tables",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}
