// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value key reserved for the "clear this field" choice.
pub const CLEAR_OPTION_ID: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditMode {
    Text,
    Choice,
    Date,
}

impl EditMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Choice => "choice",
            Self::Date => "date",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "choice" => Some(Self::Choice),
            "date" => Some(Self::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorHints {
    pub background: Option<String>,
    pub text: Option<String>,
}

impl ColorHints {
    pub const fn none() -> Self {
        Self {
            background: None,
            text: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.text.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    pub id: String,
    #[serde(alias = "text", alias = "value")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

impl OptionEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            bg_color: None,
            text_color: None,
        }
    }

    pub fn clear() -> Self {
        Self::new(CLEAR_OPTION_ID, "")
    }

    pub fn with_colors(mut self, bg_color: &str, text_color: &str) -> Self {
        self.bg_color = Some(bg_color.to_owned());
        self.text_color = Some(text_color.to_owned());
        self
    }

    pub fn is_clear(&self) -> bool {
        self.id == CLEAR_OPTION_ID
    }

    pub fn color_hints(&self) -> ColorHints {
        ColorHints {
            background: self.bg_color.clone(),
            text: self.text_color.clone(),
        }
    }
}

/// Server-side lookup that yields a choice list on first open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub key: String,
    pub qry: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl QuerySpec {
    pub fn new(key: impl Into<String>, qry: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            qry: qry.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Identical query text and bound values share one cache slot, whichever
    /// column asked for them.
    pub fn cache_key(&self) -> String {
        let mut key = self.qry.trim().to_owned();
        for value in &self.values {
            key.push('\u{1f}');
            key.push_str(value);
        }
        key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSource {
    Static(Vec<OptionEntry>),
    Query(QuerySpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableColumn {
    pub key: String,
    pub mode: EditMode,
    pub options: Option<OptionSource>,
    pub allow_blank: bool,
    pub nullable: bool,
    pub column_name: Option<String>,
}

impl EditableColumn {
    fn with_mode(key: impl Into<String>, mode: EditMode, options: Option<OptionSource>) -> Self {
        Self {
            key: key.into(),
            mode,
            options,
            allow_blank: true,
            nullable: true,
            column_name: None,
        }
    }

    pub fn text(key: impl Into<String>) -> Self {
        Self::with_mode(key, EditMode::Text, None)
    }

    pub fn choice(key: impl Into<String>, options: Vec<OptionEntry>) -> Self {
        Self::with_mode(key, EditMode::Choice, Some(OptionSource::Static(options)))
    }

    pub fn query(key: impl Into<String>, spec: QuerySpec) -> Self {
        Self::with_mode(key, EditMode::Choice, Some(OptionSource::Query(spec)))
    }

    pub fn date(key: impl Into<String>) -> Self {
        Self::with_mode(key, EditMode::Date, None)
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn without_blank_option(mut self) -> Self {
        self.allow_blank = false;
        self
    }

    pub fn with_column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Database column the edit lands in.
    pub fn field(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub table: String,
    pub id_key: String,
    pub columns: Vec<EditableColumn>,
    pub check_null_keys: Vec<String>,
}

impl TableConfig {
    pub fn new(table: impl Into<String>, id_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_key: id_key.into(),
            columns: Vec::new(),
            check_null_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: EditableColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn check_null_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_null_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn find_column(&self, key: &str) -> Option<&EditableColumn> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn is_nullable(&self, column: &EditableColumn) -> bool {
        column.nullable && !self.check_null_keys.iter().any(|key| key == &column.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Number(i64),
    Text(String),
}

impl RowId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.parse::<i64>() {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Text(trimmed.to_owned()),
        })
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Body of `PATCH /inline/edit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchPayload {
    pub table: String,
    pub field: String,
    #[serde(rename = "idkey")]
    pub id_key: String,
    pub id: RowId,
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        EditMode, EditableColumn, OptionEntry, PatchPayload, QuerySpec, RowId, TableConfig,
    };

    #[test]
    fn edit_mode_round_trips_through_str() {
        for mode in [EditMode::Text, EditMode::Choice, EditMode::Date] {
            assert_eq!(EditMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(EditMode::parse("checkbox"), None);
    }

    #[test]
    fn column_field_prefers_explicit_column_name() {
        let plain = EditableColumn::text("title");
        assert_eq!(plain.field(), "title");

        let renamed = EditableColumn::text("owner").with_column_name("owner_id");
        assert_eq!(renamed.field(), "owner_id");
    }

    #[test]
    fn check_null_keys_override_column_nullability() {
        let config = TableConfig::new("tasks", "id")
            .column(EditableColumn::text("title"))
            .column(EditableColumn::text("notes"))
            .check_null_keys(["title"]);

        let title = config.find_column("title").expect("title column");
        let notes = config.find_column("notes").expect("notes column");
        assert!(!config.is_nullable(title));
        assert!(config.is_nullable(notes));
    }

    #[test]
    fn row_id_parses_numbers_and_keeps_text() {
        assert_eq!(RowId::parse(" 42 "), Some(RowId::Number(42)));
        assert_eq!(
            RowId::parse("a-17"),
            Some(RowId::Text("a-17".to_owned()))
        );
        assert_eq!(RowId::parse("   "), None);
    }

    #[test]
    fn patch_payload_serializes_wire_field_names() {
        let payload = PatchPayload {
            table: "tasks".to_owned(),
            field: "priority".to_owned(),
            id_key: "id".to_owned(),
            id: RowId::Number(7),
            value: None,
        };
        let json = serde_json::to_value(&payload).expect("payload serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "table": "tasks",
                "field": "priority",
                "idkey": "id",
                "id": 7,
                "value": null,
            })
        );
    }

    #[test]
    fn query_cache_key_ignores_column_key() {
        let left = QuerySpec::new("owner", "SELECT id, name FROM owners").with_values(["1"]);
        let right = QuerySpec::new("reviewer", "SELECT id, name FROM owners ").with_values(["1"]);
        assert_eq!(left.cache_key(), right.cache_key());

        let other = QuerySpec::new("owner", "SELECT id, name FROM owners").with_values(["2"]);
        assert_ne!(left.cache_key(), other.cache_key());
    }

    #[test]
    fn option_entry_accepts_text_alias() {
        let entry: OptionEntry =
            serde_json::from_str(r##"{"id":"high","text":"High","bgColor":"#ff4863"}"##)
                .expect("entry parses");
        assert_eq!(entry.label, "High");
        assert_eq!(entry.bg_color.as_deref(), Some("#ff4863"));
        assert!(entry.text_color.is_none());
    }
}
