// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Map, Value};
use thiserror::Error;
use time::Date;
use time::macros::format_description;

use crate::OptionEntry;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a value is required")]
    BlankNotAllowed,
    #[error("invalid date value; use {DATE_LAYOUT}")]
    InvalidDate,
    #[error("value is not one of the offered options")]
    UnknownOption,
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Trimmed value, with blank mapped to `None` (sent as `null`).
pub fn normalize_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_owned())
}

pub fn require_value(value: Option<&str>, nullable: bool) -> ValidationResult<()> {
    let blank = value.is_none_or(|value| value.trim().is_empty());
    if blank && !nullable {
        return Err(ValidationError::BlankNotAllowed);
    }
    Ok(())
}

pub fn parse_date(input: &str) -> ValidationResult<Date> {
    Date::parse(input.trim(), &format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::InvalidDate)
}

pub fn parse_optional_date(input: &str) -> ValidationResult<Option<Date>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_date(trimmed).map(Some)
}

pub fn format_date(value: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        value.year(),
        u8::from(value.month()),
        value.day()
    )
}

/// Reads a `data-options` attribute: a JSON list, a JSON object keyed by
/// value, or a plain comma list.
pub fn parse_options(raw: &str) -> Vec<OptionEntry> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => match options_from_json(&value) {
            Some(options) => options,
            None => comma_options(trimmed),
        },
        Err(_) => comma_options(trimmed),
    }
}

pub fn options_from_json(value: &Value) -> Option<Vec<OptionEntry>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(entry_from_item).collect()),
        Value::Object(map) => Some(options_from_map(map)),
        _ => None,
    }
}

/// `{value: label}` or `{value: {text, bgColor, textColor}}`, sorted by value.
pub fn options_from_map(map: &Map<String, Value>) -> Vec<OptionEntry> {
    map.iter()
        .map(|(id, item)| match item {
            Value::Object(fields) => OptionEntry {
                id: id.clone(),
                label: fields
                    .get("text")
                    .or_else(|| fields.get("label"))
                    .map(scalar_text)
                    .unwrap_or_else(|| id.clone()),
                bg_color: fields.get("bgColor").map(scalar_text),
                text_color: fields.get("textColor").map(scalar_text),
            },
            other => OptionEntry::new(id.clone(), scalar_text(other)),
        })
        .collect()
}

fn entry_from_item(item: &Value) -> Option<OptionEntry> {
    match item {
        Value::Object(fields) => {
            let id = fields.get("id").map(scalar_text)?;
            let label = fields
                .get("label")
                .or_else(|| fields.get("text"))
                .or_else(|| fields.get("value"))
                .map(scalar_text)
                .unwrap_or_else(|| id.clone());
            Some(OptionEntry {
                id,
                label,
                bg_color: fields.get("bgColor").map(scalar_text),
                text_color: fields.get("textColor").map(scalar_text),
            })
        }
        Value::Array(_) => None,
        scalar => {
            let text = scalar_text(scalar);
            Some(OptionEntry::new(text.clone(), text))
        }
    }
}

fn comma_options(raw: &str) -> Vec<OptionEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| OptionEntry::new(item, item))
        .collect()
}

pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ValidationError, format_date, normalize_value, parse_date, parse_optional_date,
        parse_options, require_value,
    };
    use crate::OptionEntry;
    use time::{Date, Month};

    #[test]
    fn blank_values_normalize_to_none() {
        assert_eq!(normalize_value("  "), None);
        assert_eq!(normalize_value(" High "), Some("High".to_owned()));
    }

    #[test]
    fn non_nullable_rejects_blank() {
        assert_eq!(
            require_value(None, false),
            Err(ValidationError::BlankNotAllowed)
        );
        assert_eq!(
            require_value(Some("   "), false),
            Err(ValidationError::BlankNotAllowed)
        );
        assert_eq!(require_value(None, true), Ok(()));
        assert_eq!(require_value(Some("x"), false), Ok(()));
    }

    #[test]
    fn dates_parse_and_format_iso() {
        let date = parse_date(" 2026-02-28 ").expect("valid date");
        assert_eq!(
            date,
            Date::from_calendar_date(2026, Month::February, 28).expect("valid")
        );
        assert_eq!(format_date(date), "2026-02-28");
        assert_eq!(parse_date("2026-02-30"), Err(ValidationError::InvalidDate));
        assert_eq!(parse_date("02/28/2026"), Err(ValidationError::InvalidDate));
        assert_eq!(parse_optional_date(""), Ok(None));
    }

    #[test]
    fn options_override_accepts_json_list() {
        let options = parse_options(
            r##"[{"id":"high","label":"High","bgColor":"#ff4863","textColor":"white"},"low",3]"##,
        );
        assert_eq!(
            options,
            vec![
                OptionEntry::new("high", "High").with_colors("#ff4863", "white"),
                OptionEntry::new("low", "low"),
                OptionEntry::new("3", "3"),
            ]
        );
    }

    #[test]
    fn options_override_accepts_keyed_map() {
        let options = parse_options(
            r##"{"":"(none)","high":{"text":"High","bgColor":"#ff4863","textColor":"white"}}"##,
        );
        assert_eq!(options.len(), 2);
        assert!(options[0].is_clear());
        assert_eq!(options[0].label, "(none)");
        assert_eq!(options[1].bg_color.as_deref(), Some("#ff4863"));
    }

    #[test]
    fn options_override_falls_back_to_comma_list() {
        let options = parse_options("open, in progress ,,done");
        let ids: Vec<&str> = options.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["open", "in progress", "done"]);
        assert!(parse_options("   ").is_empty());
    }
}
