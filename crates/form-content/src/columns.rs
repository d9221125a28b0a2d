//! Fixed export columns, their defaults, and canonical key order.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde_json::Value;

use crate::document::{ContentDocument, SheetKind, Settings};
use crate::row::{Cell, Row};

/// How a missing required column is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// Empty text, or one empty slot per translation when the column is translated.
    Blank,
    Text(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredColumn {
    pub name: &'static str,
    pub default: DefaultValue,
}

impl RequiredColumn {
    const fn blank(name: &'static str) -> Self {
        Self {
            name,
            default: DefaultValue::Blank,
        }
    }

    const fn text(name: &'static str, value: &'static str) -> Self {
        Self {
            name,
            default: DefaultValue::Text(value),
        }
    }

    pub fn default_cell(&self, document: &ContentDocument) -> Cell {
        match self.default {
            DefaultValue::Blank => document.blank_cell(self.name),
            DefaultValue::Text(value) => Cell::text(value),
        }
    }
}

pub const SURVEY_COLUMNS: [RequiredColumn; 22] = [
    RequiredColumn::blank("type"),
    RequiredColumn::blank("name"),
    RequiredColumn::blank("label"),
    RequiredColumn::blank("bind::oc:itemgroup"),
    RequiredColumn::blank("hint"),
    RequiredColumn::blank("appearance"),
    RequiredColumn::blank("bind::oc:briefdescription"),
    RequiredColumn::blank("bind::oc:description"),
    RequiredColumn::blank("relevant"),
    RequiredColumn::blank("required"),
    RequiredColumn::blank("required_message"),
    RequiredColumn::blank("constraint"),
    RequiredColumn::blank("constraint_message"),
    RequiredColumn::blank("default"),
    RequiredColumn::blank("calculation"),
    RequiredColumn::blank("trigger"),
    RequiredColumn::blank("readonly"),
    RequiredColumn::blank("image"),
    RequiredColumn::blank("repeat_count"),
    RequiredColumn::blank("bind::oc:external"),
    RequiredColumn::blank("bind::oc:contactdata"),
    RequiredColumn::blank("instance::oc:contactdata"),
];

pub const CHOICES_COLUMNS: [RequiredColumn; 4] = [
    RequiredColumn::blank("list_name"),
    RequiredColumn::blank("label"),
    RequiredColumn::blank("name"),
    RequiredColumn::blank("image"),
];

pub const FORM_TITLE: &str = "form_title";
pub const FORM_ID: &str = "form_id";
pub const ID_STRING: &str = "id_string";
pub const READ_ME: &str = "Read Me - Form template created by OpenClinica Form Designer";
pub const DEFAULT_FORM_TITLE: &str = "Form Title";
pub const DEFAULT_NAMESPACES: &str =
    r#"oc="http://openclinica.org/xforms" , OpenClinica="http://openclinica.com/odm""#;

/// Settings every export carries, with their fallback values.
pub const SETTINGS_COLUMNS: [RequiredColumn; 4] = [
    RequiredColumn::text(FORM_TITLE, DEFAULT_FORM_TITLE),
    RequiredColumn::text("crossform_references", ""),
    RequiredColumn::text("namespaces", DEFAULT_NAMESPACES),
    RequiredColumn::text(READ_ME, ""),
];

pub const SETTINGS_ORDER: [&str; 7] = [
    FORM_TITLE,
    FORM_ID,
    "version",
    "style",
    "crossform_references",
    "namespaces",
    READ_ME,
];

pub fn required_columns(kind: SheetKind) -> &'static [RequiredColumn] {
    match kind {
        SheetKind::Survey => &SURVEY_COLUMNS,
        SheetKind::Choices => &CHOICES_COLUMNS,
    }
}

/// Fills every missing required column of `kind`. An empty sheet gets one
/// row made entirely of defaults.
pub fn ensure_required_columns(document: &mut ContentDocument, kind: SheetKind) {
    let columns = required_columns(kind);
    let defaults = columns
        .iter()
        .map(|column| (column.name, column.default_cell(document)))
        .collect::<Vec<_>>();
    let rows = document.sheet_mut(kind);
    if rows.is_empty() {
        rows.push(defaults.into_iter().collect());
        return;
    }
    for row in rows.iter_mut() {
        for (name, cell) in &defaults {
            if !row.contains(name) {
                row.insert(*name, cell.clone());
            }
        }
    }
}

/// Sorts the keys of every row by the canonical order of `kind`.
///
/// Columns outside the canonical list keep the order in which they were first
/// seen, accumulated across rows, so every row of a sheet agrees on it.
pub fn sort_sheet_columns(rows: &mut [Row], kind: SheetKind) {
    let mut order = required_columns(kind)
        .iter()
        .map(|column| column.name.to_string())
        .collect::<IndexSet<_>>();
    for row in rows.iter_mut() {
        for column in row.columns() {
            if !order.contains(column) {
                order.insert(column.to_string());
            }
        }
        row.sort_columns_by_key(|column| order.get_index_of(column).unwrap_or(usize::MAX));
    }
}

/// Sorts settings keys by [`SETTINGS_ORDER`], extras after in their current order.
pub fn sort_settings(settings: &mut Settings) {
    settings.sort_by_cached_key(|key, _| {
        SETTINGS_ORDER
            .iter()
            .position(|known| *known == key.as_str())
            .unwrap_or(SETTINGS_ORDER.len())
    });
}

/// Renames `id_string` to `form_id`.
pub fn ensure_form_id(settings: &mut Settings) {
    if let Some(value) = settings.shift_remove(ID_STRING) {
        settings.insert(FORM_ID.to_string(), value);
    }
}

/// Inserts every setting from `defaults` that is not already present.
pub fn ensure_required_settings(settings: &mut Settings, defaults: &BTreeMap<String, String>) {
    for (key, value) in defaults {
        if !settings.contains_key(key) {
            settings.insert(key.clone(), Value::String(value.clone()));
        }
    }
}

/// [`SETTINGS_COLUMNS`] as a key to value map.
pub fn default_settings() -> BTreeMap<String, String> {
    SETTINGS_COLUMNS
        .iter()
        .map(|column| {
            let value = match column.default {
                DefaultValue::Text(text) => text.to_string(),
                DefaultValue::Blank => String::new(),
            };
            (column.name.to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_columns_accumulate_across_rows() {
        let mut rows: Vec<Row> = vec![
            [("zeta", Cell::text("1")), ("name", Cell::text("a")), ("type", Cell::text("text"))]
                .into_iter()
                .collect(),
            [("alpha", Cell::text("2")), ("zeta", Cell::text("3")), ("type", Cell::text("note"))]
                .into_iter()
                .collect(),
        ];
        sort_sheet_columns(&mut rows, SheetKind::Survey);
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), ["type", "name", "zeta"]);
        assert_eq!(rows[1].columns().collect::<Vec<_>>(), ["type", "zeta", "alpha"]);
    }

    #[test]
    fn authored_settings_win_over_defaults() {
        let mut settings: Settings = [("namespaces".to_string(), json!("ns custom"))]
            .into_iter()
            .collect();
        ensure_required_settings(&mut settings, &default_settings());
        assert_eq!(settings["namespaces"], json!("ns custom"));
        assert_eq!(settings[FORM_TITLE], json!(DEFAULT_FORM_TITLE));
        assert_eq!(settings["crossform_references"], json!(""));
    }

    #[test]
    fn settings_follow_fixed_order() {
        let mut settings: Settings = [
            ("style".to_string(), json!("pages")),
            ("default_language".to_string(), json!("English")),
            ("form_id".to_string(), json!("f")),
            ("form_title".to_string(), json!("T")),
        ]
        .into_iter()
        .collect();
        sort_settings(&mut settings);
        let keys = settings.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, ["form_title", "form_id", "style", "default_language"]);
    }
}
