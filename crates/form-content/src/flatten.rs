//! Projection of a document into flat per-sheet tables.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::document::{
    CHOICES, ContentDocument, KeyOrder, SETTINGS, SURVEY, SheetKind, Translation,
};
use crate::identity::{KUID_COLUMN, PREV_COLUMN};
use crate::row::{Cell, Row, Scalar};

pub const SELECT_FROM_LIST_NAME: &str = "select_from_list_name";
pub const OR_OTHER: &str = "_or_other";
pub const AUTONAME_COLUMN: &str = "$autoname";
pub const AUTOVALUE_COLUMN: &str = "$autovalue";
pub const SCHEMA_SHEET: &str = "schema";

/// Survey columns that never leave the document.
const INTERNAL_SURVEY_COLUMNS: [&str; 3] = [PREV_COLUMN, SELECT_FROM_LIST_NAME, OR_OTHER];

/// Flat row: column name to scalar value.
pub type FlatRow = IndexMap<String, Value>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlattenError {
    #[error("content must preserve key order when flattening with ordered=true")]
    UnorderedContent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Keep the document's key order in the output; requires an ordered document.
    pub ordered: bool,
    /// Keep round-trip aids (`$kuid`, `$autoname`, `$autovalue`) in the output.
    pub kobo_specific: bool,
    /// Further survey columns to drop.
    pub remove_survey_columns: Vec<String>,
}

/// Sheet name to ordered flat rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpreadsheetContent {
    sheets: IndexMap<String, Vec<FlatRow>>,
}

impl SpreadsheetContent {
    pub fn sheet(&self, name: &str) -> Option<&[FlatRow]> {
        self.sheets.get(name).map(Vec::as_slice)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<FlatRow>> {
        self.sheets.shift_remove(name)
    }

    pub fn into_sheets(self) -> IndexMap<String, Vec<FlatRow>> {
        self.sheets
    }

    /// Every column name appearing anywhere in the content.
    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.sheets
            .values()
            .flat_map(|rows| rows.iter())
            .flat_map(|row| row.keys().map(String::as_str))
    }
}

pub fn flatten(
    document: &ContentDocument,
    options: &FlattenOptions,
) -> Result<SpreadsheetContent, FlattenError> {
    if options.ordered && document.key_order() != KeyOrder::Preserved {
        return Err(FlattenError::UnorderedContent);
    }

    let mut survey_removed = INTERNAL_SURVEY_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .chain(options.remove_survey_columns.iter().cloned())
        .collect::<Vec<_>>();
    let mut choices_removed = Vec::new();
    if !options.kobo_specific {
        survey_removed.extend([KUID_COLUMN.to_string(), AUTONAME_COLUMN.to_string()]);
        choices_removed.extend([KUID_COLUMN.to_string(), AUTOVALUE_COLUMN.to_string()]);
    }

    let mut sheets = IndexMap::new();
    let survey = document
        .survey
        .iter()
        .map(|row| flatten_row(document, SheetKind::Survey, row, &survey_removed))
        .collect::<Vec<_>>();
    sheets.insert(SURVEY.to_string(), survey);
    let choices = document
        .choices
        .iter()
        .map(|row| flatten_row(document, SheetKind::Choices, row, &choices_removed))
        .collect::<Vec<_>>();
    sheets.insert(CHOICES.to_string(), choices);
    if !document.settings.is_empty() {
        let settings = document
            .settings
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<FlatRow>();
        sheets.insert(SETTINGS.to_string(), vec![settings]);
    }
    for (name, sheet) in &document.extra_sheets {
        if name == SCHEMA_SHEET {
            continue;
        }
        if let Some(rows) = flat_rows(sheet) {
            sheets.insert(name.clone(), rows);
        }
    }

    tracing::debug!(
        sheets = sheets.len(),
        ordered = options.ordered,
        kobo_specific = options.kobo_specific,
        "flattened content"
    );
    Ok(SpreadsheetContent { sheets })
}

fn flatten_row(
    document: &ContentDocument,
    kind: SheetKind,
    row: &Row,
    removed: &[String],
) -> FlatRow {
    let list_name = match kind {
        SheetKind::Survey => row
            .get(SELECT_FROM_LIST_NAME)
            .and_then(Cell::as_scalar)
            .filter(|scalar| !scalar.is_blank())
            .map(|scalar| scalar.to_text()),
        SheetKind::Choices => None,
    };
    let or_other = row
        .get(OR_OTHER)
        .and_then(Cell::as_scalar)
        .is_some_and(|scalar| !scalar.is_blank());

    let mut flat = FlatRow::with_capacity(row.len());
    for (column, cell) in row.iter() {
        if removed.iter().any(|name| name == column) {
            continue;
        }
        if column == "type"
            && let Some(list_name) = &list_name
        {
            let base = cell.primary().map(Scalar::to_text).unwrap_or_default();
            let mut merged = format!("{base} {list_name}");
            if or_other {
                merged.push_str(" or_other");
            }
            flat.insert(column.to_string(), Value::String(merged));
            continue;
        }
        match cell {
            Cell::Translated(values) if document.is_translated(column) => {
                for (translation, value) in document.translations.iter().zip(values) {
                    flat.insert(translated_column(column, translation), value.to_value());
                }
            }
            other => {
                flat.insert(column.to_string(), other.to_value());
            }
        }
    }
    flat
}

/// `label` + `English` gives `label::English`; the unnamed translation keeps the bare name.
pub fn translated_column(column: &str, translation: &Translation) -> String {
    match translation {
        Translation::Unnamed => column.to_string(),
        Translation::Named(name) => format!("{column}::{name}"),
    }
}

fn flat_rows(sheet: &Value) -> Option<Vec<FlatRow>> {
    let Value::Array(items) = sheet else {
        return None;
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Some(map.clone().into_iter().collect()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_name_merges_into_type() {
        let document = ContentDocument::from_value(json!({
            "survey": [
                {"type": "select_one", "select_from_list_name": "colors", "_or_other": true, "name": "q"}
            ]
        }))
        .expect("document");
        let content = flatten(&document, &FlattenOptions::default()).expect("flatten");
        let row = &content.sheet(SURVEY).expect("survey")[0];
        assert_eq!(row["type"], json!("select_one colors or_other"));
        assert!(!row.contains_key(SELECT_FROM_LIST_NAME));
        assert!(!row.contains_key(OR_OTHER));
    }

    #[test]
    fn translated_cells_expand_per_language() {
        assert_eq!(translated_column("label", &Translation::named("fr")), "label::fr");
        assert_eq!(translated_column("label", &Translation::Unnamed), "label");
    }
}
