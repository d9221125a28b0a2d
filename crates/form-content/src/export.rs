//! Spreadsheet export: builds the ordered per-sheet structure and hands it to
//! a [`TabularWriter`].
//!
//! The exporter never touches the caller's document; every adjustment runs on
//! a copy. Any failure inside the pipeline surfaces as a single
//! [`ExportError`] and nothing is handed to the writer.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::autoname::{self, GIVEN_NAME_COLUMN, TYPE_COLUMN};
use crate::codec::{self, READONLY_COLUMN, REQUIRED_COLUMN};
use crate::columns::{self, FORM_TITLE};
use crate::document::{CHOICES, ContentDocument, DocumentError, SETTINGS, SURVEY, SheetKind};
use crate::flatten::{self, FlatRow, FlattenError, FlattenOptions, SpreadsheetContent};
use crate::identity;
use crate::row::{Cell, Row, Scalar};
use crate::save::{SELECT_ONE_FROM_FILE, SELECT_ONE_FROM_FILE_FILENAME};
use crate::standardize::{StandardizeError, Standardizer};

/// Sheets written to a workbook, in order.
pub const SHEET_ORDER: [&str; 3] = [SETTINGS, CHOICES, SURVEY];
pub const DEFAULT_CODELIST: &str = "codelist.csv";
pub const HXL_COLUMN: &str = "hxl";

const GROUP_TYPES: [(&str, &str); 4] = [
    ("begin_group", "begin group"),
    ("end_group", "end group"),
    ("begin_repeat", "begin repeat"),
    ("end_repeat", "end repeat"),
];

/// Rows and settings merged into the exported copy only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AppendRows {
    pub survey: Vec<Map<String, Value>>,
    pub choices: Vec<Map<String, Value>>,
    pub settings: Map<String, Value>,
}

impl AppendRows {
    pub fn is_empty(&self) -> bool {
        self.survey.is_empty() && self.choices.is_empty() && self.settings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ExportOptions {
    /// Keep row keys and autoname helper columns in the export.
    pub kobo_specific: bool,
    /// Overrides `settings.form_title`.
    pub form_title: Option<String>,
    /// Settings written into every export when the document lacks them.
    /// Authored values always win; a default never overwrites a setting the
    /// document already carries.
    pub settings_defaults: BTreeMap<String, String>,
    pub append: AppendRows,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            kobo_specific: false,
            form_title: None,
            settings_defaults: columns::default_settings(),
            append: AppendRows::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("content improperly formatted for spreadsheet export: {message}")]
pub struct ExportError {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("sheet '{sheet}' does not fit in a workbook: {detail}")]
    OutOfBounds { sheet: String, detail: String },
    #[error("workbook backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Standardize(#[from] StandardizeError),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
    #[error(transparent)]
    Writer(#[from] WriterError),
}

impl From<PipelineError> for ExportError {
    fn from(err: PipelineError) -> Self {
        tracing::warn!(error = %err, "spreadsheet export failed");
        ExportError {
            message: err.to_string(),
        }
    }
}

/// One sheet ready for a writer. Blank cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl SheetTable {
    /// The header is the first-seen union of row keys; falsy values are left blank.
    pub fn from_rows(name: &str, rows: &[FlatRow]) -> Self {
        let mut header: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !header.contains(key) {
                    header.push(key.clone());
                }
            }
        }
        let rows = rows
            .iter()
            .map(|row| {
                header
                    .iter()
                    .map(|column| row.get(column).filter(|value| is_truthy(value)).cloned())
                    .collect()
            })
            .collect();
        Self {
            name: name.to_string(),
            header,
            rows,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        other => Scalar::from_value(other).is_some_and(|scalar| !scalar.is_blank()),
    }
}

/// Sink for exported sheets.
pub trait TabularWriter {
    fn write_table(&mut self, table: &SheetTable) -> Result<(), WriterError>;

    /// Produces the finished workbook.
    fn finish(&mut self) -> Result<Vec<u8>, WriterError>;
}

/// Keeps tables in memory; `finish` renders them as JSON.
#[derive(Debug, Clone, Default)]
pub struct TableCollector {
    tables: Vec<SheetTable>,
}

impl TableCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[SheetTable] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<SheetTable> {
        self.tables
    }
}

impl TabularWriter for TableCollector {
    fn write_table(&mut self, table: &SheetTable) -> Result<(), WriterError> {
        self.tables.push(table.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, WriterError> {
        Ok(serde_json::to_vec_pretty(&self.tables)?)
    }
}

/// Runs the export pipeline and returns the flattened sheets without writing them.
pub fn ordered_content(
    document: &ContentDocument,
    standardizer: &dyn Standardizer,
    options: &ExportOptions,
) -> Result<SpreadsheetContent, ExportError> {
    Ok(build_content(document, standardizer, options)?)
}

/// Runs the export pipeline and writes `settings`, `choices` and `survey`, in
/// that order, to `writer`.
pub fn export(
    document: &ContentDocument,
    standardizer: &dyn Standardizer,
    options: &ExportOptions,
    writer: &mut dyn TabularWriter,
) -> Result<Vec<u8>, ExportError> {
    let content = build_content(document, standardizer, options)?;
    let tables = SHEET_ORDER
        .iter()
        .filter_map(|name| content.sheet(name).map(|rows| SheetTable::from_rows(name, rows)))
        .collect::<Vec<_>>();
    let bytes = write_tables(&tables, writer)?;
    tracing::info!(sheets = tables.len(), bytes = bytes.len(), "exported spreadsheet");
    Ok(bytes)
}

fn write_tables(
    tables: &[SheetTable],
    writer: &mut dyn TabularWriter,
) -> Result<Vec<u8>, PipelineError> {
    for table in tables {
        writer.write_table(table)?;
    }
    Ok(writer.finish()?)
}

fn build_content(
    document: &ContentDocument,
    standardizer: &dyn Standardizer,
    options: &ExportOptions,
) -> Result<SpreadsheetContent, PipelineError> {
    let mut content = document.clone();
    append_rows(&mut content, &options.append)?;

    codec::encode_custom_columns(&mut content);
    codec::namespace_media_columns(&mut content);
    standardizer.standardize_if_needed(&mut content)?;
    codec::restore_media_columns(&mut content);
    codec::decode_custom_columns(&mut content);
    if !options.kobo_specific {
        autoname::autoname_fields(&mut content);
        autoname::autovalue_choices(&mut content);
        autoname::replace_with_autofields(&mut content);
        identity::strip_keys(&mut content);
    }
    let mut content = content.into_ordered();

    columns::ensure_required_columns(&mut content, SheetKind::Survey);
    for row in content.survey.iter_mut() {
        adjust_survey_row(row);
    }
    columns::ensure_form_id(&mut content.settings);
    if let Some(title) = &options.form_title {
        content
            .settings
            .insert(FORM_TITLE.to_string(), Value::String(title.clone()));
    }
    columns::ensure_required_settings(&mut content.settings, &options.settings_defaults);
    columns::sort_settings(&mut content.settings);
    columns::ensure_required_columns(&mut content, SheetKind::Choices);
    for kind in SheetKind::ALL {
        columns::sort_sheet_columns(content.sheet_mut(kind), kind);
    }

    let flatten_options = FlattenOptions {
        ordered: true,
        kobo_specific: options.kobo_specific,
        remove_survey_columns: vec![HXL_COLUMN.to_string()],
    };
    Ok(flatten::flatten(&content, &flatten_options)?)
}

fn append_rows(document: &mut ContentDocument, append: &AppendRows) -> Result<(), DocumentError> {
    if append.is_empty() {
        return Ok(());
    }
    for (key, value) in &append.settings {
        document.settings.insert(key.clone(), value.clone());
    }
    for (kind, rows) in [
        (SheetKind::Survey, &append.survey),
        (SheetKind::Choices, &append.choices),
    ] {
        let parsed = rows
            .iter()
            .map(|row| Row::from_map(row.clone(), &document.translated))
            .collect::<Vec<_>>();
        document.sheet_mut(kind).extend(parsed);
    }
    document.check_alignment()
}

/// XLSForm spellings for the survey sheet.
fn adjust_survey_row(row: &mut Row) {
    row.remove(GIVEN_NAME_COLUMN);
    let filename = row
        .remove(SELECT_ONE_FROM_FILE_FILENAME)
        .and_then(|cell| cell.as_str().map(str::trim).map(str::to_string))
        .filter(|name| !name.is_empty());
    if let Some(kind) = row.text(TYPE_COLUMN) {
        let rewritten = if kind == SELECT_ONE_FROM_FILE {
            let filename = filename.as_deref().unwrap_or(DEFAULT_CODELIST);
            Some(format!("{SELECT_ONE_FROM_FILE} {filename}"))
        } else {
            GROUP_TYPES
                .iter()
                .find(|(from, _)| *from == kind)
                .map(|(_, to)| to.to_string())
        };
        if let Some(rewritten) = rewritten {
            row.insert(TYPE_COLUMN, Cell::text(rewritten));
        }
    }
    for column in [REQUIRED_COLUMN, READONLY_COLUMN] {
        if let Some(cell) = row.get_mut(column) {
            render_flag(cell);
        }
    }
}

/// Native and textual booleans become `yes` or blank.
fn render_flag(cell: &mut Cell) {
    let flag = match &*cell {
        Cell::Scalar(Scalar::Bool(flag)) => *flag,
        Cell::Scalar(Scalar::Text(text)) if text.eq_ignore_ascii_case("true") => true,
        Cell::Scalar(Scalar::Text(text)) if text.eq_ignore_ascii_case("false") => false,
        _ => return,
    };
    *cell = Cell::text(if flag { "yes" } else { "" });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_is_union_and_falsy_cells_are_blank() {
        let rows: Vec<FlatRow> = vec![
            [("a".to_string(), json!("x")), ("b".to_string(), json!(0))]
                .into_iter()
                .collect(),
            [("c".to_string(), json!(true)), ("a".to_string(), json!(""))]
                .into_iter()
                .collect(),
        ];
        let table = SheetTable::from_rows("survey", &rows);
        assert_eq!(table.header, ["a", "b", "c"]);
        assert_eq!(table.rows[0], vec![Some(json!("x")), None, None]);
        assert_eq!(table.rows[1], vec![None, None, Some(json!(true))]);
    }

    #[test]
    fn survey_rows_use_spreadsheet_spellings() {
        let mut row: Row = [
            ("type", Cell::text("select_one_from_file")),
            (SELECT_ONE_FROM_FILE_FILENAME, Cell::text("  ")),
            ("required", Cell::Scalar(Scalar::Bool(true))),
            ("readonly", Cell::text("false")),
            (GIVEN_NAME_COLUMN, Cell::text("q")),
        ]
        .into_iter()
        .collect();
        adjust_survey_row(&mut row);
        assert_eq!(row.text("type"), Some("select_one_from_file codelist.csv"));
        assert_eq!(row.text("required"), Some("yes"));
        assert_eq!(row.text("readonly"), Some(""));
        assert!(!row.contains(GIVEN_NAME_COLUMN));
        assert!(!row.contains(SELECT_ONE_FROM_FILE_FILENAME));
    }
}
