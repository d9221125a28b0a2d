//! Save-time preparation of a document.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::autoname::{self, TYPE_COLUMN};
use crate::codec;
use crate::columns::{FORM_TITLE, ID_STRING};
use crate::document::{ContentDocument, SheetKind};
use crate::identity;
use crate::row::{Cell, Row, Scalar};
use crate::standardize::{StandardizeError, Standardizer};
use crate::translations::{self, RowSkip, TranslationError};

pub const SELECT_ONE_FROM_FILE: &str = "select_one_from_file";
pub const SELECT_ONE_FROM_FILE_FILENAME: &str = "select_one_from_file_filename";
pub const LIST_NAME_COLUMN: &str = "list_name";

/// Expression columns dropped when they hold empty text.
pub const EXPRESSION_COLUMNS: [&str; 5] =
    ["relevant", "constraint", "calculation", "trigger", "choice_filter"];

#[derive(Debug, Error, PartialEq)]
pub enum SaveError {
    #[error(transparent)]
    Standardize(#[from] StandardizeError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
}

/// Caller-supplied facts about the document being saved.
#[derive(Debug, Clone, Default)]
pub struct SaveContext {
    /// Name of the file the content was imported from, if any.
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SaveOutcome {
    /// Title popped from `settings.form_title`, else the source filename.
    pub title: Option<String>,
    pub keys_assigned: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<RowSkip>,
}

/// Runs the full save-time pipeline in place.
pub fn adjust_content_on_save(
    document: &mut ContentDocument,
    standardizer: &dyn Standardizer,
    context: &SaveContext,
) -> Result<SaveOutcome, SaveError> {
    let skipped = prepare_content(document, standardizer)?;
    let keys_assigned = identity::assign_keys(document);
    autoname::autoname_fields(document);
    autoname::autovalue_choices(document);
    identity::unlink(document);
    remove_empty_expressions(document);
    split_select_one_from_file(document);
    let title = settle_title(document, context);

    tracing::info!(
        rows = document.survey.len(),
        keys_assigned,
        skipped = skipped.len(),
        "prepared content for save"
    );
    Ok(SaveOutcome {
        title,
        keys_assigned,
        skipped,
    })
}

/// Shared prefix of the save and snapshot pipelines: column normalization,
/// standardization, default-language promotion and empty-row removal.
pub(crate) fn prepare_content(
    document: &mut ContentDocument,
    standardizer: &dyn Standardizer,
) -> Result<Vec<RowSkip>, SaveError> {
    codec::adjust_readonly_for_save(document);
    codec::namespace_media_columns(document);
    standardizer.standardize_if_needed(document)?;
    codec::restore_media_columns(document);
    codec::revert_readonly_after_save(document);
    let outcome = translations::promote_default_language(document)?;
    strip_empty_rows(document);
    Ok(outcome.skipped)
}

/// Drops survey rows without `type` and choices without `list_name`.
pub fn strip_empty_rows(document: &mut ContentDocument) {
    for (kind, required) in [
        (SheetKind::Survey, TYPE_COLUMN),
        (SheetKind::Choices, LIST_NAME_COLUMN),
    ] {
        let rows = document.sheet_mut(kind);
        let before = rows.len();
        rows.retain(|row| row.contains(required));
        if rows.len() != before {
            tracing::debug!(sheet = %kind, removed = before - rows.len(), "stripped empty rows");
        }
    }
}

pub fn remove_empty_expressions(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        row.retain(|column, cell| {
            !(EXPRESSION_COLUMNS.contains(&column) && cell.as_str() == Some(""))
        });
    }
}

/// `select_one_from_file foo.csv` becomes `type: select_one_from_file` plus
/// `select_one_from_file_filename: foo.csv`. Once any row uses the type,
/// every row carries the filename column.
pub fn split_select_one_from_file(document: &mut ContentDocument) {
    let used = document.survey.iter().any(|row| {
        row.text(TYPE_COLUMN)
            .is_some_and(|kind| kind.contains(SELECT_ONE_FROM_FILE))
    });
    if !used {
        return;
    }
    for row in document.survey.iter_mut() {
        if !row.contains(SELECT_ONE_FROM_FILE_FILENAME) {
            row.insert(SELECT_ONE_FROM_FILE_FILENAME, Cell::text(""));
        }
        split_type(row);
    }
}

fn split_type(row: &mut Row) {
    let Some(kind) = row.text(TYPE_COLUMN) else {
        return;
    };
    let Some(start) = kind.find(SELECT_ONE_FROM_FILE) else {
        return;
    };
    let filename = kind[start + SELECT_ONE_FROM_FILE.len()..].trim().to_string();
    if filename.is_empty() {
        return;
    }
    row.insert(SELECT_ONE_FROM_FILE_FILENAME, Cell::text(filename));
    row.insert(TYPE_COLUMN, Cell::text(SELECT_ONE_FROM_FILE));
}

fn settle_title(document: &mut ContentDocument, context: &SaveContext) -> Option<String> {
    let mut title = document
        .settings
        .shift_remove(FORM_TITLE)
        .and_then(|value| Scalar::from_value(&value))
        .filter(|scalar| !scalar.is_blank())
        .map(|scalar| scalar.to_text());
    if let Some(filename) = context.filename.as_deref() {
        let has_id = document
            .setting_str(ID_STRING)
            .is_some_and(|id| !id.is_empty());
        if !has_id && let Some(slug) = autoname::slugify(filename) {
            document
                .settings
                .insert(ID_STRING.to_string(), Value::String(slug));
        }
        if title.is_none() {
            title = Some(filename.to_string());
        }
    }
    title
}
