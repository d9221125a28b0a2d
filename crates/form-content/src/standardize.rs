//! Normalization pass that folds spreadsheet-style columns into the document model.
//!
//! [`SheetStandardizer`] turns `label::English` style columns into translated
//! arrays, a bare translatable column into the unnamed translation, bare media
//! columns into `media::<kind>`, and textual `required` flags into booleans.

use thiserror::Error;

use crate::codec::{MEDIA_PREFIXES, REQUIRED_COLUMN};
use crate::document::{ContentDocument, SheetKind, Translation};
use crate::row::{Cell, Row, Scalar};

pub const TRANSLATABLE_COLUMNS: [&str; 8] = [
    "label",
    "hint",
    "guidance_hint",
    "required_message",
    "constraint_message",
    "media::image",
    "media::audio",
    "media::video",
];

const MEDIA_COLUMN_PREFIX: &str = "media::";

#[derive(Debug, Error, PartialEq)]
pub enum StandardizeError {
    #[error("{sheet} row {row}: column '{column}' must hold a single value to be translated")]
    NonScalarCell {
        sheet: SheetKind,
        row: usize,
        column: String,
    },
}

/// External normalization pass run by the save and export pipelines.
pub trait Standardizer {
    fn needs_standardization(&self, document: &ContentDocument) -> bool;

    fn standardize(&self, document: &mut ContentDocument) -> Result<(), StandardizeError>;

    /// Runs [`Standardizer::standardize`] only when needed. Returns whether it ran.
    fn standardize_if_needed(
        &self,
        document: &mut ContentDocument,
    ) -> Result<bool, StandardizeError> {
        if !self.needs_standardization(document) {
            return Ok(false);
        }
        self.standardize(document)?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SheetStandardizer;

impl Standardizer for SheetStandardizer {
    fn needs_standardization(&self, document: &ContentDocument) -> bool {
        SheetKind::ALL.into_iter().any(|kind| {
            document.sheet(kind).iter().any(|row| {
                row.iter().any(|(column, cell)| {
                    media_column(column).is_some()
                        || split_translated(column).is_some()
                        || (is_translatable(column) && matches!(cell, Cell::Scalar(_)))
                        || (kind == SheetKind::Survey
                            && column == REQUIRED_COLUMN
                            && text_flag(cell).is_some())
                })
            })
        })
    }

    fn standardize(&self, document: &mut ContentDocument) -> Result<(), StandardizeError> {
        rename_media_columns(document);
        coerce_required_flags(document);
        let (needs_unnamed, languages) = scan_translations(document);
        widen_translations(document, needs_unnamed, languages);
        for kind in SheetKind::ALL {
            gather_translated_cells(document, kind)?;
        }
        tracing::debug!(
            translations = document.translations.len(),
            translated = document.translated.len(),
            "standardized content"
        );
        Ok(())
    }
}

fn is_translatable(column: &str) -> bool {
    TRANSLATABLE_COLUMNS.contains(&column)
}

/// `label::English` gives `("label", "English")`.
fn split_translated(column: &str) -> Option<(&'static str, &str)> {
    TRANSLATABLE_COLUMNS.iter().find_map(|base| {
        column
            .strip_prefix(base)?
            .strip_prefix("::")
            .filter(|language| !language.is_empty())
            .map(|language| (*base, language))
    })
}

/// `image` and `image::English` move under `media::`.
fn media_column(column: &str) -> Option<String> {
    MEDIA_PREFIXES
        .iter()
        .any(|kind| {
            column
                .strip_prefix(kind)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
        .then(|| format!("{MEDIA_COLUMN_PREFIX}{column}"))
}

fn text_flag(cell: &Cell) -> Option<bool> {
    match cell.as_str()?.trim().to_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

fn rename_media_columns(document: &mut ContentDocument) {
    for kind in SheetKind::ALL {
        for row in document.sheet_mut(kind).iter_mut() {
            let renames = row
                .columns()
                .filter_map(|column| media_column(column).map(|target| (column.to_string(), target)))
                .collect::<Vec<_>>();
            for (from, to) in renames {
                row.rename(&from, &to);
            }
        }
    }
    for column in document.translated.iter_mut() {
        if let Some(target) = media_column(column) {
            *column = target;
        }
    }
}

fn coerce_required_flags(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        if let Some(flag) = row.get(REQUIRED_COLUMN).and_then(text_flag) {
            row.insert(REQUIRED_COLUMN, Cell::Scalar(Scalar::Bool(flag)));
        }
    }
}

/// Finds whether a bare translatable column exists and which new languages appear.
fn scan_translations(document: &ContentDocument) -> (bool, Vec<Translation>) {
    let mut needs_unnamed = false;
    let mut languages: Vec<Translation> = Vec::new();
    for kind in SheetKind::ALL {
        for row in document.sheet(kind) {
            for (column, cell) in row.iter() {
                if is_translatable(column) && matches!(cell, Cell::Scalar(_)) {
                    needs_unnamed = true;
                }
                if let Some((_, language)) = split_translated(column) {
                    let translation = Translation::named(language);
                    if !document.translations.contains(&translation)
                        && !languages.contains(&translation)
                    {
                        languages.push(translation);
                    }
                }
            }
        }
    }
    (needs_unnamed, languages)
}

/// Extends the translation list, padding existing translated arrays with nulls.
fn widen_translations(
    document: &mut ContentDocument,
    needs_unnamed: bool,
    languages: Vec<Translation>,
) {
    let prepend_unnamed = needs_unnamed && !document.has_unnamed_translation();
    if !prepend_unnamed && languages.is_empty() {
        return;
    }
    let appended = languages.len();
    let ContentDocument {
        survey,
        choices,
        translated,
        ..
    } = &mut *document;
    for row in survey.iter_mut().chain(choices.iter_mut()) {
        for column in translated.iter() {
            if let Some(values) = row.get_mut(column).and_then(Cell::as_translated_mut) {
                if prepend_unnamed {
                    values.insert(0, Scalar::Null);
                }
                values.extend(std::iter::repeat_n(Scalar::Null, appended));
            }
        }
    }
    if prepend_unnamed {
        document.translations.insert(0, Translation::Unnamed);
    }
    document.translations.extend(languages);
}

fn gather_translated_cells(
    document: &mut ContentDocument,
    kind: SheetKind,
) -> Result<(), StandardizeError> {
    let translations = document.translations.clone();
    let mut newly_translated = Vec::new();
    for (index, row) in document.sheet_mut(kind).iter_mut().enumerate() {
        for base in TRANSLATABLE_COLUMNS {
            let holds_array = gather_column(row, base, &translations).map_err(|column| {
                StandardizeError::NonScalarCell {
                    sheet: kind,
                    row: index,
                    column,
                }
            })?;
            if holds_array && !newly_translated.contains(&base) {
                newly_translated.push(base);
            }
        }
    }
    for base in newly_translated {
        if !document.is_translated(base) {
            document.translated.push(base.to_string());
        }
    }
    Ok(())
}

/// Folds `base` and every `base::<language>` cell of one row into a single
/// translated array. Returns whether the row now holds `base` as an array;
/// `Err` names a language column holding a non-scalar value.
fn gather_column(
    row: &mut Row,
    base: &str,
    translations: &[Translation],
) -> Result<bool, String> {
    let language_columns = row
        .columns()
        .filter_map(|column| match split_translated(column) {
            Some((found, language)) if found == base => {
                Some((column.to_string(), Translation::named(language)))
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    let bare = row.get(base).and_then(Cell::as_scalar).cloned();
    if language_columns.is_empty() && bare.is_none() {
        return Ok(matches!(row.get(base), Some(Cell::Translated(_))));
    }

    let mut values = match row.get(base) {
        Some(Cell::Translated(values)) => values.clone(),
        _ => vec![Scalar::Null; translations.len()],
    };
    values.resize(translations.len(), Scalar::Null);
    if let Some(scalar) = bare
        && let Some(slot) = translations.iter().position(Translation::is_unnamed)
    {
        values[slot] = scalar;
    }
    for (column, translation) in &language_columns {
        let Some(scalar) = row.get(column).and_then(Cell::as_scalar).cloned() else {
            return Err(column.clone());
        };
        if let Some(slot) = translations.iter().position(|entry| entry == translation) {
            values[slot] = scalar;
        }
    }

    if !row.contains(base)
        && let Some((first, _)) = language_columns.first()
    {
        row.rename(first, base);
    }
    for (column, _) in &language_columns {
        if column != base {
            row.remove(column);
        }
    }
    row.insert(base, Cell::Translated(values));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn language_columns_fold_into_arrays() {
        let mut document = ContentDocument::from_value(json!({
            "survey": [
                {"type": "text", "label::English": "Hi", "label::French": "Salut", "name": "q1"},
                {"type": "note", "label::French": "Note"}
            ]
        }))
        .expect("document");
        assert!(SheetStandardizer.needs_standardization(&document));
        SheetStandardizer.standardize(&mut document).expect("standardize");
        assert_eq!(
            document.translations,
            vec![Translation::named("English"), Translation::named("French")]
        );
        assert_eq!(document.translated, vec!["label".to_string()]);
        assert_eq!(
            document.survey[0].to_value(),
            json!({"type": "text", "label": ["Hi", "Salut"], "name": "q1"})
        );
        assert_eq!(document.survey[1].to_value()["label"], json!([null, "Note"]));
        document.check_alignment().expect("aligned");
        assert!(!SheetStandardizer.needs_standardization(&document));
    }

    #[test]
    fn bare_label_becomes_unnamed_translation() {
        let mut document = ContentDocument::from_value(json!({
            "survey": [{"type": "text", "label": "Hi", "image": "a.png", "required": "yes"}]
        }))
        .expect("document");
        SheetStandardizer.standardize(&mut document).expect("standardize");
        assert_eq!(document.translations, vec![Translation::Unnamed]);
        assert_eq!(
            document.survey[0].to_value(),
            json!({"type": "text", "label": ["Hi"], "media::image": ["a.png"], "required": true})
        );
    }

    #[test]
    fn nested_language_cell_is_rejected() {
        let mut document = ContentDocument::from_value(json!({
            "survey": [{"type": "text", "hint::English": {"nested": true}}]
        }))
        .expect("document");
        let err = SheetStandardizer
            .standardize(&mut document)
            .expect_err("nested cell");
        assert!(err.to_string().contains("hint::English"));
    }
}
