//! Translation list state machine.
//!
//! State is the translation list plus every translated array in every survey
//! and choices row. Each transition keeps `len(array) == len(translations)`
//! for every translated cell it can reach; cells that are not arrays are
//! skipped and reported rather than aborting the transition.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::document::{ContentDocument, SheetKind, Translation};
use crate::row::Scalar;

pub const DEFAULT_LANGUAGE_SETTING: &str = "default_language";

/// Structural difference between the current and a proposed translation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationDiff {
    Unchanged,
    Reordered,
    Renamed { from: Translation, to: Translation },
    Added { translation: Translation },
    Deleted { translation: Translation },
    MultipleChanges {
        added: Vec<Translation>,
        removed: Vec<Translation>,
    },
    Unsupported { detail: String },
}

/// Diff kinds that no single transition can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedChange {
    MultipleChanges,
    ChangeUnsupported,
}

impl fmt::Display for UnsupportedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedChange::MultipleChanges => f.write_str("translations_multiple_changes"),
            UnsupportedChange::ChangeUnsupported => f.write_str("translation_change_unsupported"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TranslationError {
    #[error("{0}")]
    Validation(String),
    #[error("duplicate translation: {0}")]
    DuplicateTranslation(String),
    #[error("unsupported change: \"{kind}\": {detail}")]
    UnsupportedChange {
        kind: UnsupportedChange,
        detail: String,
    },
}

/// Why a cell was left untouched by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The column is listed as translated but the cell is not an array.
    NotAnArray,
    /// The array is shorter than the slot the transition needed.
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowSkip {
    pub sheet: SheetKind,
    pub row: usize,
    pub column: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationOutcome {
    pub applied: TranslationDiff,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<RowSkip>,
}

impl TranslationOutcome {
    fn new(applied: TranslationDiff) -> Self {
        Self {
            applied,
            skipped: Vec::new(),
        }
    }
}

/// Classifies the change from `existing` to `proposed` as exactly one kind.
pub fn compare_translations(existing: &[Translation], proposed: &[Translation]) -> TranslationDiff {
    if existing == proposed {
        return TranslationDiff::Unchanged;
    }
    if let Some((from, to)) = colliding_rename(existing, proposed) {
        return TranslationDiff::Renamed {
            from: from.clone(),
            to: to.clone(),
        };
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = proposed.iter().find(|entry| !seen.insert(*entry)) {
        return TranslationDiff::Unsupported {
            detail: format!("translation '{duplicate}' appears more than once"),
        };
    }

    let added = proposed
        .iter()
        .filter(|entry| !existing.contains(entry))
        .cloned()
        .collect::<Vec<_>>();
    let removed = existing
        .iter()
        .filter(|entry| !proposed.contains(entry))
        .cloned()
        .collect::<Vec<_>>();

    match (added.as_slice(), removed.as_slice()) {
        ([], []) => TranslationDiff::Reordered,
        ([to], [from]) => {
            let renamed = existing
                .iter()
                .map(|entry| if entry == from { to } else { entry })
                .eq(proposed.iter());
            if renamed {
                TranslationDiff::Renamed {
                    from: from.clone(),
                    to: to.clone(),
                }
            } else {
                TranslationDiff::MultipleChanges { added, removed }
            }
        }
        ([translation], []) => {
            let in_order = proposed
                .iter()
                .filter(|entry| *entry != translation)
                .eq(existing.iter());
            if in_order {
                TranslationDiff::Added {
                    translation: translation.clone(),
                }
            } else {
                TranslationDiff::MultipleChanges { added, removed }
            }
        }
        ([], [translation]) => {
            let in_order = existing
                .iter()
                .filter(|entry| *entry != translation)
                .eq(proposed.iter());
            if in_order {
                TranslationDiff::Deleted {
                    translation: translation.clone(),
                }
            } else {
                TranslationDiff::MultipleChanges { added, removed }
            }
        }
        _ => TranslationDiff::MultipleChanges { added, removed },
    }
}

/// One slot replaced by a name the list already holds. Classified as a
/// rename so applying it fails with the name collision.
fn colliding_rename<'a>(
    existing: &'a [Translation],
    proposed: &'a [Translation],
) -> Option<(&'a Translation, &'a Translation)> {
    if existing.len() != proposed.len() {
        return None;
    }
    let mut changed = existing
        .iter()
        .zip(proposed)
        .filter(|(old, new)| old != new);
    let (from, to) = changed.next()?;
    if changed.next().is_some() || !existing.contains(to) {
        return None;
    }
    Some((from, to))
}

/// Moves the document from its current translation list to `proposed`.
///
/// Additions are always prepended, and only the last translation can be
/// deleted. The document is left untouched whenever an error is returned.
pub fn apply_translation_list_change(
    document: &mut ContentDocument,
    proposed: &[Translation],
) -> Result<TranslationOutcome, TranslationError> {
    let diff = compare_translations(&document.translations, proposed);
    if proposed.iter().skip(1).any(Translation::is_unnamed) {
        return Err(TranslationError::Validation(
            "unnamed translation must be first in list of translations".into(),
        ));
    }
    tracing::debug!(?diff, "applying translation list change");

    match diff {
        TranslationDiff::Unchanged => Ok(TranslationOutcome::new(diff)),
        TranslationDiff::Reordered => {
            let mut outcome = TranslationOutcome::new(diff);
            reorder(document, proposed, &mut outcome.skipped);
            Ok(outcome)
        }
        TranslationDiff::Renamed { ref from, ref to } => {
            rename(document, from, to)?;
            Ok(TranslationOutcome::new(diff))
        }
        TranslationDiff::Added { ref translation } => {
            let translation = translation.clone();
            let mut outcome = TranslationOutcome::new(diff);
            prepend(document, translation, &mut outcome.skipped)?;
            Ok(outcome)
        }
        TranslationDiff::Deleted { ref translation } => {
            if document.translations.last() != Some(translation) {
                return Err(TranslationError::Validation(
                    "you can only delete the last translation of the form".into(),
                ));
            }
            let mut outcome = TranslationOutcome::new(diff);
            remove_last(document, &mut outcome.skipped);
            Ok(outcome)
        }
        TranslationDiff::MultipleChanges { added, removed } => {
            Err(TranslationError::UnsupportedChange {
                kind: UnsupportedChange::MultipleChanges,
                detail: format!(
                    "added [{}], removed [{}]",
                    join_translations(&added),
                    join_translations(&removed)
                ),
            })
        }
        TranslationDiff::Unsupported { detail } => Err(TranslationError::UnsupportedChange {
            kind: UnsupportedChange::ChangeUnsupported,
            detail,
        }),
    }
}

/// Moves the translation named by the `default_language` setting to the front.
///
/// No-op when the setting is absent, or when the form only carries the
/// unnamed translation.
pub fn promote_default_language(
    document: &mut ContentDocument,
) -> Result<TranslationOutcome, TranslationError> {
    let Some(name) = document
        .setting_str(DEFAULT_LANGUAGE_SETTING)
        .map(str::to_string)
    else {
        return Ok(TranslationOutcome::new(TranslationDiff::Unchanged));
    };
    promote_translation(document, &Translation::Named(name))
}

/// Moves `translation` to index 0 along with its slot in every translated array.
pub fn promote_translation(
    document: &mut ContentDocument,
    translation: &Translation,
) -> Result<TranslationOutcome, TranslationError> {
    if !document.translations.contains(translation) {
        if matches!(document.translations.as_slice(), [Translation::Unnamed]) {
            return Ok(TranslationOutcome::new(TranslationDiff::Unchanged));
        }
        return Err(TranslationError::Validation(format!(
            "`{translation}` is specified as the default language, but only these translations \
             are present in the form: `{}`",
            document.translation_names().join("`, `")
        )));
    }
    let mut outcome = TranslationOutcome::new(TranslationDiff::Reordered);
    if !prioritize(document, translation, &mut outcome.skipped) {
        outcome.applied = TranslationDiff::Unchanged;
    }
    Ok(outcome)
}

/// Renames one translation in place.
pub fn rename_translation(
    document: &mut ContentDocument,
    from: &Translation,
    to: &Translation,
) -> Result<(), TranslationError> {
    if !document.translations.contains(from) {
        return Err(TranslationError::Validation(format!(
            "no translation named '{from}'"
        )));
    }
    rename(document, from, to)
}

/// Gives the unnamed translation a name.
pub fn name_unnamed_translation(
    document: &mut ContentDocument,
    name: &str,
) -> Result<(), TranslationError> {
    let named = Translation::named(name);
    if document.translations.contains(&named) {
        return Err(TranslationError::DuplicateTranslation(name.to_string()));
    }
    let Some(slot) = document
        .translations
        .iter_mut()
        .find(|translation| translation.is_unnamed())
    else {
        return Err(TranslationError::Validation(format!(
            "cannot save translation name: {name}"
        )));
    };
    *slot = named;
    Ok(())
}

pub fn has_translations(document: &ContentDocument, min_count: usize) -> bool {
    document.translations.len() >= min_count
}

fn rename(
    document: &mut ContentDocument,
    from: &Translation,
    to: &Translation,
) -> Result<(), TranslationError> {
    if document.translations.contains(to) {
        return Err(TranslationError::DuplicateTranslation(to.to_string()));
    }
    let Some(index) = document.translations.iter().position(|entry| entry == from) else {
        return Err(TranslationError::Validation(format!(
            "no translation named '{from}'"
        )));
    };
    if to.is_unnamed() && index != 0 {
        return Err(TranslationError::Validation(
            "unnamed translation must be first in list of translations".into(),
        ));
    }
    document.translations[index] = to.clone();
    Ok(())
}

fn reorder(document: &mut ContentDocument, target: &[Translation], skipped: &mut Vec<RowSkip>) {
    for translation in target.iter().rev() {
        prioritize(document, translation, skipped);
    }
}

/// Pulls one translation to the front. Returns `false` when it already was.
fn prioritize(
    document: &mut ContentDocument,
    translation: &Translation,
    skipped: &mut Vec<RowSkip>,
) -> bool {
    let Some(index) = document
        .translations
        .iter()
        .position(|entry| entry == translation)
    else {
        return false;
    };
    if index == 0 {
        return false;
    }
    for_each_translated(document, skipped, |values| {
        if index >= values.len() {
            return Err(SkipReason::IndexOutOfRange {
                index,
                len: values.len(),
            });
        }
        let value = values.remove(index);
        values.insert(0, value);
        Ok(())
    });
    let moved = document.translations.remove(index);
    document.translations.insert(0, moved);
    true
}

fn prepend(
    document: &mut ContentDocument,
    translation: Translation,
    skipped: &mut Vec<RowSkip>,
) -> Result<(), TranslationError> {
    if document.has_unnamed_translation() {
        return Err(TranslationError::Validation(
            "cannot add translation if an unnamed translation exists".into(),
        ));
    }
    if document.translations.contains(&translation) {
        return Err(TranslationError::Validation(
            "cannot add existing translation".into(),
        ));
    }
    for_each_translated(document, skipped, |values| {
        // New slots start as a copy of the current first slot.
        let seed = values.first().map(Scalar::to_text).unwrap_or_default();
        values.insert(0, Scalar::Text(seed));
        Ok(())
    });
    document.translations.insert(0, translation);
    Ok(())
}

fn remove_last(document: &mut ContentDocument, skipped: &mut Vec<RowSkip>) {
    for_each_translated(document, skipped, |values| match values.pop() {
        Some(_) => Ok(()),
        None => Err(SkipReason::IndexOutOfRange { index: 0, len: 0 }),
    });
    document.translations.pop();
}

/// Visits every translated cell of survey and choices. Absent columns are
/// ignored; cells that are present but unusable are recorded as skips.
fn for_each_translated(
    document: &mut ContentDocument,
    skipped: &mut Vec<RowSkip>,
    mut apply: impl FnMut(&mut Vec<Scalar>) -> Result<(), SkipReason>,
) {
    let ContentDocument {
        survey,
        choices,
        translated,
        ..
    } = document;
    for (kind, rows) in [(SheetKind::Survey, survey), (SheetKind::Choices, choices)] {
        for (index, row) in rows.iter_mut().enumerate() {
            for column in translated.iter() {
                let Some(cell) = row.get_mut(column) else {
                    continue;
                };
                let result = match cell.as_translated_mut() {
                    Some(values) => apply(values),
                    None => Err(SkipReason::NotAnArray),
                };
                if let Err(reason) = result {
                    tracing::debug!(sheet = %kind, row = index, column = %column, ?reason, "skipping cell");
                    skipped.push(RowSkip {
                        sheet: kind,
                        row: index,
                        column: column.clone(),
                        reason,
                    });
                }
            }
        }
    }
}

fn join_translations(translations: &[Translation]) -> String {
    translations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(names: &[Option<&str>]) -> Vec<Translation> {
        names
            .iter()
            .map(|name| match name {
                Some(name) => Translation::named(*name),
                None => Translation::Unnamed,
            })
            .collect()
    }

    #[test]
    fn classifies_single_changes() {
        let existing = list(&[Some("en"), Some("fr")]);
        assert_eq!(
            compare_translations(&existing, &list(&[Some("fr"), Some("en")])),
            TranslationDiff::Reordered
        );
        assert_eq!(
            compare_translations(&existing, &list(&[Some("en"), Some("de")])),
            TranslationDiff::Renamed {
                from: Translation::named("fr"),
                to: Translation::named("de"),
            }
        );
        assert_eq!(
            compare_translations(&existing, &list(&[Some("es"), Some("en"), Some("fr")])),
            TranslationDiff::Added {
                translation: Translation::named("es")
            }
        );
        assert_eq!(
            compare_translations(&existing, &list(&[Some("en")])),
            TranslationDiff::Deleted {
                translation: Translation::named("fr")
            }
        );
    }

    #[test]
    fn classifies_combined_changes_as_multiple() {
        let existing = list(&[Some("en"), Some("fr"), Some("de")]);
        let diff = compare_translations(&existing, &list(&[Some("de"), Some("it"), Some("en")]));
        assert!(matches!(diff, TranslationDiff::MultipleChanges { .. }));
        let diff = compare_translations(&existing, &list(&[Some("es"), Some("it")]));
        assert!(matches!(diff, TranslationDiff::MultipleChanges { .. }));
    }

    #[test]
    fn duplicate_names_are_unsupported() {
        let diff = compare_translations(
            &list(&[Some("en")]),
            &list(&[Some("en"), Some("en")]),
        );
        assert!(matches!(diff, TranslationDiff::Unsupported { .. }));
    }
}
