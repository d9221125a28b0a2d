//! Reversible column encodings applied around the standardization pass.
//!
//! Two independent codecs live here:
//!
//! * flag columns (`required`, `readonly`): native booleans are written as
//!   marker-suffixed text so the standardizer cannot reinterpret them;
//! * media columns (`audio*`, `image*`, `video*`): renamed under a private
//!   namespace so the standardizer does not rewrite them as `media::` columns.
//!
//! `decode_*` is the exact inverse of `encode_*` for every row, including rows
//! where the column is absent.

use crate::document::{ContentDocument, SheetKind};
use crate::row::{Cell, Row, Scalar};

pub const REQUIRED_COLUMN: &str = "required";
pub const READONLY_COLUMN: &str = "readonly";
/// Holds `readonly` while it is encoded. Authored `oc_readonly` columns are
/// moved one namespace level deeper for the duration.
pub const ENCODED_READONLY_COLUMN: &str = "oc_readonly";
pub const CUSTOM_COL_MARKER: &str = "custom_col_append_string";
/// Reserved suffix; authored text already ending in it is escaped by repeating it.
pub const CUSTOM_COL_SUFFIX: &str = "+custom_col_append_string";

pub const MEDIA_PREFIXES: [&str; 3] = ["audio", "image", "video"];
/// Namespace token for media columns. Repeated once per escaping level, so
/// authored `oc_image` is carried as `oc_oc_image`.
pub const MEDIA_NAMESPACE: &str = "oc_";

const TRUE_PAYLOAD: &str = "yes";
const FALSE_PAYLOAD: &str = "";

fn encode_flag(cell: Cell) -> Cell {
    match cell {
        Cell::Scalar(Scalar::Bool(true)) => {
            Cell::text(format!("{TRUE_PAYLOAD}{CUSTOM_COL_SUFFIX}"))
        }
        Cell::Scalar(Scalar::Bool(false)) => {
            Cell::text(format!("{FALSE_PAYLOAD}{CUSTOM_COL_SUFFIX}"))
        }
        Cell::Scalar(Scalar::Text(text)) if text.ends_with(CUSTOM_COL_SUFFIX) => {
            Cell::text(format!("{text}{CUSTOM_COL_SUFFIX}"))
        }
        other => other,
    }
}

fn decode_flag(cell: Cell) -> Cell {
    let Cell::Scalar(Scalar::Text(text)) = cell else {
        return cell;
    };
    let Some(payload) = text.strip_suffix(CUSTOM_COL_SUFFIX) else {
        return Cell::text(text);
    };
    match payload {
        TRUE_PAYLOAD => Cell::Scalar(Scalar::Bool(true)),
        FALSE_PAYLOAD => Cell::Scalar(Scalar::Bool(false)),
        escaped => Cell::text(escaped),
    }
}

/// Encodes `required` in place and moves `readonly` into its reserved column.
/// Authored columns already named `oc_readonly` (or `oc_oc_readonly`, ...) are
/// pushed one namespace level deeper first.
pub fn encode_custom_columns(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        rewrite(row, REQUIRED_COLUMN, encode_flag);
        push_namespace(row, is_readonly, 1);
        if row.rename(READONLY_COLUMN, ENCODED_READONLY_COLUMN) {
            rewrite(row, ENCODED_READONLY_COLUMN, encode_flag);
        }
    }
}

/// Inverse of [`encode_custom_columns`].
pub fn decode_custom_columns(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        rewrite(row, REQUIRED_COLUMN, decode_flag);
        if row.rename(ENCODED_READONLY_COLUMN, READONLY_COLUMN) {
            rewrite(row, READONLY_COLUMN, decode_flag);
        }
        pop_namespace(row, is_readonly, 2);
    }
}

fn rewrite(row: &mut Row, column: &str, transform: fn(Cell) -> Cell) {
    if let Some(cell) = row.get_mut(column) {
        let taken = std::mem::replace(cell, Cell::Scalar(Scalar::Null));
        *cell = transform(taken);
    }
}

fn is_media_column(column: &str) -> bool {
    MEDIA_PREFIXES
        .iter()
        .any(|prefix| column.starts_with(prefix))
}

fn is_readonly(column: &str) -> bool {
    column == READONLY_COLUMN
}

/// `oc_oc_image` gives `(2, "image")`.
fn split_namespace(column: &str) -> (usize, &str) {
    let mut depth = 0;
    let mut rest = column;
    while let Some(inner) = rest.strip_prefix(MEDIA_NAMESPACE) {
        depth += 1;
        rest = inner;
    }
    (depth, rest)
}

fn pushed(column: &str, family: fn(&str) -> bool, min_depth: usize) -> Option<(usize, String)> {
    let (depth, rest) = split_namespace(column);
    (depth >= min_depth && family(rest)).then(|| (depth, format!("{MEDIA_NAMESPACE}{column}")))
}

fn popped(column: &str, family: fn(&str) -> bool, min_depth: usize) -> Option<(usize, String)> {
    let (depth, rest) = split_namespace(column);
    (depth >= min_depth.max(1) && family(rest))
        .then(|| (depth, column[MEDIA_NAMESPACE.len()..].to_string()))
}

/// Adds one namespace level to every column of `family` at `min_depth` or
/// deeper. Deepest columns move first so no rename lands on a column that
/// has not moved yet.
fn push_namespace(row: &mut Row, family: fn(&str) -> bool, min_depth: usize) {
    let mut renames = row
        .columns()
        .filter_map(|column| {
            pushed(column, family, min_depth).map(|(depth, to)| (depth, column.to_string(), to))
        })
        .collect::<Vec<_>>();
    renames.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, from, to) in renames {
        row.rename(&from, &to);
    }
}

/// Inverse of [`push_namespace`]; shallowest columns move first.
fn pop_namespace(row: &mut Row, family: fn(&str) -> bool, min_depth: usize) {
    let mut renames = row
        .columns()
        .filter_map(|column| {
            popped(column, family, min_depth).map(|(depth, to)| (depth, column.to_string(), to))
        })
        .collect::<Vec<_>>();
    renames.sort_by_key(|(depth, _, _)| *depth);
    for (_, from, to) in renames {
        row.rename(&from, &to);
    }
}

/// Moves every media column of both sheets, and of the translated column
/// list, under [`MEDIA_NAMESPACE`]. Columns that already carry the namespace
/// in front of a media name gain one more level.
pub fn namespace_media_columns(document: &mut ContentDocument) {
    for kind in SheetKind::ALL {
        for row in document.sheet_mut(kind).iter_mut() {
            push_namespace(row, is_media_column, 0);
        }
    }
    for column in document.translated.iter_mut() {
        if let Some((_, target)) = pushed(column, is_media_column, 0) {
            *column = target;
        }
    }
}

/// Inverse of [`namespace_media_columns`].
pub fn restore_media_columns(document: &mut ContentDocument) {
    for kind in SheetKind::ALL {
        for row in document.sheet_mut(kind).iter_mut() {
            pop_namespace(row, is_media_column, 1);
        }
    }
    for column in document.translated.iter_mut() {
        if let Some((_, target)) = popped(column, is_media_column, 1) {
            *column = target;
        }
    }
}

/// Save-time normalization of `readonly`: the column is replaced by
/// `oc_readonly` holding `"true"` or `"false"`; rows without it get `"false"`.
pub fn adjust_readonly_for_save(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        push_namespace(row, is_readonly, 1);
        let readonly = match row.remove(READONLY_COLUMN) {
            Some(Cell::Scalar(Scalar::Bool(flag))) => flag,
            Some(Cell::Scalar(Scalar::Text(text))) => {
                let lowered = text.to_lowercase();
                lowered == "yes" || lowered == "true"
            }
            _ => false,
        };
        row.insert(ENCODED_READONLY_COLUMN, Cell::text(readonly.to_string()));
    }
}

/// Moves `oc_readonly` back to `readonly` after the save-time pass.
pub fn revert_readonly_after_save(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        row.rename(ENCODED_READONLY_COLUMN, READONLY_COLUMN);
        pop_namespace(row, is_readonly, 2);
    }
}
