use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::ContentDocument;
use crate::flatten::{AUTONAME_COLUMN, AUTOVALUE_COLUMN};
use crate::row::{Cell, Row, Scalar};

pub const NAME_COLUMN: &str = "name";
pub const GIVEN_NAME_COLUMN: &str = "$given_name";
pub const LABEL_COLUMN: &str = "label";
pub const LIST_NAME_COLUMN: &str = "list_name";
pub const TYPE_COLUMN: &str = "type";

const SLUG_MAX_LEN: usize = 40;

/// Closing markers carry no name of their own.
const END_TYPES: [&str; 7] = [
    "end_group",
    "end group",
    "end_repeat",
    "end repeat",
    "end_kobomatrix",
    "end_score",
    "end_rank",
];

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]+").expect("valid regex"));

/// Lowercase identifier made of `[a-z0-9_]`, never starting with a digit.
pub fn slugify(text: &str) -> Option<String> {
    let lowered = text.trim().to_lowercase();
    let replaced = NON_WORD.replace_all(&lowered, "_");
    let mut slug = replaced.trim_matches('_').to_string();
    if slug.is_empty() {
        return None;
    }
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert(0, '_');
    }
    slug.truncate(SLUG_MAX_LEN);
    Some(slug)
}

fn non_blank(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .and_then(Cell::as_scalar)
        .filter(|scalar| !scalar.is_blank())
        .map(Scalar::to_text)
}

fn label_slug(row: &Row) -> Option<String> {
    row.get(LABEL_COLUMN)
        .and_then(Cell::primary)
        .and_then(|scalar| slugify(&scalar.to_text()))
}

/// Appends `_001`, `_002`, ... until `base` is unused.
fn unique(base: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base}_{counter:03}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Writes `$autoname` on every survey row that can be named.
pub fn autoname_fields(document: &mut ContentDocument) {
    let mut taken = HashSet::new();
    for row in document.survey.iter_mut() {
        let is_end = row
            .text(TYPE_COLUMN)
            .is_some_and(|kind| END_TYPES.contains(&kind));
        if is_end {
            continue;
        }
        let Some(base) = non_blank(row, NAME_COLUMN)
            .or_else(|| non_blank(row, GIVEN_NAME_COLUMN))
            .or_else(|| label_slug(row))
        else {
            continue;
        };
        let name = unique(base, &mut taken);
        row.insert(AUTONAME_COLUMN, Cell::text(name));
    }
}

/// Writes `$autovalue` on every choice, unique within its list.
pub fn autovalue_choices(document: &mut ContentDocument) {
    let mut taken: HashMap<String, HashSet<String>> = HashMap::new();
    for row in document.choices.iter_mut() {
        let Some(base) = non_blank(row, NAME_COLUMN).or_else(|| label_slug(row)) else {
            continue;
        };
        let list = row.text(LIST_NAME_COLUMN).unwrap_or_default().to_string();
        let value = unique(base, taken.entry(list).or_default());
        row.insert(AUTOVALUE_COLUMN, Cell::text(value));
    }
}

/// Promotes `$autoname`/`$autovalue` into `name` and drops the helper columns.
pub fn replace_with_autofields(document: &mut ContentDocument) {
    for (rows, helper) in [
        (&mut document.survey, AUTONAME_COLUMN),
        (&mut document.choices, AUTOVALUE_COLUMN),
    ] {
        for row in rows.iter_mut() {
            if let Some(cell) = row.remove(helper) {
                row.insert(NAME_COLUMN, cell);
            }
        }
    }
}
