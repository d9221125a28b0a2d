//! Stable row keys and the derived backward-link chain over the survey sheet.
//!
//! Array order is authoritative; the `$prev` chain is regenerated from it on
//! demand and never read back.

use std::collections::HashSet;

use uuid::Uuid;

use crate::document::{ContentDocument, SheetKind};
use crate::row::{Cell, Scalar};

pub const KUID_COLUMN: &str = "$kuid";
pub const PREV_COLUMN: &str = "$prev";
pub const KUID_LEN: usize = 9;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Returns an opaque random token of `len` alphanumeric characters.
pub fn random_id(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let mut entropy = Uuid::new_v4().as_u128();
        // A v4 uuid carries 122 random bits; 20 base-62 digits stay within them.
        for _ in 0..20 {
            if out.len() == len {
                break;
            }
            let digit = (entropy % ALPHABET.len() as u128) as usize;
            out.push(char::from(ALPHABET[digit]));
            entropy /= ALPHABET.len() as u128;
        }
    }
    out
}

/// Writes a fresh key into every survey and choices row lacking one.
/// Existing keys are never overwritten. Returns the number of keys written.
pub fn assign_keys(document: &mut ContentDocument) -> usize {
    let mut assigned = 0;
    for kind in SheetKind::ALL {
        let rows = document.sheet_mut(kind);
        let mut taken = rows
            .iter()
            .filter_map(|row| row.text(KUID_COLUMN))
            .map(str::to_string)
            .collect::<HashSet<_>>();
        for row in rows.iter_mut() {
            if row.contains(KUID_COLUMN) {
                continue;
            }
            let key = loop {
                let candidate = random_id(KUID_LEN);
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
            };
            row.insert(KUID_COLUMN, Cell::text(key));
            assigned += 1;
        }
    }
    if assigned > 0 {
        tracing::debug!(assigned, "assigned row keys");
    }
    assigned
}

/// Rewrites `$prev` on every survey row to match the current array order.
/// Must be called again after any reordering of the survey.
pub fn link(document: &mut ContentDocument) {
    let mut previous: Option<Scalar> = None;
    for row in document.survey.iter_mut() {
        let key = row
            .get(KUID_COLUMN)
            .and_then(Cell::as_scalar)
            .cloned()
            .unwrap_or(Scalar::Null);
        row.insert(PREV_COLUMN, Cell::Scalar(previous.take().unwrap_or(Scalar::Null)));
        previous = Some(key);
    }
}

/// Drops the `$prev` chain from the survey.
pub fn unlink(document: &mut ContentDocument) {
    for row in document.survey.iter_mut() {
        row.remove(PREV_COLUMN);
    }
}

/// Removes row keys from survey and choices.
///
/// Keys left in place leak into downstream consumers as if they were
/// user-visible columns; cascading selects stop rendering, for one.
pub fn strip_keys(document: &mut ContentDocument) {
    for kind in SheetKind::ALL {
        for row in document.sheet_mut(kind).iter_mut() {
            row.remove(KUID_COLUMN);
        }
    }
}
