use std::fmt;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identity;
use crate::row::{Cell, Row};

pub const SURVEY: &str = "survey";
pub const CHOICES: &str = "choices";
pub const SETTINGS: &str = "settings";
pub const TRANSLATIONS: &str = "translations";
pub const TRANSLATED: &str = "translated";

/// Form-level metadata (identifier, default language, title, version, ...).
pub type Settings = IndexMap<String, Value>;

/// Row-bearing sheets of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    Survey,
    Choices,
}

impl SheetKind {
    pub const ALL: [SheetKind; 2] = [SheetKind::Survey, SheetKind::Choices];

    pub fn as_str(self) -> &'static str {
        match self {
            SheetKind::Survey => SURVEY,
            SheetKind::Choices => CHOICES,
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One language variant of labelled content. `Unnamed` marks a form with a
/// single undeclared language and may only appear first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Translation {
    Unnamed,
    Named(String),
}

impl Translation {
    pub fn named(name: impl Into<String>) -> Self {
        Translation::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Translation::Unnamed => None,
            Translation::Named(name) => Some(name),
        }
    }

    pub fn is_unnamed(&self) -> bool {
        matches!(self, Translation::Unnamed)
    }
}

impl From<Option<String>> for Translation {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) => Translation::Named(name),
            None => Translation::Unnamed,
        }
    }
}

impl From<Translation> for Option<String> {
    fn from(value: Translation) -> Self {
        match value {
            Translation::Unnamed => None,
            Translation::Named(name) => Some(name),
        }
    }
}

impl From<&str> for Translation {
    fn from(value: &str) -> Self {
        Translation::Named(value.to_string())
    }
}

impl fmt::Display for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Translation::Unnamed => f.write_str("<unnamed>"),
            Translation::Named(name) => f.write_str(name),
        }
    }
}

/// Whether row and settings keys carry a meaningful order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOrder {
    /// Keys arrive in whatever order the producer used.
    #[default]
    Unordered,
    /// Key order is significant and must survive flattening.
    Preserved,
}

/// Shape errors found while normalizing untrusted input.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error(
        "malformed document: {sheet} row {row} column '{column}' holds {found} translated values, expected {expected}"
    )]
    MisalignedTranslation {
        sheet: SheetKind,
        row: usize,
        column: String,
        expected: usize,
        found: usize,
    },
}

/// In-memory form definition: ordered sheets plus translation metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentDocument {
    pub survey: Vec<Row>,
    pub choices: Vec<Row>,
    pub settings: Settings,
    pub translations: Vec<Translation>,
    /// Columns whose cells are arrays aligned with `translations`.
    pub translated: Vec<String>,
    /// Any other top-level sheets, carried through untouched.
    pub extra_sheets: IndexMap<String, Value>,
    pub(crate) key_order: KeyOrder,
}

impl ContentDocument {
    /// Parses a loosely-typed structure, validates it, and assigns row keys.
    ///
    /// Normalizing the serialized form of an already-normalized document
    /// yields an equal document.
    pub fn normalize(raw: Value) -> Result<Self, DocumentError> {
        let mut document = Self::from_value(raw)?;
        identity::assign_keys(&mut document);
        Ok(document)
    }

    /// Parses and validates without assigning row keys.
    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let mut root = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(DocumentError::MalformedDocument(format!(
                    "content must be a mapping, found {}",
                    kind_of(&other)
                )));
            }
        };

        let translations = parse_translations(root.shift_remove(TRANSLATIONS))?;
        let translated = parse_translated(root.shift_remove(TRANSLATED))?;
        let settings = coerce_settings(root.shift_remove(SETTINGS));
        let survey = parse_sheet(SheetKind::Survey, root.shift_remove(SURVEY), &translated)?;
        let choices = parse_sheet(SheetKind::Choices, root.shift_remove(CHOICES), &translated)?;

        let document = Self {
            survey,
            choices,
            settings,
            translations,
            translated,
            extra_sheets: root.into_iter().collect(),
            key_order: KeyOrder::Unordered,
        };
        document.check_alignment()?;
        Ok(document)
    }

    pub fn key_order(&self) -> KeyOrder {
        self.key_order
    }

    /// Marks key order as significant.
    pub fn into_ordered(mut self) -> Self {
        self.key_order = KeyOrder::Preserved;
        self
    }

    pub fn sheet(&self, kind: SheetKind) -> &[Row] {
        match kind {
            SheetKind::Survey => &self.survey,
            SheetKind::Choices => &self.choices,
        }
    }

    pub fn sheet_mut(&mut self, kind: SheetKind) -> &mut Vec<Row> {
        match kind {
            SheetKind::Survey => &mut self.survey,
            SheetKind::Choices => &mut self.choices,
        }
    }

    pub fn is_translated(&self, column: &str) -> bool {
        self.translated.iter().any(|name| name == column)
    }

    /// Names of the declared translations, skipping the unnamed sentinel.
    pub fn translation_names(&self) -> Vec<&str> {
        self.translations
            .iter()
            .filter_map(Translation::name)
            .collect()
    }

    pub fn has_unnamed_translation(&self) -> bool {
        self.translations.iter().any(Translation::is_unnamed)
    }

    /// Value for a column that is missing from a row: one empty slot per
    /// translation for translated columns, empty text otherwise.
    pub fn blank_cell(&self, column: &str) -> Cell {
        if self.is_translated(column) {
            Cell::Translated(vec!["".into(); self.translations.len()])
        } else {
            Cell::text("")
        }
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Verifies that every translated array matches the translation count.
    pub fn check_alignment(&self) -> Result<(), DocumentError> {
        let expected = self.translations.len();
        for kind in SheetKind::ALL {
            for (index, row) in self.sheet(kind).iter().enumerate() {
                for column in &self.translated {
                    if let Some(values) = row.get(column).and_then(Cell::as_translated)
                        && values.len() != expected
                    {
                        return Err(DocumentError::MisalignedTranslation {
                            sheet: kind,
                            row: index,
                            column: column.clone(),
                            expected,
                            found: values.len(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            SURVEY.into(),
            Value::Array(self.survey.iter().map(Row::to_value).collect()),
        );
        map.insert(
            CHOICES.into(),
            Value::Array(self.choices.iter().map(Row::to_value).collect()),
        );
        map.insert(
            SETTINGS.into(),
            Value::Object(self.settings.clone().into_iter().collect()),
        );
        map.insert(
            TRANSLATIONS.into(),
            Value::Array(
                self.translations
                    .iter()
                    .map(|translation| match translation.name() {
                        Some(name) => Value::String(name.to_string()),
                        None => Value::Null,
                    })
                    .collect(),
            ),
        );
        map.insert(
            TRANSLATED.into(),
            Value::Array(self.translated.iter().cloned().map(Value::String).collect()),
        );
        for (name, sheet) in &self.extra_sheets {
            map.insert(name.clone(), sheet.clone());
        }
        Value::Object(map)
    }
}

impl Serialize for ContentDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5 + self.extra_sheets.len()))?;
        map.serialize_entry(SURVEY, &self.survey)?;
        map.serialize_entry(CHOICES, &self.choices)?;
        map.serialize_entry(SETTINGS, &self.settings)?;
        map.serialize_entry(TRANSLATIONS, &self.translations)?;
        map.serialize_entry(TRANSLATED, &self.translated)?;
        for (name, sheet) in &self.extra_sheets {
            map.serialize_entry(name, sheet)?;
        }
        map.end()
    }
}

/// Settings may arrive as a mapping, as a list wrapping one, or as junk.
fn coerce_settings(raw: Option<Value>) -> Settings {
    let candidate = match raw {
        Some(Value::Array(items)) => items.into_iter().next(),
        other => other,
    };
    match candidate {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => Settings::new(),
    }
}

fn parse_translations(raw: Option<Value>) -> Result<Vec<Translation>, DocumentError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(DocumentError::MalformedDocument(format!(
                "translations must be a sequence, found {}",
                kind_of(&other)
            )));
        }
    };

    let mut translations = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let translation = match item {
            Value::Null => Translation::Unnamed,
            Value::String(name) => Translation::Named(name),
            other => {
                return Err(DocumentError::MalformedDocument(format!(
                    "translation {index} must be a string or null, found {}",
                    kind_of(&other)
                )));
            }
        };
        if translation.is_unnamed() && index != 0 {
            return Err(DocumentError::MalformedDocument(
                "unnamed translation must be first in list of translations".into(),
            ));
        }
        if translations.contains(&translation) {
            return Err(DocumentError::MalformedDocument(format!(
                "duplicate translation '{translation}'"
            )));
        }
        translations.push(translation);
    }
    Ok(translations)
}

fn parse_translated(raw: Option<Value>) -> Result<Vec<String>, DocumentError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(DocumentError::MalformedDocument(format!(
                "translated must be a sequence, found {}",
                kind_of(&other)
            )));
        }
    };
    let mut columns: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(column) = item else {
            return Err(DocumentError::MalformedDocument(
                "translated column names must be strings".into(),
            ));
        };
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    Ok(columns)
}

fn parse_sheet(
    kind: SheetKind,
    raw: Option<Value>,
    translated: &[String],
) -> Result<Vec<Row>, DocumentError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(DocumentError::MalformedDocument(format!(
                "{kind} must be a sequence of rows, found {}",
                kind_of(&other)
            )));
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(Row::from_map(map, translated)),
            other => Err(DocumentError::MalformedDocument(format!(
                "{kind} row {index} must be a mapping, found {}",
                kind_of(&other)
            ))),
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
