use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Single scalar value held by a cell or by one slot of a translated array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl Scalar {
    /// Returns `None` when the value is an array or object.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(flag) => Some(Scalar::Bool(*flag)),
            Value::Number(number) => Some(Scalar::Number(number.clone())),
            Value::String(text) => Some(Scalar::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(flag) => Value::Bool(*flag),
            Scalar::Number(number) => Value::Number(number.clone()),
            Scalar::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Textual rendering used when a value has to become plain text; null renders empty.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(flag) => flag.to_string(),
            Scalar::Number(number) => number.to_string(),
            Scalar::Text(text) => text.clone(),
        }
    }

    /// Spreadsheet truthiness: null, empty text, `false` and zero are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Bool(flag) => !flag,
            Scalar::Number(number) => number.as_f64() == Some(0.0),
            Scalar::Text(text) => text.is_empty(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Value stored under one column of a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Scalar(Scalar),
    /// One slot per entry of the document's translation list.
    Translated(Vec<Scalar>),
    /// Nested structure that is neither a scalar nor a translated array.
    Opaque(Value),
}

impl Cell {
    /// Classifies a raw value. Arrays of scalars only become `Translated`
    /// when the column is listed as translated.
    pub fn from_value(value: Value, translated: bool) -> Self {
        if let Some(scalar) = Scalar::from_value(&value) {
            return Cell::Scalar(scalar);
        }
        if translated && let Value::Array(items) = &value {
            let scalars = items.iter().map(Scalar::from_value).collect::<Option<Vec<_>>>();
            if let Some(scalars) = scalars {
                return Cell::Translated(scalars);
            }
        }
        Cell::Opaque(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Scalar(Scalar::Text(value.into()))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Cell::Scalar(scalar) => scalar.to_value(),
            Cell::Translated(values) => Value::Array(values.iter().map(Scalar::to_value).collect()),
            Cell::Opaque(value) => value.clone(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Cell::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_translated(&self) -> Option<&[Scalar]> {
        match self {
            Cell::Translated(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_translated_mut(&mut self) -> Option<&mut Vec<Scalar>> {
        match self {
            Cell::Translated(values) => Some(values),
            _ => None,
        }
    }

    /// First slot of a translated cell, or the scalar itself.
    pub fn primary(&self) -> Option<&Scalar> {
        match self {
            Cell::Scalar(scalar) => Some(scalar),
            Cell::Translated(values) => values.first(),
            Cell::Opaque(_) => None,
        }
    }
}

impl From<Scalar> for Cell {
    fn from(value: Scalar) -> Self {
        Cell::Scalar(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

/// One record of the survey or choices sheet, keyed by column name in insertion order.
///
/// Equality ignores column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: IndexMap<String, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from a raw JSON object, classifying cells against the translated column set.
    pub fn from_map(map: Map<String, Value>, translated: &[String]) -> Self {
        let cells = map
            .into_iter()
            .map(|(column, value)| {
                let is_translated = translated.iter().any(|name| name == &column);
                let cell = Cell::from_value(value, is_translated);
                (column, cell)
            })
            .collect();
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Cell> {
        self.cells.get_mut(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Text of a scalar cell.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Cell::as_str)
    }

    /// Inserts or replaces a cell; replacing keeps the column's position.
    pub fn insert(&mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Option<Cell> {
        self.cells.insert(column.into(), cell.into())
    }

    pub fn remove(&mut self, column: &str) -> Option<Cell> {
        self.cells.shift_remove(column)
    }

    /// Moves a cell to a new column name in place. Returns `false` when `from` is absent.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if !self.cells.contains_key(from) {
            return false;
        }
        if from == to {
            return true;
        }
        self.cells.shift_remove(to);
        let Some((index, _, cell)) = self.cells.shift_remove_full(from) else {
            return false;
        };
        self.cells.shift_insert(index, to.to_string(), cell);
        true
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Cell) -> bool) {
        self.cells.retain(|column, cell| keep(column, cell));
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(column, cell)| (column.as_str(), cell))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Cell)> {
        self.cells
            .iter_mut()
            .map(|(column, cell)| (column.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reorders columns by a sort key; stable for equal keys.
    pub fn sort_columns_by_key<K: Ord>(&mut self, mut key: impl FnMut(&str) -> K) {
        self.cells.sort_by_cached_key(|column, _| key(column));
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.cells
                .iter()
                .map(|(column, cell)| (column.clone(), cell.to_value()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (&'a str, Cell)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(column, cell)| (column.to_string(), cell))
                .collect(),
        }
    }
}
