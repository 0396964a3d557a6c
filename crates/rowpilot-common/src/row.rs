//! Row data consumed by the execution loop.
//!
//! A row keeps its columns in document order so that positional references
//! (`col(0)`) address the same column the user sees first in the source file.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    /// Locale-independent rendering used for template substitution.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Integer(i) => write!(f, "{}", i),
            // f64's Display never switches to exponent notation.
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// One record of the loaded dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    columns: Vec<(String, CellValue)>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut row = Self::new();
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    /// Insert a column. A repeated name overwrites the value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((name, value)),
        }
    }

    /// Exact (case and whitespace sensitive) lookup by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// 0-based positional lookup.
    pub fn get_index(&self, index: usize) -> Option<(&str, &CellValue)> {
        self.columns.get(index).map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for RowData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A cell as it appears in the source document, before nested objects are
/// flattened into dotted column names.
enum RawCell {
    Scalar(CellValue),
    Nested(Vec<(String, RawCell)>),
}

struct RawCellVisitor;

impl<'de> Visitor<'de> for RawCellVisitor {
    type Value = RawCell;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar cell value or a nested object")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Integer(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(match i64::try_from(v) {
            Ok(i) => CellValue::Integer(i),
            Err(_) => CellValue::Float(v as f64),
        }))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Text(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Text(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<RawCell, E> {
        Ok(RawCell::Scalar(CellValue::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawCell, D::Error> {
        deserializer.deserialize_any(RawCellVisitor)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawCell, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, RawCell>()? {
            entries.push((key, value));
        }
        Ok(RawCell::Nested(entries))
    }
}

impl<'de> Deserialize<'de> for RawCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawCellVisitor)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawCell::deserialize(deserializer)? {
            RawCell::Scalar(value) => Ok(value),
            RawCell::Nested(_) => Err(de::Error::custom(
                "nested objects cannot be used as a single cell value",
            )),
        }
    }
}

fn flatten_into(row: &mut RowData, prefix: &str, entries: Vec<(String, RawCell)>) {
    for (key, cell) in entries {
        let name = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        match cell {
            RawCell::Scalar(value) => row.insert(name, value),
            RawCell::Nested(inner) => flatten_into(row, &name, inner),
        }
    }
}

impl<'de> Deserialize<'de> for RowData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawCell::deserialize(deserializer)? {
            RawCell::Nested(entries) => {
                let mut row = RowData::new();
                flatten_into(&mut row, "", entries);
                Ok(row)
            }
            RawCell::Scalar(_) => Err(de::Error::custom("a row must be an object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rendering_has_no_exponent() {
        assert_eq!(CellValue::Float(1e20).to_string(), "100000000000000000000");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Integer(1234567).to_string(), "1234567");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut row = RowData::from_pairs([("a", 1i64), ("b", 2i64)]);
        row.insert("a", 3i64);
        assert_eq!(row.get_index(0), Some(("a", &CellValue::Integer(3))));
        assert_eq!(row.len(), 2);
    }
}
