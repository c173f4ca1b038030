//! Declarative column-to-key mapping and row inclusion rules.

use log::{debug, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::clean::{
    clean_integer, clean_number, clean_percent, clean_text, ensure_http, is_total_label,
    normalize_token,
};
use crate::source::{RawRecord, Table};

/// How a source cell is turned into an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Text,
    /// Accent-free, upper-cased token (for categorical codes like levels or status).
    Token,
    Number,
    Percent,
    Integer,
    Link,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub column: &'static str,
    pub transform: Transform,
}

pub const fn field(key: &'static str, column: &'static str, transform: Transform) -> FieldSpec {
    FieldSpec {
        key,
        column,
        transform,
    }
}

/// Field map for one source file plus its inclusion predicate.
///
/// A row is kept only if every `identity` field is non-empty (non-zero for
/// numeric fields) and no identity text is one of `excluded`. Summary rows,
/// where any text field is a total label (`TOTAL`, `TOTAL GENERAL`,
/// `SUBTOTAL`), are always dropped.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub fields: &'static [FieldSpec],
    pub identity: &'static [&'static str],
    pub excluded: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
}

impl FieldValue {
    fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Number(n) => *n == 0.0,
            FieldValue::Integer(i) => *i == 0,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
        }
    }
}

/// One cleaned row; serializes as a JSON object in field-map order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanRecord {
    fields: Vec<(&'static str, FieldValue)>,
}

impl CleanRecord {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Text of a field; numbers are rendered (years used as keys).
    pub fn text(&self, key: &str) -> String {
        match self.get(key) {
            Some(FieldValue::Text(s)) => s.clone(),
            Some(FieldValue::Number(n)) => crate::clean::format_number(*n),
            Some(FieldValue::Integer(i)) => i.to_string(),
            None => String::new(),
        }
    }

    /// Numeric value of a field; text and missing fields count as zero.
    pub fn number(&self, key: &str) -> f64 {
        match self.get(key) {
            Some(FieldValue::Number(n)) => *n,
            Some(FieldValue::Integer(i)) => *i as f64,
            _ => 0.0,
        }
    }

    fn is_summary_row(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, v)| matches!(v, FieldValue::Text(t) if is_total_label(t)))
    }

    pub fn insert(&mut self, key: &'static str, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }
}

impl Serialize for CleanRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn apply(transform: Transform, record: &RawRecord<'_>, column: &str) -> FieldValue {
    let cell = record.get(column);
    match transform {
        Transform::Text => FieldValue::Text(clean_text(cell)),
        Transform::Token => FieldValue::Text(normalize_token(&clean_text(cell))),
        Transform::Number => FieldValue::Number(clean_number(cell)),
        Transform::Percent => FieldValue::Number(clean_percent(cell)),
        Transform::Integer => FieldValue::Integer(clean_integer(cell)),
        Transform::Link => FieldValue::Text(ensure_http(&clean_text(cell))),
    }
}

/// Maps one raw row, or `None` when it fails the inclusion predicate.
pub fn map_record(record: &RawRecord<'_>, map: &FieldMap) -> Option<CleanRecord> {
    let mut clean = CleanRecord::default();
    for spec in map.fields {
        clean.insert(spec.key, apply(spec.transform, record, spec.column));
    }
    if clean.is_summary_row() {
        return None;
    }
    if map.identity.iter().all(|key| passes_identity(&clean, key, map.excluded)) {
        Some(clean)
    } else {
        None
    }
}

fn passes_identity(record: &CleanRecord, key: &str, excluded: &[&str]) -> bool {
    let value = match record.get(key) {
        Some(v) => v,
        None => return false,
    };
    if value.is_blank() {
        return false;
    }
    if let FieldValue::Text(text) = value {
        let token = normalize_token(text);
        if excluded.iter().any(|term| normalize_token(term) == token) {
            return false;
        }
    }
    true
}

/// Maps every row of `table`, warning once per column the file lacks.
pub fn map_table(table: &Table, map: &FieldMap) -> Vec<CleanRecord> {
    for spec in map.fields {
        if table.column(spec.column).is_none() {
            warn!(
                "Column '{}' not found in {}; field '{}' will use its default",
                spec.column,
                table.path.display(),
                spec.key
            );
        }
    }

    let records: Vec<CleanRecord> = table
        .records()
        .filter_map(|record| map_record(&record, map))
        .collect();
    debug!(
        "{}: kept {} of {} rows",
        table.path.display(),
        records.len(),
        table.len()
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Cell;
    use std::path::PathBuf;

    const FIELDS: &[FieldSpec] = &[
        field("region", "REGIÓN", Transform::Text),
        field("superficie", "SUPERFICIE (ha)", Transform::Number),
        field("plantones", "N° PLANTONES", Transform::Integer),
        field("web", "WEB", Transform::Link),
    ];
    const MAP: FieldMap = FieldMap {
        fields: FIELDS,
        identity: &["region"],
        excluded: &["Resumen"],
    };

    fn table(rows: &[[&str; 4]]) -> Table {
        Table {
            path: PathBuf::from("test.csv"),
            headers: ["REGIÓN", "SUPERFICIE (ha)", "N° PLANTONES", "WEB"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|c| if c.is_empty() { Cell::Empty } else { Cell::Text(c.to_string()) })
                        .collect()
                })
                .collect(),
        }
    }

    #[test]
    fn maps_fields_and_drops_total_and_blank_rows() {
        let t = table(&[
            ["Loreto", "1,500.5", "2,000", "loreto.gob.pe"],
            ["", "10", "1", ""],
            ["TOTAL", "99", "9", ""],
            ["total  general", "99", "9", ""],
            ["No Aplica", "5", "1", ""],
            ["resumen", "7", "1", ""],
            ["Ucayali", "No Aplica", "abc", ""],
        ]);
        let records = map_table(&t, &MAP);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("region"), "Loreto");
        assert_eq!(records[0].number("superficie"), 1500.5);
        assert_eq!(records[0].get("plantones"), Some(&FieldValue::Integer(2000)));
        assert_eq!(records[0].text("web"), "https://loreto.gob.pe");
        assert_eq!(records[1].number("superficie"), 0.0);
        assert_eq!(records[1].number("plantones"), 0.0);
    }

    #[test]
    fn total_label_outside_identity_drops_the_row() {
        let by_surface = FieldMap {
            identity: &["superficie"],
            ..MAP
        };
        let t = table(&[["Loreto", "10", "1", ""], ["Subtotal", "900", "9", ""]]);
        let records = map_table(&t, &by_surface);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].number("superficie"), 10.0);
    }

    #[test]
    fn record_serializes_in_field_order() {
        let t = table(&[["Piura", "3", "4", ""]]);
        let records = map_table(&t, &MAP);
        let json = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(
            json,
            r#"{"region":"Piura","superficie":3.0,"plantones":4,"web":""}"#
        );
    }

    #[test]
    fn renamed_column_cleans_to_default() {
        let mut t = table(&[["Cusco", "12", "1", ""]]);
        t.headers[1] = "AREA".to_string();
        let records = map_table(&t, &MAP);
        assert_eq!(records[0].number("superficie"), 0.0);
    }
}
