//! Group-by-key reductions and stable ranking.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::clean::{is_total_label, normalize_token};
use crate::kpi::round2;
use crate::mapper::CleanRecord;

/// Fallback name for "top entity" KPIs over empty data.
pub const NOT_AVAILABLE: &str = "N/A";

/// Accumulated totals for one grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Display name: the first spelling seen for this key.
    pub key: String,
    pub count: usize,
    /// One running sum per metric, in the order the metrics were requested.
    pub totals: Vec<f64>,
}

impl Bucket {
    pub fn total(&self, metric: usize) -> f64 {
        self.totals.get(metric).copied().unwrap_or(0.0)
    }
}

/// Groups `records` by `key_field` and sums `metrics`, keeping first-seen order.
///
/// Keys are compared case- and accent-insensitively; records whose key is
/// blank or a total label (`TOTAL`, `SUBTOTAL`, ...) are skipped.
pub fn aggregate(records: &[CleanRecord], key_field: &str, metrics: &[&str]) -> Vec<Bucket> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for record in records {
        let key = record.text(key_field).trim().to_string();
        if key.is_empty() || is_total_label(&key) {
            continue;
        }
        let slot = *index.entry(normalize_token(&key)).or_insert_with(|| {
            buckets.push(Bucket {
                key,
                count: 0,
                totals: vec![0.0; metrics.len()],
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        bucket.count += 1;
        for (total, metric) in bucket.totals.iter_mut().zip(metrics) {
            *total += record.number(metric);
        }
    }
    buckets
}

/// Sorts by the given metric total, descending. Ties keep their input order.
pub fn rank_by(mut buckets: Vec<Bucket>, metric: usize) -> Vec<Bucket> {
    buckets.sort_by(|a, b| compare_desc(a.total(metric), b.total(metric)));
    buckets
}

/// Sorts by record count, descending. Ties keep their input order.
pub fn rank_by_count(mut buckets: Vec<Bucket>) -> Vec<Bucket> {
    buckets.sort_by(|a, b| b.count.cmp(&a.count));
    buckets
}

fn compare_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Key of the first ranked bucket, or `"N/A"`.
pub fn top_key(ranked: &[Bucket]) -> String {
    ranked
        .first()
        .map(|b| b.key.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn top_total(ranked: &[Bucket], metric: usize) -> f64 {
    ranked.first().map(|b| b.total(metric)).unwrap_or(0.0)
}

pub fn grand_total(records: &[CleanRecord], metric: &str) -> f64 {
    records.iter().map(|r| r.number(metric)).sum()
}

/// Renders buckets as JSON objects: `{ <key_name>: key, <count_name>: count, <metric>: total, ... }`.
/// Totals are rounded to two decimals.
pub fn bucket_rows(
    buckets: &[Bucket],
    key_name: &str,
    count_name: Option<&str>,
    metric_names: &[&str],
) -> Vec<Value> {
    buckets
        .iter()
        .map(|bucket| {
            let mut row = Map::new();
            row.insert(key_name.to_string(), Value::from(bucket.key.clone()));
            if let Some(name) = count_name {
                row.insert(name.to_string(), Value::from(bucket.count));
            }
            for (i, name) in metric_names.iter().enumerate() {
                row.insert(name.to_string(), Value::from(round2(bucket.total(i))));
            }
            Value::Object(row)
        })
        .collect()
}

/// `{ key: count }` in first-seen order.
pub fn count_map(buckets: &[Bucket]) -> Map<String, Value> {
    buckets
        .iter()
        .map(|b| (b.key.clone(), Value::from(b.count)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::FieldValue;

    fn rec(dep: &str, sup: f64) -> CleanRecord {
        let mut r = CleanRecord::default();
        r.insert("departamento", FieldValue::Text(dep.to_string()));
        r.insert("superficie", FieldValue::Number(sup));
        r
    }

    #[test]
    fn totals_cover_every_record_of_the_key() {
        let records = vec![
            rec("Loreto", 10.0),
            rec("Ucayali", 5.0),
            rec("LORETO", 2.5),
            rec("", 100.0),
            rec("Loreto", 0.5),
        ];
        let buckets = aggregate(&records, "departamento", &["superficie"]);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "Loreto");
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets[0].total(0), 13.0);
        assert_eq!(buckets[1].total(0), 5.0);
    }

    #[test]
    fn total_keys_never_form_a_bucket() {
        let records = vec![
            rec("China", 100.0),
            rec("TOTAL", 900.0),
            rec("Total General", 900.0),
            rec("subtotal", 50.0),
        ];
        let ranked = rank_by(aggregate(&records, "departamento", &["superficie"]), 0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(top_key(&ranked), "China");
        assert_eq!(top_total(&ranked, 0), 100.0);
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let records = vec![
            rec("Piura", 7.0),
            rec("Cusco", 9.0),
            rec("Junín", 7.0),
            rec("Puno", 7.0),
        ];
        let ranked = rank_by(aggregate(&records, "departamento", &["superficie"]), 0);
        let keys: Vec<&str> = ranked.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["Cusco", "Piura", "Junín", "Puno"]);
    }

    #[test]
    fn count_ranking_is_stable_for_ties() {
        let records = vec![rec("A", 1.0), rec("B", 1.0), rec("B", 1.0), rec("C", 1.0)];
        let ranked = rank_by_count(aggregate(&records, "departamento", &[]));
        let keys: Vec<&str> = ranked.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }

    #[test]
    fn empty_input_falls_back_to_not_available() {
        let ranked = rank_by(aggregate(&[], "departamento", &["superficie"]), 0);
        assert_eq!(top_key(&ranked), "N/A");
        assert_eq!(top_total(&ranked, 0), 0.0);
    }

    #[test]
    fn bucket_rows_use_requested_names() {
        let buckets = aggregate(&[rec("Loreto", 1.234)], "departamento", &["superficie"]);
        let rows = bucket_rows(&buckets, "departamento", Some("concesiones"), &["superficie"]);
        assert_eq!(
            rows[0],
            serde_json::json!({"departamento": "Loreto", "concesiones": 1, "superficie": 1.23})
        );
    }
}
