//! Timber production volume by species and department.

use anyhow::Result;
use serde_json::{Map, Value};

use super::{TransformUnit, UnitContext};
use crate::aggregate::{aggregate, grand_total, rank_by, top_key, top_total, Bucket};
use crate::config::{InputSpec, Topic};
use crate::document::DashboardDocument;
use crate::kpi::{percent_share, round2, Kpis};
use crate::mapper::{field, map_table, FieldMap, FieldSpec, Transform};
use crate::source::Table;

const INPUTS: &[InputSpec] = &[InputSpec::required(&["produccion*.csv", "produccion*.xlsx"])];

const FIELDS: &[FieldSpec] = &[
    field("departamento", "DEPARTAMENTO", Transform::Text),
    field("especie", "ESPECIE", Transform::Text),
    field("volumen", "VOLUMEN (m³)", Transform::Number),
    field("participacion", "PARTICIPACIÓN", Transform::Percent),
];

const MAP: FieldMap = FieldMap {
    fields: FIELDS,
    identity: &["especie"],
    excluded: &[],
};

const TOP_SPECIES: usize = 10;

/// Rows with each bucket's volume share of `total`.
fn share_rows(buckets: &[Bucket], key_name: &str, total: f64) -> Vec<Value> {
    buckets
        .iter()
        .map(|b| {
            let mut row = Map::new();
            row.insert(key_name.to_string(), Value::from(b.key.clone()));
            row.insert("registros".to_string(), Value::from(b.count));
            row.insert("volumen".to_string(), Value::from(round2(b.total(0))));
            row.insert(
                "participacion".to_string(),
                Value::from(percent_share(b.total(0), total)),
            );
            Value::Object(row)
        })
        .collect()
}

pub struct Produccion;

impl TransformUnit for Produccion {
    fn name(&self) -> &'static str {
        "produccion"
    }

    fn topic(&self) -> Topic {
        Topic::Sector
    }

    fn output_file(&self) -> &'static str {
        "produccion-madera.json"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
        let records = map_table(&tables[0], &MAP);
        let by_especie = rank_by(aggregate(&records, "especie", &["volumen"]), 0);
        let by_departamento = rank_by(aggregate(&records, "departamento", &["volumen"]), 0);
        let volumen_total = grand_total(&records, "volumen");

        let kpi = Kpis::new()
            .number("volumenTotal", volumen_total)
            .count("especies", by_especie.len())
            .text("especieTop", top_key(&by_especie))
            .number("volumenEspecieTop", top_total(&by_especie, 0))
            .number(
                "participacionTop",
                percent_share(top_total(&by_especie, 0), volumen_total),
            )
            .text("departamentoTop", top_key(&by_departamento))
            .into_map();

        let especies = share_rows(&by_especie, "especie", volumen_total);
        let top10: Vec<Value> = especies.iter().take(TOP_SPECIES).cloned().collect();
        let detalle = serde_json::to_value(&records)?;

        let metadata = ctx.metadata(
            "Producción de madera rolliza",
            "Anuario forestal: producción por especie y departamento",
        );
        Ok(DashboardDocument::new(metadata, kpi)
            .section("byEspecie", especies)
            .section(
                "byDepartamento",
                share_rows(&by_departamento, "departamento", volumen_total),
            )
            .section("top10Especies", top10)
            .section("detalle", detalle))
    }
}
