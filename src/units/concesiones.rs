//! Forest concessions by department, modality and status.

use anyhow::Result;
use serde_json::Value;

use super::{TransformUnit, UnitContext};
use crate::aggregate::{
    aggregate, bucket_rows, count_map, grand_total, rank_by, rank_by_count, top_key, top_total,
};
use crate::config::{InputSpec, Topic};
use crate::document::DashboardDocument;
use crate::kpi::{percent_share, Kpis};
use crate::mapper::{field, map_table, CleanRecord, FieldMap, FieldSpec, Transform};
use crate::source::Table;

const INPUTS: &[InputSpec] = &[InputSpec::required(&["concesiones*.csv", "concesiones*.xlsx"])];

const FIELDS: &[FieldSpec] = &[
    field("departamento", "DEPARTAMENTO", Transform::Text),
    field("titular", "TITULAR", Transform::Text),
    field("modalidad", "MODALIDAD", Transform::Text),
    field("superficie", "SUPERFICIE (ha)", Transform::Number),
    field("estado", "ESTADO", Transform::Token),
];

const MAP: FieldMap = FieldMap {
    fields: FIELDS,
    identity: &["departamento"],
    excluded: &[],
};

const TOP_CONCESSIONS: usize = 10;

/// Largest records by `metric`; equal values keep file order.
fn largest(records: &[CleanRecord], metric: &str, n: usize) -> Vec<CleanRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.number(metric)
            .partial_cmp(&a.number(metric))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

pub struct Concesiones;

impl TransformUnit for Concesiones {
    fn name(&self) -> &'static str {
        "concesiones"
    }

    fn topic(&self) -> Topic {
        Topic::Spatial
    }

    fn output_file(&self) -> &'static str {
        "concesiones.json"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
        let records = map_table(&tables[0], &MAP);

        let by_departamento = rank_by(aggregate(&records, "departamento", &["superficie"]), 0);
        let by_modalidad = rank_by(aggregate(&records, "modalidad", &["superficie"]), 0);
        let by_estado = rank_by_count(aggregate(&records, "estado", &[]));
        let vigentes = records
            .iter()
            .filter(|r| r.text("estado") == "VIGENTE")
            .count();

        let kpi = Kpis::new()
            .count("totalConcesiones", records.len())
            .number("superficieTotal", grand_total(&records, "superficie"))
            .count("departamentos", by_departamento.len())
            .text("departamentoTop", top_key(&by_departamento))
            .number("superficieDepartamentoTop", top_total(&by_departamento, 0))
            .number("pctVigentes", percent_share(vigentes as f64, records.len() as f64))
            .into_map();

        let top: Vec<Value> = largest(&records, "superficie", TOP_CONCESSIONS)
            .iter()
            .map(|r| serde_json::to_value(r))
            .collect::<Result<_, _>>()?;

        let metadata = ctx.metadata(
            "Concesiones forestales",
            "Catastro de concesiones forestales otorgadas",
        );
        Ok(DashboardDocument::new(metadata, kpi)
            .section(
                "byDepartamento",
                bucket_rows(&by_departamento, "departamento", Some("concesiones"), &["superficie"]),
            )
            .section(
                "byModalidad",
                bucket_rows(&by_modalidad, "modalidad", Some("concesiones"), &["superficie"]),
            )
            .section("byEstado", count_map(&by_estado))
            .section("topConcesiones", top))
    }
}
