//! Forest product exports: FOB value by year, product and destination.

use anyhow::Result;
use serde_json::{json, Value};

use super::{TransformUnit, UnitContext};
use crate::aggregate::{aggregate, bucket_rows, grand_total, rank_by, top_key, Bucket, NOT_AVAILABLE};
use crate::config::{InputSpec, Topic};
use crate::document::DashboardDocument;
use crate::kpi::{percent_change, round2, Kpis};
use crate::mapper::{field, map_table, FieldMap, FieldSpec, Transform};
use crate::source::Table;

const INPUTS: &[InputSpec] = &[InputSpec::required(&["exportaciones*.xlsx", "exportaciones*.csv"])];

const FIELDS: &[FieldSpec] = &[
    field("anio", "AÑO", Transform::Integer),
    field("producto", "PRODUCTO", Transform::Text),
    field("pais", "PAÍS DESTINO", Transform::Text),
    field("valorFob", "VALOR FOB (US$)", Transform::Number),
    field("pesoNeto", "PESO NETO (kg)", Transform::Number),
];

const MAP: FieldMap = FieldMap {
    fields: FIELDS,
    identity: &["producto", "anio"],
    excluded: &[],
};

const METRICS: &[&str] = &["valorFob", "pesoNeto"];
const TOP_DESTINATIONS: usize = 10;

fn year_of(bucket: &Bucket) -> i64 {
    bucket.key.parse().unwrap_or(0)
}

/// Year-over-year change of FOB value between the two latest years.
fn annual_change(by_year: &[Bucket]) -> f64 {
    match by_year {
        [.., previous, latest] => percent_change(latest.total(0), previous.total(0)),
        _ => 0.0,
    }
}

pub struct Exportaciones;

impl TransformUnit for Exportaciones {
    fn name(&self) -> &'static str {
        "exportaciones"
    }

    fn topic(&self) -> Topic {
        Topic::Economic
    }

    fn output_file(&self) -> &'static str {
        "exportaciones.json"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
        let records = map_table(&tables[0], &MAP);

        let mut by_year = aggregate(&records, "anio", METRICS);
        by_year.sort_by_key(year_of);
        let by_producto = rank_by(aggregate(&records, "producto", METRICS), 0);
        let by_pais = rank_by(aggregate(&records, "pais", METRICS), 0);

        let latest_year = match by_year.last() {
            Some(bucket) => json!(year_of(bucket)),
            None => json!(NOT_AVAILABLE),
        };

        let mut kpi = Kpis::new()
            .number("valorFobTotal", grand_total(&records, "valorFob"))
            .number("pesoNetoTotal", grand_total(&records, "pesoNeto"))
            .text("productoTop", top_key(&by_producto))
            .text("paisTop", top_key(&by_pais))
            .into_map();
        kpi.insert("anioUltimo".to_string(), latest_year);
        kpi.insert("variacionAnual".to_string(), json!(annual_change(&by_year)));

        let by_anio: Vec<Value> = by_year
            .iter()
            .map(|b| {
                json!({
                    "anio": year_of(b),
                    "registros": b.count,
                    "valorFob": round2(b.total(0)),
                    "pesoNeto": round2(b.total(1)),
                })
            })
            .collect();
        let top_paises = &by_pais[..by_pais.len().min(TOP_DESTINATIONS)];

        let metadata = ctx.metadata(
            "Exportaciones de productos forestales",
            "Registros de exportación (valor FOB y peso neto)",
        );
        Ok(DashboardDocument::new(metadata, kpi)
            .section("byAnio", by_anio)
            .section(
                "byProducto",
                bucket_rows(&by_producto, "producto", Some("registros"), METRICS),
            )
            .section(
                "topPaises",
                bucket_rows(top_paises, "pais", Some("registros"), METRICS),
            ))
    }
}
