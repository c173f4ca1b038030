//! Registered forest plantations by region and species.

use anyhow::Result;

use super::{TransformUnit, UnitContext};
use crate::aggregate::{aggregate, bucket_rows, grand_total, rank_by, top_key, top_total};
use crate::config::{InputSpec, Topic};
use crate::document::DashboardDocument;
use crate::kpi::{percent_share, Kpis};
use crate::mapper::{field, map_table, FieldMap, FieldSpec, Transform};
use crate::source::Table;

// The plantation registry is published irregularly.
const INPUTS: &[InputSpec] = &[InputSpec::optional(&["plantaciones*.csv", "plantaciones*.xlsx"])];

const FIELDS: &[FieldSpec] = &[
    field("region", "REGIÓN", Transform::Text),
    field("especie", "ESPECIE", Transform::Text),
    field("superficie", "SUPERFICIE (ha)", Transform::Number),
    field("plantones", "N° PLANTONES", Transform::Integer),
];

const MAP: FieldMap = FieldMap {
    fields: FIELDS,
    identity: &["region"],
    excluded: &[],
};

const METRICS: &[&str] = &["superficie", "plantones"];

pub struct Plantaciones;

impl TransformUnit for Plantaciones {
    fn name(&self) -> &'static str {
        "plantaciones"
    }

    fn topic(&self) -> Topic {
        Topic::Spatial
    }

    fn output_file(&self) -> &'static str {
        "plantaciones.json"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
        let records = map_table(&tables[0], &MAP);
        let by_region = rank_by(aggregate(&records, "region", METRICS), 0);
        let by_especie = rank_by(aggregate(&records, "especie", METRICS), 0);
        let superficie_total = grand_total(&records, "superficie");

        let kpi = Kpis::new()
            .number("superficieTotal", superficie_total)
            .number("plantonesTotal", grand_total(&records, "plantones"))
            .count("regiones", by_region.len())
            .text("regionTop", top_key(&by_region))
            .text("especieTop", top_key(&by_especie))
            .number(
                "pctRegionTop",
                percent_share(top_total(&by_region, 0), superficie_total),
            )
            .into_map();

        let metadata = ctx.metadata(
            "Plantaciones forestales",
            "Registro nacional de plantaciones forestales",
        );
        Ok(DashboardDocument::new(metadata, kpi)
            .section("byRegion", bucket_rows(&by_region, "region", Some("plantaciones"), METRICS))
            .section("byEspecie", bucket_rows(&by_especie, "especie", Some("plantaciones"), METRICS)))
    }
}
