//! Directory of public forestry authorities, split by government level.

use anyhow::Result;
use log::warn;
use serde_json::{json, Value};

use super::{TransformUnit, UnitContext};
use crate::aggregate::{aggregate, rank_by_count, top_key};
use crate::config::{InputSpec, Topic};
use crate::document::DashboardDocument;
use crate::kpi::Kpis;
use crate::mapper::{field, map_table, CleanRecord, FieldMap, FieldSpec, Transform};
use crate::source::Table;

const INPUTS: &[InputSpec] = &[InputSpec::required(&["entidades*.csv", "entidades*.xlsx"])];

const FIELDS: &[FieldSpec] = &[
    field("entidad", "ENTIDAD", Transform::Text),
    field("nivel", "NIVEL", Transform::Token),
    field("region", "REGIÓN", Transform::Text),
    field("enlace", "ENLACE", Transform::Link),
];

// Entries without a link are useless in a link directory.
const MAP: FieldMap = FieldMap {
    fields: FIELDS,
    identity: &["entidad", "enlace"],
    excluded: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    National,
    Regional,
    Other,
}

fn level_of(token: &str) -> Level {
    match token {
        "NACIONAL" | "GOBIERNO NACIONAL" => Level::National,
        "REGIONAL" | "GOBIERNO REGIONAL" => Level::Regional,
        _ if token.starts_with("REGIONAL") => Level::Regional,
        _ => Level::Other,
    }
}

fn entry(record: &CleanRecord) -> Value {
    json!({
        "entidad": record.text("entidad"),
        "region": record.text("region"),
        "enlace": record.text("enlace"),
    })
}

pub struct Entidades;

impl TransformUnit for Entidades {
    fn name(&self) -> &'static str {
        "entidades"
    }

    fn topic(&self) -> Topic {
        Topic::Regulatory
    }

    fn output_file(&self) -> &'static str {
        "entidades.json"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
        let records = map_table(&tables[0], &MAP);

        let mut nacional = Vec::new();
        let mut regional: Vec<CleanRecord> = Vec::new();
        let mut others = 0usize;
        for record in records {
            match level_of(&record.text("nivel")) {
                Level::National => nacional.push(entry(&record)),
                Level::Regional => regional.push(record),
                Level::Other => others += 1,
            }
        }
        if others > 0 {
            warn!("entidades: {} rows with an unrecognized NIVEL were left out", others);
        }

        let by_region = rank_by_count(aggregate(&regional, "region", &[]));
        let regional: Vec<Value> = regional.iter().map(entry).collect();

        let kpi = Kpis::new()
            .count("totalEntidades", nacional.len() + regional.len())
            .count("nacionales", nacional.len())
            .count("regionales", regional.len())
            .count("regionesCubiertas", by_region.len())
            .text("regionTop", top_key(&by_region))
            .into_map();

        let metadata = ctx.metadata(
            "Entidades del sector forestal",
            "Directorio de autoridades forestales nacionales y regionales",
        );
        Ok(DashboardDocument::new(metadata, kpi).section(
            "byNivel",
            json!({ "nacional": nacional, "regional": regional }),
        ))
    }
}
