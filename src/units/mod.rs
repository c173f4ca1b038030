//! Registry of transformation units and the read → build → write step they share.

use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;

use crate::config::{EtlConfig, InputSpec, Topic};
use crate::document::{write_document, DashboardDocument, Metadata};
use crate::error::EtlError;
use crate::source::{read_table, Table};

mod concesiones;
mod entidades;
mod exportaciones;
mod plantaciones;
mod produccion;

pub use concesiones::Concesiones;
pub use entidades::Entidades;
pub use exportaciones::Exportaciones;
pub use plantaciones::Plantaciones;
pub use produccion::Produccion;

/// One dataset pipeline: source tables in, one dashboard document out.
pub trait TransformUnit {
    fn name(&self) -> &'static str;
    fn topic(&self) -> Topic;
    /// File name under the topic directory.
    fn output_file(&self) -> &'static str;
    fn inputs(&self) -> &'static [InputSpec];
    /// Builds the document from the located tables, one per declared input.
    fn build(&self, tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument>;
}

/// What a unit sees of the batch: the shared config and its resolved sources.
pub struct UnitContext<'a> {
    pub config: &'a EtlConfig,
    pub sources: Vec<PathBuf>,
}

impl UnitContext<'_> {
    pub fn metadata(&self, title: &str, source: &str) -> Metadata {
        let source_file = self
            .sources
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        Metadata {
            title: title.to_string(),
            source: source.to_string(),
            last_updated: self.config.as_of.clone(),
            source_file,
        }
    }
}

/// Result of a unit that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Written { path: PathBuf, rows: usize },
    /// An optional input was absent; existing output is left untouched.
    Skipped { reason: String },
}

/// Units in the order the batch runs them.
pub fn registry() -> Vec<Box<dyn TransformUnit>> {
    vec![
        Box::new(Entidades),
        Box::new(Concesiones),
        Box::new(Plantaciones),
        Box::new(Produccion),
        Box::new(Exportaciones),
    ]
}

/// Keeps the registry units named in `names` (all of them when empty),
/// preserving registry order.
pub fn select(
    units: Vec<Box<dyn TransformUnit>>,
    names: &[String],
) -> Result<Vec<Box<dyn TransformUnit>>> {
    if names.is_empty() {
        return Ok(units);
    }
    let known: Vec<&str> = units.iter().map(|u| u.name()).collect();
    if let Some(unknown) = names.iter().find(|n| !known.contains(&n.as_str())) {
        return Err(EtlError::UnknownUnit {
            name: unknown.clone(),
            known: known.join(", "),
        }
        .into());
    }
    Ok(units
        .into_iter()
        .filter(|u| names.iter().any(|n| n == u.name()))
        .collect())
}

/// Locates and reads inputs, builds the document and writes it.
pub fn execute(unit: &dyn TransformUnit, config: &EtlConfig) -> Result<UnitOutcome> {
    let mut sources = Vec::new();
    for spec in unit.inputs() {
        match spec.locate(&config.data_dir) {
            Some(path) => sources.push(path),
            None => {
                let missing = EtlError::MissingInput {
                    unit: unit.name().to_string(),
                    dir: config.data_dir.clone(),
                    patterns: spec.candidates.iter().map(|c| c.to_string()).collect(),
                };
                if spec.required || config.strict {
                    return Err(missing.into());
                }
                warn!("{}. Skipping unit.", missing);
                return Ok(UnitOutcome::Skipped {
                    reason: missing.to_string(),
                });
            }
        }
    }

    let tables = sources
        .iter()
        .map(|path| read_table(path))
        .collect::<Result<Vec<_>>>()?;
    let rows = tables.iter().map(Table::len).sum();

    let ctx = UnitContext { config, sources };
    let document = unit.build(&tables, &ctx)?;
    let path = config.output_path(unit.topic(), unit.output_file());
    write_document(&path, &document)?;
    info!("{}: {} source rows -> {}", unit.name(), rows, path.display());
    Ok(UnitOutcome::Written { path, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_and_outputs_are_unique() {
        let units = registry();
        let mut names: Vec<&str> = units.iter().map(|u| u.name()).collect();
        let mut outputs: Vec<String> = units
            .iter()
            .map(|u| format!("{}/{}", u.topic().dir_name(), u.output_file()))
            .collect();
        names.sort();
        names.dedup();
        outputs.sort();
        outputs.dedup();
        assert_eq!(names.len(), units.len());
        assert_eq!(outputs.len(), units.len());
    }

    #[test]
    fn select_keeps_registry_order_and_rejects_unknown_names() {
        let picked = select(registry(), &["exportaciones".into(), "entidades".into()]).unwrap();
        let names: Vec<&str> = picked.iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["entidades", "exportaciones"]);

        let err = select(registry(), &["bosques".into()]).err().unwrap();
        assert!(err.to_string().contains("unknown unit 'bosques'"));
    }
}
