//! Sequential batch execution with per-unit failure isolation.

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::config::EtlConfig;
use crate::units::{execute, TransformUnit, UnitOutcome};

/// Lifecycle of one unit inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitState {
    Pending,
    Running,
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl UnitState {
    pub fn is_failure(&self) -> bool {
        matches!(self, UnitState::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub name: &'static str,
    pub state: UnitState,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, UnitState::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitState::Skipped(_)))
    }

    pub fn failed(&self) -> Vec<&'static str> {
        self.units
            .iter()
            .filter(|u| u.state.is_failure())
            .map(|u| u.name)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.units.iter().all(|u| !u.state.is_failure())
    }

    /// Process exit status: 0 only when no unit failed.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    fn count(&self, pred: impl Fn(&UnitState) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.state)).count()
    }
}

pub fn format_elapsed(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{}m {:.0}s", duration.as_secs() / 60, secs % 60.0)
    }
}

/// Runs one unit, turning errors and panics into a `Failed` state.
fn run_isolated(unit: &dyn TransformUnit, config: &EtlConfig) -> UnitState {
    let result = panic::catch_unwind(AssertUnwindSafe(|| execute(unit, config)));
    match result {
        Ok(Ok(UnitOutcome::Written { .. })) => UnitState::Succeeded,
        Ok(Ok(UnitOutcome::Skipped { reason })) => UnitState::Skipped(reason),
        Ok(Err(e)) => {
            error!("Unit '{}' failed: {:#}", unit.name(), e);
            UnitState::Failed(format!("{:#}", e))
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Unit '{}' panicked: {}", unit.name(), message);
            UnitState::Failed(format!("panic: {}", message))
        }
    }
}

/// Runs every unit in order; a failing unit never stops the ones after it.
pub fn run_batch(units: &[Box<dyn TransformUnit>], config: &EtlConfig) -> BatchReport {
    let start_time = Instant::now();
    let mut report = BatchReport {
        units: units
            .iter()
            .map(|u| UnitReport {
                name: u.name(),
                state: UnitState::Pending,
                elapsed: Duration::ZERO,
            })
            .collect(),
        elapsed: Duration::ZERO,
    };

    let progress_bar = if log::log_enabled!(log::Level::Info) {
        ProgressBar::new(units.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress_bar.set_style(style.progress_chars("=> "));
    }

    for (unit, entry) in units.iter().zip(report.units.iter_mut()) {
        entry.state = UnitState::Running;
        progress_bar.set_message(format!("running {}", unit.name()));
        info!("Running unit '{}'", unit.name());

        let unit_start = Instant::now();
        entry.state = run_isolated(unit.as_ref(), config);
        entry.elapsed = unit_start.elapsed();

        let status = match &entry.state {
            UnitState::Succeeded => "OK",
            UnitState::Skipped(_) => "SKIP",
            _ => "ERR",
        };
        progress_bar.inc(1);
        progress_bar.set_message(format!(
            "{}: {} ({})",
            status,
            unit.name(),
            format_elapsed(entry.elapsed)
        ));
    }

    report.elapsed = start_time.elapsed();
    progress_bar.finish_with_message(format!(
        "Batch finished. {} OK, {} skipped, {} errors.",
        report.succeeded(),
        report.skipped(),
        report.failed().len()
    ));
    report
}

pub fn print_final_summary(report: &BatchReport) {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(report.elapsed));
    info!("Units run: {}", report.units.len());
    info!("Units succeeded: {}", report.succeeded());
    if report.skipped() > 0 {
        warn!("Units skipped (missing optional input): {}", report.skipped());
    }
    let failed = report.failed();
    if failed.is_empty() {
        info!("All units completed without errors.");
    } else {
        error!("Units failed: {} of {}", failed.len(), report.units.len());
        for unit in &report.units {
            if let UnitState::Failed(reason) = &unit.state {
                error!("  - {}: {}", unit.name, reason);
            }
        }
    }
    info!("-------------------------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputSpec, Topic};
    use crate::document::DashboardDocument;
    use crate::source::Table;
    use crate::units::UnitContext;
    use anyhow::Result;
    use serde_json::Map;
    use tempfile::tempdir;

    struct Fixed {
        name: &'static str,
        behavior: &'static str,
    }

    const NO_INPUTS: &[InputSpec] = &[];
    const OPTIONAL_MISSING: &[InputSpec] = &[InputSpec::optional(&["nada*.csv"])];

    impl TransformUnit for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn topic(&self) -> Topic {
            Topic::Sector
        }
        fn output_file(&self) -> &'static str {
            self.name
        }
        fn inputs(&self) -> &'static [InputSpec] {
            if self.behavior == "skip" {
                OPTIONAL_MISSING
            } else {
                NO_INPUTS
            }
        }
        fn build(&self, _tables: &[Table], ctx: &UnitContext<'_>) -> Result<DashboardDocument> {
            match self.behavior {
                "error" => anyhow::bail!("boom"),
                "panic" => panic!("unexpected layout"),
                _ => Ok(DashboardDocument::new(ctx.metadata("t", "s"), Map::new())),
            }
        }
    }

    fn unit(name: &'static str, behavior: &'static str) -> Box<dyn TransformUnit> {
        Box::new(Fixed { name, behavior })
    }

    #[test]
    fn failures_do_not_stop_later_units() {
        let dir = tempdir().unwrap();
        let config = EtlConfig::new(dir.path(), dir.path().join("out"));
        let units = vec![
            unit("a.json", "ok"),
            unit("b.json", "error"),
            unit("c.json", "panic"),
            unit("d.json", "skip"),
            unit("e.json", "ok"),
        ];
        let report = run_batch(&units, &config);

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), vec!["b.json", "c.json"]);
        assert_eq!(report.exit_code(), 1);
        assert!(dir.path().join("out/datos-sectoriales/e.json").exists());
        assert!(!dir.path().join("out/datos-sectoriales/d.json").exists());
    }

    #[test]
    fn strict_mode_fails_missing_optional_input() {
        let dir = tempdir().unwrap();
        let config = EtlConfig::new(dir.path(), dir.path().join("out")).with_strict(true);
        let report = run_batch(&[unit("d.json", "skip")], &config);
        assert_eq!(report.failed(), vec!["d.json"]);
    }

    #[test]
    fn empty_batch_succeeds() {
        let report = run_batch(&[], &EtlConfig::default());
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_secs(2)), "2.00s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
    }
}
