pub mod monitor;
pub mod once;
pub mod saved;
pub mod serve;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::Args;

use tablestat_core::{Level, LoadSource, Monitor, MonitorConfig, SourceKind};

/// Options shared by every subcommand: what to watch and where files go.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Cluster descriptor (e.g. ZooKeeper quorum); keys the saved-file names
    #[arg(long, default_value = "synthetic")]
    pub target: String,

    /// Only show entities whose name contains this string
    #[arg(long)]
    pub filter: Option<String>,

    /// Grouping level: server, table or region
    #[arg(long, default_value = "table")]
    pub level: Level,

    /// Seconds between iterations (at least 0.1)
    #[arg(long, default_value = "3.0", value_parser = parse_interval)]
    pub interval: Duration,

    /// Replay a CSV log instead of generating synthetic load
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Number of synthetic entities
    #[arg(long, default_value = "12")]
    pub entities: usize,

    /// Seed for synthetic load
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Directory for saved baselines
    #[arg(long, default_value = ".")]
    pub save_dir: PathBuf,

    /// Append every iteration to this CSV file
    #[arg(long)]
    pub log: Option<PathBuf>,
}

impl SourceArgs {
    pub fn to_config(&self) -> MonitorConfig {
        let source = match &self.replay {
            Some(path) => SourceKind::Replay { path: path.clone() },
            None => SourceKind::Synthetic {
                entities: self.entities,
                seed: self.seed,
            },
        };
        MonitorConfig {
            target: self.target.clone(),
            entity_filter: self.filter.clone(),
            level: self.level,
            interval: self.interval,
            save_dir: self.save_dir.clone(),
            log_path: self.log.clone(),
            source,
        }
    }
}

/// Seconds as a [`Duration`], clamped to 100ms. Rejects NaN, infinity and
/// negative values.
fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("invalid number of seconds '{s}'"))?;
    if !secs.is_finite() || secs.is_sign_negative() {
        return Err(format!("interval must be a finite, non-negative number, got {s}"));
    }
    Duration::try_from_secs_f64(secs.max(0.1)).map_err(|e| format!("interval {s}: {e}"))
}

/// Open the configured source and build a monitor at the source's level.
/// Exits the process on failure.
pub fn make_monitor(args: &SourceArgs) -> (Arc<Monitor>, Box<dyn LoadSource>) {
    let mut config = args.to_config();
    let source = match tablestat_core::open_source(
        &config.source,
        config.level,
        config.entity_filter.as_deref(),
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening source: {e}");
            std::process::exit(1);
        }
    };
    // A replayed log decides its own level.
    config.level = source.level();

    match Monitor::new(config) {
        Ok(m) => (Arc::new(m), source),
        Err(e) => {
            eprintln!("Error starting monitor: {e}");
            std::process::exit(1);
        }
    }
}

/// Run the poll loop on a background thread.
pub fn spawn_poll_loop(monitor: &Arc<Monitor>, mut source: Box<dyn LoadSource>) -> JoinHandle<()> {
    let monitor = Arc::clone(monitor);
    std::thread::spawn(move || monitor.run_poll_loop(source.as_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        source: SourceArgs,
    }

    #[test]
    fn defaults_build_synthetic_config() {
        let args = Harness::parse_from(["tablestat"]).source;
        let config = args.to_config();
        assert_eq!(config.level, Level::Table);
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(
            config.source,
            SourceKind::Synthetic {
                entities: 12,
                seed: 42
            }
        );
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Harness::parse_from([
            "tablestat",
            "--level",
            "region",
            "--filter",
            "usertable",
            "--replay",
            "run.csv",
            "--interval",
            "0.5",
        ])
        .source;
        let config = args.to_config();
        assert_eq!(config.level, Level::Region);
        assert_eq!(config.entity_filter.as_deref(), Some("usertable"));
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(
            config.source,
            SourceKind::Replay {
                path: PathBuf::from("run.csv")
            }
        );
    }

    #[test]
    fn interval_is_clamped_and_validated() {
        let args = Harness::parse_from(["tablestat", "--interval", "0.01"]).source;
        assert_eq!(args.to_config().interval, Duration::from_millis(100));
        for bad in ["inf", "NaN", "-1", "1e400", "1e300", "soon"] {
            assert!(
                Harness::try_parse_from(["tablestat", "--interval", bad]).is_err(),
                "{bad}"
            );
        }
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert!(Harness::try_parse_from(["tablestat", "--level", "cluster"]).is_err());
    }
}
