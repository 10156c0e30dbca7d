use std::path::PathBuf;

use clap::Parser;

use chargepoint_sim::config::{ConfigError, SimulatorConfig, SinkKind};
use chargepoint_sim::logging::LogFormat;

/// Streams synthetic charge point telemetry into an event sink.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// TOML configuration file.
    #[clap(long, env = "CHARGEPOINT_SIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Built-in preset (`default`, `quick`).
    #[clap(long)]
    pub preset: Option<String>,

    /// Master random seed; drawn from OS entropy when absent.
    #[clap(long, env = "CHARGEPOINT_SIM_SEED")]
    pub seed: Option<u64>,

    /// SQLite database file.
    #[clap(long, env = "CHARGEPOINT_SIM_DATABASE")]
    pub database: Option<PathBuf>,

    /// Keep all events in memory (dry run).
    #[clap(long)]
    pub in_memory: bool,

    #[clap(long, value_enum, default_value_t, env = "CHARGEPOINT_SIM_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Args {
    /// Resolves the configuration: file, then preset, then the default
    /// preset, with command line overrides applied last.
    pub fn load_config(&self) -> Result<SimulatorConfig, ConfigError> {
        let mut config = match (&self.config, &self.preset) {
            (Some(path), _) => SimulatorConfig::from_toml_file(path)?,
            (None, Some(name)) => SimulatorConfig::from_preset(name)?,
            (None, None) => SimulatorConfig::default_preset(),
        };
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(path) = &self.database {
            config.sink.kind = SinkKind::Sqlite;
            config.sink.path = path.clone();
        }
        if self.in_memory {
            config.sink.kind = SinkKind::Memory;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("chargepoint-sim").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_to_default_preset() {
        let config = parse(&[]).load_config().unwrap();
        assert_eq!(config.charge_point.energy_kwh_min, 20.0);
        assert_eq!(config.sink.kind, SinkKind::Sqlite);
    }

    #[test]
    fn overrides_apply_on_top_of_preset() {
        let config = parse(&["--preset", "quick", "--seed", "5", "--in-memory"])
            .load_config()
            .unwrap();
        assert_eq!(config.charge_point.energy_kwh_max, 2.0);
        assert_eq!(config.simulation.seed, Some(5));
        assert_eq!(config.sink.kind, SinkKind::Memory);
    }

    #[test]
    fn database_override_sets_path() {
        let config = parse(&["--database", "/tmp/fleet.db"]).load_config().unwrap();
        assert_eq!(config.sink.path, PathBuf::from("/tmp/fleet.db"));
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        let err = parse(&["--preset", "turbo"]).load_config().unwrap_err();
        assert_eq!(err.field, "preset");
    }

    #[test]
    fn json_log_format_parses() {
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
    }
}
