//! Command-line interface handling for the Legacy server.
//!
//! Flags given here override the matching values from the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for this instance's name
    pub instance: Option<String>,
    /// Whether this instance runs master-only duties
    pub master: bool,
}

impl CliArgs {
    /// Parses the process arguments. Exits with clap's usage message when
    /// they are malformed.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, for embedding and tests.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            instance: matches.get_one::<String>("instance").cloned(),
            master: matches.get_flag("master"),
        }
    }
}

fn command() -> Command {
    Command::new("Legacy Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Persistent-world server core with replicated caches and spatial claims")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("instance")
                .short('i')
                .long("instance")
                .value_name("NAME")
                .help("Name of this server instance"),
        )
        .arg(
            Arg::new("master")
                .long("master")
                .help("Run as the master instance")
                .action(clap::ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let args = CliArgs::try_parse_from(["legacy_server"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert!(args.log_level.is_none());
        assert!(!args.json_logs);
        assert!(!args.master);
    }

    #[test]
    fn overrides_are_parsed() {
        let args = CliArgs::try_parse_from([
            "legacy_server",
            "--config",
            "prod.toml",
            "-l",
            "debug",
            "--json-logs",
            "--instance",
            "survival-2",
            "--master",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.instance.as_deref(), Some("survival-2"));
        assert!(args.master);
    }
}
