use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ReplibenchCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configuration of a benchmark properties file against a database.
    Bench(BenchArgs),
    /// Check that a replica has caught up with a primary.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Path to a TOML properties file.
    ///
    /// Keys set to a list of values are expanded, one run per combination.
    #[clap(long)]
    pub config: PathBuf,

    /// Override a property from the configuration file, as `key=value`.
    ///
    /// Separate several values with `|` to make the key variable, e.g. `threads=1|2|4`.
    /// May be given more than once.
    #[clap(long = "set", value_parser = parse_property_override)]
    pub overrides: Vec<(String, String)>,

    /// Append a JSON line per completed run to this file.
    #[clap(long)]
    pub jsonl: Option<PathBuf>,

    /// Write a tab separated report of every run to this file.
    #[clap(long)]
    pub text: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Print a table of iteration timings after each run.
    #[clap(long, default_value = "false")]
    pub summary_table: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Connection URL of the primary database.
    #[clap(long)]
    pub primary: String,

    /// Connection URL of the replica database.
    #[clap(long)]
    pub replica: String,

    #[clap(long)]
    pub primary_user: Option<String>,

    #[clap(long)]
    pub primary_password: Option<String>,

    #[clap(long)]
    pub replica_user: Option<String>,

    #[clap(long)]
    pub replica_password: Option<String>,

    /// Schema to use on both databases.
    #[clap(long)]
    pub schema: Option<String>,

    /// Seconds to wait for the replica on each flush.
    #[clap(long, default_value = "60")]
    pub timeout: u64,

    /// Number of flushes to perform.
    #[clap(long, default_value = "1")]
    pub flushes: u32,

    /// Create the heartbeat table on the replica too, for replication that does not carry `CREATE TABLE`.
    #[clap(long, default_value = "false")]
    pub no_ddl_replication: bool,

    /// Name of the heartbeat table.
    #[clap(long, default_value = "monitor_heartbeat")]
    pub table: String,

    /// Do not write the `simple_insert` test table on the primary before flushing.
    #[clap(long, default_value = "false")]
    pub no_load: bool,

    /// Compare the test table on both sides once the replica has caught up.
    #[clap(long, default_value = "true", action = clap::ArgAction::Set)]
    pub compare: bool,
}

fn parse_property_override(s: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or(anyhow::anyhow!("Expected `key=value`, got `{s}`"))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("No key specified in `{s}`");
    }

    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn property_override() {
        assert_eq!(
            ("threads".to_string(), "1|2".to_string()),
            parse_property_override("threads = 1|2").unwrap()
        );
        assert_eq!(
            ("url".to_string(), "sqlite:a=b.db".to_string()),
            parse_property_override("url=sqlite:a=b.db").unwrap()
        );
    }

    #[test]
    fn malformed_override() {
        assert!(parse_property_override("threads").is_err());
        assert!(parse_property_override("=4").is_err());
    }

    #[test]
    fn bench_arguments() {
        let cli = ReplibenchCli::try_parse_from([
            "replibench",
            "bench",
            "--config",
            "bench.toml",
            "--set",
            "threads=4",
            "--set",
            "scenario=readSimple",
            "--no-progress",
        ])
        .unwrap();

        let Command::Bench(args) = cli.command else {
            panic!("Expected the bench command");
        };
        assert_eq!(PathBuf::from("bench.toml"), args.config);
        assert_eq!(
            vec![
                ("threads".to_string(), "4".to_string()),
                ("scenario".to_string(), "readSimple".to_string()),
            ],
            args.overrides
        );
        assert!(args.no_progress);
        assert!(!args.summary_table);
        assert_eq!(None, args.jsonl);
    }

    #[test]
    fn verify_defaults() {
        let cli = ReplibenchCli::try_parse_from([
            "replibench",
            "verify",
            "--primary",
            "sqlite:primary.db",
            "--replica",
            "sqlite:replica.db",
        ])
        .unwrap();

        let Command::Verify(args) = cli.command else {
            panic!("Expected the verify command");
        };
        assert_eq!(60, args.timeout);
        assert_eq!(1, args.flushes);
        assert!(!args.no_ddl_replication);
        assert_eq!("monitor_heartbeat", args.table);
        assert!(!args.no_load);
        assert!(args.compare);
        assert_eq!(None, args.primary_user);
        assert_eq!(None, args.schema);
    }

    #[test]
    fn verify_credentials() {
        let cli = ReplibenchCli::try_parse_from([
            "replibench",
            "verify",
            "--primary",
            "sqlite:primary.db",
            "--replica",
            "sqlite:replica.db",
            "--primary-user",
            "tungsten",
            "--replica-password",
            "secret",
            "--schema",
            "bench",
            "--compare",
            "false",
        ])
        .unwrap();

        let Command::Verify(args) = cli.command else {
            panic!("Expected the verify command");
        };
        assert_eq!(Some("tungsten".to_string()), args.primary_user);
        assert_eq!(None, args.primary_password);
        assert_eq!(Some("secret".to_string()), args.replica_password);
        assert_eq!(Some("bench".to_string()), args.schema);
        assert!(!args.compare);
    }
}
