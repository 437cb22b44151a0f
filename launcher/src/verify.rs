use std::time::Duration;

use anyhow::Context;
use replibench_core::prelude::{Connection, ConnectionProvider, Endpoint};
use replibench_heartbeat::prelude::{FlushReport, HeartbeatOptions, ReplicationFlusher};
use replibench_sqlite::prelude::SqliteProvider;

use crate::cli::VerifyArgs;
use crate::load::{compare, load, simple_insert, TableComparison};

/// Everything a verification session found out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub flushes: Vec<FlushReport>,
    /// Empty unless every flush succeeded and comparison was requested.
    pub comparisons: Vec<TableComparison>,
}

impl VerifyReport {
    pub fn timed_out(&self) -> usize {
        self.flushes.iter().filter(|r| !r.flushed).count()
    }

    pub fn mismatched(&self) -> usize {
        self.comparisons.iter().filter(|c| !c.matches()).count()
    }
}

fn endpoint(
    url: &str,
    user: Option<&str>,
    password: Option<&str>,
    schema: Option<&str>,
) -> Endpoint {
    let mut endpoint = Endpoint::new(url);
    if let Some(user) = user {
        endpoint = endpoint.with_user(user);
    }
    if let Some(password) = password {
        endpoint = endpoint.with_password(password);
    }
    if let Some(schema) = schema {
        endpoint = endpoint.with_schema(schema);
    }
    endpoint
}

impl VerifyArgs {
    pub fn primary_endpoint(&self) -> Endpoint {
        endpoint(
            &self.primary,
            self.primary_user.as_deref(),
            self.primary_password.as_deref(),
            self.schema.as_deref(),
        )
    }

    pub fn replica_endpoint(&self) -> Endpoint {
        endpoint(
            &self.replica,
            self.replica_user.as_deref(),
            self.replica_password.as_deref(),
            self.schema.as_deref(),
        )
    }
}

fn connect(
    provider: &SqliteProvider,
    endpoint: &Endpoint,
) -> anyhow::Result<Box<dyn Connection>> {
    provider
        .open(endpoint)
        .with_context(|| format!("Failed to connect to {}", endpoint.url))
}

/// Load test data on the primary, run `args.flushes` flushes, then compare the test data on both
/// sides once the replica has caught up.
///
/// A flush that times out does not stop the session but skips the comparison.
pub fn run(args: &VerifyArgs) -> anyhow::Result<VerifyReport> {
    let provider = SqliteProvider::new();
    let primary_endpoint = args.primary_endpoint();
    let replica_endpoint = args.replica_endpoint();

    let tables = simple_insert();
    let mut data_primary = connect(&provider, &primary_endpoint)?;
    let mut data_replica = connect(&provider, &replica_endpoint)?;
    if !args.no_load {
        log::info!("Loading {} on the primary", tables.names().join(", "));
        let replica_ddl: Option<&mut dyn Connection> = if args.no_ddl_replication {
            Some(data_replica.as_mut())
        } else {
            None
        };
        load(&tables, data_primary.as_mut(), replica_ddl).context("Failed to load test data")?;
    }

    let flushes = flush(args, &provider, &primary_endpoint, &replica_endpoint)?;

    let caught_up = flushes.iter().all(|r| r.flushed);
    let comparisons = if args.compare && !args.no_load && caught_up {
        compare(&tables, data_primary.as_mut(), data_replica.as_mut())
            .context("Failed to compare test data")?
    } else {
        Vec::new()
    };

    for conn in [data_primary, data_replica] {
        if let Err(e) = conn.close() {
            log::warn!("Failed to close connection: {e}");
        }
    }

    Ok(VerifyReport {
        flushes,
        comparisons,
    })
}

fn flush(
    args: &VerifyArgs,
    provider: &SqliteProvider,
    primary_endpoint: &Endpoint,
    replica_endpoint: &Endpoint,
) -> anyhow::Result<Vec<FlushReport>> {
    let primary = connect(provider, primary_endpoint)?;
    let replica = connect(provider, replica_endpoint)?;

    let options = HeartbeatOptions {
        table: args.table.clone(),
        ddl_replication: !args.no_ddl_replication,
        ..Default::default()
    };
    let mut flusher = ReplicationFlusher::new(primary, replica, options)?;
    if let Err(e) = flusher.prepare() {
        flusher.cleanup();
        return Err(e.into());
    }

    let timeout = Duration::from_secs(args.timeout);
    let mut reports = Vec::with_capacity(args.flushes as usize);
    for _ in 0..args.flushes {
        let report = match flusher.flush_with_report(timeout) {
            Ok(report) => report,
            Err(e) => {
                flusher.cleanup();
                return Err(e.into());
            }
        };
        match report.lag {
            Some(lag) if report.flushed => {
                println!("Flushed seqno {} in {:.3}s", report.seqno, lag.as_secs_f64())
            }
            _ => println!(
                "Replica did not reach seqno {} within {}s",
                report.seqno, args.timeout
            ),
        }
        reports.push(report);
    }

    flusher.cleanup();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replibench_core::prelude::Value;

    fn verify_args(primary: String, replica: String) -> VerifyArgs {
        VerifyArgs {
            primary,
            replica,
            primary_user: None,
            primary_password: None,
            replica_user: None,
            replica_password: None,
            schema: None,
            timeout: 1,
            flushes: 2,
            no_ddl_replication: false,
            table: "monitor_heartbeat".to_string(),
            no_load: false,
            compare: true,
        }
    }

    fn sqlite_url(dir: &tempfile::TempDir, name: &str) -> String {
        format!("sqlite:{}", dir.path().join(name).display())
    }

    #[test]
    fn same_database_flushes_and_matches() {
        let dir = tempfile::tempdir().unwrap();
        let url = sqlite_url(&dir, "primary.db");

        let report = run(&verify_args(url.clone(), url)).unwrap();
        assert_eq!(
            vec![1, 2],
            report.flushes.iter().map(|r| r.seqno).collect::<Vec<_>>()
        );
        assert_eq!(0, report.timed_out());
        assert_eq!(1, report.comparisons.len());
        assert_eq!(100, report.comparisons[0].replica_rows);
        assert_eq!(0, report.mismatched());
    }

    #[test]
    fn detached_replica_times_out_without_comparing() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = verify_args(
            sqlite_url(&dir, "primary.db"),
            sqlite_url(&dir, "replica.db"),
        );
        args.no_ddl_replication = true;
        args.flushes = 1;

        let report = run(&args).unwrap();
        assert_eq!(1, report.timed_out());
        assert_eq!(None, report.flushes[0].lag);
        assert!(report.comparisons.is_empty());
    }

    #[test]
    fn diverged_replica_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let url = sqlite_url(&dir, "primary.db");
        let mut args = verify_args(url.clone(), url);
        args.flushes = 1;
        run(&args).unwrap();

        // A replica that lost one row.
        let provider = SqliteProvider::new();
        let replica_url = sqlite_url(&dir, "replica.db");
        let mut replica = provider.open(&Endpoint::new(&replica_url)).unwrap();
        let mut primary = provider.open(&Endpoint::new(&args.primary)).unwrap();
        let tables = simple_insert();
        load(&tables, replica.as_mut(), None).unwrap();
        replica
            .execute_update("DELETE FROM simple_insert WHERE id = ?", &[Value::Integer(42)])
            .unwrap();

        let comparisons = compare(&tables, primary.as_mut(), replica.as_mut()).unwrap();
        let report = VerifyReport {
            flushes: Vec::new(),
            comparisons,
        };
        assert_eq!(1, report.mismatched());
        assert_eq!(99, report.comparisons[0].replica_rows);
        assert_eq!(Some(42), report.comparisons[0].first_difference);
    }

    #[test]
    fn endpoints_carry_credentials() {
        let mut args = verify_args("sqlite:a.db".to_string(), "sqlite:b.db".to_string());
        args.primary_user = Some("tungsten".to_string());
        args.replica_password = Some("secret".to_string());
        args.schema = Some("bench".to_string());

        assert_eq!(
            Endpoint::new("sqlite:a.db")
                .with_user("tungsten")
                .with_schema("bench"),
            args.primary_endpoint()
        );
        assert_eq!(
            Endpoint::new("sqlite:b.db")
                .with_password("secret")
                .with_schema("bench"),
            args.replica_endpoint()
        );
    }
}
