use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use replibench_core::prelude::{Connection, DbError, Value};
use replibench_instruments::{ReportMetric, Reporter};
use replibench_runner::prelude::{
    ConfigError, HookResult, RunConfiguration, Scenario, ScenarioFactory, WorkerContext,
};

use crate::generator::ColumnType;
use crate::session::{in_transaction, with_connection, Session};
use crate::settings::{at_least_one, KEY_REUSEDATA};
use crate::table::{Column, TableSet};

pub const KEY_NUMBER_OF_BRANCHES: &str = "numberOfBranches";
pub const KEY_TELLERS_PER_BRANCH: &str = "tellersPerBranch";
pub const KEY_ACCOUNTS_PER_BRANCH: &str = "accountsPerBranch";
pub const KEY_UPDATE_BRANCH: &str = "updateBranch";
pub const KEY_UPDATE_TELLER: &str = "updateTeller";
pub const KEY_UPDATE_ACCOUNT: &str = "updateAccount";
pub const KEY_INSERT_HISTORY: &str = "insertHistory";
pub const KEY_QUERY_PCT: &str = "queryPCT";
pub const KEY_THINK_MILLIS: &str = "thinkMillis";
pub const KEY_RANDOMIZATION_PCT: &str = "randomizationPct";
pub const KEY_CONNECTION_REFRESH_RATE: &str = "connectionRefreshRate";

/// Each transaction moves an amount in `[-DEBIT_RANGE, DEBIT_RANGE)`.
const DEBIT_RANGE: i64 = 10_000;
const HISTORY_FILLER: &str = "0123456789";

const BRANCH_UPDATE: &str =
    "UPDATE branch SET branch_balance = branch_balance + ?, time_stamp = CURRENT_TIMESTAMP WHERE branch_id = ?";
const TELLER_UPDATE: &str =
    "UPDATE teller SET teller_balance = teller_balance + ?, time_stamp = CURRENT_TIMESTAMP WHERE teller_id = ?";
const ACCOUNT_UPDATE: &str =
    "UPDATE account SET account_balance = account_balance + ?, time_stamp = CURRENT_TIMESTAMP WHERE account_id = ?";
const ACCOUNT_QUERY: &str = "SELECT account_balance FROM account WHERE account_id = ?";
const HISTORY_INSERT: &str =
    "INSERT INTO history (account_id, teller_id, branch_id, amount, time_stamp, filler) VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, ?)";

#[derive(Debug, Clone, PartialEq)]
pub struct TpcbSettings {
    pub number_of_branches: u32,
    pub tellers_per_branch: u32,
    pub accounts_per_branch: u32,
    pub update_branch: bool,
    pub update_teller: bool,
    pub update_account: bool,
    pub insert_history: bool,
    /// Share of iterations, in percent, that read an account balance instead of running a
    /// transaction.
    pub query_pct: f64,
    /// Pause before every iteration.
    pub think: Duration,
    /// Random variation of the think time, in percent of it.
    pub randomization_pct: f64,
    /// Reconnect every this many iterations. Zero keeps one connection for the whole run.
    pub connection_refresh_rate: u64,
    pub reusedata: bool,
}

impl Default for TpcbSettings {
    fn default() -> Self {
        Self {
            number_of_branches: 10,
            tellers_per_branch: 10,
            accounts_per_branch: 10_000,
            update_branch: true,
            update_teller: true,
            update_account: true,
            insert_history: true,
            query_pct: 0.0,
            think: Duration::ZERO,
            randomization_pct: 0.0,
            connection_refresh_rate: 0,
            reusedata: false,
        }
    }
}

impl TpcbSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let query_pct: f64 = config.parse_or(KEY_QUERY_PCT, defaults.query_pct)?;
        if !(0.0..=100.0).contains(&query_pct) {
            return Err(ConfigError::Invalid {
                key: KEY_QUERY_PCT.to_string(),
                value: query_pct.to_string(),
                reason: "must be a percentage between 0 and 100".to_string(),
            });
        }

        Ok(Self {
            number_of_branches: at_least_one(
                KEY_NUMBER_OF_BRANCHES,
                config.parse_or(KEY_NUMBER_OF_BRANCHES, defaults.number_of_branches)?,
            )?,
            tellers_per_branch: at_least_one(
                KEY_TELLERS_PER_BRANCH,
                config.parse_or(KEY_TELLERS_PER_BRANCH, defaults.tellers_per_branch)?,
            )?,
            accounts_per_branch: at_least_one(
                KEY_ACCOUNTS_PER_BRANCH,
                config.parse_or(KEY_ACCOUNTS_PER_BRANCH, defaults.accounts_per_branch)?,
            )?,
            update_branch: config.flag(KEY_UPDATE_BRANCH, defaults.update_branch)?,
            update_teller: config.flag(KEY_UPDATE_TELLER, defaults.update_teller)?,
            update_account: config.flag(KEY_UPDATE_ACCOUNT, defaults.update_account)?,
            insert_history: config.flag(KEY_INSERT_HISTORY, defaults.insert_history)?,
            query_pct,
            think: Duration::from_millis(config.parse_or(KEY_THINK_MILLIS, 0)?),
            randomization_pct: config
                .parse_or(KEY_RANDOMIZATION_PCT, defaults.randomization_pct)?,
            connection_refresh_rate: config
                .parse_or(KEY_CONNECTION_REFRESH_RATE, defaults.connection_refresh_rate)?,
            reusedata: config.flag(KEY_REUSEDATA, defaults.reusedata)?,
        })
    }

    pub fn number_of_accounts(&self) -> i64 {
        self.number_of_branches as i64 * self.accounts_per_branch as i64
    }

    pub fn number_of_tellers(&self) -> i64 {
        self.number_of_branches as i64 * self.tellers_per_branch as i64
    }

    /// The teller and branch an account belongs to.
    pub fn owners_of(&self, account_id: i64) -> (i64, i64) {
        let teller_id = account_id * self.tellers_per_branch as i64 / self.accounts_per_branch as i64;
        let branch_id = account_id / self.accounts_per_branch as i64;
        (teller_id, branch_id)
    }

    /// Think time for one iteration, varied by up to `randomization_pct` either way.
    fn think_time(&self, rng: &mut impl Rng) -> Duration {
        if self.think.is_zero() || self.randomization_pct <= 0.0 {
            return self.think;
        }
        let variance = self.think.as_secs_f64() * self.randomization_pct / 100.0;
        let think = self.think.as_secs_f64() + rng.gen_range(-variance..=variance);
        Duration::from_secs_f64(think.max(0.0))
    }
}

/// Transaction and query counts across every worker of a run.
#[derive(Debug, Default)]
pub struct TpcbStatistics {
    tpcb_count: AtomicU64,
    query_count: AtomicU64,
}

impl TpcbStatistics {
    pub fn tpcb_count(&self) -> u64 {
        self.tpcb_count.load(Ordering::Relaxed)
    }

    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.tpcb_count.store(0, Ordering::Relaxed);
        self.query_count.store(0, Ordering::Relaxed);
    }
}

/// Creates the instances of one run around a shared [TpcbStatistics].
#[derive(Debug, Clone, Default)]
pub struct TpcbFactory {
    statistics: Option<Arc<TpcbStatistics>>,
}

impl TpcbFactory {
    /// Record into `statistics` rather than into a new instance per run.
    pub fn with_statistics(statistics: Arc<TpcbStatistics>) -> Self {
        Self {
            statistics: Some(statistics),
        }
    }
}

impl ScenarioFactory for TpcbFactory {
    fn instantiate(&self, workers: usize) -> Vec<Box<dyn Scenario>> {
        let statistics = self.statistics.clone().unwrap_or_default();
        (0..workers)
            .map(|_| Box::new(Tpcb::new(statistics.clone())) as Box<dyn Scenario>)
            .collect()
    }
}

/// The TPC-B banking transaction: move a random amount through an account, its teller and its
/// branch, and record it in the history table. A share of iterations only reads a balance.
pub struct Tpcb {
    session: Session,
    settings: Option<TpcbSettings>,
    statistics: Arc<TpcbStatistics>,
    reporter: Option<Reporter>,
    xact_count: u64,
}

impl Tpcb {
    pub fn new(statistics: Arc<TpcbStatistics>) -> Self {
        Self {
            session: Session::default(),
            settings: None,
            statistics,
            reporter: None,
            xact_count: 0,
        }
    }

    fn settings(&self) -> anyhow::Result<&TpcbSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))
    }

    fn create_and_populate(settings: &TpcbSettings, conn: &mut dyn Connection) -> Result<(), DbError> {
        log::info!("Creating and populating tables.");
        let filler = ColumnType::Varchar(100);
        let stamp = ColumnType::Timestamp;
        let tables = [
            TableSet::single(
                "branch",
                vec![
                    Column::new("branch_id", ColumnType::Integer).primary_key(),
                    Column::new("branch_balance", ColumnType::Integer),
                    Column::new("filler", filler),
                    Column::new("time_stamp", stamp),
                ],
            ),
            TableSet::single(
                "teller",
                vec![
                    Column::new("teller_id", ColumnType::Integer).primary_key(),
                    Column::new("branch_id", ColumnType::Integer),
                    Column::new("teller_balance", ColumnType::Integer),
                    Column::new("filler", filler),
                    Column::new("time_stamp", stamp),
                ],
            ),
            TableSet::single(
                "account",
                vec![
                    Column::new("account_id", ColumnType::Integer).primary_key(),
                    Column::new("branch_id", ColumnType::Integer),
                    Column::new("account_balance", ColumnType::Integer),
                    Column::new("filler", filler),
                    Column::new("time_stamp", stamp),
                ],
            ),
            TableSet::single(
                "history",
                vec![
                    Column::new("account_id", ColumnType::Integer),
                    Column::new("teller_id", ColumnType::Integer),
                    Column::new("branch_id", ColumnType::Integer),
                    Column::new("amount", ColumnType::Integer),
                    Column::new("time_stamp", stamp),
                    Column::new("filler", ColumnType::Varchar(22)),
                ],
            ),
        ];
        for table in &tables {
            table.create_all(conn)?;
        }

        let filler100 = "X".repeat(100);
        populate(
            conn,
            "INSERT INTO branch VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
            settings.number_of_branches as i64,
            |id| vec![Value::Integer(id), Value::Integer(0), Value::from(filler100.as_str())],
        )?;
        populate(
            conn,
            "INSERT INTO teller VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
            settings.number_of_tellers(),
            |id| {
                vec![
                    Value::Integer(id),
                    Value::Integer(id / settings.tellers_per_branch as i64),
                    Value::Integer(0),
                    Value::from(filler100.as_str()),
                ]
            },
        )?;
        populate(
            conn,
            "INSERT INTO account VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
            settings.number_of_accounts(),
            |id| {
                vec![
                    Value::Integer(id),
                    Value::Integer(id / settings.accounts_per_branch as i64),
                    Value::Integer(0),
                    Value::from(filler100.as_str()),
                ]
            },
        )?;
        Ok(())
    }

    fn execute_one(&mut self, settings: &TpcbSettings) -> anyhow::Result<()> {
        let mut rng = rand::thread_rng();
        let account_id = rng.gen_range(0..settings.number_of_accounts());
        let (teller_id, branch_id) = settings.owners_of(account_id);
        let amount = rng.gen_range(-DEBIT_RANGE..DEBIT_RANGE);
        let perform_query = rng.gen_range(0.0..100.0) < settings.query_pct;

        self.xact_count += 1;
        if settings.connection_refresh_rate > 0
            && self.xact_count % settings.connection_refresh_rate == 0
        {
            log::debug!("Refreshing connection after {} transactions", self.xact_count);
            self.session.connect()?;
        }
        let conn = self.session.conn()?;

        if perform_query {
            self.statistics.query_count.fetch_add(1, Ordering::Relaxed);
            conn.query(ACCOUNT_QUERY, &[Value::Integer(account_id)])?;
            return Ok(());
        }

        self.statistics.tpcb_count.fetch_add(1, Ordering::Relaxed);
        let result = in_transaction(conn, false, |conn| {
            if settings.update_branch {
                conn.execute_update(BRANCH_UPDATE, &[Value::Integer(amount), Value::Integer(branch_id)])?;
            }
            if settings.update_teller {
                conn.execute_update(TELLER_UPDATE, &[Value::Integer(amount), Value::Integer(teller_id)])?;
            }
            if settings.update_account {
                conn.execute_update(ACCOUNT_UPDATE, &[Value::Integer(amount), Value::Integer(account_id)])?;
            }
            if settings.insert_history {
                conn.execute_update(
                    HISTORY_INSERT,
                    &[
                        Value::Integer(account_id),
                        Value::Integer(teller_id),
                        Value::Integer(branch_id),
                        Value::Integer(amount),
                        Value::from(HISTORY_FILLER),
                    ],
                )?;
            }
            Ok(())
        });
        if let Err(e) = &result {
            log::info!("exception during transaction {e}");
        }
        Ok(result?)
    }
}

/// Insert `count` rows, committing every thousand rows.
fn populate(
    conn: &mut dyn Connection,
    insert: &str,
    count: i64,
    row: impl Fn(i64) -> Vec<Value>,
) -> Result<(), DbError> {
    in_transaction(conn, false, |conn| {
        for id in 0..count {
            if id > 0 && id % 1000 == 0 {
                conn.commit()?;
                conn.begin()?;
                log::info!("Inserted {id} rows...");
            }
            conn.execute_update(insert, &row(id))?;
        }
        Ok(())
    })
}

impl Scenario for Tpcb {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        self.settings = Some(TpcbSettings::apply(ctx.config())?);
        self.reporter = Some(ctx.reporter().clone());
        self.session.bind(ctx);
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        let settings = self.settings()?.clone();
        if settings.reusedata {
            log::info!("Reusing existing test data");
        } else {
            with_connection(&self.session, |conn| {
                Ok(Self::create_and_populate(&settings, conn)?)
            })?;
        }
        self.statistics.reset();
        Ok(())
    }

    fn prepare(&mut self) -> HookResult {
        self.session.connect()
    }

    fn iterate(&mut self, _iteration: u64) -> HookResult {
        let settings = self.settings()?.clone();
        let think = settings.think_time(&mut rand::thread_rng());
        if !think.is_zero() {
            std::thread::sleep(think);
        }
        self.execute_one(&settings)
    }

    fn cleanup(&mut self) -> HookResult {
        self.session.close()
    }

    fn global_cleanup(&mut self) -> HookResult {
        let tpcb_count = self.statistics.tpcb_count();
        let query_count = self.statistics.query_count();
        log::info!("Total TPCBs   = {tpcb_count}");
        log::info!("Total Queries = {query_count}");
        if let Some(reporter) = &self.reporter {
            reporter.add_custom(ReportMetric::new("tpcb_transactions", tpcb_count as f64));
            reporter.add_custom(ReportMetric::new("tpcb_queries", query_count as f64));
        }
        Ok(())
    }
}
