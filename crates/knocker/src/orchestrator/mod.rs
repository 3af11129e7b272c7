//! Reset orchestrator - sequences a reset or delete inside one transaction.
//!
//! ```text
//! Idle -> ConstraintsDisabled -> DataDeleted -> [IdentityReset]
//!      -> [DataInserted] -> ConstraintsEnabled -> Committed
//! ```
//!
//! Any failure before the commit rolls the transaction back and moves the
//! machine to `RolledBack`; the error that caused it is returned. Identity
//! work the dialect cannot roll back runs after the commit.

mod transaction;

pub use transaction::Transaction;

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::dataset::DatasetLoader;
use crate::core::schema::ExcludeSet;
use crate::core::traits::{Dialect, Session};
use crate::error::{KnockerError, Result};

/// Position of an orchestrator run in the reset state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetState {
    Idle,
    ConstraintsDisabled,
    DataDeleted,
    IdentityReset,
    DataInserted,
    ConstraintsEnabled,
    Committed,
    RolledBack,
}

impl fmt::Display for ResetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResetState::Idle => "idle",
            ResetState::ConstraintsDisabled => "constraints_disabled",
            ResetState::DataDeleted => "data_deleted",
            ResetState::IdentityReset => "identity_reset",
            ResetState::DataInserted => "data_inserted",
            ResetState::ConstraintsEnabled => "constraints_enabled",
            ResetState::Committed => "committed",
            ResetState::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// Which workflow produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Reset,
    Delete,
}

/// Rows loaded into one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub rows: u64,
}

/// Outcome of a successful reset or delete.
#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    /// Provider name (e.g. "mssql").
    pub provider: String,

    pub operation: Operation,

    /// Final state; `committed` for every returned report.
    pub state: ResetState,

    /// Tables whose rows were deleted, in catalog order.
    pub tables_cleared: Vec<String>,

    /// Total rows removed by the delete phase.
    pub rows_deleted: u64,

    /// Tables whose identity/auto-increment was reseeded.
    pub identity_reset: Vec<String>,

    /// Rows inserted per dataset, in input order.
    pub tables_loaded: Vec<TableLoad>,

    /// Datasets with a header but no rows.
    pub skipped_empty: Vec<String>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl ResetReport {
    fn new(provider: &str, operation: Operation) -> Self {
        Self {
            provider: provider.to_string(),
            operation,
            state: ResetState::Idle,
            tables_cleared: Vec::new(),
            rows_deleted: 0,
            identity_reset: Vec::new(),
            tables_loaded: Vec::new(),
            skipped_empty: Vec::new(),
            duration_seconds: 0.0,
        }
    }

    pub fn rows_inserted(&self) -> u64 {
        self.tables_loaded.iter().map(|t| t.rows).sum()
    }
}

/// Identity work that has to wait until the data is committed.
#[derive(Debug, Default)]
struct PostCommit {
    /// Tables whose identity reset the dialect defers.
    resets: Vec<String>,
    /// Tables loaded with explicit identity values.
    syncs: Vec<String>,
}

/// Drives one reset or delete against a borrowed session.
pub struct ResetOrchestrator<'a> {
    session: &'a mut dyn Session,
    dialect: &'a dyn Dialect,
    excludes: ExcludeSet,
    reset_identity: bool,
    state: ResetState,
}

impl<'a> ResetOrchestrator<'a> {
    pub fn new(session: &'a mut dyn Session, dialect: &'a dyn Dialect, excludes: ExcludeSet) -> Self {
        Self {
            session,
            dialect,
            excludes,
            reset_identity: true,
            state: ResetState::Idle,
        }
    }

    /// Toggle reseeding of identity/auto-increment columns (on by default).
    pub fn with_reset_identity(mut self, reset_identity: bool) -> Self {
        self.reset_identity = reset_identity;
        self
    }

    pub fn state(&self) -> ResetState {
        self.state
    }

    /// Delete every non-excluded table, then load `datasets`.
    pub async fn perform_reset(&mut self, datasets: &[DatasetLoader]) -> Result<ResetReport> {
        info!(
            "Starting {} reset with {} datasets ({} tables excluded)",
            self.dialect.name(),
            datasets.len(),
            self.excludes.len()
        );
        self.run(Operation::Reset, datasets).await
    }

    /// Delete every non-excluded table.
    pub async fn perform_delete(&mut self) -> Result<ResetReport> {
        info!(
            "Starting {} delete ({} tables excluded)",
            self.dialect.name(),
            self.excludes.len()
        );
        self.run(Operation::Delete, &[]).await
    }

    async fn run(&mut self, operation: Operation, datasets: &[DatasetLoader]) -> Result<ResetReport> {
        if self.state != ResetState::Idle {
            return Err(KnockerError::Config(format!(
                "orchestrator already used (state: {})",
                self.state
            )));
        }

        let started = Instant::now();
        let mut report = ResetReport::new(self.dialect.name(), operation);

        let tx = match Transaction::begin(self.session).await {
            Ok(tx) => tx,
            Err(e) => {
                self.transition(ResetState::RolledBack);
                return Err(e);
            }
        };

        let post_commit = match self.apply(operation, datasets, &mut report).await {
            Ok(post_commit) => post_commit,
            Err(e) => {
                warn!("{} failed in state {}, rolling back: {}", self.dialect.name(), self.state, e);
                if let Err(rollback_err) = tx.rollback(self.session).await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                self.transition(ResetState::RolledBack);
                return Err(e);
            }
        };

        if let Err(e) = tx.commit(self.session).await {
            if let Err(rollback_err) = self.session.rollback().await {
                debug!("Rollback after failed commit: {}", rollback_err);
            }
            self.transition(ResetState::RolledBack);
            return Err(e);
        }
        self.transition(ResetState::Committed);

        self.finish_identity(post_commit, &mut report).await?;

        report.state = self.state;
        report.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            "{} complete: {} tables cleared, {} rows inserted in {:.2}s",
            self.dialect.name(),
            report.tables_cleared.len(),
            report.rows_inserted(),
            report.duration_seconds
        );
        Ok(report)
    }

    /// Everything between begin and commit. Returns the identity work that
    /// has to wait for the commit.
    async fn apply(
        &mut self,
        operation: Operation,
        datasets: &[DatasetLoader],
        report: &mut ResetReport,
    ) -> Result<PostCommit> {
        self.dialect
            .disable_constraints(self.session)
            .await
            .map_err(KnockerError::constraint)?;
        self.transition(ResetState::ConstraintsDisabled);

        let tables = self.delete_phase(report).await?;
        self.transition(ResetState::DataDeleted);

        let mut post_commit = PostCommit::default();
        if self.reset_identity {
            post_commit.resets = self.identity_phase(&tables, report).await?;
            self.transition(ResetState::IdentityReset);
        } else {
            debug!("Identity reset disabled");
        }

        if operation == Operation::Reset {
            post_commit.syncs = self.insert_phase(datasets, report).await?;
            self.transition(ResetState::DataInserted);
        }

        self.dialect
            .enable_constraints(self.session)
            .await
            .map_err(KnockerError::constraint)?;
        self.transition(ResetState::ConstraintsEnabled);

        Ok(post_commit)
    }

    /// Deferred resets, then sequence syncs for loaded tables the resets
    /// did not already cover. The data is committed by now, so a failure
    /// here names the table and leaves the data in place.
    async fn finish_identity(&mut self, post_commit: PostCommit, report: &mut ResetReport) -> Result<()> {
        for table in &post_commit.resets {
            self.dialect
                .reset_auto_increment(self.session, table)
                .await
                .map_err(|e| {
                    warn!("Data is committed but identity reset failed for {}", table);
                    KnockerError::identity(table.as_str(), e)
                })?;
            report.identity_reset.push(table.clone());
        }

        for table in post_commit.syncs {
            if post_commit.resets.contains(&table) {
                continue;
            }
            self.dialect
                .sync_identity(self.session, &table)
                .await
                .map_err(|e| {
                    warn!("Data is committed but identity sync failed for {}", table);
                    KnockerError::identity(table.as_str(), e)
                })?;
            debug!("{}: identity synced", table);
        }

        Ok(())
    }

    async fn delete_phase(&mut self, report: &mut ResetReport) -> Result<Vec<String>> {
        let tables = self
            .dialect
            .list_tables(self.session, &self.excludes)
            .await
            .map_err(|e| KnockerError::delete("(catalog)", e))?;
        info!("Deleting data from {} tables", tables.len());

        for table in &tables {
            let sql = self
                .dialect
                .build_delete(table)
                .map_err(|e| KnockerError::delete(table.as_str(), e))?;
            let deleted = self
                .session
                .execute(&sql, &[])
                .await
                .map_err(|e| KnockerError::delete(table.as_str(), e))?;
            debug!("{}: deleted {} rows", table, deleted);
            report.rows_deleted += deleted;
            report.tables_cleared.push(table.clone());
        }

        Ok(tables)
    }

    async fn identity_phase(
        &mut self,
        tables: &[String],
        report: &mut ResetReport,
    ) -> Result<Vec<String>> {
        let defer = self.dialect.defers_identity_reset();
        let mut deferred = Vec::new();

        for table in tables {
            let has_identity = self
                .dialect
                .has_auto_increment(self.session, table)
                .await
                .map_err(|e| KnockerError::identity(table.as_str(), e))?;
            if !has_identity {
                continue;
            }

            if defer {
                debug!("{}: identity reset deferred until after commit", table);
                deferred.push(table.clone());
                continue;
            }

            self.dialect
                .reset_auto_increment(self.session, table)
                .await
                .map_err(|e| KnockerError::identity(table.as_str(), e))?;
            debug!("{}: identity reset", table);
            report.identity_reset.push(table.clone());
        }

        Ok(deferred)
    }

    /// Load every dataset, excluded tables included: the exclude list only
    /// protects a table from being cleared and reseeded. Returns the tables
    /// that received explicit identity values.
    async fn insert_phase(
        &mut self,
        datasets: &[DatasetLoader],
        report: &mut ResetReport,
    ) -> Result<Vec<String>> {
        let case_insensitive = self.dialect.case_insensitive_names();
        let mut explicit_identity = Vec::new();

        for loader in datasets {
            let table = loader.table_name()?;
            if self.excludes.contains(&table, case_insensitive) {
                debug!("{}: excluded from delete, loading {}", table, loader.path().display());
            }

            let dataset = loader.load()?;
            if dataset.is_empty() {
                info!("No data for table {}", table);
                report.skipped_empty.push(table);
                continue;
            }

            let (rows, explicit) = self
                .load_table(&table, &dataset.columns, &dataset.rows)
                .await
                .map_err(|e| KnockerError::insert(table.as_str(), e))?;
            info!("{}: inserted {} rows", table, rows);
            if explicit && !explicit_identity.contains(&table) {
                explicit_identity.push(table.clone());
            }
            report.tables_loaded.push(TableLoad { table, rows });
        }

        Ok(explicit_identity)
    }

    /// Insert `rows` into `table`. Returns the row count and whether the
    /// rows carried explicit identity values.
    async fn load_table(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> Result<(u64, bool)> {
        let sql = self.dialect.build_insert(table, columns)?;
        let params = rows
            .iter()
            .map(|row| self.dialect.row_params(columns, row))
            .collect::<Result<Vec<_>>>()?;

        let explicit = self.writes_identity(table, columns).await?;
        if explicit {
            self.dialect.begin_identity_insert(self.session, table).await?;
        }

        let inserted = match self.session.execute_batch(&sql, &params).await {
            Ok(inserted) => inserted,
            Err(e) => {
                // The identity bracket is session state and outlives the rollback.
                if explicit {
                    if let Err(end_err) = self.dialect.end_identity_insert(self.session, table).await {
                        warn!("Could not end identity insert on {}: {}", table, end_err);
                    }
                }
                return Err(e);
            }
        };

        if explicit {
            self.dialect.end_identity_insert(self.session, table).await?;
        }

        Ok((inserted, explicit))
    }

    /// Whether `columns` names one of `table`'s identity columns.
    async fn writes_identity(&mut self, table: &str, columns: &[String]) -> Result<bool> {
        let identity = self.dialect.identity_columns(self.session, table).await?;
        let case_insensitive = self.dialect.case_insensitive_names();
        Ok(identity.iter().any(|id| {
            columns.iter().any(|c| {
                if case_insensitive {
                    c.eq_ignore_ascii_case(id)
                } else {
                    c == id
                }
            })
        }))
    }

    fn transition(&mut self, next: ResetState) {
        debug!("State: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_matches_serde() {
        for state in [ResetState::Idle, ResetState::ConstraintsDisabled, ResetState::RolledBack] {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, state.to_string());
        }
    }

    #[test]
    fn test_report_serializes_snake_case_state() {
        let mut report = ResetReport::new("mysql", Operation::Delete);
        report.state = ResetState::Committed;
        report.tables_loaded.push(TableLoad {
            table: "users".into(),
            rows: 3,
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "committed");
        assert_eq!(json["operation"], "delete");
        assert_eq!(json["tables_loaded"][0]["rows"], 3);
        assert_eq!(report.rows_inserted(), 3);
    }
}
