//! Registry of history table managers and the change-recording boundary.
//!
//! [`HistoryTables`] is built once from a resolved [`HistoryConfig`] and the
//! named [`DataSources`]. It opens one [`HistoryTableManager`] per entity key
//! on first use and keeps it, and it serializes the check-then-create-then-
//! backfill sequence per history table so concurrent first changes to the same
//! entity create and backfill the table exactly once.
//!
//! Whatever triggers auditing (a repository hook, an event consumer, an
//! explicit call) talks to the engine through [`HistoryRecorder`]: ensure the
//! history table before the first change, then record every change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use histable_core::{Action, HistoryConfig, IdentifiableRecord, SqlValue, Timestamp};
use tokio::sync::{Mutex, RwLock};

use crate::datasource::{DataSource, DataSources};
use crate::error::HistoryError;
use crate::manager::HistoryTableManager;

/// What [`HistoryRecorder::ensure_history_table`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The history table was already there; nothing was written.
    AlreadyPresent,
    /// The table was created here and backfilled with `rows` `INITIAL` rows.
    Created { rows: u64 },
    /// Another process created the table between the existence check and
    /// `CREATE TABLE`; the backfill is left to it.
    CreatedElsewhere,
}

/// The two calls an audit trigger makes.
#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    /// Create and backfill the entity's history table if it does not exist.
    async fn ensure_history_table(
        &self,
        entity_key: &str,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<EnsureOutcome, HistoryError>;

    /// Append the current state of one source row to the history table.
    async fn record_change(
        &self,
        entity_key: &str,
        record_id: &SqlValue,
        action: Action,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<(), HistoryError>;
}

#[derive(Debug)]
pub struct HistoryTables {
    config: HistoryConfig,
    source: DataSource,
    history: DataSource,
    /// Opened managers indexed by entity key.
    managers: RwLock<HashMap<String, Arc<HistoryTableManager>>>,
    /// History tables known to exist.
    ready: RwLock<HashSet<String>>,
    /// Per-history-table guards for exists/create/populate.
    table_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HistoryTables {
    /// Bind a configuration to its data sources.
    ///
    /// Both data-source names in the configuration must be present in
    /// `data_sources`. Nothing is queried yet.
    pub fn new(config: HistoryConfig, data_sources: &DataSources) -> Result<Self, HistoryError> {
        let source = lookup(data_sources, &config.source_data_source)?;
        let history = lookup(data_sources, &config.history_data_source)?;

        Ok(Self {
            config,
            source,
            history,
            managers: RwLock::new(HashMap::new()),
            ready: RwLock::new(HashSet::new()),
            table_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// The manager for `entity_key`, opening (and introspecting) it on first use.
    pub async fn manager(&self, entity_key: &str) -> Result<Arc<HistoryTableManager>, HistoryError> {
        if let Some(manager) = self.managers.read().await.get(entity_key) {
            return Ok(Arc::clone(manager));
        }

        let mapping = self
            .config
            .get(entity_key)
            .ok_or_else(|| HistoryError::InvalidArgument(format!("unknown entity: {entity_key}")))?
            .clone();

        let opened = Arc::new(
            HistoryTableManager::open(mapping, self.source.clone(), self.history.clone()).await?,
        );

        // A concurrent caller may have opened the same manager meanwhile; keep
        // whichever got in first.
        let mut managers = self.managers.write().await;
        let manager = managers.entry(entity_key.to_string()).or_insert(opened);
        Ok(Arc::clone(manager))
    }

    /// Ensure the history table of every configured entity, in key order.
    pub async fn ensure_all(
        &self,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<Vec<(String, EnsureOutcome)>, HistoryError> {
        let mut outcomes = Vec::with_capacity(self.config.len());
        for mapping in self.config.entities() {
            let outcome = self
                .ensure_history_table(&mapping.entity_key, actor_id, timestamp)
                .await?;
            outcomes.push((mapping.entity_key.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Ensure the record's history table, then record the change.
    pub async fn record<R>(
        &self,
        record: &R,
        action: Action,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<EnsureOutcome, HistoryError>
    where
        R: IdentifiableRecord + Sync + ?Sized,
    {
        let entity_key = record.entity_key();
        let outcome = self
            .ensure_history_table(entity_key, actor_id, timestamp)
            .await?;
        self.record_change(entity_key, &record.record_id(), action, actor_id, timestamp)
            .await?;
        Ok(outcome)
    }

    async fn table_lock(&self, history_table: &str) -> Arc<Mutex<()>> {
        let mut locks = self.table_locks.lock().await;
        Arc::clone(locks.entry(history_table.to_string()).or_default())
    }
}

#[async_trait]
impl HistoryRecorder for HistoryTables {
    async fn ensure_history_table(
        &self,
        entity_key: &str,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<EnsureOutcome, HistoryError> {
        let manager = self.manager(entity_key).await?;
        let table = manager.history_table();

        if self.ready.read().await.contains(table) {
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        let lock = self.table_lock(table).await;
        let _guard = lock.lock().await;

        // Re-check under the lock; the previous holder may have created it.
        if self.ready.read().await.contains(table) {
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        let outcome = if manager.exists().await? {
            EnsureOutcome::AlreadyPresent
        } else {
            match manager.create().await {
                Ok(()) => match manager.populate(actor_id, timestamp).await {
                    Ok(rows) => EnsureOutcome::Created { rows },
                    // Never leave a table without its INITIAL rows behind.
                    Err(populate) => {
                        return Err(match manager.drop_table().await {
                            Ok(()) => populate.into(),
                            Err(drop) => {
                                tracing::error!(
                                    entity = entity_key,
                                    table,
                                    error = %drop,
                                    "Failed to drop unpopulated history table",
                                );
                                HistoryError::Abandoned { populate, drop }
                            }
                        });
                    }
                },
                Err(e) if e.is_table_already_exists() => {
                    tracing::warn!(
                        entity = entity_key,
                        table,
                        "History table created concurrently elsewhere, skipping backfill",
                    );
                    EnsureOutcome::CreatedElsewhere
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.ready.write().await.insert(table.to_string());
        tracing::debug!(entity = entity_key, table, ?outcome, "History table ensured");
        Ok(outcome)
    }

    async fn record_change(
        &self,
        entity_key: &str,
        record_id: &SqlValue,
        action: Action,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<(), HistoryError> {
        if record_id.is_null() {
            return Err(HistoryError::InvalidArgument(format!(
                "null record id for entity {entity_key}"
            )));
        }

        let manager = self.manager(entity_key).await?;
        manager.insert(record_id, action, actor_id, timestamp).await?;
        Ok(())
    }
}

fn lookup(data_sources: &DataSources, name: &str) -> Result<DataSource, HistoryError> {
    data_sources
        .get(name)
        .cloned()
        .ok_or_else(|| HistoryError::InvalidArgument(format!("unknown data source: {name}")))
}
