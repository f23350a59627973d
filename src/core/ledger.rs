//! Holdings and daily value history, persisted as two whole JSON documents.
//!
//! Reads never fail: a missing, unreadable or undecodable document is
//! treated as empty (and logged). Writes overwrite the full document with a
//! conditional update; on a version conflict the document is re-read, the
//! same change is applied to the fresh content and the write is tried once
//! more. The in-memory copy always reflects the change, even when the write
//! itself fails.

use crate::core::clock::Clock;
use crate::core::document::{DocumentError, DocumentStore};
use crate::core::holding::{HistoryPoint, Holding};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid holding: {0}")]
    InvalidHolding(String),

    #[error("Could not save {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: DocumentError,
    },
}

/// Outcome of recording today's portfolio value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    Appended,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct LedgerPaths {
    pub portfolio: String,
    pub history: String,
}

impl Default for LedgerPaths {
    fn default() -> Self {
        Self {
            portfolio: "portfolio.json".to_string(),
            history: "history.json".to_string(),
        }
    }
}

/// One persisted JSON array plus the version it was read at.
struct Document<T> {
    path: String,
    items: Vec<T>,
    version: Option<String>,
}

impl<T: Serialize + DeserializeOwned + Clone> Document<T> {
    fn empty(path: &str) -> Self {
        Self {
            path: path.to_string(),
            items: Vec::new(),
            version: None,
        }
    }

    async fn load(&mut self, remote: &dyn DocumentStore) {
        match remote.fetch(&self.path).await {
            Ok(Some(doc)) => {
                self.version = Some(doc.version);
                self.items = match serde_json::from_str(&doc.content) {
                    Ok(items) => items,
                    Err(e) => {
                        warn!(
                            "{} is not valid JSON ({}); treating it as empty",
                            self.path, e
                        );
                        Vec::new()
                    }
                };
            }
            Ok(None) => {
                debug!("{} not found; starting empty", self.path);
                self.version = None;
                self.items = Vec::new();
            }
            Err(e) => {
                warn!("Could not read {}: {}; treating it as empty", self.path, e);
                self.items = Vec::new();
            }
        }
    }

    /// Applies `change` in memory and persists, re-reading once on conflict.
    async fn update<F>(&mut self, remote: &dyn DocumentStore, change: F) -> Result<(), LedgerError>
    where
        F: Fn(&mut Vec<T>),
    {
        change(&mut self.items);

        match self.write(remote).await {
            Err(DocumentError::Conflict { .. }) => {
                info!("{} changed remotely; re-reading and retrying once", self.path);
                let local = self.items.clone();
                self.load(remote).await;
                change(&mut self.items);
                match self.write(remote).await {
                    Ok(()) => Ok(()),
                    Err(source) => {
                        // Remote state is unknown; keep the session's view
                        self.items = local;
                        Err(LedgerError::Write {
                            path: self.path.clone(),
                            source,
                        })
                    }
                }
            }
            Err(source) => Err(LedgerError::Write {
                path: self.path.clone(),
                source,
            }),
            Ok(()) => Ok(()),
        }
    }

    async fn write(&mut self, remote: &dyn DocumentStore) -> Result<(), DocumentError> {
        let content =
            serde_json::to_string_pretty(&self.items).map_err(|e| DocumentError::Decode {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        let version = remote
            .put(&self.path, &content, self.version.as_deref())
            .await?;
        debug!("Saved {} at version {}", self.path, version);
        self.version = Some(version);
        Ok(())
    }
}

fn replace_holding(holdings: &mut Vec<Holding>, holding: &Holding) {
    holdings.retain(|h| h.ticker != holding.ticker);
    holdings.push(holding.clone());
}

fn record_value(history: &mut Vec<HistoryPoint>, today: chrono::NaiveDate, value: f64) -> HistoryChange {
    match history.last_mut() {
        Some(last) if last.date == today => {
            if last.value == value {
                HistoryChange::Unchanged
            } else {
                last.value = value;
                HistoryChange::Updated
            }
        }
        Some(last) if last.date > today => {
            warn!(
                "Latest history point is dated {}, after today ({}); not recording",
                last.date, today
            );
            HistoryChange::Unchanged
        }
        _ => {
            history.push(HistoryPoint { date: today, value });
            HistoryChange::Appended
        }
    }
}

pub struct HoldingsStore {
    remote: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    holdings: Document<Holding>,
    history: Document<HistoryPoint>,
}

impl HoldingsStore {
    /// Creates a store and reads both documents.
    pub async fn open(
        remote: Arc<dyn DocumentStore>,
        paths: LedgerPaths,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut store = Self {
            remote,
            clock,
            holdings: Document::empty(&paths.portfolio),
            history: Document::empty(&paths.history),
        };
        store.load().await;
        store.load_history().await;
        store
    }

    /// Re-reads the holdings document.
    pub async fn load(&mut self) -> &[Holding] {
        self.holdings.load(self.remote.as_ref()).await;
        &self.holdings.items
    }

    /// Re-reads the history document.
    pub async fn load_history(&mut self) -> &[HistoryPoint] {
        self.history.load(self.remote.as_ref()).await;
        &self.history.items
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings.items
    }

    pub fn history(&self) -> &[HistoryPoint] {
        &self.history.items
    }

    /// Replaces any holding with the same ticker, wholesale.
    pub async fn upsert_holding(&mut self, holding: Holding) -> Result<(), LedgerError> {
        holding.validate().map_err(LedgerError::InvalidHolding)?;
        info!("Saving holding {}", holding.ticker);
        self.holdings
            .update(self.remote.as_ref(), |items| replace_holding(items, &holding))
            .await
    }

    /// Drops `ticker`. Returns whether it was present.
    pub async fn remove_holding(&mut self, ticker: &str) -> Result<bool, LedgerError> {
        let present = self.holdings.items.iter().any(|h| h.ticker == ticker);
        info!("Removing holding {}", ticker);
        self.holdings
            .update(self.remote.as_ref(), |items| items.retain(|h| h.ticker != ticker))
            .await?;
        Ok(present)
    }

    /// Records today's total, at most one point per calendar day.
    ///
    /// Appends when the last point is from an earlier day and rewrites the
    /// last point when today's value moved. Nothing is written when the value
    /// did not move or the last point is dated after today.
    pub async fn record_daily_value(&mut self, total_value: f64) -> Result<HistoryChange, LedgerError> {
        let today = self.clock.today();
        let mut preview = self.history.items.clone();
        let change = record_value(&mut preview, today, total_value);
        if change == HistoryChange::Unchanged {
            debug!("History for {} already at {}", today, total_value);
            return Ok(change);
        }

        self.history
            .update(self.remote.as_ref(), |items| {
                record_value(items, today, total_value);
            })
            .await?;
        Ok(change)
    }
}
