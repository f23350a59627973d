//! Domain logic and the traits at its I/O seams

pub mod cache;
pub mod clock;
pub mod config;
pub mod dividend;
pub mod document;
pub mod gateway;
pub mod holding;
pub mod ledger;
pub mod log;
pub mod market;
pub mod projection;
pub mod valuation;

// Re-export main types for cleaner imports
pub use clock::{Clock, SystemClock};
pub use document::{DocumentError, DocumentStore, VersionedDocument};
pub use gateway::MarketDataGateway;
pub use holding::{AssetType, Currency, HistoryPoint, Holding};
pub use ledger::{HistoryChange, HoldingsStore, LedgerError};
pub use market::{DividendInfo, IndexQuote, MarketDataError, MarketDataSource, Quote};
