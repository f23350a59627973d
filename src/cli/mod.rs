//! Terminal presentation for each command

pub mod goal;
pub mod history;
pub mod holdings;
pub mod market;
pub mod setup;
pub mod summary;
pub mod ui;
