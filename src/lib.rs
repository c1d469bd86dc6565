//! Browser-driven extraction of channel and video records into resumable
//! CSV / JSON outputs.

pub mod config;
pub mod db;
pub mod engine;
pub mod extract;
pub mod flows;
pub mod ledger;
pub mod output;
pub mod record;
pub mod scraper;
