//! aoveille - tender announcement acquisition and monitoring.
//!
//! Scrapes "appels d'offres" from the Sodipress client portal, reconciles
//! them against a local SQLite store, and flags records newly seen since the
//! previous scraping run.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod jobs;
pub mod models;
pub mod reconcile;
pub mod repository;
pub mod scheduler;
pub mod scrape;
pub mod utils;
