// Adding the context method to errors:
use eyre::WrapErr;
use color_eyre::Result;
use serde::Deserialize;
use std::convert::From;
use std::time::Duration;
use crate::content::SearchSettings;
use crate::db::DbOptions;

#[derive(Debug, Deserialize)]
pub struct Config {
  pub db_path: String,
  // Connection pool settings:
  pub db_pool_size: u32,
  pub db_busy_timeout_ms: u64,
  pub db_connection_timeout: u64,
  // Search input limits:
  pub search_min_length: usize,
  pub max_search_terms: usize,
  // Default page size for listings:
  pub pagination: u32,
  // Buffer for the counter thread:
  pub counter_queue_size: usize,
  pub cache_enabled: bool,
  pub cache_path: String
}

// The database doesn't need to know about the rest
// of the config.
impl From<&Config> for DbOptions {
  fn from(config: &Config) -> Self {
    Self {
      pool_size: config.db_pool_size,
      busy_timeout: Duration::from_millis(config.db_busy_timeout_ms),
      connection_timeout: Duration::from_secs(config.db_connection_timeout)
    }
  }
}

impl From<&Config> for SearchSettings {
  fn from(config: &Config) -> Self {
    Self {
      min_length: config.search_min_length,
      max_terms: config.max_search_terms
    }
  }
}

impl Config {

  pub fn from_env() -> Result<Config> {
    let mut c = config::Config::new();
    // RUST_LOG is already set in main.rs if it
    // was absent.
    // You have to use lowercase when compared to
    // what's in the .env file. db_path has no
    // default on purpose.
    c.set_default("db_pool_size", 8)?;
    c.set_default("db_busy_timeout_ms", 5000)?;
    c.set_default("db_connection_timeout", 10)?;
    c.set_default("search_min_length", 3)?;
    c.set_default("max_search_terms", 10)?;
    c.set_default("pagination", 10)?;
    // Used to set the queue size for sync_sender
    // (the counter thread uses it):
    c.set_default("counter_queue_size", 30)?;
    c.set_default("cache_enabled", false)?;
    c.set_default("cache_path", "./cache")?;

    c.merge(config::Environment::default())?;
    // The error has to be given a context for
    // color_eyre to work here:
    c.try_into()
      .context("Loading configuration from env")
  }

}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Config {
    Config {
      db_path: String::from("tuskfish.db"),
      db_pool_size: 4,
      db_busy_timeout_ms: 250,
      db_connection_timeout: 3,
      search_min_length: 4,
      max_search_terms: 5,
      pagination: 10,
      counter_queue_size: 30,
      cache_enabled: false,
      cache_path: String::from("./cache")
    }
  }

  #[test]
  fn db_options_from_config() {
    let options = DbOptions::from(&sample());
    assert_eq!(4, options.pool_size);
    assert_eq!(Duration::from_millis(250), options.busy_timeout);
    assert_eq!(Duration::from_secs(3), options.connection_timeout);
  }

  #[test]
  fn search_settings_from_config() {
    let settings = SearchSettings::from(&sample());
    assert_eq!(4, settings.min_length);
    assert_eq!(5, settings.max_terms);
  }
}
