use color_eyre::Result;
use eyre::WrapErr;
use log::{debug, error, info};
use crate::cache::PageCache;
use crate::config::Config;
use crate::content::ContentHandler;
use crate::counter::CounterService;
use crate::db::{schema, Database, DbOptions};
use crate::error;

/**
 * Everything a page needs, wired once and handed around
 * explicitly. Nothing in the crate reaches for a global.
 */
pub struct AppContext {
  pub database: Database,
  pub content: ContentHandler,
  pub cache: PageCache,
  pub counter: CounterService,
  pub pagination: u32
}

impl AppContext {

  pub fn open(config: &Config) -> Result<AppContext> {
    debug!("Current config: {:?}", config);
    let options = DbOptions::from(config);
    let database = Database::open(&config.db_path, &options)
      .context("Opening the content database")?;
    Self::assemble(database, config)
  }

  // Creates the database file if needed and installs the
  // schema before wiring everything.
  pub fn install(config: &Config) -> Result<AppContext> {
    let options = DbOptions::from(config);
    let database = Database::create(&config.db_path, &options)
      .context("Creating the content database")?;
    schema::install(&database)?;
    info!("Schema installed in {}", config.db_path);
    Self::assemble(database, config)
  }

  fn assemble(database: Database, config: &Config) -> Result<AppContext> {
    let cache = PageCache::open(&config.cache_path, config.cache_enabled)
      .context("Cache directory is missing or not writable")?;
    let counter = CounterService::open(&database, config.counter_queue_size)?;
    Ok(AppContext {
      content: ContentHandler::new(database.clone(), config.into()),
      database,
      cache,
      counter,
      pagination: config.pagination
    })
  }

  /**
   * Runs a write through the content handler and flushes
   * the page cache afterwards, even when the write failed
   * halfway (the transaction rolled back but better safe).
   */
  pub fn mutate<T, F>(&self, f: F) -> error::Result<T>
    where F: FnOnce(&ContentHandler) -> error::Result<T>
  {
    let result = f(&self.content);
    match self.cache.flush() {
      Ok(count) => debug!("Flushed {} cached pages after a write", count),
      Err(e) => error!("Could not flush the page cache - {}", e)
    }
    result
  }

  // Counts a view without waiting for the write.
  pub fn record_view(&self, id: i64) {
    if let Err(e) = self.counter.increment(id) {
      error!("Falling back to a direct counter update - {}", e);
      self.content.update_counter(id);
    }
  }

  // The counter thread is joined when it's dropped here,
  // pending views are written first.
  pub fn close(self) {
    let AppContext { database, content, cache, counter, .. } = self;
    drop(counter);
    drop(cache);
    drop(content);
    database.close();
    info!("Application context closed");
  }

}
