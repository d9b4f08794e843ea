/*
 * View counter updates happen on their own thread so
 * showing a page never waits on a write.
 */

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use color_eyre::Result;
use eyre::eyre;
use log::{debug, error, info};
use crate::db::{Database, CONTENT};

#[derive(Debug)]
enum CounterMessage {
  Close,
  Increment(i64)
}

pub struct CounterService {
  tx: SyncSender<CounterMessage>,
  thread_handle: Option<JoinHandle<()>>
}

impl CounterService {

  pub fn open(db: &Database, queue_size: usize) -> Result<CounterService> {
    // Producers never block on a full buffer (see
    // increment), the queue size just has to be large
    // enough for traffic spikes.
    let (tx, rx) = mpsc::sync_channel::<CounterMessage>(queue_size);
    // Fail now rather than on the first view.
    db.connect()?;
    let db = db.clone();
    info!("Starting counter thread...");
    let thread_handle = thread::spawn(move || loop {
      match rx.recv() {
        Ok(CounterMessage::Close) => {
          info!("Counter thread terminating...");
          break;
        },
        Ok(CounterMessage::Increment(id)) => {
          debug!("Incrementing counter for content {}", id);
          if let Err(e) = db.increment(id, &CONTENT, "counter") {
            error!("Error from CounterService: \
              could not increment counter for {} - {}", id, e);
          }
        },
        // All the senders are gone.
        Err(_) => break
      }
    });
    Ok(CounterService {
      tx,
      thread_handle: Some(thread_handle)
    })
  }

  // Never blocks. A full buffer loses the view, a dead
  // thread is an error.
  pub fn increment(&self, id: i64) -> Result<()> {
    match self.tx.try_send(CounterMessage::Increment(id)) {
      Ok(_) => Ok(()),
      Err(TrySendError::Full(msg)) => {
        error!("Counter thread buffer is full, dropping: {:?}", msg);
        Ok(())
      },
      Err(TrySendError::Disconnected(msg)) => {
        error!("Counter thread is dead, could not send: {:?}", msg);
        Err(eyre!("Counter thread appears to have died"))
      }
    }
  }

}

// Close is queued behind the pending increments so those
// still get written before the join returns.
impl Drop for CounterService {
  fn drop(&mut self) {
    match self.tx.send(CounterMessage::Close) {
      Ok(_) => info!("CounterService is closing..."),
      Err(e) => error!("Could not close CounterService - {}", e)
    }
    if let Some(handle) = self.thread_handle.take() {
      if handle.join().is_err() {
        error!("Counter thread panicked");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rusqlite::types::Value;
  use crate::db::testing::scratch_database;
  use crate::db::{Criteria, CriteriaItem, CONTENT_COLUMNS};

  fn counter_of(db: &Database, id: i64) -> i64 {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id).unwrap());
    db.select(&CONTENT, &criteria, Some(&["counter"]), |row| row.get(0))
      .unwrap()[0]
  }

  #[test]
  fn pending_increments_are_written_on_close() {
    let (_dir, db) = scratch_database();
    let id = db.insert(&CONTENT, &[
      ("type", Value::Text("Article".to_string())),
      ("title", Value::Text("Counted".to_string())),
      ("counter", Value::Integer(0))
    ]).unwrap();
    let service = CounterService::open(&db, 30).unwrap();
    for _ in 0..10 {
      service.increment(id).unwrap();
    }
    drop(service);
    assert_eq!(10, counter_of(&db, id));
  }

  #[test]
  fn unknown_ids_do_not_kill_the_thread() {
    let (_dir, db) = scratch_database();
    let id = db.insert(&CONTENT, &[
      ("type", Value::Text("Article".to_string())),
      ("title", Value::Text("Still counted".to_string()))
    ]).unwrap();
    let service = CounterService::open(&db, 30).unwrap();
    service.increment(9999).unwrap();
    service.increment(id).unwrap();
    drop(service);
    assert_eq!(1, counter_of(&db, id));
  }
}
