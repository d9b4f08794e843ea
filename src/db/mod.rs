use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use derive_more::Display;
use log::{debug, error, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Transaction};
use rusqlite::types::Value;
pub mod criteria;
pub mod helpers;
pub mod mappers;
pub mod schema;
use helpers::{
  generate_placeholders,
  generate_set_clause,
  is_valid_identifier
};
pub use criteria::{Criteria, CriteriaError, CriteriaItem, Order};
pub use schema::{ColumnType, Table, CONTENT, CONTENT_COLUMNS, TAGLINK, TAGLINK_COLUMNS};

// Type alias to make function signatures much clearer:
pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

// Key/value pairs handed to insert and update.
pub type Pair<'a> = (&'a str, Value);

#[derive(Debug, Display, PartialEq)]
pub enum DbError {
  #[display(fmt = "Could not connect to database {} - {}", _0, _1)]
  ConnectionError(String, String),
  #[display(fmt = "Query failed ({} on {}) - {}", _0, _1, _2)]
  QueryFailed(&'static str, String, String),
  #[display(fmt = "Insertion into {} failed - {}", _0, _1)]
  InsertionFailed(String, String),
  #[display(fmt = "No row with id {} in {}", _1, _0)]
  RowNotFound(String, i64),
  #[display(fmt = "Invalid identifier: {}", _0)]
  InvalidIdentifier(String),
  #[display(fmt = "Invalid column {} for table {}", _1, _0)]
  InvalidColumn(String, String),
  #[display(fmt = "Invalid criteria - {}", _0)]
  Criteria(CriteriaError)
}

impl std::error::Error for DbError {}

impl From<CriteriaError> for DbError {
  fn from(e: CriteriaError) -> Self {
    DbError::Criteria(e)
  }
}

fn query_error(operation: &'static str, table: &str, e: rusqlite::Error) -> DbError {
  DbError::QueryFailed(operation, table.to_string(), e.to_string())
}

#[derive(Debug, Clone)]
pub struct DbOptions {
  pub pool_size: u32,
  pub busy_timeout: Duration,
  pub connection_timeout: Duration
}

impl Default for DbOptions {
  fn default() -> Self {
    Self {
      pool_size: 8,
      busy_timeout: Duration::from_millis(5000),
      connection_timeout: Duration::from_secs(10)
    }
  }
}

/**
 * The database gateway. Reads go through the connection
 * pool and can run side by side, writes all go through
 * the write lock since SQLite only takes one writer at a
 * time anyway.
 * Cloning is cheap and clones share the pool and the lock.
 */
#[derive(Clone)]
pub struct Database {
  path: String,
  pool: Pool,
  write_lock: Arc<Mutex<()>>
}

impl Database {

  // Opens an existing database. Will not create the file.
  pub fn open(path: &str, options: &DbOptions) -> Result<Database, DbError> {
    if !Path::new(path).is_file() {
      return Err(DbError::ConnectionError(
        path.to_string(),
        String::from("database file is missing")
      ));
    }
    Self::build(
      path,
      options,
      OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
    )
  }

  // Same as open but creates the file if needed. Meant for
  // installation.
  pub fn create(path: &str, options: &DbOptions) -> Result<Database, DbError> {
    Self::build(
      path,
      options,
      OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
    )
  }

  fn build(
    path: &str,
    options: &DbOptions,
    flags: OpenFlags
  ) -> Result<Database, DbError> {
    let busy_timeout = options.busy_timeout;
    let manager = SqliteConnectionManager::file(path)
      .with_flags(flags)
      .with_init(move |c| {
        c.busy_timeout(busy_timeout)?;
        c.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        c.pragma_update(None, "foreign_keys", true)
      });
    let pool = r2d2::Pool::builder()
      .max_size(options.pool_size)
      .connection_timeout(options.connection_timeout)
      .build(manager)
      .map_err(|e| DbError::ConnectionError(path.to_string(), e.to_string()))?;
    let db = Database {
      path: path.to_string(),
      pool,
      write_lock: Arc::new(Mutex::new(()))
    };
    db.connect()?;
    info!("Connected to database {}", path);
    Ok(db)
  }

  // Can be called as many times as you want, just checks
  // that we can get a connection out of the pool.
  pub fn connect(&self) -> Result<(), DbError> {
    self.connection().map(|_| ())
  }

  // The pool goes away with the last clone of the handle.
  pub fn close(self) {
    debug!("Releasing database handle for {}", self.path);
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  fn connection(&self) -> Result<PooledConnection, DbError> {
    self.pool.get()
      .map_err(|e| DbError::ConnectionError(self.path.clone(), e.to_string()))
  }

  fn lock_writes(&self) -> MutexGuard<'_, ()> {
    // A poisoned lock only means another writer panicked,
    // the unit value inside can't be in a bad state.
    self.write_lock.lock().unwrap_or_else(|poisoned| {
      error!("Database write lock was poisoned for {}", self.path);
      poisoned.into_inner()
    })
  }

  fn write<T, F>(&self, f: F) -> Result<T, DbError>
    where F: FnOnce(&Connection) -> Result<T, DbError>
  {
    let _guard = self.lock_writes();
    let conn = self.connection()?;
    f(&conn)
  }

  /**
   * Runs f in a transaction while holding the write lock.
   * Commits when f returns Ok, rolls back otherwise.
   */
  pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
      F: FnOnce(&Transaction<'_>) -> Result<T, E>,
      E: From<DbError>
  {
    let _guard = self.lock_writes();
    let mut conn = self.connection()?;
    let tx = conn.transaction()
      .map_err(|e| query_error("begin transaction", &self.path, e))?;
    match f(&tx) {
      Ok(value) => {
        tx.commit()
          .map_err(|e| query_error("commit", &self.path, e))?;
        Ok(value)
      },
      Err(e) => {
        if let Err(rollback_error) = tx.rollback() {
          error!("Rollback failed on {} - {}", self.path, rollback_error);
        }
        Err(e)
      }
    }
  }

  pub fn select<T, F>(
    &self,
    table: &Table,
    criteria: &Criteria,
    columns: Option<&[&str]>,
    mapper: F
  ) -> Result<Vec<T>, DbError>
    where F: FnMut(&rusqlite::Row<'_>) -> Result<T, rusqlite::Error>
  {
    let conn = self.connection()?;
    select_with(&conn, table, criteria, columns, mapper)
  }

  // Row by row version of select, the visitor sees each row
  // as it comes off the cursor.
  pub fn select_each<F, E>(
    &self,
    table: &Table,
    criteria: &Criteria,
    columns: Option<&[&str]>,
    visit: F
  ) -> Result<(), E>
    where
      F: FnMut(&rusqlite::Row<'_>) -> Result<(), E>,
      E: From<DbError>
  {
    let conn = self.connection()?;
    select_each_with(&conn, table, criteria, columns, visit)
  }

  pub fn select_count(
    &self,
    table: &Table,
    criteria: &Criteria
  ) -> Result<i64, DbError> {
    let conn = self.connection()?;
    select_count_with(&conn, table, criteria)
  }

  pub fn insert(&self, table: &Table, pairs: &[Pair<'_>]) -> Result<i64, DbError> {
    self.write(|conn| insert_with(conn, table, pairs))
  }

  pub fn update(&self, table: &Table, id: i64, pairs: &[Pair<'_>]) -> Result<(), DbError> {
    self.write(|conn| update_with(conn, table, id, pairs))
  }

  pub fn delete(&self, table: &Table, id: i64) -> Result<(), DbError> {
    self.write(|conn| delete_with(conn, table, id))
  }

  pub fn delete_all(&self, table: &Table, criteria: &Criteria) -> Result<usize, DbError> {
    self.write(|conn| delete_all_with(conn, table, criteria))
  }

  pub fn toggle_boolean(&self, id: i64, table: &Table, column: &str) -> Result<(), DbError> {
    self.write(|conn| toggle_boolean_with(conn, id, table, column))
  }

  pub fn increment(&self, id: i64, table: &Table, column: &str) -> Result<(), DbError> {
    self.write(|conn| increment_with(conn, id, table, column))
  }

  pub fn create_table(
    &self,
    name: &str,
    column_defs: &[(&str, ColumnType)],
    primary_key: &str
  ) -> Result<(), DbError> {
    check_identifier(name)?;
    let mut definitions: Vec<String> = Vec::with_capacity(column_defs.len());
    for (column, column_type) in column_defs {
      check_identifier(column)?;
      if *column == primary_key {
        definitions.push(format!("{} {} PRIMARY KEY", column, column_type.as_sql()));
      } else {
        definitions.push(format!("{} {}", column, column_type.as_sql()));
      }
    }
    if !column_defs.iter().any(|(c, _)| *c == primary_key) {
      return Err(DbError::InvalidColumn(name.to_string(), primary_key.to_string()));
    }
    let sql = format!(
      "CREATE TABLE IF NOT EXISTS {} ({})",
      name,
      definitions.join(", ")
    );
    self.write(|conn| execute_ddl(conn, name, &sql))
  }

  pub fn create_index(
    &self,
    name: &str,
    table: &str,
    columns: &[&str],
    unique: bool
  ) -> Result<(), DbError> {
    check_identifier(name)?;
    check_identifier(table)?;
    for column in columns {
      check_identifier(column)?;
    }
    let sql = format!(
      "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
      if unique { "UNIQUE " } else { "" },
      name,
      table,
      columns.join(", ")
    );
    self.write(|conn| execute_ddl(conn, table, &sql))
  }

}

fn check_identifier(name: &str) -> Result<(), DbError> {
  if is_valid_identifier(name) {
    Ok(())
  } else {
    Err(DbError::InvalidIdentifier(name.to_string()))
  }
}

fn check_columns(table: &Table, columns: &[&str]) -> Result<(), DbError> {
  match columns.iter().find(|c| !table.columns.contains(c)) {
    Some(c) => Err(DbError::InvalidColumn(table.name.to_string(), c.to_string())),
    None => Ok(())
  }
}

fn execute_ddl(conn: &Connection, table: &str, sql: &str) -> Result<(), DbError> {
  debug!("{}", sql);
  conn.execute_batch(sql)
    .map_err(|e| query_error("create", table, e))
}

fn select_sql(
  table: &Table,
  criteria: &Criteria,
  columns: Option<&[&str]>
) -> Result<(String, Vec<Value>), DbError> {
  let fields = match columns {
    Some(columns) => {
      check_columns(table, columns)?;
      columns.join(", ")
    },
    None => String::from("*")
  };
  let (where_clause, mut params) = criteria.render_where();
  let (tail, tail_params) = criteria.render_tail(table)?;
  params.extend(tail_params);
  let sql = format!("SELECT {} FROM {} {}{}", fields, table.name, where_clause, tail);
  Ok((sql.trim_end().to_string(), params))
}

// The *_with functions run on whatever connection they're
// given, which includes transactions.

pub fn select_each_with<F, E>(
  conn: &Connection,
  table: &Table,
  criteria: &Criteria,
  columns: Option<&[&str]>,
  mut visit: F
) -> Result<(), E>
  where
    F: FnMut(&rusqlite::Row<'_>) -> Result<(), E>,
    E: From<DbError>
{
  let (sql, params) = select_sql(table, criteria, columns)?;
  debug!("{}", sql);
  let mut stmt = conn.prepare(&sql)
    .map_err(|e| query_error("select", table.name, e))?;
  let mut rows = stmt.query(params_from_iter(params.iter()))
    .map_err(|e| query_error("select", table.name, e))?;
  while let Some(row) = rows.next()
    .map_err(|e| query_error("select", table.name, e))? {
    visit(row)?;
  }
  Ok(())
}

pub fn select_with<T, F>(
  conn: &Connection,
  table: &Table,
  criteria: &Criteria,
  columns: Option<&[&str]>,
  mut mapper: F
) -> Result<Vec<T>, DbError>
  where F: FnMut(&rusqlite::Row<'_>) -> Result<T, rusqlite::Error>
{
  let mut results: Vec<T> = Vec::new();
  select_each_with::<_, DbError>(conn, table, criteria, columns, |row| {
    let item = mapper(row)
      .map_err(|e| query_error("select", table.name, e))?;
    results.push(item);
    Ok(())
  })?;
  Ok(results)
}

pub fn select_count_with(
  conn: &Connection,
  table: &Table,
  criteria: &Criteria
) -> Result<i64, DbError> {
  let (where_clause, params) = criteria.render_where();
  let sql = format!("SELECT COUNT(*) FROM {} {}", table.name, where_clause);
  debug!("{}", sql);
  conn.query_row(sql.trim_end(), params_from_iter(params.iter()), |row| row.get(0))
    .map_err(|e| query_error("count", table.name, e))
}

pub fn insert_with(
  conn: &Connection,
  table: &Table,
  pairs: &[Pair<'_>]
) -> Result<i64, DbError> {
  let columns: Vec<&str> = pairs.iter().map(|p| p.0).collect();
  check_columns(table, &columns)?;
  let sql = format!(
    "INSERT INTO {} ({}) VALUES ({})",
    table.name,
    columns.join(", "),
    generate_placeholders(columns.len())
  );
  debug!("{}", sql);
  conn.execute(&sql, params_from_iter(pairs.iter().map(|p| &p.1)))
    .map_err(|e| DbError::InsertionFailed(table.name.to_string(), e.to_string()))?;
  Ok(conn.last_insert_rowid())
}

pub fn update_with(
  conn: &Connection,
  table: &Table,
  id: i64,
  pairs: &[Pair<'_>]
) -> Result<(), DbError> {
  let columns: Vec<&str> = pairs.iter().map(|p| p.0).collect();
  check_columns(table, &columns)?;
  if columns.is_empty() {
    return exists_with(conn, table, id);
  }
  let sql = format!(
    "UPDATE {} SET {} WHERE id = ?",
    table.name,
    generate_set_clause(&columns)
  );
  debug!("{}", sql);
  let mut values: Vec<&Value> = pairs.iter().map(|p| &p.1).collect();
  let id_value = Value::Integer(id);
  values.push(&id_value);
  let changed = conn.execute(&sql, params_from_iter(values.into_iter()))
    .map_err(|e| query_error("update", table.name, e))?;
  row_changed(table, id, changed)
}

// Same as update but for every row matching the criteria.
pub fn update_all_with(
  conn: &Connection,
  table: &Table,
  criteria: &Criteria,
  pairs: &[Pair<'_>]
) -> Result<usize, DbError> {
  let columns: Vec<&str> = pairs.iter().map(|p| p.0).collect();
  check_columns(table, &columns)?;
  let (where_clause, where_params) = criteria.render_where();
  let sql = format!(
    "UPDATE {} SET {} {}",
    table.name,
    generate_set_clause(&columns),
    where_clause
  );
  debug!("{}", sql);
  let values: Vec<&Value> = pairs.iter()
    .map(|p| &p.1)
    .chain(where_params.iter())
    .collect();
  conn.execute(sql.trim_end(), params_from_iter(values.into_iter()))
    .map_err(|e| query_error("update", table.name, e))
}

pub fn delete_with(conn: &Connection, table: &Table, id: i64) -> Result<(), DbError> {
  let sql = format!("DELETE FROM {} WHERE id = ?", table.name);
  debug!("{}", sql);
  let changed = conn.execute(&sql, params![id])
    .map_err(|e| query_error("delete", table.name, e))?;
  row_changed(table, id, changed)
}

// Deleting everything by accident is refused, an empty
// criteria is an error here.
pub fn delete_all_with(
  conn: &Connection,
  table: &Table,
  criteria: &Criteria
) -> Result<usize, DbError> {
  if criteria.is_empty() {
    return Err(DbError::Criteria(CriteriaError::InvalidValue(
      String::from("refusing to delete without criteria")
    )));
  }
  let (where_clause, params) = criteria.render_where();
  let sql = format!("DELETE FROM {} {}", table.name, where_clause);
  debug!("{}", sql);
  conn.execute(sql.trim_end(), params_from_iter(params.iter()))
    .map_err(|e| query_error("delete", table.name, e))
}

pub fn toggle_boolean_with(
  conn: &Connection,
  id: i64,
  table: &Table,
  column: &str
) -> Result<(), DbError> {
  check_columns(table, &[column])?;
  let sql = format!(
    "UPDATE {} SET {} = CASE WHEN {} = 1 THEN 0 ELSE 1 END WHERE id = ?",
    table.name,
    column,
    column
  );
  debug!("{}", sql);
  let changed = conn.execute(&sql, params![id])
    .map_err(|e| query_error("toggle", table.name, e))?;
  row_changed(table, id, changed)
}

pub fn increment_with(
  conn: &Connection,
  id: i64,
  table: &Table,
  column: &str
) -> Result<(), DbError> {
  check_columns(table, &[column])?;
  let sql = format!(
    "UPDATE {} SET {} = COALESCE({}, 0) + 1 WHERE id = ?",
    table.name,
    column,
    column
  );
  debug!("{}", sql);
  let changed = conn.execute(&sql, params![id])
    .map_err(|e| query_error("increment", table.name, e))?;
  row_changed(table, id, changed)
}

fn exists_with(conn: &Connection, table: &Table, id: i64) -> Result<(), DbError> {
  let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table.name);
  let count: i64 = conn.query_row(&sql, params![id], |row| row.get(0))
    .map_err(|e| query_error("count", table.name, e))?;
  row_changed(table, id, count as usize)
}

fn row_changed(table: &Table, id: i64, changed: usize) -> Result<(), DbError> {
  if changed == 0 {
    Err(DbError::RowNotFound(table.name.to_string(), id))
  } else {
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use super::testing::scratch_database;

  fn insert_row(db: &Database, content_type: &str, title: &str, online: i64) -> i64 {
    db.insert(&CONTENT, &[
      ("type", Value::Text(content_type.to_string())),
      ("title", Value::Text(title.to_string())),
      ("online", Value::Integer(online)),
      ("counter", Value::Integer(0))
    ]).unwrap()
  }

  fn title_of(db: &Database, id: i64) -> Vec<String> {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id).unwrap());
    db.select(&CONTENT, &criteria, Some(&["title"]), |row| row.get(0)).unwrap()
  }

  #[test]
  fn opening_a_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.db");
    match Database::open(path.to_str().unwrap(), &DbOptions::default()) {
      Err(DbError::ConnectionError(_, _)) => (),
      _ => panic!("expected a connection error")
    }
    assert!(!path.exists());
  }

  #[test]
  fn connect_is_idempotent() {
    let (_dir, db) = scratch_database();
    assert!(db.connect().is_ok());
    assert!(db.connect().is_ok());
    let reopened = Database::open(db.path(), &DbOptions::default()).unwrap();
    assert!(reopened.connect().is_ok());
    reopened.close();
  }

  #[test]
  fn insert_then_select() {
    let (_dir, db) = scratch_database();
    let id = insert_row(&db, "Article", "Hello", 1);
    assert!(id > 0);
    assert_eq!(vec!["Hello".to_string()], title_of(&db, id));
  }

  #[test]
  fn insert_rejects_unknown_columns() {
    let (_dir, db) = scratch_database();
    let result = db.insert(&CONTENT, &[("password", Value::Text("x".to_string()))]);
    assert_eq!(
      Err(DbError::InvalidColumn("content".to_string(), "password".to_string())),
      result
    );
  }

  #[test]
  fn count_uses_the_same_predicates() {
    let (_dir, db) = scratch_database();
    insert_row(&db, "Article", "One", 1);
    insert_row(&db, "Article", "Two", 0);
    insert_row(&db, "Image", "Three", 1);
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "type", "Article").unwrap());
    assert_eq!(2, db.select_count(&CONTENT, &criteria).unwrap());
    let online = criteria.add(CriteriaItem::equal(CONTENT_COLUMNS, "online", 1).unwrap());
    assert_eq!(1, db.select_count(&CONTENT, &online).unwrap());
    assert_eq!(3, db.select_count(&CONTENT, &Criteria::new()).unwrap());
  }

  #[test]
  fn update_missing_row_is_an_error() {
    let (_dir, db) = scratch_database();
    let result = db.update(&CONTENT, 42, &[("title", Value::Text("x".to_string()))]);
    assert_eq!(Err(DbError::RowNotFound("content".to_string(), 42)), result);
  }

  #[test]
  fn update_changes_only_that_row() {
    let (_dir, db) = scratch_database();
    let first = insert_row(&db, "Article", "First", 1);
    let second = insert_row(&db, "Article", "Second", 1);
    db.update(&CONTENT, first, &[("title", Value::Text("Changed".to_string()))]).unwrap();
    assert_eq!(vec!["Changed".to_string()], title_of(&db, first));
    assert_eq!(vec!["Second".to_string()], title_of(&db, second));
  }

  #[test]
  fn delete_and_delete_missing() {
    let (_dir, db) = scratch_database();
    let id = insert_row(&db, "Article", "Bye", 1);
    assert!(db.delete(&CONTENT, id).is_ok());
    assert!(title_of(&db, id).is_empty());
    assert_eq!(
      Err(DbError::RowNotFound("content".to_string(), id)),
      db.delete(&CONTENT, id)
    );
  }

  #[test]
  fn delete_all_needs_criteria() {
    let (_dir, db) = scratch_database();
    insert_row(&db, "Article", "Stay", 1);
    assert!(db.delete_all(&CONTENT, &Criteria::new()).is_err());
    assert_eq!(1, db.select_count(&CONTENT, &Criteria::new()).unwrap());
  }

  #[test]
  fn toggle_twice_restores_value() {
    let (_dir, db) = scratch_database();
    let id = insert_row(&db, "Article", "Toggle", 1);
    let online = |db: &Database| -> Vec<i64> {
      let criteria = Criteria::new()
        .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id).unwrap());
      db.select(&CONTENT, &criteria, Some(&["online"]), |row| row.get(0)).unwrap()
    };
    db.toggle_boolean(id, &CONTENT, "online").unwrap();
    assert_eq!(vec![0], online(&db));
    db.toggle_boolean(id, &CONTENT, "online").unwrap();
    assert_eq!(vec![1], online(&db));
    assert!(db.toggle_boolean(id, &CONTENT, "nope").is_err());
  }

  #[test]
  fn increment_is_atomic_across_threads() {
    let (_dir, db) = scratch_database();
    let id = insert_row(&db, "Article", "Popular", 1);
    let handles: Vec<_> = (0..4).map(|_| {
      let db = db.clone();
      std::thread::spawn(move || {
        for _ in 0..25 {
          db.increment(id, &CONTENT, "counter").unwrap();
        }
      })
    }).collect();
    for handle in handles {
      handle.join().unwrap();
    }
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id).unwrap());
    let counter: Vec<i64> = db.select(
      &CONTENT, &criteria, Some(&["counter"]), |row| row.get(0)
    ).unwrap();
    assert_eq!(vec![100], counter);
  }

  #[test]
  fn failed_transaction_rolls_back() {
    let (_dir, db) = scratch_database();
    let result: Result<(), DbError> = db.transaction(|tx| {
      insert_with(tx, &CONTENT, &[("title", Value::Text("Ghost".to_string()))])?;
      delete_with(tx, &CONTENT, 9999)
    });
    assert!(result.is_err());
    assert_eq!(0, db.select_count(&CONTENT, &Criteria::new()).unwrap());
  }

  #[test]
  fn create_table_checks_identifiers() {
    let (_dir, db) = scratch_database();
    let result = db.create_table("bad name", &[("id", ColumnType::Integer)], "id");
    assert_eq!(Err(DbError::InvalidIdentifier("bad name".to_string())), result);
    let result = db.create_table("other", &[("id", ColumnType::Integer)], "key");
    assert!(result.is_err());
    assert!(db.create_table("other", &[("id", ColumnType::Integer)], "id").is_ok());
    assert!(db.create_table("other", &[("id", ColumnType::Integer)], "id").is_ok());
  }

  #[test]
  fn select_each_stops_on_visitor_error() {
    let (_dir, db) = scratch_database();
    for i in 0..5 {
      insert_row(&db, "Article", &format!("Article {}", i), 1);
    }
    let mut seen = 0;
    let result: Result<(), DbError> = db.select_each(
      &CONTENT,
      &Criteria::new().set_order("id").set_order_type(Order::Asc),
      Some(&["id"]),
      |_row| {
        seen += 1;
        if seen == 2 {
          Err(DbError::InvalidIdentifier("stop".to_string()))
        } else {
          Ok(())
        }
      }
    );
    assert!(result.is_err());
    assert_eq!(2, seen);
  }
}
