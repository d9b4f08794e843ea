// Table descriptors for the two tables this crate knows about.
// The column lists double as the whitelists used when
// building criteria and when writing rows.

use log::info;
use super::{Database, DbError};

pub struct Table {
  pub name: &'static str,
  pub columns: &'static [&'static str]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
  Integer,
  Text,
  Real,
  Blob
}

impl ColumnType {
  pub fn as_sql(&self) -> &'static str {
    match self {
      ColumnType::Integer => "INTEGER",
      ColumnType::Text => "TEXT",
      ColumnType::Real => "REAL",
      ColumnType::Blob => "BLOB"
    }
  }
}

pub const CONTENT_COLUMNS: &[&str] = &[
  "type",
  "id",
  "title",
  "teaser",
  "description",
  "media",
  "format",
  "file_size",
  "creator",
  "image",
  "caption",
  "date",
  "parent",
  "language",
  "rights",
  "publisher",
  "online",
  "submission_time",
  "counter",
  "meta_title",
  "meta_description",
  "seo"
];

pub const TAGLINK_COLUMNS: &[&str] = &[
  "id",
  "tag_id",
  "content_type",
  "content_id"
];

pub const CONTENT: Table = Table {
  name: "content",
  columns: CONTENT_COLUMNS
};

pub const TAGLINK: Table = Table {
  name: "taglink",
  columns: TAGLINK_COLUMNS
};

const CONTENT_DEFINITION: &[(&str, ColumnType)] = &[
  ("type", ColumnType::Text),
  ("id", ColumnType::Integer),
  ("title", ColumnType::Text),
  ("teaser", ColumnType::Text),
  ("description", ColumnType::Text),
  ("media", ColumnType::Text),
  ("format", ColumnType::Text),
  ("file_size", ColumnType::Integer),
  ("creator", ColumnType::Text),
  ("image", ColumnType::Text),
  ("caption", ColumnType::Text),
  ("date", ColumnType::Text),
  ("parent", ColumnType::Integer),
  ("language", ColumnType::Text),
  ("rights", ColumnType::Integer),
  ("publisher", ColumnType::Text),
  ("online", ColumnType::Integer),
  ("submission_time", ColumnType::Integer),
  ("counter", ColumnType::Integer),
  ("meta_title", ColumnType::Text),
  ("meta_description", ColumnType::Text),
  ("seo", ColumnType::Text)
];

const TAGLINK_DEFINITION: &[(&str, ColumnType)] = &[
  ("id", ColumnType::Integer),
  ("tag_id", ColumnType::Integer),
  ("content_type", ColumnType::Text),
  ("content_id", ColumnType::Integer)
];

/**
 * Creates the tables and indexes. Safe to run on a database
 * that's already installed.
 */
pub fn install(db: &Database) -> Result<(), DbError> {
  info!("Installing schema in {}", db.path());
  db.create_table(CONTENT.name, CONTENT_DEFINITION, "id")?;
  db.create_table(TAGLINK.name, TAGLINK_DEFINITION, "id")?;
  db.create_index("content_type_index", CONTENT.name, &["type"], false)?;
  db.create_index("content_parent_index", CONTENT.name, &["parent"], false)?;
  db.create_index("content_online_index", CONTENT.name, &["online"], false)?;
  db.create_index("taglink_content_index", TAGLINK.name, &["content_id"], false)?;
  // One link per (tag, content) pair.
  db.create_index(
    "taglink_unique_index",
    TAGLINK.name,
    &["tag_id", "content_type", "content_id"],
    true
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn definitions_match_whitelists() {
    let content: Vec<&str> = CONTENT_DEFINITION.iter().map(|d| d.0).collect();
    let taglink: Vec<&str> = TAGLINK_DEFINITION.iter().map(|d| d.0).collect();
    assert_eq!(CONTENT_COLUMNS.to_vec(), content);
    assert_eq!(TAGLINK_COLUMNS.to_vec(), taglink);
  }

  #[test]
  fn install_twice_is_fine() {
    let (_dir, db) = crate::db::testing::scratch_database();
    assert!(install(&db).is_ok());
  }
}
