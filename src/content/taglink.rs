use std::collections::HashMap;
use log::debug;
use rusqlite::Connection;
use rusqlite::types::Value;
use crate::db::{
  self,
  mappers::map_taglink,
  Criteria,
  CriteriaItem,
  Database,
  DbError,
  Order,
  TAGLINK,
  TAGLINK_COLUMNS
};
use super::types::ContentType;

/**
 * Links between tags and the content they're attached to.
 * The writes taking a connection are meant to be called
 * from inside a content transaction.
 */
#[derive(Clone)]
pub struct TaglinkHandler {
  db: Database
}

impl TaglinkHandler {

  pub fn new(db: Database) -> Self {
    Self { db }
  }

  pub fn get_tag_ids(&self, content_id: i64) -> Result<Vec<i64>, DbError> {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(TAGLINK_COLUMNS, "content_id", content_id)?)
      .set_order("tag_id")
      .set_order_type(Order::Asc);
    self.db.select(&TAGLINK, &criteria, Some(&["tag_id"]), |row| row.get(0))
  }

  // Tags for a batch of content in one query, keyed by
  // content id. Content without tags isn't in the map.
  pub fn get_tag_ids_for(&self, content_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>, DbError> {
    let mut tags: HashMap<i64, Vec<i64>> = HashMap::new();
    if content_ids.is_empty() {
      return Ok(tags);
    }
    let criteria = Criteria::new()
      .add(CriteriaItem::new(TAGLINK_COLUMNS, "content_id", content_ids.to_vec(), "IN")?)
      .set_order("tag_id")
      .set_order_type(Order::Asc);
    let links = self.db.select(
      &TAGLINK,
      &criteria,
      Some(&["content_id", "tag_id"]),
      map_taglink
    )?;
    for (content_id, tag_id) in links {
      tags.entry(content_id).or_insert_with(Vec::new).push(tag_id);
    }
    Ok(tags)
  }

  pub fn delete_taglink(&self, id: i64) -> Result<(), DbError> {
    self.db.delete(&TAGLINK, id)
  }

}

pub fn save_with(
  conn: &Connection,
  content_type: ContentType,
  content_id: i64,
  tag_ids: &[i64]
) -> Result<(), DbError> {
  let mut saved: Vec<i64> = Vec::with_capacity(tag_ids.len());
  for tag_id in tag_ids {
    // The unique index would refuse a duplicate anyway,
    // this avoids aborting the whole transaction over it.
    if saved.contains(tag_id) {
      continue;
    }
    db::insert_with(conn, &TAGLINK, &[
      ("tag_id", Value::Integer(*tag_id)),
      ("content_type", Value::Text(content_type.name().to_string())),
      ("content_id", Value::Integer(content_id))
    ])?;
    saved.push(*tag_id);
  }
  debug!("Saved {} taglinks for content {}", saved.len(), content_id);
  Ok(())
}

// Delete everything and write the new set. Only meant to be
// run inside a transaction.
pub fn replace_with(
  conn: &Connection,
  content_type: ContentType,
  content_id: i64,
  tag_ids: &[i64]
) -> Result<(), DbError> {
  delete_for_content_with(conn, content_id)?;
  save_with(conn, content_type, content_id, tag_ids)
}

pub fn delete_for_content_with(conn: &Connection, content_id: i64) -> Result<usize, DbError> {
  let criteria = Criteria::new()
    .add(CriteriaItem::equal(TAGLINK_COLUMNS, "content_id", content_id)?);
  db::delete_all_with(conn, &TAGLINK, &criteria)
}

pub fn delete_for_tag_with(conn: &Connection, tag_id: i64) -> Result<usize, DbError> {
  let criteria = Criteria::new()
    .add(CriteriaItem::equal(TAGLINK_COLUMNS, "tag_id", tag_id)?);
  db::delete_all_with(conn, &TAGLINK, &criteria)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::testing::scratch_database;

  #[test]
  fn save_skips_duplicates_and_reads_back_sorted() {
    let (_dir, db) = scratch_database();
    let handler = TaglinkHandler::new(db.clone());
    db.transaction::<_, DbError, _>(|tx| save_with(tx, ContentType::Article, 1, &[9, 3, 9]))
      .unwrap();
    assert_eq!(vec![3, 9], handler.get_tag_ids(1).unwrap());
  }

  #[test]
  fn replace_swaps_the_whole_set() {
    let (_dir, db) = scratch_database();
    let handler = TaglinkHandler::new(db.clone());
    db.transaction::<_, DbError, _>(|tx| save_with(tx, ContentType::Article, 1, &[1, 2]))
      .unwrap();
    db.transaction::<_, DbError, _>(|tx| replace_with(tx, ContentType::Article, 1, &[2, 5]))
      .unwrap();
    assert_eq!(vec![2, 5], handler.get_tag_ids(1).unwrap());
  }

  #[test]
  fn batch_lookup_groups_by_content() {
    let (_dir, db) = scratch_database();
    let handler = TaglinkHandler::new(db.clone());
    db.transaction::<_, DbError, _>(|tx| {
      save_with(tx, ContentType::Article, 1, &[4, 2])?;
      save_with(tx, ContentType::Image, 2, &[4])
    }).unwrap();
    let tags = handler.get_tag_ids_for(&[1, 2, 3]).unwrap();
    assert_eq!(Some(&vec![2, 4]), tags.get(&1));
    assert_eq!(Some(&vec![4]), tags.get(&2));
    assert_eq!(None, tags.get(&3));
    assert!(handler.get_tag_ids_for(&[]).unwrap().is_empty());
  }

  #[test]
  fn delete_by_tag_and_by_content() {
    let (_dir, db) = scratch_database();
    let handler = TaglinkHandler::new(db.clone());
    db.transaction::<_, DbError, _>(|tx| {
      save_with(tx, ContentType::Article, 1, &[4, 5])?;
      save_with(tx, ContentType::Article, 2, &[4])
    }).unwrap();
    let removed = db.transaction::<_, DbError, _>(|tx| delete_for_tag_with(tx, 4)).unwrap();
    assert_eq!(2, removed);
    assert_eq!(vec![5], handler.get_tag_ids(1).unwrap());
    assert!(handler.get_tag_ids(2).unwrap().is_empty());
    db.transaction::<_, DbError, _>(|tx| delete_for_content_with(tx, 1)).unwrap();
    assert!(handler.get_tag_ids(1).unwrap().is_empty());
  }

  #[test]
  fn delete_single_link() {
    let (_dir, db) = scratch_database();
    let handler = TaglinkHandler::new(db.clone());
    db.transaction::<_, DbError, _>(|tx| save_with(tx, ContentType::Article, 1, &[4]))
      .unwrap();
    let ids: Vec<i64> = db.select(&TAGLINK, &Criteria::new(), Some(&["id"]), |row| row.get(0))
      .unwrap();
    handler.delete_taglink(ids[0]).unwrap();
    assert!(handler.get_tag_ids(1).unwrap().is_empty());
    assert!(handler.delete_taglink(ids[0]).is_err());
  }
}
