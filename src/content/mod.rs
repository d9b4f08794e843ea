use std::collections::BTreeSet;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use rusqlite::types::Value;
use serde::Serialize;
use crate::db::{
  self,
  mappers::map_content,
  Criteria,
  CriteriaItem,
  Database,
  Order,
  Pair,
  CONTENT,
  CONTENT_COLUMNS
};
use crate::error::{Error, Result};
use crate::utils::time_utils;
pub mod entity;
pub mod search;
pub mod taglink;
pub mod types;
use entity::{ContentEntity, ValidationError};
use search::SearchMode;
use taglink::TaglinkHandler;
use types::ContentType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagLink {
  pub id: i64,
  pub title: String,
  pub url: String
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
  pub count: i64,
  pub items: Vec<ContentEntity>
}

impl SearchResults {
  fn empty() -> Self {
    Self {
      count: 0,
      items: Vec::new()
    }
  }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
  pub min_length: usize,
  pub max_terms: usize
}

impl Default for SearchSettings {
  fn default() -> Self {
    Self {
      min_length: 3,
      max_terms: 10
    }
  }
}

/**
 * Everything content goes through here: reads, the writes
 * and their cascades, search and the view counter.
 * No access checks are done at this level, callers have to
 * make sure the writes come from an admin.
 */
#[derive(Clone)]
pub struct ContentHandler {
  db: Database,
  taglinks: TaglinkHandler,
  search: SearchSettings
}

impl ContentHandler {

  pub fn new(db: Database, search: SearchSettings) -> Self {
    Self {
      taglinks: TaglinkHandler::new(db.clone()),
      db,
      search
    }
  }

  pub fn taglinks(&self) -> &TaglinkHandler {
    &self.taglinks
  }

  // Returns Ok(None) when there's no such id. Query errors
  // are still errors.
  pub fn get_object(&self, id: i64) -> Result<Option<ContentEntity>> {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id)?);
    let mut found: Option<ContentEntity> = None;
    self.for_each_object(&criteria, |entity| {
      found = Some(entity);
      Ok(())
    })?;
    match found {
      Some(mut entity) => {
        entity.tags = self.taglinks.get_tag_ids(id)?;
        Ok(Some(entity))
      },
      None => Ok(None)
    }
  }

  pub fn get_objects(&self, criteria: &Criteria) -> Result<Vec<ContentEntity>> {
    let mut items: Vec<ContentEntity> = Vec::new();
    self.for_each_object(criteria, |entity| {
      items.push(entity);
      Ok(())
    })?;
    self.load_tags(&mut items)?;
    Ok(items)
  }

  /**
   * Hands the entities to f one at a time, straight off the
   * cursor. Tags aren't loaded here (the cursor is holding a
   * connection), use load_tags if you need them.
   * Returning an error from f stops the iteration.
   */
  pub fn for_each_object<F>(&self, criteria: &Criteria, mut f: F) -> Result<()>
    where F: FnMut(ContentEntity) -> Result<()>
  {
    self.db.select_each::<_, Error>(&CONTENT, criteria, None, |row| {
      f(map_content(row)?)
    })
  }

  pub fn get_count(&self, criteria: &Criteria) -> Result<i64> {
    Ok(self.db.select_count(&CONTENT, criteria)?)
  }

  pub fn load_tags(&self, items: &mut [ContentEntity]) -> Result<()> {
    let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
    let mut tags = self.taglinks.get_tag_ids_for(&ids)?;
    for item in items.iter_mut() {
      item.tags = tags.remove(&item.id).unwrap_or_default();
    }
    Ok(())
  }

  /**
   * Saves a new entity and its tags in one go. Whatever id
   * the entity had is ignored, the submission time is
   * set here.
   */
  pub fn insert(&self, entity: &ContentEntity) -> Result<i64> {
    check_title(entity)?;
    let now = time_utils::current_timestamp();
    let row: Vec<Pair<'_>> = entity.to_row()
      .into_iter()
      .map(|(column, value)| {
        if column == "submission_time" {
          (column, Value::Integer(now))
        } else {
          (column, value)
        }
      })
      .collect();
    let id = self.db.transaction::<_, Error, _>(|tx| {
      check_references(tx, entity)?;
      let id = db::insert_with(tx, &CONTENT, &row)?;
      taglink::save_with(tx, entity.content_type, id, &entity.tags)?;
      Ok(id)
    })?;
    info!("Inserted {} {}", entity.content_type, id);
    Ok(id)
  }

  // Only the mutable fields are written. The stored type has
  // to match the entity's.
  pub fn update(&self, entity: &ContentEntity) -> Result<()> {
    if entity.is_new() {
      return Err(ValidationError::IllegalValue(
        "id",
        String::from("content has to be inserted first")
      ).into());
    }
    check_title(entity)?;
    let row = entity.to_update_row();
    self.db.transaction::<_, Error, _>(|tx| {
      let stored = stored_type(tx, entity.id)?;
      if stored != entity.content_type {
        return Err(ValidationError::IllegalValue(
          "type",
          format!("{} {} cannot become {}", stored, entity.id, entity.content_type)
        ).into());
      }
      check_references(tx, entity)?;
      db::update_with(tx, &CONTENT, entity.id, &row)?;
      taglink::replace_with(tx, entity.content_type, entity.id, &entity.tags)
        .map_err(Error::from)
    })?;
    info!("Updated {} {}", entity.content_type, entity.id);
    Ok(())
  }

  /**
   * Deletes the content and everything pointing at it: its
   * taglinks, the links to it if it's a tag. Children of a
   * collection are detached rather than deleted.
   * Either all of it happens or nothing does.
   */
  pub fn delete(&self, id: i64) -> Result<()> {
    self.db.transaction::<_, Error, _>(|tx| {
      let content_type = stored_type(tx, id)?;
      let removed = taglink::delete_for_content_with(tx, id)?;
      debug!("Removed {} taglinks from content {}", removed, id);
      if content_type == ContentType::Tag {
        let removed = taglink::delete_for_tag_with(tx, id)?;
        debug!("Removed {} taglinks to tag {}", removed, id);
      }
      if content_type.is_collection() {
        let children = Criteria::new()
          .add(CriteriaItem::equal(CONTENT_COLUMNS, "parent", id)?);
        db::update_all_with(tx, &CONTENT, &children, &[("parent", Value::Null)])?;
      }
      db::delete_with(tx, &CONTENT, id)?;
      Ok(())
    })?;
    info!("Deleted content {}", id);
    Ok(())
  }

  pub fn toggle_online_status(&self, id: i64) -> Result<()> {
    Ok(self.db.toggle_boolean(id, &CONTENT, "online")?)
  }

  // Fire and forget, a lost view isn't worth failing a page
  // for.
  pub fn update_counter(&self, id: i64) {
    if let Err(e) = self.db.increment(id, &CONTENT, "counter") {
      error!("Could not update counter for content {} - {}", id, e);
    }
  }

  /**
   * Search over online content. Input that's empty or made
   * only of terms that are too short gives no results, not
   * an error. Check the count before using the items.
   */
  pub fn search_content(
    &self,
    input: &str,
    mode: SearchMode,
    limit: u32,
    offset: u32
  ) -> Result<SearchResults> {
    let terms = search::prepare_terms(
      input,
      mode,
      self.search.min_length,
      self.search.max_terms
    );
    if terms.is_empty() {
      debug!("Nothing to search for in \"{}\"", input);
      return Ok(SearchResults::empty());
    }
    let criteria = search::search_criteria(&terms, mode)?;
    let count = self.get_count(&criteria)?;
    if count == 0 {
      return Ok(SearchResults::empty());
    }
    let items = self.get_objects(
      &criteria.set_limit(limit).set_offset(offset)
    )?;
    Ok(SearchResults { count, items })
  }

  /**
   * Turns tag ids into something a template can print. Ids
   * that aren't tags are skipped.
   */
  pub fn make_tag_links(&self, tag_ids: &[i64], target_page: &str) -> Result<Vec<TagLink>> {
    if tag_ids.is_empty() {
      return Ok(Vec::new());
    }
    let criteria = Criteria::new()
      .add(CriteriaItem::new(CONTENT_COLUMNS, "id", tag_ids.to_vec(), "IN")?)
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "type", ContentType::Tag.name())?)
      .set_order("title")
      .set_order_type(Order::Asc);
    let tags: Vec<(i64, String)> = self.db.select(
      &CONTENT,
      &criteria,
      Some(&["id", "title"]),
      |row| Ok((row.get(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
    )?;
    Ok(
      tags.into_iter()
        .map(|(id, title)| TagLink {
          url: format!("{}?tag_id={}", target_page, id),
          id,
          title
        })
        .collect()
    )
  }

  // (id, title) of every tag, sorted by title.
  pub fn get_tag_list(&self, online_only: bool) -> Result<Vec<(i64, String)>> {
    self.id_title_list(vec![ContentType::Tag.name()], online_only)
  }

  // Possible parents for other content.
  pub fn get_collection_list(&self, online_only: bool) -> Result<Vec<(i64, String)>> {
    let types = ContentType::ALL.iter()
      .filter(|t| t.is_collection())
      .map(|t| t.name())
      .collect();
    self.id_title_list(types, online_only)
  }

  fn id_title_list(&self, types: Vec<&str>, online_only: bool) -> Result<Vec<(i64, String)>> {
    let mut criteria = Criteria::new()
      .add(CriteriaItem::new(CONTENT_COLUMNS, "type", types, "IN")?)
      .set_order("title")
      .set_order_type(Order::Asc);
    if online_only {
      criteria = criteria.add(CriteriaItem::equal(CONTENT_COLUMNS, "online", 1)?);
    }
    Ok(self.db.select(
      &CONTENT,
      &criteria,
      Some(&["id", "title"]),
      |row| Ok((row.get(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
    )?)
  }

  // Types that have at least one row stored.
  pub fn get_active_types(&self) -> Result<Vec<ContentType>> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    self.db.select_each::<_, Error>(&CONTENT, &Criteria::new(), Some(&["type"]), |row| {
      let name: Option<String> = row.get(0)
        .map_err(|e| db::DbError::QueryFailed("select", CONTENT.name.to_string(), e.to_string()))?;
      if let Some(name) = name {
        names.insert(name);
      }
      Ok(())
    })?;
    let mut types: Vec<ContentType> = Vec::with_capacity(names.len());
    for name in names {
      match name.parse::<ContentType>() {
        Ok(t) => types.push(t),
        Err(_) => warn!("Ignoring unknown content type {} in storage", name)
      }
    }
    types.sort_by_key(|t| ContentType::ALL.iter().position(|a| a == t));
    Ok(types)
  }

}

fn check_title(entity: &ContentEntity) -> Result<()> {
  if entity.title.trim().is_empty() {
    Err(ValidationError::IllegalValue("title", String::from("cannot be empty")).into())
  } else {
    Ok(())
  }
}

fn stored_type(conn: &Connection, id: i64) -> Result<ContentType> {
  let criteria = Criteria::new()
    .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id)?);
  let types: Vec<String> = db::select_with(
    conn,
    &CONTENT,
    &criteria,
    Some(&["type"]),
    |row| row.get(0)
  )?;
  match types.first() {
    Some(t) => Ok(t.parse()?),
    None => Err(Error::NotFound(id))
  }
}

// Type and parent of a stored row, None when the id is unknown.
fn stored_parent_info(conn: &Connection, id: i64) -> Result<Option<(String, Option<i64>)>> {
  let criteria = Criteria::new()
    .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", id)?);
  let rows: Vec<(String, Option<i64>)> = db::select_with(
    conn,
    &CONTENT,
    &criteria,
    Some(&["type", "parent"]),
    |row| Ok((row.get(0)?, row.get(1)?))
  )?;
  Ok(rows.into_iter().next())
}

fn illegal_parent(message: String) -> Error {
  ValidationError::IllegalValue("parent", message).into()
}

/**
 * Collections only go one level deep: the parent has to be an
 * existing collection that isn't inside another collection
 * itself, and content that already has children can't be
 * moved under a parent. That rules out cycles too.
 * Every tag id also has to point at a tag.
 */
fn check_references(conn: &Connection, entity: &ContentEntity) -> Result<()> {
  if let Some(parent) = entity.parent {
    // The setter only catches this when the id was set first.
    if !entity.is_new() && parent == entity.id {
      return Err(illegal_parent(String::from("content cannot be its own parent")));
    }
    let (type_name, grandparent) = match stored_parent_info(conn, parent)? {
      Some(info) => info,
      None => return Err(illegal_parent(format!("{} is not a collection", parent)))
    };
    let is_collection = type_name.parse::<ContentType>()
      .map(|t| t.is_collection())
      .unwrap_or(false);
    if !is_collection {
      return Err(illegal_parent(format!("{} is not a collection", parent)));
    }
    if grandparent.is_some() {
      return Err(illegal_parent(format!("{} is already inside a collection", parent)));
    }
    if !entity.is_new() {
      let children = Criteria::new()
        .add(CriteriaItem::equal(CONTENT_COLUMNS, "parent", entity.id)?);
      if db::select_count_with(conn, &CONTENT, &children)? > 0 {
        return Err(illegal_parent(String::from("content with children cannot have a parent")));
      }
    }
  }
  if !entity.tags.is_empty() {
    let criteria = Criteria::new()
      .add(CriteriaItem::new(CONTENT_COLUMNS, "id", entity.tags.clone(), "IN")?)
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "type", ContentType::Tag.name())?);
    let found = db::select_count_with(conn, &CONTENT, &criteria)?;
    if found as usize != entity.tags.len() {
      return Err(ValidationError::IllegalValue(
        "tags",
        String::from("some tag ids don't point at tags")
      ).into());
    }
  }
  Ok(())
}
