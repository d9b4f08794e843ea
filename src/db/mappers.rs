use std::convert::TryFrom;
use rusqlite::Row;
use crate::content::entity::ContentEntity;
use crate::content::types::{ContentType, Rights};
use crate::error::Error;
use super::DbError;

fn column_error(e: rusqlite::Error) -> Error {
  Error::Database(DbError::QueryFailed("map", String::from("content"), e.to_string()))
}

// Expects the full row (SELECT *). The discriminator has to
// resolve to a known type or the row is refused.
pub fn map_content(row: &Row) -> Result<ContentEntity, Error> {
  let type_name: String = row.get("type").map_err(column_error)?;
  let content_type: ContentType = type_name.parse()?;
  let rights: Option<i64> = row.get("rights").map_err(column_error)?;
  let rights = match rights {
    Some(r) if content_type.uses("rights") => Some(Rights::try_from(r)?),
    _ => None
  };
  let online: Option<i64> = row.get("online").map_err(column_error)?;
  let mut entity = ContentEntity {
    id: row.get("id").map_err(column_error)?,
    content_type,
    title: row.get::<_, Option<String>>("title").map_err(column_error)?.unwrap_or_default(),
    teaser: row.get::<_, Option<String>>("teaser").map_err(column_error)?.unwrap_or_default(),
    description: row.get::<_, Option<String>>("description").map_err(column_error)?
      .unwrap_or_default(),
    media: row.get("media").map_err(column_error)?,
    format: row.get("format").map_err(column_error)?,
    file_size: row.get("file_size").map_err(column_error)?,
    creator: row.get("creator").map_err(column_error)?,
    image: row.get("image").map_err(column_error)?,
    caption: row.get("caption").map_err(column_error)?,
    date: row.get::<_, Option<String>>("date").map_err(column_error)?.unwrap_or_default(),
    parent: row.get("parent").map_err(column_error)?,
    language: row.get("language").map_err(column_error)?,
    rights,
    publisher: row.get("publisher").map_err(column_error)?,
    online: online.unwrap_or(0) == 1,
    submission_time: row.get::<_, Option<i64>>("submission_time").map_err(column_error)?
      .unwrap_or(0),
    counter: row.get::<_, Option<i64>>("counter").map_err(column_error)?.unwrap_or(0),
    meta_title: row.get("meta_title").map_err(column_error)?,
    meta_description: row.get("meta_description").map_err(column_error)?,
    seo: row.get("seo").map_err(column_error)?,
    tags: Vec::new()
  };
  // Whatever was stored for a field the type ignores is
  // dropped on the way in.
  for field in content_type.ignored_fields() {
    match *field {
      "media" => entity.media = None,
      "format" => entity.format = None,
      "file_size" => entity.file_size = None,
      "creator" => entity.creator = None,
      "language" => entity.language = None,
      "publisher" => entity.publisher = None,
      "parent" => entity.parent = None,
      _ => ()
    }
  }
  Ok(entity)
}

// (content_id, tag_id) out of the taglink table.
pub fn map_taglink(row: &Row) -> Result<(i64, i64), rusqlite::Error> {
  Ok((row.get("content_id")?, row.get("tag_id")?))
}
