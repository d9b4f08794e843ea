use std::convert::TryFrom;
use derive_more::Display;
use serde::Serialize;
use regex::Regex;
use lazy_static::lazy_static;
use rusqlite::types::Value;
use crate::db::Pair;
use crate::utils::{bool_to_i64, text_utils, time_utils};
use super::types::{ContentType, Rights};

// Length of the plain text meta description we derive from
// the teaser when none was given.
const META_DESCRIPTION_LENGTH: usize = 160;

const ALLOWED_MIMETYPES: &[&str] = &[
  "application/epub+zip",
  "application/gzip",
  "application/msword",
  "application/pdf",
  "application/vnd.oasis.opendocument.text",
  "application/x-tar",
  "application/zip",
  "audio/mp4",
  "audio/mpeg",
  "audio/ogg",
  "audio/wav",
  "image/gif",
  "image/jpeg",
  "image/png",
  "image/svg+xml",
  "image/webp",
  "text/plain",
  "video/mp4",
  "video/ogg",
  "video/webm"
];

// Columns an update is allowed to touch. id, type,
// submission_time and counter are fixed after insert.
pub const MUTABLE_FIELDS: &[&str] = &[
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
  "meta_title",
  "meta_description",
  "seo"
];

lazy_static! {
  static ref FILE_PATH_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_\-./]+$").unwrap();
  static ref LANGUAGE_REGEX: Regex = Regex::new(r"^[a-z]{2}(-[A-Z]{2})?$").unwrap();
}

#[derive(Debug, Display, PartialEq)]
pub enum ValidationError {
  #[display(fmt = "{} must be an integer", _0)]
  NotInt(&'static str),
  #[display(fmt = "Illegal value for {} - {}", _0, _1)]
  IllegalValue(&'static str, String),
  #[display(fmt = "Unknown field: {}", _0)]
  UnknownField(String),
  #[display(fmt = "Unknown content type: {}", _0)]
  UnknownType(String)
}

impl std::error::Error for ValidationError {}

/**
 * One row of the content table, whatever its type. The type
 * decides which of the optional fields mean anything, fields
 * the type ignores are never set.
 * Tags aren't a column, they're resolved through the taglink
 * table by the handler.
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEntity {
  pub(crate) id: i64,
  #[serde(rename = "type")]
  pub(crate) content_type: ContentType,
  pub(crate) title: String,
  pub(crate) teaser: String,
  pub(crate) description: String,
  pub(crate) media: Option<String>,
  pub(crate) format: Option<String>,
  pub(crate) file_size: Option<i64>,
  pub(crate) creator: Option<String>,
  pub(crate) image: Option<String>,
  pub(crate) caption: Option<String>,
  pub(crate) date: String,
  pub(crate) parent: Option<i64>,
  pub(crate) language: Option<String>,
  pub(crate) rights: Option<Rights>,
  pub(crate) publisher: Option<String>,
  pub(crate) online: bool,
  pub(crate) submission_time: i64,
  pub(crate) counter: i64,
  pub(crate) meta_title: Option<String>,
  pub(crate) meta_description: Option<String>,
  pub(crate) seo: Option<String>,
  pub(crate) tags: Vec<i64>
}

impl ContentEntity {

  pub fn new(content_type: ContentType) -> Self {
    Self {
      id: 0,
      content_type,
      title: String::new(),
      teaser: String::new(),
      description: String::new(),
      media: None,
      format: None,
      file_size: None,
      creator: None,
      image: None,
      caption: None,
      date: time_utils::today(),
      parent: None,
      language: if content_type.uses("language") { Some(String::from("en")) } else { None },
      rights: if content_type.uses("rights") { Some(Rights::Copyright) } else { None },
      publisher: None,
      online: false,
      submission_time: 0,
      counter: 0,
      meta_title: None,
      meta_description: None,
      seo: None,
      tags: Vec::new()
    }
  }

  pub fn id(&self) -> i64 { self.id }
  pub fn content_type(&self) -> ContentType { self.content_type }
  pub fn title(&self) -> &str { &self.title }
  pub fn teaser(&self) -> &str { &self.teaser }
  pub fn description(&self) -> &str { &self.description }
  pub fn media(&self) -> Option<&str> { self.media.as_deref() }
  pub fn format(&self) -> Option<&str> { self.format.as_deref() }
  pub fn file_size(&self) -> Option<i64> { self.file_size }
  pub fn creator(&self) -> Option<&str> { self.creator.as_deref() }
  pub fn image(&self) -> Option<&str> { self.image.as_deref() }
  pub fn caption(&self) -> Option<&str> { self.caption.as_deref() }
  pub fn date(&self) -> &str { &self.date }
  pub fn parent(&self) -> Option<i64> { self.parent }
  pub fn language(&self) -> Option<&str> { self.language.as_deref() }
  pub fn rights(&self) -> Option<Rights> { self.rights }
  pub fn publisher(&self) -> Option<&str> { self.publisher.as_deref() }
  pub fn online(&self) -> bool { self.online }
  pub fn submission_time(&self) -> i64 { self.submission_time }
  pub fn counter(&self) -> i64 { self.counter }
  pub fn meta_title(&self) -> Option<&str> { self.meta_title.as_deref() }
  pub fn meta_description(&self) -> Option<&str> { self.meta_description.as_deref() }
  pub fn seo(&self) -> Option<&str> { self.seo.as_deref() }
  pub fn tags(&self) -> &[i64] { &self.tags }

  pub fn is_new(&self) -> bool {
    self.id == 0
  }

  // The id is handed out by storage and can't change after.
  pub fn set_id(&mut self, id: i64) -> Result<(), ValidationError> {
    if id < 1 {
      return Err(ValidationError::IllegalValue("id", format!("{} is not a valid id", id)));
    }
    if self.id != 0 && self.id != id {
      return Err(ValidationError::IllegalValue("id", String::from("id cannot change")));
    }
    self.id = id;
    Ok(())
  }

  pub fn set_title(&mut self, title: &str) -> Result<(), ValidationError> {
    let title = title.trim();
    if title.is_empty() {
      return Err(ValidationError::IllegalValue("title", String::from("cannot be empty")));
    }
    self.title = title.to_string();
    Ok(())
  }

  pub fn set_teaser(&mut self, html: &str) {
    self.teaser = text_utils::sanitize_html(html);
  }

  pub fn set_description(&mut self, html: &str) {
    self.description = text_utils::sanitize_html(html);
  }

  pub fn set_media(&mut self, media: Option<&str>) -> Result<(), ValidationError> {
    let media = check_file_path("media", media)?;
    if self.content_type.uses("media") {
      self.media = media;
    }
    Ok(())
  }

  pub fn set_format(&mut self, format: Option<&str>) -> Result<(), ValidationError> {
    let format = clean_text(format).map(|f| f.to_lowercase());
    if let Some(f) = &format {
      if !ALLOWED_MIMETYPES.contains(&f.as_str()) {
        return Err(ValidationError::IllegalValue("format", format!("{} is not allowed", f)));
      }
      let required_prefix = match self.content_type {
        ContentType::Audio => Some("audio/"),
        ContentType::Video => Some("video/"),
        _ => None
      };
      if let Some(prefix) = required_prefix {
        if !f.starts_with(prefix) {
          return Err(ValidationError::IllegalValue(
            "format",
            format!("{} content needs a {}* format", self.content_type, prefix)
          ));
        }
      }
    }
    if self.content_type.uses("format") {
      self.format = format;
    }
    Ok(())
  }

  pub fn set_file_size(&mut self, size: Option<i64>) -> Result<(), ValidationError> {
    if let Some(s) = size {
      if s < 0 {
        return Err(ValidationError::IllegalValue("file_size", String::from("cannot be negative")));
      }
    }
    if self.content_type.uses("file_size") {
      self.file_size = size;
    }
    Ok(())
  }

  pub fn set_creator(&mut self, creator: Option<&str>) {
    if self.content_type.uses("creator") {
      self.creator = clean_text(creator);
    }
  }

  pub fn set_image(&mut self, image: Option<&str>) -> Result<(), ValidationError> {
    self.image = check_file_path("image", image)?;
    Ok(())
  }

  pub fn set_caption(&mut self, caption: Option<&str>) {
    self.caption = clean_text(caption);
  }

  pub fn set_date(&mut self, date: &str) -> Result<(), ValidationError> {
    let date = date.trim();
    if !time_utils::is_valid_date(date) {
      return Err(ValidationError::IllegalValue(
        "date",
        format!("{} is not a YYYY-MM-DD date", date)
      ));
    }
    self.date = date.to_string();
    Ok(())
  }

  // Whether the parent exists and can hold children is for
  // the handler to check, it needs the database for that.
  pub fn set_parent(&mut self, parent: Option<i64>) -> Result<(), ValidationError> {
    if let Some(p) = parent {
      if p < 1 {
        return Err(ValidationError::IllegalValue("parent", format!("{} is not a valid id", p)));
      }
      if p == self.id {
        return Err(ValidationError::IllegalValue("parent", String::from("content cannot be its own parent")));
      }
    }
    if self.content_type.uses("parent") {
      self.parent = parent;
    }
    Ok(())
  }

  pub fn set_language(&mut self, language: Option<&str>) -> Result<(), ValidationError> {
    let language = clean_text(language);
    if let Some(l) = &language {
      if !LANGUAGE_REGEX.is_match(l) {
        return Err(ValidationError::IllegalValue("language", format!("{} is not a language code", l)));
      }
    }
    if self.content_type.uses("language") {
      self.language = language;
    }
    Ok(())
  }

  pub fn set_rights(&mut self, rights: Option<i64>) -> Result<(), ValidationError> {
    let rights = match rights {
      Some(r) => Some(Rights::try_from(r)?),
      None => None
    };
    if self.content_type.uses("rights") {
      self.rights = rights;
    }
    Ok(())
  }

  pub fn set_publisher(&mut self, publisher: Option<&str>) {
    if self.content_type.uses("publisher") {
      self.publisher = clean_text(publisher);
    }
  }

  pub fn set_online(&mut self, online: bool) {
    self.online = online;
  }

  // Views only ever go up.
  pub fn set_counter(&mut self, counter: i64) -> Result<(), ValidationError> {
    if counter < self.counter {
      return Err(ValidationError::IllegalValue("counter", String::from("counter cannot decrease")));
    }
    self.counter = counter;
    Ok(())
  }

  pub fn set_meta_title(&mut self, meta_title: Option<&str>) {
    self.meta_title = clean_text(meta_title);
  }

  pub fn set_meta_description(&mut self, meta_description: Option<&str>) {
    self.meta_description = clean_text(meta_description);
  }

  pub fn set_seo(&mut self, seo: Option<&str>) -> Result<(), ValidationError> {
    self.seo = match clean_text(seo) {
      Some(s) => {
        let normalized = text_utils::normalize_seo(&s);
        if normalized.is_empty() {
          return Err(ValidationError::IllegalValue("seo", format!("{} has nothing usable in a URL", s)));
        }
        Some(normalized)
      },
      None => None
    };
    Ok(())
  }

  pub fn set_tags(&mut self, tags: Vec<i64>) -> Result<(), ValidationError> {
    let mut unique: Vec<i64> = Vec::with_capacity(tags.len());
    for tag in tags {
      if tag < 1 {
        return Err(ValidationError::IllegalValue("tags", format!("{} is not a valid id", tag)));
      }
      if !unique.contains(&tag) {
        unique.push(tag);
      }
    }
    self.tags = unique;
    Ok(())
  }

  /**
   * Sets a field from form-like string input. Only the fields
   * an admin is allowed to edit are accepted. Empty strings
   * clear optional fields.
   */
  pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    let optional = if trimmed.is_empty() { None } else { Some(trimmed) };
    match key {
      "title" => self.set_title(value),
      "teaser" => Ok(self.set_teaser(value)),
      "description" => Ok(self.set_description(value)),
      "media" => self.set_media(optional),
      "format" => self.set_format(optional),
      "file_size" => self.set_file_size(parse_optional_int("file_size", optional)?),
      "creator" => Ok(self.set_creator(optional)),
      "image" => self.set_image(optional),
      "caption" => Ok(self.set_caption(optional)),
      "date" => self.set_date(value),
      "parent" => self.set_parent(parse_optional_int("parent", optional)?),
      "language" => self.set_language(optional),
      "rights" => self.set_rights(parse_optional_int("rights", optional)?),
      "publisher" => Ok(self.set_publisher(optional)),
      "online" => Ok(self.set_online(parse_bool("online", trimmed)?)),
      "meta_title" => Ok(self.set_meta_title(optional)),
      "meta_description" => Ok(self.set_meta_description(optional)),
      "seo" => self.set_seo(optional),
      "tags" => {
        let mut tags: Vec<i64> = Vec::new();
        for t in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
          tags.push(t.parse().map_err(|_| ValidationError::NotInt("tags"))?);
        }
        self.set_tags(tags)
      },
      "id" => Err(ValidationError::IllegalValue("id", String::from("assigned by storage"))),
      "type" => Err(ValidationError::IllegalValue("type", String::from("fixed at creation"))),
      "submission_time" => Err(ValidationError::IllegalValue("submission_time", String::from("set on insert"))),
      "counter" => Err(ValidationError::IllegalValue("counter", String::from("only incremented by views"))),
      _ => Err(ValidationError::UnknownField(key.to_string()))
    }
  }

  pub fn meta_description_or_teaser(&self) -> String {
    match &self.meta_description {
      Some(d) => d.clone(),
      None => {
        let mut plain = text_utils::strip_html(&self.teaser)
          .split_whitespace()
          .collect::<Vec<&str>>()
          .join(" ");
        text_utils::truncate_utf8(&mut plain, META_DESCRIPTION_LENGTH);
        plain
      }
    }
  }

  /**
   * Column/value pairs for the content table. The id is left
   * out, storage assigns it. Fields the type ignores are
   * written as NULL.
   */
  pub fn to_row(&self) -> Vec<Pair<'static>> {
    vec![
      ("type", Value::Text(self.content_type.name().to_string())),
      ("title", Value::Text(self.title.clone())),
      ("teaser", Value::Text(self.teaser.clone())),
      ("description", Value::Text(self.description.clone())),
      ("media", optional_text(&self.media)),
      ("format", optional_text(&self.format)),
      ("file_size", optional_int(self.file_size)),
      ("creator", optional_text(&self.creator)),
      ("image", optional_text(&self.image)),
      ("caption", optional_text(&self.caption)),
      ("date", Value::Text(self.date.clone())),
      ("parent", optional_int(self.parent)),
      ("language", optional_text(&self.language)),
      ("rights", optional_int(self.rights.map(|r| r.id()))),
      ("publisher", optional_text(&self.publisher)),
      ("online", Value::Integer(bool_to_i64(self.online))),
      ("submission_time", Value::Integer(self.submission_time)),
      ("counter", Value::Integer(self.counter)),
      ("meta_title", optional_text(&self.meta_title)),
      ("meta_description", optional_text(&self.meta_description)),
      ("seo", optional_text(&self.seo))
    ]
  }

  pub fn to_update_row(&self) -> Vec<Pair<'static>> {
    self.to_row()
      .into_iter()
      .filter(|(column, _)| MUTABLE_FIELDS.contains(column))
      .collect()
  }

}

fn clean_text(value: Option<&str>) -> Option<String> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(String::from)
}

fn check_file_path(
  field: &'static str,
  path: Option<&str>
) -> Result<Option<String>, ValidationError> {
  match clean_text(path) {
    Some(p) => {
      if p.starts_with('/') || p.contains("..") || !FILE_PATH_REGEX.is_match(&p) {
        Err(ValidationError::IllegalValue(field, format!("{} is not a valid file path", p)))
      } else {
        Ok(Some(p))
      }
    },
    None => Ok(None)
  }
}

fn parse_optional_int(
  field: &'static str,
  value: Option<&str>
) -> Result<Option<i64>, ValidationError> {
  match value {
    Some(v) => v.parse::<i64>()
      .map(Some)
      .map_err(|_| ValidationError::NotInt(field)),
    None => Ok(None)
  }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ValidationError> {
  match value.to_lowercase().as_str() {
    "1" | "true" | "on" => Ok(true),
    "0" | "false" | "off" | "" => Ok(false),
    _ => Err(ValidationError::IllegalValue(field, format!("{} is not a boolean", value)))
  }
}

fn optional_text(value: &Option<String>) -> Value {
  match value {
    Some(v) => Value::Text(v.clone()),
    None => Value::Null
  }
}

fn optional_int(value: Option<i64>) -> Value {
  match value {
    Some(v) => Value::Integer(v),
    None => Value::Null
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_entity_has_type_defaults() {
    let article = ContentEntity::new(ContentType::Article);
    assert!(article.is_new());
    assert_eq!(Some("en"), article.language());
    assert_eq!(Some(Rights::Copyright), article.rights());
    assert!(!article.online());
    assert_eq!(0, article.counter());
    let tag = ContentEntity::new(ContentType::Tag);
    assert_eq!(None, tag.language());
    assert_eq!(None, tag.rights());
  }

  #[test]
  fn tag_ignores_media_fields() {
    let mut tag = ContentEntity::new(ContentType::Tag);
    tag.set_media(Some("uploads/song.mp3")).unwrap();
    tag.set_rights(Some(2)).unwrap();
    tag.set_language(Some("th")).unwrap();
    assert_eq!(None, tag.media());
    assert_eq!(None, tag.rights());
    assert_eq!(None, tag.language());
    let row = tag.to_row();
    let media = row.iter().find(|(c, _)| *c == "media").unwrap();
    assert_eq!(Value::Null, media.1);
  }

  #[test]
  fn ignored_fields_are_still_validated() {
    let mut tag = ContentEntity::new(ContentType::Tag);
    assert!(tag.set_rights(Some(99)).is_err());
  }

  #[test]
  fn id_is_immutable_once_set() {
    let mut entity = ContentEntity::new(ContentType::Article);
    assert!(entity.set_id(0).is_err());
    entity.set_id(4).unwrap();
    assert!(entity.set_id(4).is_ok());
    assert_eq!(
      Err(ValidationError::IllegalValue("id", String::from("id cannot change"))),
      entity.set_id(5)
    );
  }

  #[test]
  fn parent_cannot_be_self() {
    let mut entity = ContentEntity::new(ContentType::Image);
    entity.set_id(9).unwrap();
    assert!(entity.set_parent(Some(9)).is_err());
    assert!(entity.set_parent(Some(-1)).is_err());
    entity.set_parent(Some(3)).unwrap();
    assert_eq!(Some(3), entity.parent());
  }

  #[test]
  fn teaser_is_sanitized() {
    let mut entity = ContentEntity::new(ContentType::Article);
    entity.set_teaser("<p>Hi</p><script>alert(1)</script>");
    assert_eq!("<p>Hi</p>", entity.teaser());
    entity.set_description("<p>Hi</p><scr<script>x</script>ipt>alert(1)</script>");
    assert_eq!("<p>Hi</p>", entity.description());
  }

  #[test]
  fn format_is_whitelisted_and_checked_per_type() {
    let mut audio = ContentEntity::new(ContentType::Audio);
    assert!(audio.set_format(Some("application/x-msdownload")).is_err());
    assert!(audio.set_format(Some("video/mp4")).is_err());
    audio.set_format(Some("Audio/MPEG")).unwrap();
    assert_eq!(Some("audio/mpeg"), audio.format());
  }

  #[test]
  fn file_paths_are_checked() {
    let mut entity = ContentEntity::new(ContentType::Download);
    assert!(entity.set_media(Some("../../etc/passwd")).is_err());
    assert!(entity.set_media(Some("/etc/passwd")).is_err());
    assert!(entity.set_image(Some("pic<script>.png")).is_err());
    entity.set_media(Some("uploads/manual-v2.pdf")).unwrap();
    assert_eq!(Some("uploads/manual-v2.pdf"), entity.media());
  }

  #[test]
  fn counter_only_goes_up() {
    let mut entity = ContentEntity::new(ContentType::Article);
    entity.set_counter(3).unwrap();
    assert!(entity.set_counter(2).is_err());
    assert_eq!(3, entity.counter());
  }

  #[test]
  fn set_field_handles_form_input() {
    let mut entity = ContentEntity::new(ContentType::Article);
    entity.set_field("title", "  Hello ").unwrap();
    entity.set_field("online", "1").unwrap();
    entity.set_field("rights", "9").unwrap();
    entity.set_field("tags", "5, 7,5").unwrap();
    entity.set_field("seo", "Hello World").unwrap();
    entity.set_field("creator", "").unwrap();
    assert_eq!("Hello", entity.title());
    assert!(entity.online());
    assert_eq!(Some(Rights::PublicDomain), entity.rights());
    assert_eq!(&[5, 7], entity.tags());
    assert_eq!(Some("hello-world"), entity.seo());
    assert_eq!(None, entity.creator());
  }

  #[test]
  fn set_field_errors() {
    let mut entity = ContentEntity::new(ContentType::Article);
    assert_eq!(Err(ValidationError::NotInt("parent")), entity.set_field("parent", "abc"));
    assert_eq!(Err(ValidationError::NotInt("tags")), entity.set_field("tags", "1,x"));
    assert_eq!(
      Err(ValidationError::UnknownField("password".to_string())),
      entity.set_field("password", "x")
    );
    assert!(entity.set_field("type", "Tag").is_err());
    assert!(entity.set_field("id", "3").is_err());
    assert!(entity.set_field("date", "yesterday").is_err());
    assert!(entity.set_field("language", "English").is_err());
  }

  #[test]
  fn update_row_leaves_fixed_columns_out() {
    let entity = ContentEntity::new(ContentType::Article);
    let columns: Vec<&str> = entity.to_update_row().iter().map(|p| p.0).collect();
    assert_eq!(MUTABLE_FIELDS.to_vec(), columns);
    assert!(!columns.contains(&"type"));
    assert!(!columns.contains(&"counter"));
  }

  #[test]
  fn meta_description_falls_back_to_plain_teaser() {
    let mut entity = ContentEntity::new(ContentType::Article);
    entity.set_teaser("<p>A small\n  fish</p>");
    assert_eq!("A small fish", entity.meta_description_or_teaser());
    entity.set_meta_description(Some("Custom"));
    assert_eq!("Custom", entity.meta_description_or_teaser());
  }
}
