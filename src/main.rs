use std::env;
use color_eyre::Result;
use eyre::{eyre, WrapErr};
use dotenv::dotenv;
use getopts::{Matches, Options};
use log::{debug, error, info};
use serde::Serialize;
use tuskfish_content::app::AppContext;
use tuskfish_content::config::Config;
use tuskfish_content::content::TagLink;
use tuskfish_content::content::entity::ContentEntity;
use tuskfish_content::content::search::SearchMode;
use tuskfish_content::content::types::ContentType;
use tuskfish_content::db::{Criteria, CriteriaItem, Order, CONTENT_COLUMNS};
use tuskfish_content::utils::time_utils::timestamp_to_date_string;

const TAG_PAGE: &str = "index.php";

// Copy pasted this from getopts doc.
fn print_usage(program: &str, opts: Options) {
  let brief = format!("Usage: {} [options]", program);
  print!("{}", opts.usage(&brief));
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
  value.trim().parse::<T>()
    .map_err(|_| eyre!("{} is not a valid {}", value, name))
}

fn opt_number<T: std::str::FromStr>(matches: &Matches, name: &str) -> Result<Option<T>> {
  match matches.opt_str(name) {
    Some(value) => Ok(Some(parse_number(name, &value)?)),
    None => Ok(None)
  }
}

// Listing and counting share the same filters.
fn filter_criteria(matches: &Matches, content_type: Option<String>) -> Result<Criteria> {
  let mut criteria = Criteria::new();
  if let Some(t) = content_type {
    let content_type: ContentType = t.parse()?;
    criteria = criteria.add(CriteriaItem::equal(CONTENT_COLUMNS, "type", content_type.name())?);
  }
  if matches.opt_present("online") {
    criteria = criteria.add(CriteriaItem::equal(CONTENT_COLUMNS, "online", 1)?);
  }
  let mut tags: Vec<i64> = Vec::new();
  for tag in matches.opt_strs("tag") {
    tags.push(parse_number("tag", &tag)?);
  }
  if !tags.is_empty() {
    criteria = criteria.set_tag(tags);
  }
  Ok(criteria)
}

// --set key=value, as many as needed.
fn apply_fields(entity: &mut ContentEntity, matches: &Matches) -> Result<()> {
  for pair in matches.opt_strs("set") {
    let mut split = pair.splitn(2, '=');
    let key = split.next().unwrap_or("").trim();
    let value = split.next()
      .ok_or_else(|| eyre!("Expected key=value, got {}", pair))?;
    entity.set_field(key, value)
      .with_context(|| format!("Setting {}", key))?;
  }
  Ok(())
}

#[derive(Serialize)]
struct ContentView<'a> {
  content: &'a ContentEntity,
  submitted: String,
  meta_description: String,
  rights_label: Option<&'static str>,
  tag_links: Vec<TagLink>
}

// The JSON for --get, the same thing a content page would
// be built from.
fn render_content(context: &AppContext, id: i64) -> Result<String> {
  let entity = context.content.get_object(id)?
    .ok_or_else(|| eyre!("No content with id {}", id))?;
  let tag_links = context.content.make_tag_links(entity.tags(), TAG_PAGE)?;
  let view = ContentView {
    content: &entity,
    submitted: timestamp_to_date_string(entity.submission_time()),
    meta_description: entity.meta_description_or_teaser(),
    rights_label: entity.rights().map(|r| r.label()),
    tag_links
  };
  Ok(serde_json::to_string_pretty(&view)?)
}

/**
 * Admin tool for the content database. Everything is
 * printed as JSON, rendering pages is someone else's job.
 */
fn main() -> Result<()> {
  dotenv().ok();
  // Set RUST_LOG to info by default if absent:
  if env::var("RUST_LOG").is_err() {
    env::set_var("RUST_LOG", "info");
  }
  env_logger::init();
  color_eyre::install()?;

  let args: Vec<String> = env::args().collect();
  let program = args[0].clone();
  let mut opts = Options::new();
  opts.optflag("i", "install", "Create the database and install the schema");
  opts.optopt("g", "get", "Show one content item", "ID");
  opts.optflagopt("l", "list", "List content, optionally of one type", "TYPE");
  opts.optflagopt("c", "count", "Count content, optionally of one type", "TYPE");
  opts.optmulti("", "tag", "Only content with this tag (repeatable)", "TAG_ID");
  opts.optflag("", "online", "Only online content");
  opts.optopt("", "limit", "Maximum number of items listed", "N");
  opts.optopt("", "offset", "Number of items to skip", "N");
  opts.optopt("s", "search", "Search online content", "TERMS");
  opts.optopt("m", "mode", "Search mode: ALL, ANY or EXACT (default ALL)", "MODE");
  opts.optopt("a", "add", "Add content of the given type", "TYPE");
  opts.optopt("u", "update", "Update content", "ID");
  opts.optmulti("", "set", "Field to set when adding or updating (repeatable)", "KEY=VALUE");
  opts.optopt("t", "toggle", "Toggle online status", "ID");
  opts.optopt("d", "delete", "Delete content and its tag links", "ID");
  opts.optopt("v", "view", "Count a view for this content", "ID");
  opts.optflag("", "tags", "List tags");
  opts.optflag("", "collections", "List collections");
  opts.optflag("", "types", "List the content types in use");
  opts.optflag("h", "help", "Program usage");
  let matches = opts.parse(&args[1..])?;
  if matches.opt_present("h") {
    print_usage(&program, opts);
    return Ok(());
  }

  let config = Config::from_env()
    .expect("Configuration (environment or .env file) is missing");

  if matches.opt_present("install") {
    let context = AppContext::install(&config)?;
    info!("Database ready at {}", config.db_path);
    context.close();
    return Ok(());
  }

  let context = AppContext::open(&config)?;
  let limit: u32 = opt_number(&matches, "limit")?.unwrap_or(context.pagination);
  let offset: u32 = opt_number(&matches, "offset")?.unwrap_or(0);

  if let Some(id) = opt_number::<i64>(&matches, "get")? {
    // Served from the page cache when it's on, writes flush it.
    let key = id.to_string();
    let params = [("id", key.as_str())];
    let page = match context.cache.fetch("content", &params) {
      Some(page) => page,
      None => {
        let page = render_content(&context, id)?;
        if let Err(e) = context.cache.store("content", &params, &page) {
          error!("Could not cache content {} - {}", id, e);
        }
        page
      }
    };
    println!("{}", page);
  } else if matches.opt_present("list") {
    let criteria = filter_criteria(&matches, matches.opt_str("list"))?
      .set_order("date")
      .set_order_type(Order::Desc)
      .set_secondary_order("submission_time")
      .set_secondary_order_type(Order::Desc)
      .set_limit(limit)
      .set_offset(offset);
    print_json(&context.content.get_objects(&criteria)?)?;
  } else if matches.opt_present("count") {
    let criteria = filter_criteria(&matches, matches.opt_str("count"))?;
    println!("{}", context.content.get_count(&criteria)?);
  } else if let Some(terms) = matches.opt_str("search") {
    let mode: SearchMode = match matches.opt_str("mode") {
      Some(m) => m.parse()?,
      None => SearchMode::All
    };
    let results = context.content.search_content(&terms, mode, limit, offset)?;
    debug!("Search for \"{}\" ({}) found {}", terms, mode, results.count);
    print_json(&results)?;
  } else if let Some(t) = matches.opt_str("add") {
    let content_type: ContentType = t.parse()?;
    let mut entity = ContentEntity::new(content_type);
    apply_fields(&mut entity, &matches)?;
    let id = context.mutate(|content| content.insert(&entity))?;
    println!("{}", id);
  } else if let Some(id) = opt_number::<i64>(&matches, "update")? {
    let mut entity = context.content.get_object(id)?
      .ok_or_else(|| eyre!("No content with id {}", id))?;
    apply_fields(&mut entity, &matches)?;
    context.mutate(|content| content.update(&entity))?;
    info!("Content {} updated", id);
  } else if let Some(id) = opt_number::<i64>(&matches, "toggle")? {
    context.mutate(|content| content.toggle_online_status(id))?;
    info!("Toggled online status of {}", id);
  } else if let Some(id) = opt_number::<i64>(&matches, "delete")? {
    context.mutate(|content| content.delete(id))?;
    info!("Content {} deleted", id);
  } else if let Some(id) = opt_number::<i64>(&matches, "view")? {
    context.record_view(id);
  } else if matches.opt_present("tags") {
    print_json(&context.content.get_tag_list(matches.opt_present("online"))?)?;
  } else if matches.opt_present("collections") {
    print_json(&context.content.get_collection_list(matches.opt_present("online"))?)?;
  } else if matches.opt_present("types") {
    print_json(&context.content.get_active_types()?)?;
  } else {
    print_usage(&program, opts);
  }

  context.close();
  Ok(())
}
