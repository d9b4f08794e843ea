use std::fs;
use std::io;
use std::path::PathBuf;
use regex::Regex;
use lazy_static::lazy_static;
use log::{debug, error, info};

const CACHE_EXT: &str = "html";

lazy_static! {
  static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_]+").unwrap();
}

/**
 * Rendered pages stored as plain files, one per page and
 * parameter combination. Nothing in here knows when a
 * page goes stale, whoever writes content has to flush.
 */
pub struct PageCache {
  cache_path: PathBuf,
  enabled: bool
}

impl PageCache {

  // The directory has to exist and be writable, even when
  // caching is off, so that turning it on later can't fail.
  pub fn open(path: &str, enabled: bool) -> Result<Self, io::Error> {
    let cache_path = PathBuf::from(path);
    let read_only = cache_path.metadata()?.permissions().readonly();
    let is_dir = cache_path.is_dir();
    match (read_only, is_dir) {
      (false, true) => {
        info!("Page cache at {} (enabled: {})", path, enabled);
        Ok(Self { cache_path, enabled })
      },
      _ => Err(
        io::Error::new(
          io::ErrorKind::PermissionDenied,
          "Cache directory is not writable"
        )
      )
    }
  }

  fn file_for(&self, basename: &str, params: &[(&str, &str)]) -> PathBuf {
    let mut name = clean_name(basename);
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort();
    for (key, value) in sorted {
      name.push('-');
      name.push_str(&clean_name(key));
      name.push('-');
      name.push_str(&clean_name(value));
    }
    self.cache_path.join(format!("{}.{}", name, CACHE_EXT))
  }

  // A miss and a read error look the same to the caller,
  // the page just gets rendered again.
  pub fn fetch(&self, basename: &str, params: &[(&str, &str)]) -> Option<String> {
    if !self.enabled {
      return None;
    }
    let file = self.file_for(basename, params);
    match fs::read_to_string(&file) {
      Ok(body) => {
        debug!("Cache hit for {}", file.display());
        Some(body)
      },
      Err(e) => {
        if e.kind() != io::ErrorKind::NotFound {
          error!("Could not read cache file {} - {}", file.display(), e);
        }
        None
      }
    }
  }

  pub fn store(
    &self,
    basename: &str,
    params: &[(&str, &str)],
    body: &str
  ) -> Result<(), io::Error> {
    if !self.enabled {
      return Ok(());
    }
    let file = self.file_for(basename, params);
    debug!("Caching {}", file.display());
    fs::write(file, body)
  }

  // Removes every cached page. Returns how many files went.
  pub fn flush(&self) -> Result<usize, io::Error> {
    let mut removed = 0;
    for entry in fs::read_dir(&self.cache_path)? {
      let path = entry?.path();
      let is_cache_file = path.is_file()
        && path.extension().map(|e| e == CACHE_EXT).unwrap_or(false);
      if is_cache_file {
        fs::remove_file(&path)?;
        removed += 1;
      }
    }
    debug!("Flushed {} cached pages", removed);
    Ok(removed)
  }

}

fn clean_name(value: &str) -> String {
  UNSAFE_NAME_CHARS.replace_all(value, "_").to_string()
}
