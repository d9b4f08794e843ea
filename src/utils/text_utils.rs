use html2text::from_read;
use regex::Regex;
use lazy_static::lazy_static;

// Where the external HTML purifier isn't around we
// still refuse to store the obvious script vectors.
lazy_static! {
  static ref DANGEROUS_BLOCK_REGEX: Regex = Regex::new(
    r"(?is)<(script|style|iframe|object|embed)\b.*?(</\s*(script|style|iframe|object|embed)\s*>|/>|$)"
  ).unwrap();
  static ref EVENT_ATTRIBUTE_REGEX: Regex = Regex::new(
    r#"(?i)\s+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#
  ).unwrap();
  static ref JAVASCRIPT_URL_REGEX: Regex = Regex::new(
    r#"(?i)(href|src)\s*=\s*(["']?)\s*javascript:[^"'\s>]*(["']?)"#
  ).unwrap();
  static ref SEO_INVALID_CHARS: Regex = Regex::new(r"[^a-z0-9_-]+").unwrap();
  static ref SEO_DASHES: Regex = Regex::new(r"-{2,}").unwrap();
}

/**
 * Removing a tag can glue the pieces around it back into
 * another one (<scr<script></script>ipt>), so the passes
 * run again until nothing changes. Every replacement makes
 * the string shorter so this ends.
 */
pub fn sanitize_html(html: &str) -> String {
  let mut current = html.to_string();
  loop {
    let cleaned = DANGEROUS_BLOCK_REGEX.replace_all(&current, "");
    let cleaned = EVENT_ATTRIBUTE_REGEX.replace_all(&cleaned, "");
    let cleaned = JAVASCRIPT_URL_REGEX.replace_all(&cleaned, "$1=$2#$3")
      .to_string();
    if cleaned == current {
      break;
    }
    current = cleaned;
  }
  current.trim().to_string()
}

pub fn strip_html(html: &str) -> String {
  from_read(html.as_bytes(), 70)
}

// I was using truncate at first but it can panic when cutting
// a multibyte unicode char in half.
pub fn truncate_utf8(s: &mut String, max_chars: usize) {
  if let Some((idx, _)) = s.char_indices().nth(max_chars) {
    s.truncate(idx);
  }
}

// Turns whatever the admin typed into something usable in a URL.
// Spaces become dashes, anything that isn't [a-z0-9_-] goes away.
pub fn normalize_seo(value: &str) -> String {
  let lowered = value.trim().to_lowercase();
  let dashed: String = lowered
    .split_whitespace()
    .collect::<Vec<&str>>()
    .join("-");
  let cleaned = SEO_INVALID_CHARS.replace_all(&dashed, "");
  SEO_DASHES.replace_all(&cleaned, "-")
    .trim_matches('-')
    .to_string()
}

// LIKE wildcards have to be escaped for user input, the
// criteria renders LIKE with ESCAPE '\'.
pub fn escape_like(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len() + 2);
  for c in term.chars() {
    if c == '\\' || c == '%' || c == '_' {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped
}

pub fn wrap_like(term: &str) -> String {
  format!("%{}%", escape_like(term))
}

/**
 * Splits search input on whitespace, dropping terms shorter
 * than min_length (in chars) and keeping at most max_terms.
 */
pub fn split_search_terms(
  input: &str,
  min_length: usize,
  max_terms: usize
) -> Vec<String> {
  let mut terms: Vec<String> = Vec::new();
  for term in input.split_whitespace() {
    if term.chars().count() < min_length {
      continue;
    }
    let term = term.to_string();
    if !terms.contains(&term) {
      terms.push(term);
    }
    if terms.len() >= max_terms {
      break;
    }
  }
  terms
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sanitize_removes_scripts_and_handlers() {
    let sut = "<p onclick=\"evil()\">Hello</p><script>alert(1)</script>\
      <a href=\"javascript:evil()\">link</a>";
    let result = sanitize_html(sut);
    assert_eq!(
      "<p>Hello</p><a href=\"#\">link</a>",
      result
    );
  }

  #[test]
  fn sanitize_catches_nested_scripts() {
    let result = sanitize_html("<scr<script>x</script>ipt>alert(1)</script>");
    assert!(!result.to_lowercase().contains("<script"));
    assert_eq!("", result);
    let result = sanitize_html(
      "<p>Hi</p><a href=\"jav<script></script>ascript:evil()\">x</a>"
    );
    assert!(!result.contains("javascript:"));
    assert_eq!("<p>Hi</p><a href=\"#\">x</a>", result);
  }

  #[test]
  fn sanitize_keeps_regular_markup() {
    let sut = "<p><b>Bold</b> and <a href=\"/page\">link</a></p>";
    assert_eq!(sut, sanitize_html(sut));
  }

  #[test]
  fn truncate_does_not_split_multibyte_chars() {
    let mut sut = String::from("héllo wörld");
    truncate_utf8(&mut sut, 7);
    assert_eq!("héllo w", sut);
  }

  #[test]
  fn seo_is_normalized() {
    assert_eq!("hello-big-world", normalize_seo("  Hello  Big World! "));
    assert_eq!("a_b-c", normalize_seo("a_b -- c"));
  }

  #[test]
  fn like_wildcards_are_escaped() {
    assert_eq!("100\\%\\_off", escape_like("100%_off"));
    assert_eq!("%fish%", wrap_like("fish"));
  }

  #[test]
  fn short_and_duplicate_terms_are_dropped() {
    let terms = split_search_terms("the tusk fish  ox tusk", 3, 10);
    assert_eq!(vec!["the", "tusk", "fish"], terms);
  }

  #[test]
  fn search_terms_are_capped() {
    let terms = split_search_terms("aaa bbb ccc ddd", 3, 2);
    assert_eq!(2, terms.len());
  }
}
