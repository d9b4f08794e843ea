use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
  static ref IDENTIFIER_REGEX: Regex = Regex::new(
    r"^[A-Za-z_][A-Za-z0-9_]*$"
  ).unwrap();
}

/**
 * Generate a certain amount of comma separated query placeholders
 */
pub fn generate_placeholders(count: usize) -> String {
  vec!["?"; count].join(", ")
}

pub fn generate_field_equal_qmark(name: &str) -> String {
  format!("{} = ?", name)
}

pub fn generate_set_clause(names: &[&str]) -> String {
  names.iter()
    .map(|n| generate_field_equal_qmark(n))
    .collect::<Vec<String>>()
    .join(", ")
}

// Table and column names can't be bound as parameters, so
// anything that ends up in SQL text has to look like a plain
// identifier.
pub fn is_valid_identifier(name: &str) -> bool {
  IDENTIFIER_REGEX.is_match(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generate_4_query_placeholders() {
    assert_eq!("?, ?, ?, ?", generate_placeholders(4));
    assert_eq!("", generate_placeholders(0));
  }

  #[test]
  fn generate_update_set_clause() {
    let expected = String::from("title = ?, online = ?");
    assert_eq!(expected, generate_set_clause(&["title", "online"]));
  }

  #[test]
  fn identifiers_are_checked() {
    assert!(is_valid_identifier("meta_title"));
    assert!(is_valid_identifier("_x1"));
    assert!(!is_valid_identifier("1abc"));
    assert!(!is_valid_identifier("title; DROP TABLE content"));
    assert!(!is_valid_identifier("`title`"));
    assert!(!is_valid_identifier(""));
  }
}
