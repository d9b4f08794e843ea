use std::fmt;
use std::str::FromStr;
use crate::db::{Criteria, CriteriaError, CriteriaItem, Order, CONTENT_COLUMNS};
use crate::utils::text_utils::{split_search_terms, wrap_like};

// Only these columns are ever searched.
pub const SEARCHABLE_COLUMNS: &[&str] = &[
  "title",
  "teaser",
  "description",
  "caption",
  "creator",
  "publisher"
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
  // Every term has to show up somewhere.
  All,
  // Any term will do.
  Any,
  // The whole input as one phrase.
  Exact
}

impl FromStr for SearchMode {
  type Err = CriteriaError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "ALL" => Ok(SearchMode::All),
      "ANY" => Ok(SearchMode::Any),
      "EXACT" => Ok(SearchMode::Exact),
      _ => Err(CriteriaError::InvalidValue(format!("{} is not a search mode", s)))
    }
  }
}

impl fmt::Display for SearchMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SearchMode::All => "ALL",
      SearchMode::Any => "ANY",
      SearchMode::Exact => "EXACT"
    };
    write!(f, "{}", name)
  }
}

/**
 * Turns the raw input into the list of terms to look for.
 * An empty list means there's nothing worth searching, the
 * caller should report no results.
 */
pub fn prepare_terms(
  input: &str,
  mode: SearchMode,
  min_length: usize,
  max_terms: usize
) -> Vec<String> {
  match mode {
    SearchMode::Exact => {
      let phrase = input.split_whitespace().collect::<Vec<&str>>().join(" ");
      if phrase.chars().count() < min_length {
        Vec::new()
      } else {
        vec![phrase]
      }
    },
    _ => split_search_terms(input, min_length, max_terms)
  }
}

// One OR group per term for ALL, a single big OR group for
// ANY. EXACT only ever has the one term.
fn add_term(criteria: Criteria, term: &str, new_group: bool) -> Result<Criteria, CriteriaError> {
  let pattern = wrap_like(term);
  let mut criteria = criteria;
  for (i, column) in SEARCHABLE_COLUMNS.iter().enumerate() {
    let item = CriteriaItem::new(CONTENT_COLUMNS, column, pattern.as_str(), "LIKE")?;
    criteria = if i == 0 && new_group {
      criteria.add(item)
    } else {
      criteria.add_or(item)
    };
  }
  Ok(criteria)
}

/**
 * Criteria for a search over online content. Each term is
 * bound as its own LIKE parameter, wildcards typed by the
 * user are escaped.
 */
pub fn search_criteria(terms: &[String], mode: SearchMode) -> Result<Criteria, CriteriaError> {
  let mut criteria = Criteria::new();
  for (i, term) in terms.iter().enumerate() {
    let new_group = match mode {
      SearchMode::Any => i == 0,
      SearchMode::All | SearchMode::Exact => true
    };
    criteria = add_term(criteria, term, new_group)?;
  }
  Ok(
    criteria
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "online", 1)?)
      .set_order("date")
      .set_order_type(Order::Desc)
      .set_secondary_order("submission_time")
      .set_secondary_order_type(Order::Desc)
  )
}
