// Query criteria: predicates, tag filter, ordering and
// pagination for a select against one table.
// Column names can never come from the outside unchecked,
// values only ever end up in the bound parameter list.

use std::fmt;
use std::str::FromStr;
use derive_more::Display;
use rusqlite::types::Value;
use super::helpers::generate_placeholders;
use super::schema::{Table, TAGLINK};

#[derive(Debug, Display, PartialEq)]
pub enum CriteriaError {
  #[display(fmt = "Invalid column: {}", _0)]
  InvalidColumn(String),
  #[display(fmt = "Invalid operator: {}", _0)]
  InvalidOperator(String),
  #[display(fmt = "Invalid value: {}", _0)]
  InvalidValue(String)
}

impl std::error::Error for CriteriaError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Order {
  Asc,
  Desc
}

impl Order {
  fn as_sql(&self) -> &'static str {
    match self {
      Order::Asc => "ASC",
      Order::Desc => "DESC"
    }
  }
}

impl FromStr for Order {
  type Err = CriteriaError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "ASC" => Ok(Order::Asc),
      "DESC" => Ok(Order::Desc),
      _ => Err(CriteriaError::InvalidValue(format!("order type {}", s)))
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
  Equal,
  NotEqual,
  // "<>" is kept apart from "!=" so it renders the way it was written.
  Different,
  LessThan,
  GreaterThan,
  LessOrEqual,
  GreaterOrEqual,
  Like,
  In
}

impl Operator {
  fn as_sql(&self) -> &'static str {
    match self {
      Operator::Equal => "=",
      Operator::NotEqual => "!=",
      Operator::Different => "<>",
      Operator::LessThan => "<",
      Operator::GreaterThan => ">",
      Operator::LessOrEqual => "<=",
      Operator::GreaterOrEqual => ">=",
      Operator::Like => "LIKE",
      Operator::In => "IN"
    }
  }
}

impl FromStr for Operator {
  type Err = CriteriaError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "=" => Ok(Operator::Equal),
      "!=" => Ok(Operator::NotEqual),
      "<>" => Ok(Operator::Different),
      "<" => Ok(Operator::LessThan),
      ">" => Ok(Operator::GreaterThan),
      "<=" => Ok(Operator::LessOrEqual),
      ">=" => Ok(Operator::GreaterOrEqual),
      "LIKE" => Ok(Operator::Like),
      "IN" => Ok(Operator::In),
      _ => Err(CriteriaError::InvalidOperator(s.to_string()))
    }
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_sql())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
  Scalar(Value),
  List(Vec<Value>)
}

impl From<i64> for ItemValue {
  fn from(v: i64) -> Self {
    ItemValue::Scalar(Value::Integer(v))
  }
}

impl From<i32> for ItemValue {
  fn from(v: i32) -> Self {
    ItemValue::Scalar(Value::Integer(v.into()))
  }
}

impl From<bool> for ItemValue {
  fn from(v: bool) -> Self {
    ItemValue::Scalar(Value::Integer(if v { 1 } else { 0 }))
  }
}

impl From<&str> for ItemValue {
  fn from(v: &str) -> Self {
    ItemValue::Scalar(Value::Text(v.to_string()))
  }
}

impl From<String> for ItemValue {
  fn from(v: String) -> Self {
    ItemValue::Scalar(Value::Text(v))
  }
}

impl From<Vec<i64>> for ItemValue {
  fn from(v: Vec<i64>) -> Self {
    ItemValue::List(v.into_iter().map(Value::Integer).collect())
  }
}

impl From<Vec<&str>> for ItemValue {
  fn from(v: Vec<&str>) -> Self {
    ItemValue::List(v.into_iter().map(|s| Value::Text(s.to_string())).collect())
  }
}

impl From<Vec<String>> for ItemValue {
  fn from(v: Vec<String>) -> Self {
    ItemValue::List(v.into_iter().map(Value::Text).collect())
  }
}

/// A single `column operator value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaItem {
  column: String,
  operator: Operator,
  value: ItemValue
}

impl CriteriaItem {

  pub fn new<V: Into<ItemValue>>(
    whitelist: &[&str],
    column: &str,
    value: V,
    operator: &str
  ) -> Result<Self, CriteriaError> {
    if !whitelist.contains(&column) {
      return Err(CriteriaError::InvalidColumn(column.to_string()));
    }
    let operator: Operator = operator.parse()?;
    let value = value.into();
    let problem = match (&operator, &value) {
      (Operator::In, ItemValue::Scalar(_)) =>
        Some(format!("IN on {} requires a list of values", column)),
      (Operator::In, ItemValue::List(values)) => {
        if values.iter().any(|v| !is_scalar(v)) {
          Some(format!("IN on {} only takes integers or text", column))
        } else {
          None
        }
      },
      (_, ItemValue::List(_)) =>
        Some(format!("{} on {} does not take a list", operator, column)),
      _ => None
    };
    match problem {
      Some(reason) => Err(CriteriaError::InvalidValue(reason)),
      None => Ok(Self { column: column.to_string(), operator, value })
    }
  }

  // The operator defaults to "=".
  pub fn equal<V: Into<ItemValue>>(
    whitelist: &[&str],
    column: &str,
    value: V
  ) -> Result<Self, CriteriaError> {
    Self::new(whitelist, column, value, "=")
  }

  fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
    match (&self.operator, &self.value) {
      (Operator::In, ItemValue::List(values)) => {
        if values.is_empty() {
          // IN over nothing never matches.
          sql.push_str("1 = 0");
        } else {
          sql.push_str(&format!(
            "{} IN ({})",
            self.column,
            generate_placeholders(values.len())
          ));
          params.extend(values.iter().cloned());
        }
      },
      (Operator::Like, ItemValue::Scalar(value)) => {
        sql.push_str(&format!("{} LIKE ? ESCAPE '\\'", self.column));
        params.push(value.clone());
      },
      (operator, ItemValue::Scalar(value)) => {
        sql.push_str(&format!("{} {} ?", self.column, operator.as_sql()));
        params.push(value.clone());
      },
      // Rejected by the constructor.
      (_, ItemValue::List(_)) => sql.push_str("1 = 0")
    }
  }

}

fn is_scalar(value: &Value) -> bool {
  match value {
    Value::Integer(_) | Value::Text(_) => true,
    _ => false
  }
}

/// Builder for the WHERE, ORDER BY and LIMIT parts of a select.
/// Items added with `add` are ANDed together, `add_or` ORs an item
/// into the last group.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
  groups: Vec<Vec<CriteriaItem>>,
  tag: Vec<i64>,
  offset: Option<u32>,
  limit: Option<u32>,
  order: Option<String>,
  order_type: Order,
  secondary_order: Option<String>,
  secondary_order_type: Order
}

impl Default for Criteria {
  fn default() -> Self {
    Self::new()
  }
}

impl Criteria {

  pub fn new() -> Self {
    Criteria {
      groups: Vec::new(),
      tag: Vec::new(),
      offset: None,
      limit: None,
      order: None,
      order_type: Order::Desc,
      secondary_order: None,
      secondary_order_type: Order::Desc
    }
  }

  pub fn add(mut self, item: CriteriaItem) -> Self {
    self.groups.push(vec![item]);
    self
  }

  pub fn add_or(mut self, item: CriteriaItem) -> Self {
    match self.groups.last_mut() {
      Some(group) => group.push(item),
      None => self.groups.push(vec![item])
    }
    self
  }

  pub fn set_tag(mut self, tag_ids: Vec<i64>) -> Self {
    self.tag = tag_ids;
    self
  }

  pub fn set_offset(mut self, offset: u32) -> Self {
    self.offset = Some(offset);
    self
  }

  pub fn set_limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn set_order(mut self, column: &str) -> Self {
    self.order = Some(column.to_string());
    self
  }

  pub fn set_order_type(mut self, order: Order) -> Self {
    self.order_type = order;
    self
  }

  pub fn set_secondary_order(mut self, column: &str) -> Self {
    self.secondary_order = Some(column.to_string());
    self
  }

  pub fn set_secondary_order_type(mut self, order: Order) -> Self {
    self.secondary_order_type = order;
    self
  }

  pub fn is_empty(&self) -> bool {
    self.groups.is_empty() && self.tag.is_empty()
  }

  // Get the "WHERE" part of the query, with a trailing space,
  // or an empty string when there's nothing to filter on.
  pub fn render_where(&self) -> (String, Vec<Value>) {
    let mut params: Vec<Value> = Vec::new();
    let mut clauses: Vec<String> = Vec::with_capacity(self.groups.len() + 1);
    for group in &self.groups {
      let mut parts: Vec<String> = Vec::with_capacity(group.len());
      for item in group {
        let mut sql = String::new();
        item.render(&mut sql, &mut params);
        parts.push(sql);
      }
      if parts.len() == 1 {
        clauses.push(parts.remove(0));
      } else {
        clauses.push(format!("({})", parts.join(" OR ")));
      }
    }
    if !self.tag.is_empty() {
      clauses.push(format!(
        "id IN (SELECT content_id FROM {} WHERE tag_id IN ({}))",
        TAGLINK.name,
        generate_placeholders(self.tag.len())
      ));
      params.extend(self.tag.iter().map(|id| Value::Integer(*id)));
    }
    if clauses.is_empty() {
      (String::new(), params)
    } else {
      (format!("WHERE {} ", clauses.join(" AND ")), params)
    }
  }

  // ORDER BY, LIMIT and OFFSET. Sort columns are checked against
  // the table here since they can't be bound.
  pub fn render_tail(&self, table: &Table) -> Result<(String, Vec<Value>), CriteriaError> {
    let mut sql = String::new();
    let mut params: Vec<Value> = Vec::new();
    // A secondary order on its own is still an order.
    let mut orders: Vec<String> = Vec::new();
    if let Some(order) = &self.order {
      check_column(table, order)?;
      orders.push(format!("{} {}", order, self.order_type.as_sql()));
    }
    if let Some(secondary) = &self.secondary_order {
      check_column(table, secondary)?;
      orders.push(format!("{} {}", secondary, self.secondary_order_type.as_sql()));
    }
    if !orders.is_empty() {
      sql.push_str(&format!("ORDER BY {} ", orders.join(", ")));
    }
    match (self.limit, self.offset) {
      (Some(limit), Some(offset)) => {
        sql.push_str("LIMIT ? OFFSET ? ");
        params.push(Value::Integer(limit.into()));
        params.push(Value::Integer(offset.into()));
      },
      (Some(limit), None) => {
        sql.push_str("LIMIT ? ");
        params.push(Value::Integer(limit.into()));
      },
      // SQLite won't take an OFFSET without a LIMIT.
      (None, Some(offset)) => {
        sql.push_str("LIMIT -1 OFFSET ? ");
        params.push(Value::Integer(offset.into()));
      },
      (None, None) => ()
    }
    Ok((sql, params))
  }

}

fn check_column(table: &Table, column: &str) -> Result<(), CriteriaError> {
  if table.columns.contains(&column) {
    Ok(())
  } else {
    Err(CriteriaError::InvalidColumn(column.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::schema::{CONTENT, CONTENT_COLUMNS};

  #[test]
  fn item_rejects_unknown_column() {
    let result = CriteriaItem::equal(CONTENT_COLUMNS, "password", 1);
    assert_eq!(
      Err(CriteriaError::InvalidColumn("password".to_string())),
      result
    );
  }

  #[test]
  fn item_rejects_unknown_operator() {
    let result = CriteriaItem::new(CONTENT_COLUMNS, "id", 1, "; DROP");
    assert_eq!(
      Err(CriteriaError::InvalidOperator("; DROP".to_string())),
      result
    );
  }

  #[test]
  fn in_needs_a_list_and_lists_need_in() {
    assert!(CriteriaItem::new(CONTENT_COLUMNS, "id", 3, "IN").is_err());
    assert!(CriteriaItem::new(CONTENT_COLUMNS, "id", vec![1i64, 2], "=").is_err());
    assert!(CriteriaItem::new(CONTENT_COLUMNS, "id", vec![1i64, 2], "in").is_ok());
  }

  #[test]
  fn empty_criteria_selects_everything() {
    let criteria = Criteria::new();
    let (sql, params) = criteria.render_where();
    assert_eq!("", sql);
    assert!(params.is_empty());
    let (tail, tail_params) = criteria.render_tail(&CONTENT).unwrap();
    assert_eq!("", tail);
    assert!(tail_params.is_empty());
  }

  #[test]
  fn values_never_end_up_in_sql_text() {
    let hostile = "x' OR '1'='1";
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "title", hostile).unwrap())
      .add(CriteriaItem::new(CONTENT_COLUMNS, "teaser", "%nope%", "LIKE").unwrap())
      .add(CriteriaItem::new(
        CONTENT_COLUMNS, "type", vec!["Article", "Tag'--"], "IN"
      ).unwrap());
    let (sql, params) = criteria.render_where();
    assert!(!sql.contains(hostile));
    assert!(!sql.contains("nope"));
    assert!(!sql.contains("Tag'--"));
    assert_eq!(
      "WHERE title = ? AND teaser LIKE ? ESCAPE '\\' AND type IN (?, ?) ",
      sql
    );
    assert_eq!(4, params.len());
    assert_eq!(Value::Text(hostile.to_string()), params[0]);
  }

  #[test]
  fn or_items_are_grouped() {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "online", true).unwrap())
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "type", "Article").unwrap())
      .add_or(CriteriaItem::equal(CONTENT_COLUMNS, "type", "Image").unwrap());
    let (sql, params) = criteria.render_where();
    assert_eq!("WHERE online = ? AND (type = ? OR type = ?) ", sql);
    assert_eq!(
      vec![
        Value::Integer(1),
        Value::Text("Article".to_string()),
        Value::Text("Image".to_string())
      ],
      params
    );
  }

  #[test]
  fn tag_filter_is_a_subquery() {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "online", 1).unwrap())
      .set_tag(vec![5, 7]);
    let (sql, params) = criteria.render_where();
    assert_eq!(
      "WHERE online = ? AND id IN (SELECT content_id FROM taglink WHERE tag_id IN (?, ?)) ",
      sql
    );
    assert_eq!(3, params.len());
  }

  #[test]
  fn full_tail() {
    let criteria = Criteria::new()
      .set_order("date")
      .set_order_type(Order::Desc)
      .set_secondary_order("submission_time")
      .set_secondary_order_type(Order::Asc)
      .set_limit(10)
      .set_offset(20);
    let (sql, params) = criteria.render_tail(&CONTENT).unwrap();
    assert_eq!("ORDER BY date DESC, submission_time ASC LIMIT ? OFFSET ? ", sql);
    assert_eq!(vec![Value::Integer(10), Value::Integer(20)], params);
  }

  #[test]
  fn secondary_order_alone_is_rendered() {
    let criteria = Criteria::new()
      .set_secondary_order("submission_time")
      .set_secondary_order_type(Order::Asc);
    let (sql, _) = criteria.render_tail(&CONTENT).unwrap();
    assert_eq!("ORDER BY submission_time ASC ", sql);
    let criteria = Criteria::new().set_secondary_order("nope");
    assert!(criteria.render_tail(&CONTENT).is_err());
  }

  #[test]
  fn offset_without_limit() {
    let criteria = Criteria::new().set_offset(5);
    let (sql, _) = criteria.render_tail(&CONTENT).unwrap();
    assert_eq!("LIMIT -1 OFFSET ? ", sql);
  }

  #[test]
  fn order_column_is_checked() {
    let criteria = Criteria::new().set_order("title; DROP TABLE content");
    assert!(criteria.render_tail(&CONTENT).is_err());
  }

  #[test]
  fn rendering_twice_gives_the_same_result() {
    let criteria = Criteria::new()
      .add(CriteriaItem::equal(CONTENT_COLUMNS, "id", 3).unwrap());
    assert_eq!(criteria.render_where(), criteria.render_where());
  }

  #[test]
  fn order_types_parse() {
    assert_eq!(Ok(Order::Asc), "asc".parse::<Order>());
    assert!("sideways".parse::<Order>().is_err());
  }
}
