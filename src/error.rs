use derive_more::Display;
use crate::content::entity::ValidationError;
use crate::db::{CriteriaError, DbError};

// What the handlers hand back to their callers. Everything
// below this layer has its own error enum.
#[derive(Debug, Display, PartialEq)]
pub enum Error {
  #[display(fmt = "Validation failed - {}", _0)]
  Validation(ValidationError),
  #[display(fmt = "{}", _0)]
  Criteria(CriteriaError),
  #[display(fmt = "No content with id {}", _0)]
  NotFound(i64),
  #[display(fmt = "Unknown content type: {}", _0)]
  UnknownType(String),
  #[display(fmt = "{}", _0)]
  Database(DbError)
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ValidationError> for Error {
  fn from(e: ValidationError) -> Self {
    match e {
      ValidationError::UnknownType(t) => Error::UnknownType(t),
      other => Error::Validation(other)
    }
  }
}

impl From<CriteriaError> for Error {
  fn from(e: CriteriaError) -> Self {
    Error::Criteria(e)
  }
}

impl From<DbError> for Error {
  fn from(e: DbError) -> Self {
    match e {
      DbError::Criteria(c) => Error::Criteria(c),
      DbError::RowNotFound(ref table, id) if table == "content" => Error::NotFound(id),
      other => Error::Database(other)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_content_rows_become_not_found() {
    let e: Error = DbError::RowNotFound("content".to_string(), 7).into();
    assert_eq!(Error::NotFound(7), e);
    let e: Error = DbError::RowNotFound("taglink".to_string(), 7).into();
    assert_eq!(Error::Database(DbError::RowNotFound("taglink".to_string(), 7)), e);
  }

  #[test]
  fn unknown_types_are_lifted() {
    let e: Error = ValidationError::UnknownType("Widget".to_string()).into();
    assert_eq!(Error::UnknownType("Widget".to_string()), e);
  }
}
