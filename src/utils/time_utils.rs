use chrono::{Local, NaiveDate, TimeZone};

// Content dates are plain calendar dates, submission times
// are timestamps.
// chrono formatting reference:
// https://docs.rs/chrono/0.4.19/chrono/format/strftime/index.html
pub const CONTENT_DATE_FORMAT: &'static str = "%Y-%m-%d";
const DATE_FORMAT_STANDARD: &'static str = "%d/%m/%Y %k:%M:%S%:z";

pub fn current_timestamp() -> i64 {
  Local::now().timestamp()
}

pub fn today() -> String {
  Local::now().format(CONTENT_DATE_FORMAT).to_string()
}

pub fn is_valid_date(date: &str) -> bool {
  NaiveDate::parse_from_str(date, CONTENT_DATE_FORMAT).is_ok()
}

pub fn timestamp_to_date_string(timestamp: i64) -> String {
  match Local.timestamp_opt(timestamp, 0).single() {
    Some(d) => d.format(DATE_FORMAT_STANDARD).to_string(),
    None => String::new()
  }
}
