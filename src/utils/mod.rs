pub mod text_utils;
pub mod time_utils;

pub fn bool_to_i64(value: bool) -> i64 {
  match value {
    true => 1,
    false => 0
  }
}
