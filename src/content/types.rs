// The closed set of content types and licences.
// ContentType::from_str is the only way a stored discriminator
// turns into a type, anything not listed is refused.

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use serde::Serialize;
use super::entity::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContentType {
  Article,
  Audio,
  Block,
  Collection,
  Download,
  Image,
  Podcast,
  Static,
  Tag,
  Video
}

impl ContentType {

  pub const ALL: [ContentType; 10] = [
    ContentType::Article,
    ContentType::Audio,
    ContentType::Block,
    ContentType::Collection,
    ContentType::Download,
    ContentType::Image,
    ContentType::Podcast,
    ContentType::Static,
    ContentType::Tag,
    ContentType::Video
  ];

  pub fn name(&self) -> &'static str {
    match self {
      ContentType::Article => "Article",
      ContentType::Audio => "Audio",
      ContentType::Block => "Block",
      ContentType::Collection => "Collection",
      ContentType::Download => "Download",
      ContentType::Image => "Image",
      ContentType::Podcast => "Podcast",
      ContentType::Static => "Static",
      ContentType::Tag => "Tag",
      ContentType::Video => "Video"
    }
  }

  // Types that other content can use as a parent.
  pub fn is_collection(&self) -> bool {
    match self {
      ContentType::Collection | ContentType::Podcast => true,
      _ => false
    }
  }

  // Fields that mean nothing for this type. They're never
  // stored and always read back as empty.
  pub fn ignored_fields(&self) -> &'static [&'static str] {
    match self {
      ContentType::Tag => &[
        "media",
        "format",
        "file_size",
        "creator",
        "rights",
        "language",
        "publisher",
        "parent"
      ],
      ContentType::Block => &["media", "format", "file_size", "parent"],
      ContentType::Static => &["parent"],
      _ => &[]
    }
  }

  pub fn uses(&self, field: &str) -> bool {
    !self.ignored_fields().contains(&field)
  }

}

impl FromStr for ContentType {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ContentType::ALL.iter()
      .find(|t| t.name() == s)
      .copied()
      .ok_or_else(|| ValidationError::UnknownType(s.to_string()))
  }
}

impl fmt::Display for ContentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rights {
  Copyright,
  Attribution,
  AttributionShareAlike,
  AttributionNoDerivs,
  AttributionNonCommercial,
  AttributionNonCommercialShareAlike,
  AttributionNonCommercialNoDerivs,
  GnuFdl,
  PublicDomain,
  GnuGpl2,
  GnuGpl3
}

impl Rights {

  pub fn id(&self) -> i64 {
    match self {
      Rights::Copyright => 1,
      Rights::Attribution => 2,
      Rights::AttributionShareAlike => 3,
      Rights::AttributionNoDerivs => 4,
      Rights::AttributionNonCommercial => 5,
      Rights::AttributionNonCommercialShareAlike => 6,
      Rights::AttributionNonCommercialNoDerivs => 7,
      Rights::GnuFdl => 8,
      Rights::PublicDomain => 9,
      Rights::GnuGpl2 => 10,
      Rights::GnuGpl3 => 11
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Rights::Copyright => "Copyright, all rights reserved",
      Rights::Attribution => "Creative Commons Attribution",
      Rights::AttributionShareAlike => "Creative Commons Attribution-ShareAlike",
      Rights::AttributionNoDerivs => "Creative Commons Attribution-NoDerivs",
      Rights::AttributionNonCommercial => "Creative Commons Attribution-NonCommercial",
      Rights::AttributionNonCommercialShareAlike =>
        "Creative Commons Attribution-NonCommercial-ShareAlike",
      Rights::AttributionNonCommercialNoDerivs =>
        "Creative Commons Attribution-NonCommercial-NoDerivs",
      Rights::GnuFdl => "GNU Free Documentation License",
      Rights::PublicDomain => "Public domain",
      Rights::GnuGpl2 => "GNU General Public License Version 2",
      Rights::GnuGpl3 => "GNU General Public License Version 3"
    }
  }

}

impl TryFrom<i64> for Rights {
  type Error = ValidationError;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Rights::Copyright),
      2 => Ok(Rights::Attribution),
      3 => Ok(Rights::AttributionShareAlike),
      4 => Ok(Rights::AttributionNoDerivs),
      5 => Ok(Rights::AttributionNonCommercial),
      6 => Ok(Rights::AttributionNonCommercialShareAlike),
      7 => Ok(Rights::AttributionNonCommercialNoDerivs),
      8 => Ok(Rights::GnuFdl),
      9 => Ok(Rights::PublicDomain),
      10 => Ok(Rights::GnuGpl2),
      11 => Ok(Rights::GnuGpl3),
      _ => Err(ValidationError::IllegalValue(
        "rights",
        format!("{} is not a known licence", value)
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_type_parses_back_from_its_name() {
    for t in ContentType::ALL.iter() {
      assert_eq!(Ok(*t), t.name().parse::<ContentType>());
    }
  }

  #[test]
  fn unknown_discriminators_are_refused() {
    assert_eq!(
      Err(ValidationError::UnknownType("TfArticle".to_string())),
      "TfArticle".parse::<ContentType>()
    );
    assert!("article".parse::<ContentType>().is_err());
  }

  #[test]
  fn tags_ignore_asset_fields() {
    assert!(!ContentType::Tag.uses("media"));
    assert!(!ContentType::Tag.uses("rights"));
    assert!(!ContentType::Tag.uses("language"));
    assert!(ContentType::Tag.uses("title"));
    assert!(ContentType::Article.uses("media"));
  }

  #[test]
  fn rights_round_trip_through_ids() {
    for id in 1..=11 {
      assert_eq!(id, Rights::try_from(id).unwrap().id());
    }
    assert!(Rights::try_from(0).is_err());
    assert!(Rights::try_from(12).is_err());
  }

  #[test]
  fn rights_have_readable_labels() {
    assert_eq!("Public domain", Rights::try_from(9).map(|r| r.label()).unwrap_or(""));
    assert_eq!("Copyright, all rights reserved", Rights::Copyright.label());
  }
}
