//! Post record returned by the catalog API

use serde::Serialize as _;
use serde_json::{Map, Value};

/// Record key holding the media URL
const FILE_URL_KEY: &str = "file_url";
/// Record key holding space separated character tags
const CHARACTER_TAGS_KEY: &str = "tag_string_character";
/// Record key holding space separated general tags
const GENERAL_TAGS_KEY: &str = "tag_string_general";

/// Metadata for one matched post.
///
/// Only a few keys are interpreted, the rest is kept verbatim so it can be persisted as is.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Media URL, if the post has one
    #[must_use]
    pub fn file_url(&self) -> Option<&str> {
        self.0.get(FILE_URL_KEY).and_then(Value::as_str)
    }

    /// String field, or empty string if missing
    fn str_field(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Character then general tags, separated by `", "`
    #[must_use]
    pub fn tag_line(&self) -> String {
        format!(
            "{} {}",
            self.str_field(CHARACTER_TAGS_KEY),
            self.str_field(GENERAL_TAGS_KEY)
        )
        .replace(' ', ", ")
    }

    /// Serialize full record as JSON indented with 4 spaces
    pub fn to_indented_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}
