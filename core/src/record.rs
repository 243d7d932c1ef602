use serde::{Deserialize, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::StoreError;

pub type TermId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashtag {
    pub text: String,
}

/// One tweet as kept in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub created_at: OffsetDateTime,
    pub screen_name: String,
    /// Raw text, used by keyword search and echoed in the full report.
    #[serde(default)]
    pub text: String,
    pub tokenized_text: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
}

impl Record {
    pub fn has_hashtags(&self) -> bool { !self.hashtags.is_empty() }

    /// Hashtag texts, lower-cased.
    pub fn hashtag_tokens(&self) -> Vec<String> {
        self.hashtags.iter().map(|h| h.text.to_lowercase()).collect()
    }
}

/// Parse the timestamps accepted on the command line and in imported dumps.
///
/// `2020-03-03 00:00:00.0`, `2020-03-03 00:00:00` and RFC 3339 are accepted;
/// values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, StoreError> {
    let value = value.trim();
    let with_fraction = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    let without_fraction = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

    if let Ok(dt) = PrimitiveDateTime::parse(value, with_fraction) {
        return Ok(dt.assume_utc());
    }
    if let Ok(dt) = PrimitiveDateTime::parse(value, without_fraction) {
        return Ok(dt.assume_utc());
    }
    OffsetDateTime::parse(value, &Rfc3339).map_err(|_| StoreError::Timestamp(value.to_string()))
}

/// Milliseconds since the Unix epoch, the resolution of the store's date type.
pub fn epoch_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// A timestamp rendered in extended-JSON form: `{"$date": <millis>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedDate(pub OffsetDateTime);

impl Serialize for ExtendedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("$date", &epoch_millis(self.0))?;
        map.end()
    }
}
