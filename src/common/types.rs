use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field names used by documents of the message collection.
pub mod fields {
    pub const SENDER: &str = "Sender";
    pub const BODY: &str = "MessageBody";
    pub const UNIQUE_ID: &str = "UniqueId";
    pub const TIMESTAMP: &str = "Timestamp";
}

/// Point in time as milliseconds since the Unix epoch (UTC).
///
/// Ordering is numeric, so chronological and sort order always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Parses an RFC 3339 string, or a naive ISO-8601 date-time read as UTC.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
            return Some(Self(parsed.timestamp_millis()));
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(datetime) => write!(f, "{}", datetime.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// A stored document as a store delivers it in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier, absent for documents not yet persisted.
    pub id: Option<String>,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: Option<String>, data: Map<String, Value>) -> Self {
        Self { id, data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` has an unexpected type or format")]
    InvalidField(&'static str),
}

/// A chat message read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub document_id: Option<String>,
    pub sender: String,
    pub body: String,
    pub identifier: Option<String>,
    pub timestamp: Timestamp,
}

impl MessageRecord {
    pub fn from_document(document: &Document) -> Result<Self, MalformedRecord> {
        let sender = required_str(&document.data, fields::SENDER)?;
        let body = required_str(&document.data, fields::BODY)?;

        let identifier = match document.data.get(fields::UNIQUE_ID) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if id.is_empty() => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(MalformedRecord::InvalidField(fields::UNIQUE_ID)),
        };

        let timestamp = match document.data.get(fields::TIMESTAMP) {
            None | Some(Value::Null) => return Err(MalformedRecord::MissingField(fields::TIMESTAMP)),
            Some(Value::Number(number)) => number
                .as_i64()
                .map(Timestamp::from_millis)
                .ok_or(MalformedRecord::InvalidField(fields::TIMESTAMP))?,
            Some(Value::String(text)) => {
                Timestamp::parse(text).ok_or(MalformedRecord::InvalidField(fields::TIMESTAMP))?
            }
            Some(_) => return Err(MalformedRecord::InvalidField(fields::TIMESTAMP)),
        };

        Ok(Self {
            document_id: document.id.clone(),
            sender,
            body,
            identifier,
            timestamp,
        })
    }

    /// Key usable across snapshots: the store id, else the client identifier.
    pub fn stable_key(&self) -> Option<&str> {
        self.document_id.as_deref().or(self.identifier.as_deref())
    }

    /// Like [`MessageRecord::stable_key`], tagged with where the key came from.
    pub fn record_key(&self) -> Option<RecordKey> {
        match (&self.document_id, &self.identifier) {
            (Some(id), _) => Some(RecordKey::Document(id.clone())),
            (None, Some(identifier)) => Some(RecordKey::Client(identifier.clone())),
            (None, None) => None,
        }
    }

    pub fn is_own(&self, display_name: &str) -> bool {
        self.sender == display_name
    }
}

/// Deduplication identity. Store ids and client identifiers never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Document(String),
    Client(String),
}

fn required_str(data: &Map<String, Value>, field: &'static str) -> Result<String, MalformedRecord> {
    match data.get(field) {
        None | Some(Value::Null) => Err(MalformedRecord::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(MalformedRecord::InvalidField(field)),
    }
}

/// A message about to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender: String,
    pub body: String,
    pub identifier: String,
    pub timestamp: Timestamp,
}

impl MessageDraft {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            identifier: uuid::Uuid::new_v4().to_string(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(fields::SENDER.to_string(), Value::from(self.sender.clone()));
        data.insert(fields::BODY.to_string(), Value::from(self.body.clone()));
        data.insert(
            fields::UNIQUE_ID.to_string(),
            Value::from(self.identifier.clone()),
        );
        data.insert(
            fields::TIMESTAMP.to_string(),
            Value::from(self.timestamp.as_millis()),
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: Option<&str>, value: Value) -> Document {
        let data = value.as_object().cloned().unwrap_or_default();
        Document::new(id.map(str::to_string), data)
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let naive = Timestamp::parse("2024-01-01T10:00:00").expect("naive");
        let offset = Timestamp::parse("2024-01-01T11:00:00+01:00").expect("offset");
        assert_eq!(naive, offset);
        assert_eq!(naive.as_millis(), 1_704_103_200_000);
        assert!(Timestamp::parse("01/02/2024 10:00").is_none());
    }

    #[test]
    fn decodes_numeric_and_string_timestamps() {
        let numeric = doc(
            Some("d1"),
            json!({"Sender": "ana", "MessageBody": "hi", "Timestamp": 42}),
        );
        let record = MessageRecord::from_document(&numeric).expect("valid record");
        assert_eq!(record.timestamp, Timestamp::from_millis(42));
        assert_eq!(record.identifier, None);
        assert_eq!(record.stable_key(), Some("d1"));

        let text = doc(
            None,
            json!({"Sender": "ana", "MessageBody": "", "UniqueId": "u1", "Timestamp": "2024-01-01T09:00:00"}),
        );
        let record = MessageRecord::from_document(&text).expect("valid record");
        assert_eq!(record.body, "");
        assert_eq!(record.stable_key(), Some("u1"));
    }

    #[test]
    fn rejects_documents_missing_required_fields() {
        let missing_body = doc(None, json!({"Sender": "ana", "Timestamp": 1}));
        assert_eq!(
            MessageRecord::from_document(&missing_body),
            Err(MalformedRecord::MissingField(fields::BODY))
        );

        let bad_time = doc(
            None,
            json!({"Sender": "ana", "MessageBody": "x", "Timestamp": "yesterday"}),
        );
        assert_eq!(
            MessageRecord::from_document(&bad_time),
            Err(MalformedRecord::InvalidField(fields::TIMESTAMP))
        );
    }

    #[test]
    fn draft_fields_decode_back_into_a_record() {
        let draft = MessageDraft::new("ana", "hello");
        let document = Document::new(Some("doc".into()), draft.to_fields());
        let record = MessageRecord::from_document(&document).expect("valid record");
        assert_eq!(record.sender, "ana");
        assert_eq!(record.identifier.as_deref(), Some(draft.identifier.as_str()));
        assert_eq!(record.timestamp, draft.timestamp);
        assert!(record.is_own("ana"));
        assert!(!record.is_own("bob"));
    }
}
