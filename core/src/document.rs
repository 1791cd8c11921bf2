//! Document and collection types.
//!
//! A document is a JSON object addressed by `(collection, id)`. The id is not
//! part of the stored object; it travels alongside it in [`Document`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a document within a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a document id from any string-like value
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Collection names used by the admin dashboard.
pub struct Collection;

impl Collection {
    /// Active registrations
    pub const REGISTRATIONS: &'static str = "registrations";
    /// Cancellation records (one per cancellation event)
    pub const CANCELLATIONS: &'static str = "cancellations";
    /// Tenant definitions, stored in the master database
    pub const YATRA_DASHBOARDS: &'static str = "yatra_dashboards";
    /// Admin accounts, stored in the master database
    pub const ADMIN_USERS: &'static str = "admin_users";
}

/// Object payload of a document.
pub type Fields = Map<String, Value>;

/// A stored document: its id plus its JSON object body.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Document id
    pub id: DocumentId,
    /// Document body
    pub data: Fields,
}

impl Document {
    /// Create a document from an id and body
    #[must_use]
    pub const fn new(id: DocumentId, data: Fields) -> Self {
        Self { id, data }
    }

    /// Decode the body into a typed record.
    ///
    /// The document id is injected under the `"id"` key first so records can
    /// carry their own identity.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn decode<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.to_string()));
        serde_json::from_value(Value::Object(data))
    }
}

/// Encode a typed record into a document body.
///
/// The `"id"` key is stripped, since ids live outside the stored object.
///
/// # Errors
///
/// Returns the `serde_json` error if `value` fails to serialize or does not
/// serialize to a JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        },
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
