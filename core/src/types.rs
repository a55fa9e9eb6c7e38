//! Domain types for the synchronization engine.
//!
//! # Design
//! The remote service is schema-less: an entry is an open key-value map
//! whose field keys are service-generated identifiers with a semantic
//! suffix (`*_text`, `*_date`, `*_categories_sort`). `Record` therefore
//! wraps `serde_json::Map` rather than a struct — with the `preserve_order`
//! feature the map keeps service insertion order, which the field
//! heuristics depend on for tie-breaking. `NormalizedItem` is the typed
//! view derived from a `Record` on every read; it is never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// The authenticated user, as reported by the current-user endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

/// A remote list of entries. Immutable for the engine's purposes: fetched
/// once per process lifetime and cached until restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: i64,
    pub short_id: String,
    pub uuid: Uuid,
    pub name: String,
    /// Icon hint from the service (Font Awesome class names). Carried as-is;
    /// interpreting it is the presentation layer's business.
    #[serde(default)]
    pub icon_class_names: Option<String>,
}

/// A workspace groups lists; the engine only ever flattens them.
#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    pub lists: Vec<List>,
}

/// A schema-less remote entry: an ordered field map plus the well-known
/// `uuid`, `id` and `displayString` members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub serde_json::Map<String, Value>);

impl Record {
    /// Stable entry uuid, the identifier exposed to consumers.
    pub fn uuid(&self) -> Option<Uuid> {
        self.0.get("uuid")?.as_str()?.parse().ok()
    }

    /// Internal numeric id. Required for batch delete, never exposed to
    /// consumers directly.
    pub fn entry_id(&self) -> Option<i64> {
        self.0.get("id")?.as_i64()
    }

    /// Canonical title as rendered by the service.
    pub fn display_string(&self) -> Option<&str> {
        self.0.get("displayString")?.as_str()
    }

    /// All fields in service insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Completion state of a task item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemStatus {
    #[default]
    NeedsAction,
    Completed,
}

/// The typed view of a `Record`, derived fresh on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub uid: Uuid,
    pub title: String,
    pub status: ItemStatus,
    pub description: Option<String>,
    pub due: Option<NaiveDate>,
}

/// Input for creating a new task item.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub due: Option<NaiveDate>,
    pub status: ItemStatus,
}

impl NewItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A requested change to one logical field of an entry.
///
/// The remote service has no fixed schema, so the engine accepts logical
/// fields and resolves them to concrete field keys at update time. Exactly
/// one field must be set per update.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

impl EntryPatch {
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            name: Some(value.into()),
            ..Self::default()
        }
    }

    /// The single requested field, or a validation error when zero or more
    /// than one field is set.
    pub(crate) fn single(&self) -> Result<PatchField<'_>, Error> {
        let count = self.name.is_some() as usize
            + self.description.is_some() as usize
            + self.completed.is_some() as usize
            + self.due_date.is_some() as usize;
        if count != 1 {
            return Err(Error::Validation(format!(
                "exactly one field may be updated per request, got {count}"
            )));
        }
        if let Some(name) = &self.name {
            return Ok(PatchField::Name(name));
        }
        if let Some(description) = &self.description {
            return Ok(PatchField::Description(description));
        }
        if let Some(completed) = self.completed {
            return Ok(PatchField::Completed(completed));
        }
        match self.due_date {
            Some(due) => Ok(PatchField::DueDate(due)),
            None => Err(Error::Validation("no update field supplied".to_string())),
        }
    }
}

/// A validated single-field view of an `EntryPatch`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PatchField<'a> {
    Name(&'a str),
    Description(&'a str),
    Completed(bool),
    DueDate(NaiveDate),
}
