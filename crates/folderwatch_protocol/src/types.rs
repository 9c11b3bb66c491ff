//! Canonical event types shared by the watcher adapter, the encoders and the publisher.

use crate::error::{EncodingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filesystem change kinds that are forwarded to the broker.
///
/// Every other watcher operation (content writes, permission changes) is
/// dropped before an [`Event`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Remove,
    Rename,
    Move,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Create,
        EventKind::Remove,
        EventKind::Rename,
        EventKind::Move,
    ];

    /// Wire token used in the `action` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Remove => "REMOVE",
            EventKind::Rename => "RENAME",
            EventKind::Move => "MOVE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EncodingError::UnknownAction(s.to_string()))
    }
}

/// A filesystem change, independent of how it was detected or how it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Absolute path of the entry (the new path for renames and moves)
    pub path: String,
    pub is_dir: bool,
    /// Root under observation when the change was detected
    pub watch_root: String,
}

impl Event {
    pub fn new(
        kind: EventKind,
        path: impl Into<String>,
        is_dir: bool,
        watch_root: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            is_dir,
            watch_root: watch_root.into(),
        }
    }

    /// Body fields as they appear on the wire.
    pub fn to_wire(&self) -> FolderWatch {
        FolderWatch {
            action: self.kind.as_str().to_string(),
            path: self.path.clone(),
            is_dir: self.is_dir,
        }
    }
}

/// Message body shared by the JSON and XML encodings.
///
/// `isDir` is the literal string `"true"` or `"false"`; receivers match on
/// the string, so a native boolean is never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "FolderWatch")]
pub struct FolderWatch {
    pub action: String,
    pub path: String,
    #[serde(rename = "isDir", with = "bool_literal")]
    pub is_dir: bool,
}

impl FolderWatch {
    /// Rebuild the event, validating the action token.
    pub fn into_event(self, watch_root: impl Into<String>) -> Result<Event> {
        let kind = self.action.parse::<EventKind>()?;
        Ok(Event {
            kind,
            path: self.path,
            is_dir: self.is_dir,
            watch_root: watch_root.into(),
        })
    }
}

mod bool_literal {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!(
                "isDir must be \"true\" or \"false\", got {:?}",
                other
            ))),
        }
    }
}
