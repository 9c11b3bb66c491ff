//! Folderwatch wire protocol
//!
//! Canonical event model and the two message encodings published to the broker.
//!
//! # Message bodies
//!
//! JSON (`text/json`):
//! ```text
//! {
//!       "action": "CREATE",
//!       "path": "/data/a.txt",
//!       "isDir": "false"
//!   }
//! ```
//!
//! XML (`text/xml`):
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE FolderWatch SYSTEM "folderWatch.dtd">
//! <FolderWatch>
//!     <action>CREATE</action>
//!     <path>/data/a.txt</path>
//!     <isDir>false</isDir>
//! </FolderWatch>
//! ```
//!
//! The watch root is not part of the body. It travels in the envelope
//! (the `watch-root` AMQP header) so that decoding rebuilds the full [`Event`].

pub mod defaults;
pub mod error;
pub mod json;
pub mod types;
pub mod xml;

pub use error::{EncodingError, Result};
pub use json::JsonEncoder;
pub use types::{Event, EventKind, FolderWatch};
pub use xml::XmlEncoder;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Body encoding of a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Xml,
}

impl Format {
    /// AMQP `content-type` property for this encoding
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => "text/json",
            Format::Xml => "text/xml",
        }
    }

    /// Encoder implementing this format, for injection into the bridge.
    pub fn encoder(self) -> Box<dyn Encoder> {
        match self {
            Format::Json => Box::new(JsonEncoder),
            Format::Xml => Box::new(XmlEncoder),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Xml => f.write_str("xml"),
        }
    }
}

impl FromStr for Format {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            _ => Err(EncodingError::UnknownFormat(s.to_string())),
        }
    }
}

/// Encoded message: body bytes plus envelope metadata.
///
/// Built fresh for every event and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    format: Format,
    body: Vec<u8>,
    watch_root: String,
}

impl EncodedMessage {
    pub fn new(format: Format, body: Vec<u8>, watch_root: impl Into<String>) -> Self {
        Self {
            format,
            body,
            watch_root: watch_root.into(),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn watch_root(&self) -> &str {
        &self.watch_root
    }

    /// Body as text (both encodings are UTF-8).
    pub fn body_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    fn expect_format(&self, expected: Format) -> Result<()> {
        if self.format != expected {
            return Err(EncodingError::FormatMismatch {
                expected,
                got: self.format,
            });
        }
        Ok(())
    }
}

/// Turns events into message bodies and back.
pub trait Encoder: Send + Sync {
    fn format(&self) -> Format;

    fn encode(&self, event: &Event) -> Result<EncodedMessage>;

    fn decode(&self, message: &EncodedMessage) -> Result<Event>;
}

/// Encode `event` in the given format.
pub fn encode(event: &Event, format: Format) -> Result<EncodedMessage> {
    format.encoder().encode(event)
}

/// Decode a message with the encoder matching its own format tag.
pub fn decode(message: &EncodedMessage) -> Result<Event> {
    message.format().encoder().decode(message)
}
