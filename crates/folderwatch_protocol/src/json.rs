//! JSON (`text/json`) encoding

use crate::error::Result;
use crate::types::{Event, FolderWatch};
use crate::{EncodedMessage, Encoder, Format};
use serde::Serialize;

/// Prefix written before every line after the first.
const LINE_PREFIX: &str = "  ";
/// Indentation per nesting level.
const INDENT: &[u8] = b"    ";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn format(&self) -> Format {
        Format::Json
    }

    fn encode(&self, event: &Event) -> Result<EncodedMessage> {
        let body = to_indented_json(&event.to_wire())?;
        Ok(EncodedMessage::new(
            Format::Json,
            body.into_bytes(),
            event.watch_root.clone(),
        ))
    }

    fn decode(&self, message: &EncodedMessage) -> Result<Event> {
        message.expect_format(Format::Json)?;
        let wire: FolderWatch = serde_json::from_slice(message.body())?;
        wire.into_event(message.watch_root())
    }
}

fn to_indented_json(wire: &FolderWatch) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    wire.serialize(&mut serializer)?;

    // Strings are escaped by serde_json, so every raw newline is structural.
    let body = String::from_utf8(buf).map_err(|e| e.utf8_error())?;
    Ok(body.replace('\n', &format!("\n{}", LINE_PREFIX)))
}
