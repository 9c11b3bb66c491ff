//! XML (`text/xml`) encoding
//!
//! Every document starts with an XML declaration and a document type
//! declaration naming `folderWatch.dtd`. The DTD is referenced only; nothing
//! here validates against it.
//!
//! Tabs and line breaks in text are written as character references so that
//! receivers applying end-of-line normalization still see the exact path.

use crate::error::{EncodingError, Result};
use crate::types::{Event, FolderWatch};
use crate::{EncodedMessage, Encoder, Format};
use quick_xml::events::{BytesText, Event as XmlEvent};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

pub const ROOT_ELEMENT: &str = "FolderWatch";
pub const DTD_SYSTEM_ID: &str = "folderWatch.dtd";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const INDENT_SIZE: usize = 4;

const ACTION: &str = "action";
const PATH: &str = "path";
const IS_DIR: &str = "isDir";

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlEncoder;

impl Encoder for XmlEncoder {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn encode(&self, event: &Event) -> Result<EncodedMessage> {
        if let Some(ch) = event.path.chars().find(|&c| !is_xml_char(c)) {
            return Err(EncodingError::InvalidXmlChar {
                path: event.path.clone(),
                ch,
            });
        }

        let wire = event.to_wire();
        let fields = [
            (ACTION, wire.action.as_str()),
            (PATH, wire.path.as_str()),
            (IS_DIR, if wire.is_dir { "true" } else { "false" }),
        ];

        let mut writer = Writer::new_with_indent(prolog().into_bytes(), b' ', INDENT_SIZE);
        writer
            .create_element(ROOT_ELEMENT)
            .write_inner_content(|inner| {
                for (name, value) in fields {
                    inner
                        .create_element(name)
                        .write_text_content(BytesText::from_escaped(escape_text(value)))?;
                }
                Ok::<(), quick_xml::Error>(())
            })?;

        Ok(EncodedMessage::new(
            Format::Xml,
            writer.into_inner(),
            event.watch_root.clone(),
        ))
    }

    fn decode(&self, message: &EncodedMessage) -> Result<Event> {
        message.expect_format(Format::Xml)?;
        let wire = read_document(message.body_str()?)?;
        wire.into_event(message.watch_root())
    }
}

/// Declaration and doctype lines preceding the root element.
pub fn prolog() -> String {
    format!(
        "{}\n<!DOCTYPE {} SYSTEM \"{}\">\n",
        XML_DECLARATION, ROOT_ELEMENT, DTD_SYSTEM_ID
    )
}

/// XML 1.0 `Char` production. Surrogates cannot occur in a Rust `char`.
fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Escape markup and turn tab, LF and CR into character references.
fn escape_text(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '\t', '\n', '\r']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Pull the three fields out of the first `FolderWatch` element.
///
/// Text is kept untrimmed; surrounding whitespace is part of a path.
fn read_document(text: &str) -> Result<FolderWatch> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(false);

    let mut in_root = false;
    let mut field: Option<&'static str> = None;
    let (mut action, mut path, mut is_dir) = (None::<String>, None::<String>, None::<String>);

    loop {
        match reader.read_event()? {
            XmlEvent::Start(start) => {
                let name = start.name();
                if !in_root {
                    in_root = name.as_ref() == ROOT_ELEMENT.as_bytes();
                    continue;
                }
                field = [ACTION, PATH, IS_DIR]
                    .into_iter()
                    .find(|known| name.as_ref() == known.as_bytes());
                let slot = match field {
                    Some(ACTION) => &mut action,
                    Some(PATH) => &mut path,
                    Some(_) => &mut is_dir,
                    None => continue,
                };
                slot.get_or_insert_with(String::new);
            }
            XmlEvent::Text(content) if in_root => {
                let value = content.unescape()?;
                append(field, &value, &mut action, &mut path, &mut is_dir);
            }
            XmlEvent::CData(content) if in_root => {
                let raw = content.into_inner();
                let value = std::str::from_utf8(&raw)?;
                append(field, value, &mut action, &mut path, &mut is_dir);
            }
            XmlEvent::End(end) if in_root => {
                if end.name().as_ref() == ROOT_ELEMENT.as_bytes() {
                    break;
                }
                field = None;
            }
            XmlEvent::Eof => {
                if !in_root {
                    return Err(EncodingError::MissingRoot(ROOT_ELEMENT));
                }
                break;
            }
            _ => {}
        }
    }

    let is_dir = match is_dir.ok_or(EncodingError::MissingField(IS_DIR))?.as_str() {
        "true" => true,
        "false" => false,
        other => return Err(EncodingError::InvalidIsDir(other.to_string())),
    };
    Ok(FolderWatch {
        action: action.ok_or(EncodingError::MissingField(ACTION))?,
        path: path.ok_or(EncodingError::MissingField(PATH))?,
        is_dir,
    })
}

fn append(
    field: Option<&'static str>,
    value: &str,
    action: &mut Option<String>,
    path: &mut Option<String>,
    is_dir: &mut Option<String>,
) {
    let slot = match field {
        Some(ACTION) => action,
        Some(PATH) => path,
        Some(IS_DIR) => is_dir,
        _ => return,
    };
    slot.get_or_insert_with(String::new).push_str(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_xml_layout() {
        let event = Event::new(EventKind::Remove, "/data/old", true, "/data");
        let message = XmlEncoder.encode(&event).unwrap();
        let expected = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE FolderWatch SYSTEM \"folderWatch.dtd\">\n",
            "<FolderWatch>\n",
            "    <action>REMOVE</action>\n",
            "    <path>/data/old</path>\n",
            "    <isDir>true</isDir>\n",
            "</FolderWatch>",
        );
        assert_eq!(message.body_str().unwrap(), expected);
        assert_eq!(message.content_type(), "text/xml");
    }

    #[test]
    fn test_xml_escapes_markup_in_path() {
        let event = Event::new(EventKind::Create, "/data/a<b>&c.txt", false, "/data");
        let message = XmlEncoder.encode(&event).unwrap();
        let body = message.body_str().unwrap();
        assert!(body.contains("a&lt;b&gt;&amp;c.txt"));
        assert_eq!(XmlEncoder.decode(&message).unwrap(), event);
    }

    #[test]
    fn test_xml_without_prolog_still_decodes() {
        let body = b"<FolderWatch><action>MOVE</action><path>/data/x</path><isDir>false</isDir></FolderWatch>".to_vec();
        let message = EncodedMessage::new(Format::Xml, body, "/data");
        let event = XmlEncoder.decode(&message).unwrap();
        assert_eq!(event, Event::new(EventKind::Move, "/data/x", false, "/data"));
    }

    #[test]
    fn test_xml_missing_root() {
        let body = b"<?xml version=\"1.0\"?>\n<FolderWatchList/>".to_vec();
        let message = EncodedMessage::new(Format::Xml, body, "/data");
        assert!(matches!(
            XmlEncoder.decode(&message),
            Err(EncodingError::MissingRoot("FolderWatch"))
        ));
    }

    #[test]
    fn test_xml_keeps_surrounding_whitespace() {
        for path in ["/data/trailing ", " /data/leading", "/data/tab\t", "/data/new\n", "/data/cr\r"] {
            let event = Event::new(EventKind::Create, path, false, "/data");
            let message = XmlEncoder.encode(&event).unwrap();
            assert_eq!(XmlEncoder.decode(&message).unwrap(), event, "{:?}", path);
        }
    }

    #[test]
    fn test_xml_line_breaks_become_references() {
        let event = Event::new(EventKind::Create, "/data/a\tb\nc", false, "/data");
        let message = XmlEncoder.encode(&event).unwrap();
        assert!(message
            .body_str()
            .unwrap()
            .contains("<path>/data/a&#9;b&#10;c</path>"));
    }

    #[test]
    fn test_xml_rejects_control_characters() {
        let event = Event::new(EventKind::Create, "/data/ctl\u{1}x", false, "/data");
        match XmlEncoder.encode(&event) {
            Err(EncodingError::InvalidXmlChar { path, ch }) => {
                assert_eq!(path, "/data/ctl\u{1}x");
                assert_eq!(ch, '\u{1}');
            }
            other => panic!("expected InvalidXmlChar, got {:?}", other),
        }
    }

    #[test]
    fn test_xml_invalid_is_dir_literal() {
        let body = b"<FolderWatch><action>CREATE</action><path>/data/x</path><isDir>yes</isDir></FolderWatch>".to_vec();
        let message = EncodedMessage::new(Format::Xml, body, "/data");
        assert!(matches!(
            XmlEncoder.decode(&message),
            Err(EncodingError::InvalidIsDir(ref v)) if v == "yes"
        ));
    }

    #[test]
    fn test_xml_missing_field() {
        let body = b"<FolderWatch><action>CREATE</action><isDir>true</isDir></FolderWatch>".to_vec();
        let message = EncodedMessage::new(Format::Xml, body, "/data");
        assert!(matches!(
            XmlEncoder.decode(&message),
            Err(EncodingError::MissingField("path"))
        ));
    }
}
