//! PROPFIND `multistatus` parsing
//!
//! Extracts one [`DavEntry`] per `<response>`. Namespace prefixes are
//! ignored (servers disagree on them); only properties inside a `propstat`
//! whose status is 200 are kept.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::WebDavError;

/// Properties of one resource as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavEntry {
    /// Raw `href`, still percent-encoded
    pub href: String,
    pub display_name: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_length: Option<u64>,
    pub is_collection: bool,
}

#[derive(Default)]
struct Props {
    display_name: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    content_length: Option<u64>,
    is_collection: bool,
    status_ok: bool,
}

/// Parses an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Formats a timestamp as an HTTP date
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn is_ok_status(line: &str) -> bool {
    line.split_whitespace().nth(1) == Some("200")
}

/// Parses a `207 Multi-Status` body
///
/// # Errors
/// Returns [`WebDavError::InvalidResponse`] for malformed XML or a
/// `<response>` without `<href>`.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavEntry>, WebDavError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<DavEntry> = None;
    let mut props: Option<Props> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| WebDavError::InvalidResponse(format!("XML error at {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "response" => current = Some(DavEntry::default()),
                    "propstat" => props = Some(Props::default()),
                    "collection" if stack.iter().any(|s| s == "resourcetype") => {
                        if let Some(p) = props.as_mut() {
                            p.is_collection = true;
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }

            Event::Empty(e) => {
                if e.local_name().as_ref() == b"collection"
                    && stack.last().map(String::as_str) == Some("resourcetype")
                {
                    if let Some(p) = props.as_mut() {
                        p.is_collection = true;
                    }
                }
            }

            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| WebDavError::InvalidResponse(e.to_string()))?;
                apply_text(&stack, &text, current.as_mut(), props.as_mut());
            }

            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                apply_text(&stack, &text, current.as_mut(), props.as_mut());
            }

            Event::End(e) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"propstat" => {
                        if let (Some(entry), Some(p)) = (current.as_mut(), props.take()) {
                            if p.status_ok {
                                entry.display_name = p.display_name.or(entry.display_name.take());
                                entry.last_modified = p.last_modified.or(entry.last_modified);
                                entry.content_length = p.content_length.or(entry.content_length);
                                entry.is_collection |= p.is_collection;
                            }
                        }
                    }
                    b"response" => {
                        if let Some(entry) = current.take() {
                            if entry.href.is_empty() {
                                return Err(WebDavError::InvalidResponse(
                                    "response without href".to_string(),
                                ));
                            }
                            entries.push(entry);
                        }
                    }
                    _ => {}
                }
            }

            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn apply_text(stack: &[String], text: &str, entry: Option<&mut DavEntry>, props: Option<&mut Props>) {
    let Some(element) = stack.last().map(String::as_str) else {
        return;
    };
    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());

    match (element, parent) {
        ("href", Some("response")) => {
            if let Some(entry) = entry {
                entry.href = text.trim().to_string();
            }
        }
        ("status", Some("propstat")) => {
            if let Some(p) = props {
                p.status_ok = is_ok_status(text);
            }
        }
        ("displayname", _) => {
            if let Some(p) = props {
                p.display_name = Some(text.to_string());
            }
        }
        ("getlastmodified", _) => {
            if let Some(p) = props {
                p.last_modified = parse_http_date(text);
            }
        }
        ("getcontentlength", _) => {
            if let Some(p) = props {
                p.content_length = text.trim().parse().ok();
            }
        }
        _ => {}
    }
}
