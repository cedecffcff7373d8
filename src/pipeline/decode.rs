//! Response decoding: service XML → [`TaskRecord`] or a typed error.
//!
//! The service wraps every answer in a `<response>` container:
//!
//! ```xml
//! <response>
//!   <task id="3f9a..." status="Completed" resultUrl="https://..." filesCount="1"/>
//! </response>
//! ```
//!
//! Errors come back as `<error><message>...</message></error>`, either inside
//! the container or, for authentication failures, as the root element.
//!
//! Field values are accepted both as attributes and as nested elements
//! (`<task><status>Queued</status></task>`), so the body is first read into a
//! small element tree and fields are looked up with [`Element::field`].
//! Decoding is all-or-nothing: a record is returned only when every required
//! field is present and every numeric field parses.

use crate::error::DecodeError;
use crate::task::{TaskId, TaskRecord, TaskStatus};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Interprets raw response bodies. Injected into [`crate::OcrClient`].
pub trait ResponseDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<TaskRecord, DecodeError>;
}

/// The service's XML format.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlDecoder;

impl ResponseDecoder for XmlDecoder {
    fn decode(&self, raw: &[u8]) -> Result<TaskRecord, DecodeError> {
        decode(raw)
    }
}

/// Decode one response body.
pub fn decode(raw: &[u8]) -> Result<TaskRecord, DecodeError> {
    let root = parse_tree(raw)?;

    match root.name.as_str() {
        "response" => {}
        "error" => {
            return Err(DecodeError::Service {
                message: error_message(&root),
            })
        }
        other => {
            return Err(DecodeError::MissingContainer {
                found: other.to_string(),
            })
        }
    }

    if let Some(err) = root.children_named("error").next() {
        return Err(DecodeError::Service {
            message: error_message(err),
        });
    }

    let tasks: Vec<&Element> = root.children_named("task").collect();
    match tasks.as_slice() {
        [task] => task_from_element(task),
        [] => Err(DecodeError::UnknownResponse),
        many => Err(DecodeError::MultipleTasks { count: many.len() }),
    }
}

fn task_from_element(el: &Element) -> Result<TaskRecord, DecodeError> {
    let id = el
        .field("id")?
        .ok_or(DecodeError::MissingField { field: "id" })?;
    let status = el
        .field("status")?
        .ok_or(DecodeError::MissingField { field: "status" })?;
    let status = TaskStatus::parse(&status);

    let result_url = el.field("resultUrl")?;
    if status == TaskStatus::Completed && result_url.is_none() {
        return Err(DecodeError::MissingField { field: "resultUrl" });
    }

    let mut extra_result_urls = Vec::new();
    for field in ["resultUrl2", "resultUrl3"] {
        if let Some(url) = el.field(field)? {
            extra_result_urls.push(url);
        }
    }

    // Older responses carry the failure reason in `error`, newer ones in `description`.
    let error_message = if status == TaskStatus::ProcessingFailed {
        match el.field("error")? {
            Some(msg) => Some(msg),
            None => el.field("description")?,
        }
    } else {
        None
    };

    Ok(TaskRecord {
        id: TaskId::new(id),
        status,
        result_url,
        extra_result_urls,
        error_message,
        registration_time: el.field("registrationTime")?,
        status_change_time: el.field("statusChangeTime")?,
        files_count: el.numeric_field("filesCount")?,
        credits: el.numeric_field("credits")?,
        estimated_processing_time: el.numeric_field("estimatedProcessingTime")?,
        description: el.field("description")?,
    })
}

/// Literal message text of an `<error>` element.
fn error_message(err: &Element) -> String {
    match err.children_named("message").next() {
        Some(msg) => msg.deep_text.trim().to_string(),
        None => err.deep_text.trim().to_string(),
    }
}

// ── Element tree ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    /// Direct text content.
    text: String,
    /// Text of this element and all descendants, in document order.
    deep_text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(malformed)?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            ..Default::default()
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute or single nested element, trimmed; empty counts as absent.
    /// An attribute and a nested element that disagree are ambiguous.
    fn field(&self, name: &'static str) -> Result<Option<String>, DecodeError> {
        let attr = self
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, value)| non_empty(value));
        let mut nested = self.children_named(name);
        let nested = match (nested.next(), nested.next()) {
            (None, _) => None,
            (Some(one), None) => non_empty(&one.text),
            (Some(_), Some(_)) => return Err(DecodeError::AmbiguousField { field: name }),
        };
        match (attr, nested) {
            (Some(a), Some(n)) if a != n => Err(DecodeError::AmbiguousField { field: name }),
            (a, n) => Ok(a.or(n)),
        }
    }

    fn numeric_field<T: std::str::FromStr>(
        &self,
        name: &'static str,
    ) -> Result<Option<T>, DecodeError> {
        match self.field(name)? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| DecodeError::InvalidField { field: name, value: raw }),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn malformed(err: impl std::fmt::Display) -> DecodeError {
    DecodeError::Malformed {
        detail: err.to_string(),
    }
}

/// Read the whole body into an element tree.
fn parse_tree(raw: &[u8]) -> Result<Element, DecodeError> {
    // Untrimmed: whitespace between inline runs is part of a message.
    let mut reader = Reader::from_reader(raw);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let el = Element::from_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack.pop().ok_or_else(|| DecodeError::Malformed {
                    detail: "unexpected closing tag".into(),
                })?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => push_text(&mut stack, &text.unescape().map_err(malformed)?),
            Event::CData(data) => push_text(&mut stack, &String::from_utf8_lossy(&data.into_inner())),
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::Malformed {
            detail: format!("unclosed element <{}>", open.name),
        });
    }
    root.ok_or_else(|| DecodeError::Malformed {
        detail: "empty response body".into(),
    })
}

fn push_text(stack: &mut [Element], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.text.push_str(text);
    }
    for open in stack.iter_mut() {
        open.deep_text.push_str(text);
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(DecodeError::Malformed {
                detail: "more than one root element".into(),
            })
        }
    }
    Ok(())
}
