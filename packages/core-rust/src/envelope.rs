//! Diagnostic envelopes: an XML document describing one top-level call.
//!
//! Success documents are rooted at the method name and hold an `Output`
//! section followed by one section per input parameter, named after the
//! parameter's type. Fault documents are rooted at `Result` and hold only the
//! fault section. Both always end with a `CallDuration` node.
//!
//! Values are written from their JSON form: object fields in key order, array
//! items as repeated elements. Building an envelope never fails. A value that
//! cannot be serialized is left out of the document and everything else is
//! still written; an object field whose key is not an element name is left
//! out on its own.

use std::fmt;
use std::time::Duration;

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use serde_json::Value;

use crate::fault::{Fault, InvocationResult};
use crate::request::{short_type_name, Param};

const FAULT_ROOT: &str = "Result";
const OUTPUT: &str = "Output";
const CALL_DURATION: &str = "CallDuration";
const ARRAY_ITEM: &str = "Item";

/// A rendered diagnostic document. Built once per top-level call and not
/// persisted by this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    root: String,
    xml: String,
}

impl Envelope {
    /// Name of the document's root element.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.xml
    }

    /// True when the document contains an element named `name`.
    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        self.xml.contains(&format!("<{name}>")) || self.xml.contains(&format!("<{name}/>"))
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

/// Renders invocation outcomes into [`Envelope`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultEnvelopeBuilder;

impl ResultEnvelopeBuilder {
    /// Builds the envelope for `result`.
    ///
    /// `inputs` are the parameters the call was made with; `duration` is the
    /// wall-clock time of the attempt that produced `result`.
    #[must_use]
    pub fn build<T: Serialize>(
        method: &str,
        result: &InvocationResult<T>,
        inputs: &[Param],
        duration: Duration,
    ) -> Envelope {
        match result {
            InvocationResult::Success(value) => Self::success(method, value, inputs, duration),
            InvocationResult::Fault(fault) => Self::fault(fault, duration),
        }
    }

    fn success<T: Serialize>(
        method: &str,
        value: &T,
        inputs: &[Param],
        duration: Duration,
    ) -> Envelope {
        let root = if is_xml_name(method) { method } else { FAULT_ROOT };
        let mut xml = String::new();
        open(&mut xml, root);

        match render(short_type_name::<T>(), value) {
            Some(output) => {
                open(&mut xml, OUTPUT);
                xml.push_str(&output);
                close(&mut xml, OUTPUT);
            }
            None => empty(&mut xml, OUTPUT),
        }

        for param in inputs {
            let name = param.type_name.as_ref();
            if let Some(rendered) = render(name, &param.value) {
                open(&mut xml, name);
                xml.push_str(&rendered);
                close(&mut xml, name);
            }
        }

        duration_node(&mut xml, duration);
        close(&mut xml, root);

        Envelope {
            root: root.to_string(),
            xml,
        }
    }

    fn fault(fault: &Fault, duration: Duration) -> Envelope {
        let mut xml = String::new();
        open(&mut xml, FAULT_ROOT);
        open(&mut xml, "Exception");
        open(&mut xml, "ExceptionInfo");
        open(&mut xml, "FaultMessage");
        xml.push_str(&escape(fault.message()));
        close(&mut xml, "FaultMessage");
        if let Some(detail) = fault.detail() {
            xml.push_str(detail);
        }
        close(&mut xml, "ExceptionInfo");
        close(&mut xml, "Exception");
        duration_node(&mut xml, duration);
        close(&mut xml, FAULT_ROOT);

        Envelope {
            root: FAULT_ROOT.to_string(),
            xml,
        }
    }
}

/// Formats a duration as `hh:mm:ss.fffffff` (100 ns ticks).
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let ticks = duration.subsec_nanos() / 100;
    format!(
        "{:02}:{:02}:{:02}.{:07}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        ticks
    )
}

fn render<T: Serialize + ?Sized>(name: &str, value: &T) -> Option<String> {
    if !is_xml_name(name) {
        tracing::debug!(name, "skipping envelope section with unusable element name");
        return None;
    }
    let value = match serde_json::to_value(value) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(name, error = %err, "skipping envelope section that failed to serialize");
            return None;
        }
    };
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, name, &value).ok()?;
    String::from_utf8(writer.into_inner()).ok()
}

/// Writes `value` as element `name`. Array items repeat the element; an item
/// that is itself an array becomes one element holding an `Item` per entry.
/// Object fields whose keys are not element names are left out.
fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> quick_xml::Result<()> {
    match value {
        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name)))?;
            Ok(())
        }
        Value::Bool(b) => write_text(writer, name, if *b { "true" } else { "false" }),
        Value::Number(n) => write_text(writer, name, &n.to_string()),
        Value::String(text) => write_text(writer, name, text),
        Value::Array(items) => {
            for item in items {
                if let Value::Array(inner) = item {
                    writer.write_event(Event::Start(BytesStart::new(name)))?;
                    for entry in inner {
                        write_element(writer, ARRAY_ITEM, entry)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else {
                    write_element(writer, name, item)?;
                }
            }
            Ok(())
        }
        Value::Object(fields) => {
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            for (key, field) in fields {
                if is_xml_name(key) {
                    write_element(writer, key, field)?;
                } else {
                    tracing::debug!(key = %key, "skipping envelope field with unusable element name");
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
    }
}

fn write_text(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn duration_node(xml: &mut String, duration: Duration) {
    open(xml, CALL_DURATION);
    xml.push_str(&format_duration(duration));
    close(xml, CALL_DURATION);
}

fn open(xml: &mut String, name: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
}

fn close(xml: &mut String, name: &str) {
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

fn empty(xml: &mut String, name: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push_str("/>");
}

/// Conservative XML element-name check (ASCII subset).
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}
