//! Streaming decoder from CIB XML to the typed model.
//!
//! A single forward pass over the token stream: each start tag either enters a
//! section decoder or has its subtree skipped. Unknown attributes and elements
//! are logged and ignored; only XML that does not parse is an error.

mod attributes;
mod configuration;
mod constraints;
mod resources;
mod status;
mod stream;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use strum::VariantNames;
use tracing::{debug, warn};

use crate::config::DecodeOptions;
use crate::error::{CibError, CibResult};
use crate::types::{AttributeSet, CibVersion, Configuration, Document, Lenient, Status, parse_interval_ms};

pub(crate) use stream::{Element, Token, XmlStream};

/// Decode a full `cib` document with default options.
pub fn decode(raw: &str) -> CibResult<Document> {
    Document::decode(raw)
}

/// Decode configuration from a `cib` document, a `configuration` element or
/// a single configuration section such as `resources` or `nodes`.
pub fn decode_configuration(raw: &str) -> CibResult<Configuration> {
    decode_configuration_with(raw, &DecodeOptions::default())
}

pub fn decode_configuration_with(raw: &str, options: &DecodeOptions) -> CibResult<Configuration> {
    let mut ctx = DecodeContext::new(options);
    let mut stream = XmlStream::new(raw);
    let root = stream.root()?;
    let mut config = Configuration::default();
    match root.name.as_str() {
        "cib" => {
            let mut root = root;
            root.take_all();
            stream.children(&root, |stream, child| match child.name.as_str() {
                "configuration" => configuration::configuration(&mut ctx, stream, child, &mut config),
                _ => stream.skip(&child),
            })?;
        }
        "configuration" => configuration::configuration(&mut ctx, &mut stream, root, &mut config)?,
        name if configuration::is_section(name) => {
            configuration::section(&mut ctx, &mut stream, root, &mut config)?
        }
        other => {
            return Err(CibError::Decode(format!(
                "expected <cib>, <configuration> or a configuration section, found <{other}>"
            )));
        }
    }
    Ok(config)
}

/// Decode status from a `cib` document, a `status` element or a single `node_state`.
pub fn decode_status(raw: &str) -> CibResult<Status> {
    let options = DecodeOptions::default();
    let mut ctx = DecodeContext::new(&options);
    let mut stream = XmlStream::new(raw);
    let mut root = stream.root()?;
    match root.name.as_str() {
        "cib" => {
            let mut found = Status::default();
            root.take_all();
            stream.children(&root, |stream, child| match child.name.as_str() {
                "status" => {
                    found = status::status(&mut ctx, stream, child)?;
                    Ok(())
                }
                _ => stream.skip(&child),
            })?;
            Ok(found)
        }
        "status" => status::status(&mut ctx, &mut stream, root),
        "node_state" => Ok(Status {
            node_states: status::node_state(&mut ctx, &mut stream, root)?
                .into_iter()
                .collect(),
        }),
        other => Err(CibError::Decode(format!(
            "expected <cib>, <status> or <node_state>, found <{other}>"
        ))),
    }
}

/// The version triple on the root element of `xml`, whatever the root is.
pub(crate) fn root_version(xml: &str) -> CibResult<CibVersion> {
    let mut stream = XmlStream::new(xml);
    let mut root = stream.root()?;
    let attributes = root.take_all();
    CibVersion::from_attributes(attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}

/// Everything decoded from a `cib` document in one pass.
#[derive(Debug)]
pub(crate) struct DocumentParts {
    pub attributes: BTreeMap<String, String>,
    pub status: Status,
    pub configuration: Option<Configuration>,
}

/// Decode the root attributes and status; configuration only when
/// `options.eager_configuration` is set.
pub(crate) fn document_parts(raw: &str, options: &DecodeOptions) -> CibResult<DocumentParts> {
    let mut ctx = DecodeContext::new(options);
    let mut stream = XmlStream::new(raw);
    let mut root = stream.root()?;
    if root.name != "cib" {
        return Err(CibError::Decode(format!(
            "expected <cib> document, found <{}>",
            root.name
        )));
    }

    let attributes: BTreeMap<String, String> = root.take_all().into_iter().collect();
    let mut status = None;
    let mut configuration = None;
    stream.children(&root, |stream, child| match child.name.as_str() {
        "status" => {
            status = Some(status::status(&mut ctx, stream, child)?);
            Ok(())
        }
        "configuration" if options.eager_configuration => {
            let mut config = Configuration::default();
            configuration::configuration(&mut ctx, stream, child, &mut config)?;
            configuration = Some(config);
            Ok(())
        }
        "configuration" => stream.skip(&child),
        _ => ctx.unknown_child(stream, "cib", child),
    })?;

    debug!(
        event = "Decode",
        phase = "Document",
        node_states = status.as_ref().map_or(0, |s: &Status| s.node_states.len()),
        configuration = configuration.is_some()
    );

    Ok(DocumentParts {
        attributes,
        status: status.unwrap_or_default(),
        configuration,
    })
}

/// Per-pass decode state: options and the attribute sets seen so far, for
/// resolving `id-ref`.
pub(crate) struct DecodeContext<'o> {
    options: &'o DecodeOptions,
    sets: HashMap<String, AttributeSet>,
}

impl<'o> DecodeContext<'o> {
    pub fn new(options: &'o DecodeOptions) -> Self {
        Self {
            options,
            sets: HashMap::new(),
        }
    }

    /// Report attributes the decoder did not take.
    pub fn finish(&self, element: &Element) {
        for name in element.leftover() {
            self.tolerate(&element.name, "attribute", name);
        }
    }

    pub fn unknown_child(&self, stream: &mut XmlStream<'_>, parent: &str, child: Element) -> CibResult<()> {
        self.tolerate(parent, "element", &child.name);
        stream.skip(&child)
    }

    /// Consume an element that has no modeled children.
    pub fn leaf(&self, stream: &mut XmlStream<'_>, element: &Element) -> CibResult<()> {
        stream.children(element, |stream, child| {
            self.unknown_child(stream, &element.name, child)
        })
    }

    fn tolerate(&self, element: &str, kind: &str, name: &str) {
        if self.options.warn_unknown {
            warn!(event = "Decode", phase = "Unknown", element, kind, name);
        } else {
            debug!(event = "Decode", phase = "Unknown", element, kind, name);
        }
    }

    /// Take an identifying attribute that must be present and non-empty.
    pub fn take_required(&self, element: &mut Element, attribute: &str) -> Option<String> {
        let value = non_empty(element.take(attribute));
        if value.is_none() {
            self.missing(&element.name, attribute);
        }
        value
    }

    /// Report an element dropped for lacking its identity.
    pub fn missing(&self, element: &str, attribute: &str) {
        warn!(
            event = "Decode",
            phase = "Missing",
            element,
            attribute,
            "dropping element without required attribute"
        );
    }

    /// Take an enumerated attribute. Values outside the table are kept as written.
    pub fn take_lenient<T>(&self, element: &mut Element, attribute: &str) -> Option<Lenient<T>>
    where
        T: FromStr + VariantNames,
    {
        let raw = element.take(attribute)?;
        let value = Lenient::parse(&raw);
        if !value.is_known() {
            warn!(
                event = "Decode",
                phase = "Enumeration",
                element = element.name,
                attribute,
                value = raw,
                allowed = T::VARIANTS.join(",")
            );
        }
        Some(value)
    }

    /// Take a duration attribute, warning when it does not parse.
    pub fn take_duration(&self, element: &mut Element, attribute: &str) -> Option<String> {
        let raw = element.take(attribute)?;
        if parse_interval_ms(&raw).is_none() {
            warn!(
                event = "Decode",
                phase = "Duration",
                element = element.name,
                attribute,
                value = raw
            );
        }
        Some(raw)
    }

    /// Take a numeric attribute. A value that does not parse is reported and
    /// treated as absent.
    pub fn take_parsed<T: FromStr>(&self, element: &mut Element, attribute: &str) -> Option<T> {
        let raw = element.take(attribute)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    event = "Decode",
                    phase = "Number",
                    element = element.name,
                    attribute,
                    value = raw
                );
                None
            }
        }
    }

    pub fn register_set(&mut self, id: &str, set: &AttributeSet) {
        self.sets.insert(id.to_string(), set.clone());
    }

    pub fn resolve_set(&self, id: &str) -> Option<&AttributeSet> {
        self.sets.get(id)
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
