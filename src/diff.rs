//! Diff notification envelopes and the version range a diff covers.

use serde::{Deserialize, Serialize};

use crate::decode::{Element, Token, XmlStream};
use crate::error::{CibError, CibResult};
use crate::types::CibVersion;

const UPDATE_RESULT: &str = "cib_update_result";

/// Return the diff carried by a notification: the first element inside
/// `cib_update_result`, verbatim.
pub fn extract_diff(envelope: &str) -> CibResult<String> {
    let mut stream = XmlStream::new(envelope);
    loop {
        match stream.next()? {
            Token::Start(element) if element.name == UPDATE_RESULT && !element.empty => {
                return match stream.next()? {
                    Token::Start(diff) => Ok(stream.capture(&diff)?.to_string()),
                    Token::End | Token::Eof => Err(CibError::Decode(format!(
                        "empty {UPDATE_RESULT} in notification"
                    ))),
                };
            }
            Token::Start(_) | Token::End => continue,
            Token::Eof => {
                return Err(CibError::Decode(format!(
                    "notification carries no {UPDATE_RESULT}"
                )));
            }
        }
    }
}

/// Which revisions a diff moves between.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub format: Option<u32>,
    pub source: Option<CibVersion>,
    pub target: Option<CibVersion>,
    /// Number of `change` entries in a format 2 patchset.
    pub changes: usize,
}

impl DiffSummary {
    /// Read a format 2 patchset (`version/source`, `version/target`) or a
    /// legacy diff (`diff-removed`, `diff-added`).
    pub fn decode(diff: &str) -> CibResult<Self> {
        let mut stream = XmlStream::new(diff);
        let mut root = stream.root()?;
        if root.name != "diff" {
            return Err(CibError::Decode(format!(
                "expected <diff>, found <{}>",
                root.name
            )));
        }

        let mut summary = DiffSummary {
            format: root.take("format").and_then(|f| f.trim().parse().ok()),
            ..Default::default()
        };
        stream.children(&root, |stream, child| match child.name.as_str() {
            "version" => stream.children(&child, |stream, mut side| {
                match side.name.as_str() {
                    "source" => summary.source = version_of(&mut side),
                    "target" => summary.target = version_of(&mut side),
                    _ => {}
                }
                stream.skip(&side)
            }),
            "change" => {
                summary.changes += 1;
                stream.skip(&child)
            }
            "diff-removed" => {
                summary.source = legacy_version(stream, child)?;
                Ok(())
            }
            "diff-added" => {
                summary.target = legacy_version(stream, child)?;
                Ok(())
            }
            _ => stream.skip(&child),
        })?;
        Ok(summary)
    }

    /// True if the diff applies on top of `base`.
    pub fn applies_to(&self, base: CibVersion) -> bool {
        self.source == Some(base)
    }
}

fn version_of(element: &mut Element) -> Option<CibVersion> {
    let attributes = element.take_all();
    CibVersion::from_attributes(attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))).ok()
}

/// Legacy diffs carry the version on the `diff-added` / `diff-removed`
/// element or on its `cib` child.
fn legacy_version(stream: &mut XmlStream<'_>, mut element: Element) -> CibResult<Option<CibVersion>> {
    let mut version = version_of(&mut element);
    stream.children(&element, |stream, mut child| {
        if version.is_none() && child.name == "cib" {
            version = version_of(&mut child);
        }
        stream.skip(&child)
    })?;
    Ok(version)
}
