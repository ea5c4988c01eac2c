//! A decoded CIB revision.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use tracing::warn;

use super::configuration::{Configuration, Node};
use super::status::{NodeState, ResourceState, Status};
use super::version::CibVersion;
use crate::config::DecodeOptions;
use crate::decode::{decode_configuration_with, document_parts};
use crate::error::CibResult;

/// An immutable decoded CIB document.
///
/// Root attributes and status are decoded up front. Configuration is decoded
/// from the retained source on first access unless the decode options ask for
/// it eagerly. A new revision is always a new `Document`.
#[derive(Debug)]
pub struct Document {
    raw: Arc<str>,
    attributes: BTreeMap<String, String>,
    version: CibVersion,
    status: Status,
    configuration: OnceCell<Configuration>,
    options: DecodeOptions,
}

impl Document {
    pub fn decode(raw: &str) -> CibResult<Self> {
        Self::decode_with(raw, &DecodeOptions::default())
    }

    pub fn decode_with(raw: &str, options: &DecodeOptions) -> CibResult<Self> {
        Self::from_shared(Arc::from(raw), options)
    }

    pub(crate) fn from_shared(raw: Arc<str>, options: &DecodeOptions) -> CibResult<Self> {
        let parts = document_parts(&raw, options)?;
        let version = CibVersion::from_attributes(
            parts
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
        .unwrap_or_else(|err| {
            warn!(event = "Decode", phase = "Version", error = %err, "treating version as 0:0:0");
            CibVersion::default()
        });

        let configuration = OnceCell::new();
        if let Some(config) = parts.configuration {
            let _ = configuration.set(config);
        }

        Ok(Self {
            raw,
            attributes: parts.attributes,
            version,
            status: parts.status,
            configuration,
            options: *options,
        })
    }

    /// The document as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> CibVersion {
        self.version
    }

    /// Root attributes in name order.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn validate_with(&self) -> Option<&str> {
        self.attribute("validate-with")
    }

    pub fn have_quorum(&self) -> bool {
        matches!(self.attribute("have-quorum"), Some("1" | "true"))
    }

    pub fn dc_uuid(&self) -> Option<&str> {
        self.attribute("dc-uuid")
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The configuration subtree, decoded on first call.
    pub fn configuration(&self) -> CibResult<&Configuration> {
        self.configuration
            .get_or_try_init(|| decode_configuration_with(&self.raw, &self.options))
    }

    pub fn is_configuration_decoded(&self) -> bool {
        self.configuration.get().is_some()
    }

    pub fn node(&self, uname: &str) -> CibResult<Option<&Node>> {
        Ok(self.configuration()?.node(uname))
    }

    pub fn node_state(&self, uname: &str) -> Option<&NodeState> {
        self.status.node_state(uname)
    }

    pub fn resource_state(&self, uname: &str, resource_id: &str) -> Option<&ResourceState> {
        self.status.resource_state(uname, resource_id)
    }

    pub fn to_json(&self) -> CibResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| crate::error::CibError::Decode(e.to_string()))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let configuration = self.configuration().map_err(S::Error::custom)?;
        let mut state = serializer.serialize_struct("Document", 4)?;
        state.serialize_field("version", &self.version.to_string())?;
        state.serialize_field("attributes", &self.attributes)?;
        state.serialize_field("configuration", configuration)?;
        state.serialize_field("status", &self.status)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<cib admin_epoch="1" epoch="0" num_updates="0" validate-with="pacemaker-3.9" have-quorum="1" dc-uuid="xxx">
  <configuration>
    <crm_config/>
    <nodes><node id="xxx" uname="c001n01" type="normal"/></nodes>
    <resources/>
    <constraints/>
  </configuration>
  <status><node_state id="xxx" uname="c001n01" in_ccm="true" crmd="online" join="member" expected="member"/></status>
</cib>"#;

    #[test]
    fn test_version_and_attributes() {
        let doc = Document::decode(DOC).unwrap();
        insta::assert_snapshot!(doc.version().to_string(), @"1:0:0");
        assert_eq!(doc.validate_with(), Some("pacemaker-3.9"));
        assert!(doc.have_quorum());
        assert_eq!(doc.dc_uuid(), Some("xxx"));
        assert_eq!(doc.raw(), DOC);
    }

    #[test]
    fn test_configuration_is_lazy() {
        let doc = Document::decode(DOC).unwrap();
        assert!(!doc.is_configuration_decoded());
        assert!(doc.node_state("c001n01").unwrap().in_ccm());

        let node = doc.node("c001n01").unwrap().unwrap();
        assert_eq!(node.type_name(), "normal");
        assert!(doc.is_configuration_decoded());
    }

    #[test]
    fn test_eager_configuration() {
        let options = DecodeOptions::default().with_eager_configuration(true);
        let doc = Document::decode_with(DOC, &options).unwrap();
        assert!(doc.is_configuration_decoded());
    }

    #[test]
    fn test_missing_version_defaults() {
        let doc = Document::decode("<cib><status/></cib>").unwrap();
        assert_eq!(doc.version(), CibVersion::default());
    }

    #[test]
    fn test_malformed_is_decode_error() {
        let err = Document::decode("<cib admin_epoch=\"1\"><status>").unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_json_form() {
        let doc = Document::decode(DOC).unwrap();
        let json = doc.to_json().unwrap();
        assert_eq!(json["version"], "1:0:0");
        assert_eq!(json["configuration"]["nodes"][0]["uname"], "c001n01");
        assert_eq!(json["configuration"]["nodes"][0]["type"], "normal");
        assert_eq!(json["status"]["node_states"][0]["join"], "member");
    }
}
