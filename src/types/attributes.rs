//! Name/value attribute sets (`instance_attributes`, `meta_attributes`, ...).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::rule::Rule;

/// A single `nvpair`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Nvpair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_ref: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Nvpair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// A named collection of name/value pairs, optionally gated by rules.
///
/// A set may be a reference (`id-ref`) to another set instead of a definition.
/// References seen after their referent are filled in at decode time and keep
/// `id_ref`; references to sets not yet decoded stay empty so the caller can
/// resolve them later through [`crate::Configuration::attribute_set`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AttributeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default)]
    pub values: Vec<Nvpair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

impl AttributeSet {
    pub fn is_reference(&self) -> bool {
        self.id.is_none() && self.id_ref.is_some()
    }

    /// The identifier this set is known by, whether defined or referenced.
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().or(self.id_ref.as_deref())
    }

    /// Value of the first pair named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|pair| pair.name == name)
            .and_then(|pair| pair.value.as_deref())
    }
}

/// Look `name` up across several sets, first match wins.
pub fn lookup<'a>(sets: &'a [AttributeSet], name: &str) -> Option<&'a str> {
    sets.iter().find_map(|set| set.get(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(id: &str, pairs: &[(&str, &str)]) -> AttributeSet {
        AttributeSet {
            id: Some(id.to_string()),
            values: pairs.iter().map(|(k, v)| Nvpair::new(*k, *v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_first_match() {
        let s = set("s1", &[("target-role", "Stopped"), ("target-role", "Started")]);
        assert_eq!(s.get("target-role"), Some("Stopped"));
        assert_eq!(s.get("missing"), None);
    }

    #[test]
    fn test_lookup_across_sets() {
        let sets = vec![set("a", &[("x", "1")]), set("b", &[("y", "2")])];
        assert_eq!(lookup(&sets, "y"), Some("2"));
    }

    #[test]
    fn test_reference_key() {
        let reference = AttributeSet {
            id_ref: Some("shared".to_string()),
            ..Default::default()
        };
        assert!(reference.is_reference());
        assert_eq!(reference.key(), Some("shared"));
        assert!(!set("a", &[]).is_reference());
    }

    #[test]
    fn test_nvpair_json() {
        insta::assert_json_snapshot!(Nvpair::new("stonith-enabled", "false"), @r#"
        {
          "name": "stonith-enabled",
          "value": "false"
        }
        "#);
    }
}
