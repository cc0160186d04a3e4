//! The invocation envelope: a template field projecting the GraphQL
//! selection set, plus named data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A projection of the GraphQL selection set onto a result value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateField {
    /// Field name, matched against result object keys.
    pub name: String,

    /// Optional response alias.
    #[serde(default)]
    pub alias: Option<String>,

    /// Nested selections, in declaration order.
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

impl TemplateField {
    /// Creates a template field with no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            fields: Vec::new(),
        }
    }

    /// The alias if present and non-empty, otherwise the name.
    pub fn alias_or_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }
}

/// One function invocation: `{"fn": <TemplateField>, "data": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallInfo {
    /// The function to call, with its selection set.
    #[serde(rename = "fn")]
    pub function: TemplateField,

    /// Named parameters. Numbers keep their JSON precision.
    #[serde(default, rename = "data")]
    pub parameters: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let input = r#"{"fn":{"name":"add","alias":null,"fields":[]},"data":{"a":1,"b":2}}"#;
        let ci: CallInfo = serde_json::from_str(input).unwrap();
        assert_eq!(ci.function.name, "add");
        assert_eq!(ci.function.alias_or_name(), "add");
        assert_eq!(ci.parameters.get("a").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn test_alias_or_name() {
        let mut tf = TemplateField::new("getPerson");
        assert_eq!(tf.alias_or_name(), "getPerson");

        tf.alias = Some("person".to_string());
        assert_eq!(tf.alias_or_name(), "person");

        tf.alias = Some(String::new());
        assert_eq!(tf.alias_or_name(), "getPerson");
    }

    #[test]
    fn test_number_precision_preserved() {
        let input = r#"{"fn":{"name":"f"},"data":{"big":9007199254740993}}"#;
        let ci: CallInfo = serde_json::from_str(input).unwrap();
        assert_eq!(
            ci.parameters.get("big").unwrap().as_i64(),
            Some(9007199254740993)
        );
    }
}
