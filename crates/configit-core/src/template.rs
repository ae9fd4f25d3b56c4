//! Payload templates.
//!
//! Templates contain `{{ .name }}` placeholders that are replaced with the
//! resolved parameter values of the owning config.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::parameter::ParameterError;

// Regex for matching {{ .name }} placeholders
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\.([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Where the template came from, for messages.
    pub name: String,
    pub content: String,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Names of all placeholders used by the template, in order of appearance.
    pub fn placeholders(&self) -> Vec<String> {
        PLACEHOLDER_REGEX
            .captures_iter(&self.content)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Render the template with resolved parameter values.
    ///
    /// Strings are inserted JSON-escaped without surrounding quotes, so a
    /// template writes `"{{ .name }}"`. Any other value is inserted as JSON.
    pub fn render(&self, values: &BTreeMap<String, Value>) -> Result<String, ParameterError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !values.contains_key(name))
        {
            return Err(ParameterError::InvalidValue(format!(
                "template '{}' uses '{{{{ .{missing} }}}}' but the config has no such parameter",
                self.name
            )));
        }

        let rendered = PLACEHOLDER_REGEX.replace_all(&self.content, |caps: &regex::Captures| {
            match values.get(&caps[1]) {
                Some(Value::String(s)) => escape_json_string(s),
                Some(other) => other.to_string(),
                None => String::new(),
            }
        });
        Ok(rendered.into_owned())
    }
}

fn escape_json_string(s: &str) -> String {
    let quoted = Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_strings_and_values() {
        let template = Template::new(
            "zone.json",
            r#"{"name": "{{ .name }}", "rules": {{.rules}}, "enabled": {{ .enabled }}}"#,
        );
        let values = BTreeMap::from([
            ("name".to_string(), json!("My \"zone\"")),
            ("rules".to_string(), json!(["a", "b"])),
            ("enabled".to_string(), json!(true)),
        ]);

        let rendered = template.render(&values).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["name"], json!("My \"zone\""));
        assert_eq!(parsed["rules"], json!(["a", "b"]));
        assert_eq!(parsed["enabled"], json!(true));
    }

    #[test]
    fn test_render_missing_parameter() {
        let template = Template::new("t.json", r#"{"name": "{{ .name }}"}"#);
        let err = template.render(&BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains(".name"));
    }

    #[test]
    fn test_placeholders() {
        let template = Template::new("t", "{{ .a }} {{.b}} {{ .a }}");
        assert_eq!(template.placeholders(), vec!["a", "b", "a"]);
    }
}
