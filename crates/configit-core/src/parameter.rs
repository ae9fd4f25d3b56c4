//! Parameters and their resolution.
//!
//! A parameter is one of a closed set of variants. Each variant knows the
//! references it declares (used to build the dependency graph) and how to
//! resolve itself against the values resolved so far in a run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use thiserror::Error;

use crate::context::ResolutionContext;
use crate::coordinate::Reference;

// Matches ${part} placeholders in compound formats
static PART_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_.-]*)\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("environment variable '{name}' is not set")]
    MissingEnvironmentVariable { name: String },

    #[error("reference {reference} cannot be resolved: the config was not deployed in this run")]
    UnresolvedReference { reference: Reference },

    #[error("reference {reference} cannot be resolved: the config has no property '{}'", reference.property)]
    UnknownProperty { reference: Reference },

    #[error("format references unknown part '{part}'")]
    UnknownPart { part: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// A value of a config, possibly depending on other configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Parameter {
    /// A literal value.
    Value { value: Value },
    /// Read from the process environment at resolve time.
    Environment {
        name: String,
        default: Option<String>,
    },
    /// The resolved value of a property of another config.
    Reference { reference: Reference },
    /// An ordered list of parameters.
    List { items: Vec<Parameter> },
    /// Named parts substituted into a `${part}` format string.
    Compound {
        format: String,
        parts: BTreeMap<String, Parameter>,
    },
}

impl Parameter {
    pub fn value(value: impl Into<Value>) -> Self {
        Parameter::Value {
            value: value.into(),
        }
    }

    pub fn env(name: impl Into<String>) -> Self {
        Parameter::Environment {
            name: name.into(),
            default: None,
        }
    }

    pub fn env_or(name: impl Into<String>, default: impl Into<String>) -> Self {
        Parameter::Environment {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    pub fn reference(reference: Reference) -> Self {
        Parameter::Reference { reference }
    }

    /// All references this parameter declares, including nested ones.
    pub fn references(&self) -> BTreeSet<Reference> {
        let mut refs = BTreeSet::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, refs: &mut BTreeSet<Reference>) {
        match self {
            Parameter::Value { .. } | Parameter::Environment { .. } => {}
            Parameter::Reference { reference } => {
                refs.insert(reference.clone());
            }
            Parameter::List { items } => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Parameter::Compound { parts, .. } => {
                for part in parts.values() {
                    part.collect_references(refs);
                }
            }
        }
    }

    /// Resolve this parameter against the values resolved so far.
    pub fn resolve(&self, ctx: &ResolutionContext) -> Result<Value, ParameterError> {
        match self {
            Parameter::Value { value } => Ok(value.clone()),
            Parameter::Environment { name, default } => match std::env::var(name) {
                Ok(value) => Ok(Value::String(value)),
                Err(_) => default
                    .clone()
                    .map(Value::String)
                    .ok_or_else(|| ParameterError::MissingEnvironmentVariable {
                        name: name.clone(),
                    }),
            },
            Parameter::Reference { reference } => {
                if !ctx.contains(&reference.coordinate) {
                    return Err(ParameterError::UnresolvedReference {
                        reference: reference.clone(),
                    });
                }
                ctx.lookup(reference)
                    .ok_or_else(|| ParameterError::UnknownProperty {
                        reference: reference.clone(),
                    })
            }
            Parameter::List { items } => items
                .iter()
                .map(|item| item.resolve(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Parameter::Compound { format, parts } => resolve_compound(format, parts, ctx),
        }
    }
}

fn resolve_compound(
    format: &str,
    parts: &BTreeMap<String, Parameter>,
    ctx: &ResolutionContext,
) -> Result<Value, ParameterError> {
    let mut resolved = BTreeMap::new();
    for name in PART_REGEX.captures_iter(format).map(|caps| caps[1].to_string()) {
        if resolved.contains_key(&name) {
            continue;
        }
        let part = parts
            .get(&name)
            .ok_or_else(|| ParameterError::UnknownPart { part: name.clone() })?;
        let text = match part.resolve(ctx)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(ParameterError::InvalidValue(format!(
                    "part '{name}' resolved to {other}, which cannot be embedded in a format"
                )));
            }
        };
        resolved.insert(name, text);
    }

    let output = PART_REGEX.replace_all(format, |caps: &regex::Captures| {
        resolved.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(Value::String(output.into_owned()))
}
