//! Project manifest parsing.
//!
//! A manifest declares the environments and, per project, the configs to
//! deploy. Each config is materialized once per environment with that
//! environment's overrides applied.

use crate::node::{args, children, has_prop, required_arg, string_prop, to_json};
use crate::{ConfigError, ConfigResult, read_file};
use configit_core::config::ConfigType;
use configit_core::coordinate::{ID_PROPERTY, SEPARATOR};
use configit_core::project::{configs_for_environment, find_duplicate_coordinates};
use configit_core::{Config, Coordinate, Parameter, Project, Template};
use kdl::{KdlDocument, KdlNode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    /// Declared environments, in declaration order.
    pub environments: Vec<String>,
    pub projects: Vec<Project>,
}

impl Manifest {
    /// Every config of every project for one environment.
    pub fn configs_for(&self, environment: &str) -> Vec<Config> {
        configs_for_environment(&self.projects, environment)
    }
}

/// Read and parse a manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> ConfigResult<Manifest> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading manifest");
    parse_manifest(&read_file(path)?)
}

/// Parse a manifest from KDL text.
///
/// All problems found are reported together.
pub fn parse_manifest(kdl: &str) -> ConfigResult<Manifest> {
    let doc: KdlDocument = kdl.parse()?;

    let mut errors = Vec::new();
    let mut environments: Vec<String> = Vec::new();
    let mut declared_projects: Vec<(String, Vec<ConfigDecl>)> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "environment" => match required_arg(node, 0, "environment name") {
                Ok(name) if environments.contains(&name) => {
                    errors.push(ConfigError::Duplicate(format!("environment '{name}'")));
                }
                Ok(name) => environments.push(name),
                Err(e) => errors.push(e),
            },
            "project" => match required_arg(node, 0, "project name") {
                Ok(id) if id.contains(SEPARATOR) => {
                    errors.push(ConfigError::invalid(
                        format!("project '{id}'"),
                        format!("project names must not contain '{SEPARATOR}'"),
                    ));
                }
                Ok(id) if declared_projects.iter().any(|(p, _)| p == &id) => {
                    errors.push(ConfigError::Duplicate(format!("project '{id}'")));
                }
                Ok(id) => {
                    let configs = parse_project(&id, node, &mut errors);
                    declared_projects.push((id, configs));
                }
                Err(e) => errors.push(e),
            },
            other => warn!(node = other, "Ignoring unknown manifest node"),
        }
    }

    if environments.is_empty() {
        errors.push(ConfigError::MissingField("environment".to_string()));
    }

    let mut projects = Vec::new();
    for (id, decls) in declared_projects {
        let mut project = Project::new(id);
        for decl in decls {
            for config in decl.materialize(&environments, &mut errors) {
                project.push(config);
            }
        }
        projects.push(project);
    }

    let mut duplicates = BTreeSet::new();
    for environment in &environments {
        let configs = configs_for_environment(&projects, environment);
        duplicates.extend(find_duplicate_coordinates(&configs));
    }
    errors.extend(
        duplicates
            .into_iter()
            .map(|c: Coordinate| ConfigError::Duplicate(c.to_string())),
    );

    ConfigError::collect(errors)?;
    Ok(Manifest {
        environments,
        projects,
    })
}

/// Settings that a config body or an override can set.
#[derive(Debug, Clone, Default)]
struct Body {
    template: Option<String>,
    parameters: BTreeMap<String, Parameter>,
    skip: Option<bool>,
    origin_object_id: Option<String>,
}

impl Body {
    /// Apply an override on top of this body. Parameters are replaced by name.
    fn merged(&self, over: &Body) -> Body {
        let mut parameters = self.parameters.clone();
        parameters.extend(over.parameters.clone());
        Body {
            template: over.template.clone().or_else(|| self.template.clone()),
            parameters,
            skip: over.skip.or(self.skip),
            origin_object_id: over
                .origin_object_id
                .clone()
                .or_else(|| self.origin_object_id.clone()),
        }
    }
}

/// A config as declared, before it is expanded per environment.
#[derive(Debug)]
struct ConfigDecl {
    coordinate: Coordinate,
    config_type: ConfigType,
    body: Body,
    overrides: Vec<(String, Body)>,
}

impl ConfigDecl {
    fn materialize(&self, environments: &[String], errors: &mut Vec<ConfigError>) -> Vec<Config> {
        for (environment, _) in &self.overrides {
            if !environments.contains(environment) {
                errors.push(ConfigError::UnknownEnvironment(format!(
                    "'{environment}' in override of {}",
                    self.coordinate
                )));
            }
        }

        let mut configs = Vec::new();
        for environment in environments {
            let body = self
                .overrides
                .iter()
                .filter(|(env, _)| env == environment)
                .fold(self.body.clone(), |body, (_, over)| body.merged(over));

            let Some(template) = body.template else {
                errors.push(ConfigError::MissingField(format!(
                    "template of {} in environment '{environment}'",
                    self.coordinate
                )));
                continue;
            };

            let template_name = format!("{}.json", self.coordinate.config_id);
            let mut config = Config::new(
                self.coordinate.clone(),
                self.config_type.clone(),
                environment.as_str(),
                Template::new(template_name, template),
            )
            .with_skip(body.skip.unwrap_or(false));
            config.parameters = body.parameters;
            config.origin_object_id = body.origin_object_id;
            configs.push(config);
        }
        configs
    }
}

fn parse_project(project: &str, node: &KdlNode, errors: &mut Vec<ConfigError>) -> Vec<ConfigDecl> {
    let mut configs = Vec::new();
    for child in children(node) {
        match child.name().value() {
            "config" => match parse_config(project, child, errors) {
                Ok(decl) => configs.push(decl),
                Err(e) => errors.push(e),
            },
            other => warn!(%project, node = other, "Ignoring unknown project node"),
        }
    }
    configs
}

fn parse_config(
    project: &str,
    node: &KdlNode,
    errors: &mut Vec<ConfigError>,
) -> ConfigResult<ConfigDecl> {
    let type_name = required_arg(node, 0, &format!("config type in project '{project}'"))?;
    let config_id = required_arg(node, 1, &format!("config id of '{type_name}' in project '{project}'"))?;
    if config_id.contains(SEPARATOR) {
        return Err(ConfigError::invalid(
            format!("id '{config_id}' of '{type_name}' in project '{project}'"),
            format!("config ids must not contain '{SEPARATOR}'"),
        ));
    }
    let coordinate = Coordinate::new(project, type_name.as_str(), config_id);

    let mut config_type = ConfigType::from_type_name(&type_name).ok_or_else(|| {
        ConfigError::invalid(
            format!("type of {coordinate}"),
            format!("unknown config type '{type_name}'"),
        )
    })?;
    if let ConfigType::Settings { schema_version, .. } = &mut config_type {
        *schema_version = string_prop(node, "schema-version");
    }

    let mut body = Body::default();
    let mut overrides = Vec::new();
    for child in children(node) {
        if child.name().value() == "override" {
            match required_arg(child, 0, &format!("override environment of {coordinate}")) {
                Ok(environment) => {
                    let mut over = Body::default();
                    for grandchild in children(child) {
                        parse_body_node(&coordinate, grandchild, &mut over, errors);
                    }
                    overrides.push((environment, over));
                }
                Err(e) => errors.push(e),
            }
        } else {
            parse_body_node(&coordinate, child, &mut body, errors);
        }
    }

    Ok(ConfigDecl {
        coordinate,
        config_type,
        body,
        overrides,
    })
}

fn parse_body_node(
    coordinate: &Coordinate,
    node: &KdlNode,
    body: &mut Body,
    errors: &mut Vec<ConfigError>,
) {
    let result = match node.name().value() {
        "template" => required_arg(node, 0, &format!("template of {coordinate}"))
            .map(|t| body.template = Some(t)),
        "origin-object-id" => required_arg(node, 0, &format!("origin-object-id of {coordinate}"))
            .map(|id| body.origin_object_id = Some(id)),
        "skip" => {
            body.skip = Some(args(node).first().and_then(|v| v.as_bool()).unwrap_or(true));
            Ok(())
        }
        "param" => parse_named_parameter(coordinate, node, body),
        other => Err(ConfigError::invalid(
            format!("{coordinate}"),
            format!("unknown node '{other}'"),
        )),
    };
    if let Err(e) = result {
        errors.push(e);
    }
}

fn parse_named_parameter(
    coordinate: &Coordinate,
    node: &KdlNode,
    body: &mut Body,
) -> ConfigResult<()> {
    let name = required_arg(node, 0, &format!("parameter name of {coordinate}"))?;
    let field = format!("parameter '{name}' of {coordinate}");
    if body.parameters.contains_key(&name) {
        return Err(ConfigError::Duplicate(field));
    }
    let parameter = parse_parameter(node, 1, &field)?;
    body.parameters.insert(name, parameter);
    Ok(())
}

/// Parse a parameter node. A literal value is taken from the positional
/// argument at `value_index`.
fn parse_parameter(node: &KdlNode, value_index: usize, field: &str) -> ConfigResult<Parameter> {
    if let Some(reference) = string_prop(node, "ref") {
        let coordinate: Coordinate = reference
            .parse()
            .map_err(|e| ConfigError::InvalidReference(format!("{field}: {e}")))?;
        let property = string_prop(node, "property").unwrap_or_else(|| ID_PROPERTY.to_string());
        return Ok(Parameter::reference(coordinate.property(property)));
    }

    if let Some(name) = string_prop(node, "env") {
        return Ok(Parameter::Environment {
            name,
            default: string_prop(node, "default"),
        });
    }

    if let Some(format) = string_prop(node, "format") {
        let mut parts = BTreeMap::new();
        for child in children(node) {
            if child.name().value() != "part" {
                return Err(ConfigError::invalid(
                    field,
                    format!("expected 'part', found '{}'", child.name().value()),
                ));
            }
            let part = required_arg(child, 0, &format!("part name in {field}"))?;
            let value = parse_parameter(child, 1, &format!("{field}, part '{part}'"))?;
            if parts.insert(part.clone(), value).is_some() {
                return Err(ConfigError::Duplicate(format!("part '{part}' in {field}")));
            }
        }
        return Ok(Parameter::Compound { format, parts });
    }

    if node.children().is_some() {
        let mut items = Vec::new();
        for (i, child) in children(node).iter().enumerate() {
            if child.name().value() != "item" {
                return Err(ConfigError::invalid(
                    field,
                    format!("expected 'item', found '{}'", child.name().value()),
                ));
            }
            items.push(parse_parameter(child, 0, &format!("{field}, item {i}"))?);
        }
        return Ok(Parameter::List { items });
    }

    if has_prop(node, "default") {
        return Err(ConfigError::invalid(field, "'default' requires 'env'"));
    }

    match args(node).get(value_index) {
        Some(value) => Ok(Parameter::Value {
            value: to_json(value, field)?,
        }),
        None => Err(ConfigError::MissingField(format!("value of {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configit_core::ConfigKind;
    use serde_json::json;

    const EXAMPLE: &str = r##"
        environment "dev"
        environment "prod"

        project "infra" {
            config "management-zone" "mz0" {
                template #"{"name": "{{ .name }}"}"#
                param "name" "Base zone"
            }
            config "management-zone" "mz1" {
                template #"{"name": "{{ .name }}", "parent": "{{ .zone }}"}"#
                param "name" "Zone"
                param "owner" env="OWNER" default="ops"
                param "zone" ref="infra:management-zone:mz0" property="id"
                param "tags" {
                    item "a"
                    item ref="infra:management-zone:mz0" property="name"
                }
                param "label" format="${a}-${b}" {
                    part "a" "x"
                    part "b" env="B"
                }
                origin-object-id "abc"
                override "prod" {
                    param "name" "Prod zone"
                    skip
                }
            }
        }
    "##;

    fn find<'a>(configs: &'a [Config], id: &str) -> &'a Config {
        configs
            .iter()
            .find(|c| c.coordinate.config_id == id)
            .unwrap()
    }

    #[test]
    fn test_parse_example() {
        let manifest = parse_manifest(EXAMPLE).unwrap();
        assert_eq!(manifest.environments, vec!["dev", "prod"]);
        assert_eq!(manifest.projects.len(), 1);

        let dev = manifest.configs_for("dev");
        assert_eq!(dev.len(), 2);
        let mz1 = find(&dev, "mz1");
        assert_eq!(mz1.coordinate.to_string(), "infra:management-zone:mz1");
        assert_eq!(mz1.environment, "dev");
        assert!(!mz1.skip);
        assert_eq!(mz1.origin_object_id.as_deref(), Some("abc"));
        assert_eq!(mz1.parameters["name"], Parameter::value("Zone"));
        assert_eq!(
            mz1.parameters["owner"],
            Parameter::env_or("OWNER", "ops")
        );
        assert_eq!(
            mz1.parameters["zone"],
            Parameter::reference(Coordinate::new("infra", "management-zone", "mz0").property("id"))
        );
        assert!(matches!(&mz1.parameters["tags"], Parameter::List { items } if items.len() == 2));
        assert!(matches!(
            &mz1.parameters["label"],
            Parameter::Compound { format, parts } if format == "${a}-${b}" && parts.len() == 2
        ));
        assert_eq!(mz1.references().len(), 2);
    }

    #[test]
    fn test_override_applies_only_to_its_environment() {
        let manifest = parse_manifest(EXAMPLE).unwrap();

        let prod = manifest.configs_for("prod");
        let mz1 = find(&prod, "mz1");
        assert!(mz1.skip);
        assert_eq!(mz1.parameters["name"], Parameter::value("Prod zone"));
        // untouched parameters are inherited
        assert_eq!(mz1.parameters["owner"], Parameter::env_or("OWNER", "ops"));

        let dev = manifest.configs_for("dev");
        assert_eq!(find(&dev, "mz1").parameters["name"], Parameter::value("Zone"));
    }

    #[test]
    fn test_settings_config_and_reference() {
        let manifest = parse_manifest(
            r##"
            environment "dev"
            project "p" {
                config "builtin:tagging.auto" "tag" schema-version="1.0.2" {
                    template "{}"
                    param "scope" "environment"
                }
                config "slo" "s1" {
                    template "{}"
                    param "name" "s1"
                    param "tag" ref="p:builtin:tagging.auto:tag"
                    param "count" 3
                }
            }
            "##,
        )
        .unwrap();

        let dev = manifest.configs_for("dev");
        let tag = find(&dev, "tag");
        assert_eq!(tag.config_type.kind(), ConfigKind::Settings);
        assert!(matches!(
            &tag.config_type,
            ConfigType::Settings { schema_version: Some(v), .. } if v == "1.0.2"
        ));

        let slo = find(&dev, "s1");
        let reference = slo.references().into_iter().next().unwrap();
        assert_eq!(reference.coordinate, tag.coordinate);
        assert!(reference.is_id());
        assert_eq!(slo.parameters["count"], Parameter::value(json!(3)));
    }

    #[test]
    fn test_duplicate_config_is_reported_once() {
        let err = parse_manifest(
            r#"
            environment "dev"
            environment "prod"
            project "p" {
                config "auto-tag" "t1" { template "{}"; }
                config "auto-tag" "t1" { template "{}"; }
            }
            "#,
        )
        .unwrap_err();

        assert!(matches!(&err, ConfigError::Duplicate(c) if c == "p:auto-tag:t1"));
    }

    #[test]
    fn test_collects_all_errors() {
        let err = parse_manifest(
            r#"
            environment "dev"
            project "p" {
                config "not-a-type" "x" { template "{}"; }
                config "auto-tag" "no-template" { param "name" "t"; }
                config "slo" "bad-ref" {
                    template "{}"
                    param "zone" ref="missing-separators"
                }
                config "dashboard" "d" {
                    template "{}"
                    override "staging" { skip; }
                }
            }
            "#,
        )
        .unwrap_err();

        let errors = err.errors();
        assert_eq!(errors.len(), 4, "{err}");
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidValue { .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::MissingField(_))));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidReference(_))));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownEnvironment(_))));
    }

    #[test]
    fn test_config_id_with_separator_is_rejected() {
        let err = parse_manifest(
            r#"
            environment "dev"
            project "p" {
                config "auto-tag" "a:b" { template "{}"; }
                config "slo" "s" {
                    template "{}"
                    param "tag" ref="p:auto-tag:a:b"
                }
            }
            "#,
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            ConfigError::InvalidValue { field, .. } if field.contains("'a:b'")
        ));
    }

    #[test]
    fn test_project_name_with_separator_is_rejected() {
        let err = parse_manifest(
            r#"
            environment "dev"
            project "p:q" {
                config "auto-tag" "t1" { template "{}"; }
            }
            "#,
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            ConfigError::InvalidValue { field, .. } if field == "project 'p:q'"
        ));
    }

    #[test]
    fn test_requires_an_environment() {
        let err = parse_manifest(r#"project "p""#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "environment"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = parse_manifest(
            r#"
            environment "dev"
            project "p" {
                config "auto-tag" "t1" {
                    template "{}"
                    param "name" "a"
                    param "name" "b"
                }
            }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate(_)));
    }

    #[test]
    fn test_explicit_skip_false_in_override() {
        let manifest = parse_manifest(
            r#"
            environment "dev"
            environment "prod"
            project "p" {
                config "auto-tag" "t1" {
                    template "{}"
                    skip
                    override "prod" { skip #false; }
                }
            }
            "#,
        )
        .unwrap();

        assert!(manifest.configs_for("dev")[0].skip);
        assert!(!manifest.configs_for("prod")[0].skip);
    }

    #[test]
    fn test_invalid_kdl() {
        let err = parse_manifest("project {").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_manifest("/definitely/not/here.kdl").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
