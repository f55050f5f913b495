//! Extraction of build and infrastructure facts from repository files: the container base image
//! from a Dockerfile, stages and matrix usage from the CI file, and container environment plus
//! parameter store paths from the CloudFormation deployment descriptor.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

const PARAMETERS_BY_PATH_ACTION: &str = "ssm:GetParametersByPath";

lazy_static! {
    static ref FROM_INSTRUCTION: Regex = Regex::new(r"(?m)^FROM\s+(\S+)").unwrap();
    static ref PARAMETER_PATH: Regex = Regex::new(r"parameter(/.+)").unwrap();
}

/// Image named by the first `FROM` instruction.
pub fn base_image(dockerfile: &str) -> Option<String> {
    FROM_INSTRUCTION
        .captures(dockerfile)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether the CI configuration fans deployments out per entidad with a parallel matrix.
pub fn uses_deployment_matrix(ci_file: &str) -> bool {
    ci_file.contains("parallel:") && ci_file.contains("matrix:")
}

#[derive(Deserialize)]
struct CiFile {
    #[serde(default)]
    stages: Vec<String>,
}

/// Top-level `stages` of a `.gitlab-ci.yml`.
pub fn ci_stages(ci_file: &str) -> Vec<String> {
    let parsed = serde_yaml::from_str::<Value>(ci_file)
        .and_then(|value| serde_yaml::from_value::<CiFile>(normalize_tags(value)));

    match parsed {
        Ok(ci) => ci.stages,
        Err(e) => {
            debug!("unable to read stages from CI file: {e}");
            Vec::new()
        }
    }
}

/// Parse a CloudFormation template, rewriting short-form intrinsic tags (`!Sub x`) into their
/// long form (`Fn::Sub: x`).
pub fn parse_template(content: &str) -> Option<Value> {
    match serde_yaml::from_str::<Value>(content) {
        Ok(value) => Some(normalize_tags(value)),
        Err(e) => {
            debug!("unable to parse deployment descriptor: {e}");
            None
        }
    }
}

fn normalize_tags(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let key = if name == "Ref" {
                name.to_string()
            } else {
                format!("Fn::{name}")
            };

            let mut mapping = Mapping::new();
            mapping.insert(Value::String(key), normalize_tags(tagged.value));
            Value::Mapping(mapping)
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize_tags).collect()),
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(k, v)| (k, normalize_tags(v)))
                .collect(),
        ),
        other => other,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.first(),
        }
    }

    fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerTemplate {
    resources: ContainerResources,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerResources {
    task_definition: TaskDefinition,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskDefinition {
    properties: TaskDefinitionProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskDefinitionProperties {
    /// Only the first definition is typed; sidecars may use any shape.
    container_definitions: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerDefinition {
    #[serde(default)]
    environment: Vec<EnvironmentEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnvironmentEntry {
    name: Value,
    #[serde(default)]
    value: Value,
}

/// Environment of the first container definition in the task definition.
pub fn container_environment(template: &Value) -> BTreeMap<String, String> {
    let parsed = match serde_yaml::from_value::<ContainerTemplate>(template.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("deployment descriptor has no container environment: {e}");
            return BTreeMap::new();
        }
    };

    let Some(first) = parsed
        .resources
        .task_definition
        .properties
        .container_definitions
        .into_iter()
        .next()
    else {
        return BTreeMap::new();
    };

    let container = match serde_yaml::from_value::<ContainerDefinition>(first) {
        Ok(container) => container,
        Err(e) => {
            debug!("first container definition has no usable environment: {e}");
            return BTreeMap::new();
        }
    };

    container
        .environment
        .iter()
        .filter_map(|entry| Some((scalar_to_string(&entry.name)?, scalar_to_string(&entry.value)?)))
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyTemplate {
    resources: PolicyResources,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyResources {
    task_role: TaskRole,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskRole {
    properties: TaskRoleProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskRoleProperties {
    #[serde(default)]
    policies: Vec<Policy>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Policy {
    policy_document: PolicyDocument,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDocument {
    #[serde(default)]
    statement: OneOrMany<Statement>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Statement {
    #[serde(default)]
    action: OneOrMany<String>,
    #[serde(default)]
    resource: OneOrMany<ResourceRef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResourceRef {
    Literal(String),
    Sub {
        #[serde(rename = "Fn::Sub")]
        sub: SubTemplate,
    },
    Other(Value),
}

/// `Fn::Sub` takes either a template string or a `[template, variables]` pair.
#[derive(Deserialize)]
#[serde(untagged)]
enum SubTemplate {
    Template(String),
    WithVariables(String, Value),
}

impl ResourceRef {
    fn as_str(&self) -> Option<&str> {
        match self {
            ResourceRef::Literal(s) => Some(s),
            ResourceRef::Sub {
                sub: SubTemplate::Template(s),
            } => Some(s),
            ResourceRef::Sub {
                sub: SubTemplate::WithVariables(s, _),
            } => Some(s),
            ResourceRef::Other(_) => None,
        }
    }
}

/// Parameter store paths the task role may read by path.
pub fn parameter_store_paths(template: &Value) -> Vec<String> {
    let parsed = match serde_yaml::from_value::<PolicyTemplate>(template.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("deployment descriptor has no task role policies: {e}");
            return Vec::new();
        }
    };

    parsed
        .resources
        .task_role
        .properties
        .policies
        .iter()
        .flat_map(|policy| policy.policy_document.statement.iter())
        .filter(|statement| {
            statement.action.first().map(String::as_str) == Some(PARAMETERS_BY_PATH_ACTION)
        })
        .flat_map(|statement| statement.resource.iter())
        .filter_map(ResourceRef::as_str)
        .filter_map(|resource| PARAMETER_PATH.captures(resource))
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
