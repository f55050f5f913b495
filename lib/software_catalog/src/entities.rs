use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// https://backstage.io/docs/features/software-catalog/descriptor-format

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Component,
    Resource,
    /// Any kind the catalog stores without a typed spec (API, System, Group...)
    Other(String),
}

impl Kind {
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Component => "Component",
            Kind::Resource => "Resource",
            Kind::Other(kind) => kind.as_str(),
        }
    }
}

impl From<&str> for Kind {
    fn from(value: &str) -> Self {
        match value {
            "Component" => Kind::Component,
            "Resource" => Kind::Resource,
            other => Kind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub link_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub annotations: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub links: Vec<Link>,
}

impl Metadata {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTarget {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for RelationTarget {
    fn default() -> Self {
        Self {
            kind: String::new(),
            name: String::new(),
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "type", default)]
    pub relation_type: String,
    #[serde(default)]
    pub target: RelationTarget,
}

/// A single deployment of a component to an environment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub environment: String,
    pub version: String,
    pub timestamp: String,
    /// Numeric sub-identifier parsed from the deploying job name, e.g. `deploy [3]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entidad: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechDocs {
    #[serde(default)]
    pub dir: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiStatus {
    #[serde(default)]
    pub last_run_status: String,
    #[serde(default)]
    pub pipeline_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTag {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub tags: Vec<RepositoryTag>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentSpec {
    #[serde(rename = "type")]
    pub component_type: String,
    pub lifecycle: String,
    pub owner: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<Deployment>,
    pub techdocs: TechDocs,
    pub ci: CiStatus,
    pub repository: Repository,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub readme_content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ci_stages: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deployment_target: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_store_paths: Vec<String>,
    #[serde(rename = "projectURL", skip_serializing_if = "String::is_empty")]
    pub project_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub owner: String,
}

/// Typed spec payload selected by the entity's [`Kind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntitySpec {
    Component(ComponentSpec),
    Resource(ResourceSpec),
    /// Kinds without a typed spec. Stored as an empty object.
    Unknown {},
}

impl EntitySpec {
    /// Decode a stored spec payload using the decoder for `kind`.
    pub fn decode(kind: &Kind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let value = match value {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            v => v,
        };

        match kind {
            Kind::Component => serde_json::from_value(value).map(EntitySpec::Component),
            Kind::Resource => serde_json::from_value(value).map(EntitySpec::Resource),
            Kind::Other(_) => Ok(EntitySpec::Unknown {}),
        }
    }

    pub fn as_component(&self) -> Option<&ComponentSpec> {
        match self {
            EntitySpec::Component(spec) => Some(spec),
            _ => None,
        }
    }
}

/// One cataloged item. `metadata.name` is the identity key.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "StoredEntity")]
pub struct Entity {
    pub api_version: String,
    pub kind: Kind,
    pub metadata: Metadata,
    pub spec: EntitySpec,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntity {
    #[serde(default)]
    api_version: String,
    kind: String,
    metadata: Metadata,
    #[serde(default)]
    spec: serde_json::Value,
}

impl TryFrom<StoredEntity> for Entity {
    type Error = serde_json::Error;

    fn try_from(stored: StoredEntity) -> Result<Self, Self::Error> {
        let kind = Kind::from(stored.kind.as_str());
        let spec = EntitySpec::decode(&kind, stored.spec)?;
        Ok(Entity {
            api_version: stored.api_version,
            kind,
            metadata: stored.metadata,
            spec,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntityRef<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    api_version: &'a str,
    kind: &'a str,
    metadata: &'a Metadata,
    spec: &'a EntitySpec,
}

impl Serialize for Entity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        StoredEntityRef {
            api_version: &self.api_version,
            kind: self.kind.as_str(),
            metadata: &self.metadata,
            spec: &self.spec,
        }
        .serialize(serializer)
    }
}

/// Manifests routinely leave keys present but empty (`tags:`), which YAML reads as null.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ComponentSpec, Deployment, Entity, EntitySpec, Kind, Metadata, ResourceSpec};

    fn component(name: &str) -> Entity {
        Entity {
            api_version: "backstage.io/v1alpha1".to_string(),
            kind: Kind::Component,
            metadata: Metadata {
                name: name.to_string(),
                tags: vec!["java".to_string()],
                ..Default::default()
            },
            spec: EntitySpec::Component(ComponentSpec {
                component_type: "service".to_string(),
                owner: "team-a".to_string(),
                deployments: vec![Deployment {
                    environment: "wg_adquirencia_prod".to_string(),
                    version: "v1.0.0".to_string(),
                    timestamp: "2024-03-01T10:15:30+00:00".to_string(),
                    entidad: Some("3".to_string()),
                }],
                project_url: "https://gitlab.example.com/acme/payments".to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn stored_component_uses_catalog_field_names() {
        let value = serde_json::to_value(component("payments")).unwrap();

        assert_eq!("Component", value["kind"]);
        assert_eq!("payments", value["metadata"]["name"]);
        assert_eq!("service", value["spec"]["type"]);
        assert_eq!(
            "https://gitlab.example.com/acme/payments",
            value["spec"]["projectURL"]
        );
        assert_eq!("3", value["spec"]["deployments"][0]["entidad"]);
        assert_eq!("", value["spec"]["ci"]["last_run_status"]);
    }

    #[test]
    fn stored_entity_decodes_spec_by_kind() {
        let entity = component("payments");
        let json = serde_json::to_string(&entity).unwrap();
        let decoded: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, decoded);

        let resource: Entity = serde_json::from_value(json!({
            "kind": "Resource",
            "metadata": {"name": "orders-db", "tags": ["resource"]},
            "spec": {"type": "database", "owner": "team-b"}
        }))
        .unwrap();
        assert_eq!(
            EntitySpec::Resource(ResourceSpec {
                resource_type: "database".to_string(),
                owner: "team-b".to_string(),
            }),
            resource.spec
        );
    }

    #[test]
    fn unknown_kind_stores_empty_spec() {
        let entity: Entity = serde_json::from_value(json!({
            "kind": "API",
            "metadata": {"name": "payments-api"},
            "spec": {"definition": "openapi: 3.0.0"}
        }))
        .unwrap();

        assert_eq!(Kind::Other("API".to_string()), entity.kind);
        assert_eq!(EntitySpec::Unknown {}, entity.spec);
        assert_eq!(json!({}), serde_json::to_value(&entity).unwrap()["spec"]);
    }

    #[test]
    fn invalid_component_spec_is_rejected() {
        let result = serde_json::from_value::<Entity>(json!({
            "kind": "Component",
            "metadata": {"name": "broken"},
            "spec": {"deployments": "not a list"}
        }));

        assert!(result.is_err());
    }
}
