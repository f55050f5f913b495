use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::enrichment::enrich_component;
use crate::entities::{
    null_as_default, CiStatus, ComponentSpec, Deployment, Entity, EntitySpec, Kind, Relation,
    Repository, RepositoryTag, ResourceSpec, TechDocs,
};
use crate::manifest::RawEntity;
use crate::relations::resolve_shorthand_relations;
use crate::remote::{RemoteProject, RemoteRepository};
use crate::{CatalogError, CatalogResult};

/// Remote project an entity was discovered in, along with the API to enrich it from.
#[derive(Clone, Copy)]
pub struct RemoteContext<'a> {
    pub remote: &'a dyn RemoteRepository,
    pub project: &'a RemoteProject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedEntity {
    pub entity: Entity,
    /// Enrichment fetches that failed. Always zero for entities without a remote project.
    pub failed_fetches: usize,
}

/// Component fields taken from a manifest as written. `relations` and `repository` are read
/// separately because their manifest shape differs from the stored one.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawComponentSpec {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    component_type: String,
    #[serde(deserialize_with = "null_as_default")]
    lifecycle: String,
    #[serde(deserialize_with = "null_as_default")]
    owner: String,
    #[serde(deserialize_with = "null_as_default")]
    system: String,
    #[serde(deserialize_with = "null_as_default")]
    deployments: Vec<Deployment>,
    #[serde(deserialize_with = "null_as_default")]
    techdocs: TechDocs,
    #[serde(deserialize_with = "null_as_default")]
    ci: CiStatus,
    #[serde(deserialize_with = "null_as_default")]
    readme_content: String,
    #[serde(deserialize_with = "null_as_default")]
    base_image: String,
    #[serde(deserialize_with = "null_as_default")]
    ci_stages: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    deployment_target: String,
    #[serde(deserialize_with = "null_as_default")]
    environment_variables: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    parameter_store_paths: Vec<String>,
    #[serde(rename = "projectURL", deserialize_with = "null_as_default")]
    project_url: String,
}

/// Turn a manifest entity into a storable one, enriching components found in a remote project.
pub async fn normalize(
    raw: RawEntity,
    remote: Option<RemoteContext<'_>>,
) -> CatalogResult<NormalizedEntity> {
    let kind = Kind::from(raw.kind.as_str());
    let name = raw.metadata.name.clone();
    let mut failed_fetches = 0;

    let spec = match &kind {
        Kind::Component => {
            let mut spec = decode_component(&name, raw.spec)?;
            if let Some(context) = remote {
                let summary = enrich_component(context.remote, context.project, &mut spec).await;
                failed_fetches = summary.failures;
                spec.project_url = context.project.web_url.clone();
            }
            EntitySpec::Component(spec)
        }
        Kind::Resource => EntitySpec::Resource(decode_resource(&name, raw.spec)?),
        Kind::Other(other) => {
            warn!("unknown entity kind '{other}' for {name}, skipping spec processing");
            EntitySpec::Unknown {}
        }
    };

    Ok(NormalizedEntity {
        entity: Entity {
            api_version: raw.api_version,
            kind,
            metadata: raw.metadata,
            spec,
        },
        failed_fetches,
    })
}

fn decode_component(name: &str, mut raw: Map<String, Value>) -> CatalogResult<ComponentSpec> {
    let shorthand = resolve_shorthand_relations(&raw);

    let mut relations: Vec<Relation> = take_lenient(raw.remove("relations"), name, "relations");
    let tags: Vec<RepositoryTag> = take_lenient(
        raw.get_mut("repository")
            .and_then(Value::as_object_mut)
            .and_then(|repository| repository.remove("tags")),
        name,
        "repository.tags",
    );

    let decoded: RawComponentSpec =
        serde_json::from_value(Value::Object(raw)).map_err(|source| CatalogError::SpecDecode {
            kind: Kind::Component.to_string(),
            name: name.to_string(),
            source,
        })?;

    relations.extend(shorthand);

    Ok(ComponentSpec {
        component_type: decoded.component_type,
        lifecycle: decoded.lifecycle,
        owner: decoded.owner,
        system: decoded.system,
        relations,
        deployments: decoded.deployments,
        techdocs: decoded.techdocs,
        ci: decoded.ci,
        repository: Repository { tags },
        readme_content: decoded.readme_content,
        base_image: decoded.base_image,
        ci_stages: decoded.ci_stages,
        deployment_target: decoded.deployment_target,
        environment_variables: decoded.environment_variables,
        parameter_store_paths: decoded.parameter_store_paths,
        project_url: decoded.project_url,
    })
}

fn decode_resource(name: &str, raw: Map<String, Value>) -> CatalogResult<ResourceSpec> {
    serde_json::from_value(Value::Object(raw)).map_err(|source| CatalogError::SpecDecode {
        kind: Kind::Resource.to_string(),
        name: name.to_string(),
        source,
    })
}

/// Decode a side-channel field. A value of the wrong shape is logged and read as empty.
fn take_lenient<T: DeserializeOwned + Default>(
    value: Option<Value>,
    name: &str,
    field: &str,
) -> T {
    match value {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("ignoring malformed {field} of {name}: {e}");
            T::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::entities::{EntitySpec, Kind, RelationTarget};
    use crate::manifest::{ManifestDocuments, RawEntity};
    use crate::test_support::{project, FakeRemote};
    use crate::CatalogError;

    use super::{normalize, RemoteContext};

    fn raw(content: &str) -> RawEntity {
        ManifestDocuments::parse(content, false)
            .iter()
            .next()
            .unwrap()
            .unwrap()
    }

    const COMPONENT: &str = r#"
apiVersion: backstage.io/v1alpha1
kind: Component
metadata:
  name: payments
  tags: [java]
spec:
  type: service
  lifecycle: production
  owner: team-a
  system: checkout
  techdocs:
    dir: docs
  relations:
    - type: ownedBy
      target:
        kind: Group
        name: team-a
  repository:
    url: https://gitlab.example.com/acme/payments
    tags:
      - name: v1.0.0
        timestamp: "2024-01-01T00:00:00+00:00"
  dependsOn:
    - svc-b
    - Resource:team-x/db-main
  providesApis: [payments-api]
"#;

    #[tokio::test]
    async fn component_relations_are_existing_then_shorthand() {
        let normalized = normalize(raw(COMPONENT), None).await.unwrap();
        let spec = normalized.entity.spec.as_component().unwrap().clone();

        let relations: Vec<(String, RelationTarget)> = spec
            .relations
            .into_iter()
            .map(|r| (r.relation_type, r.target))
            .collect();

        assert_eq!(
            vec![
                (
                    "ownedBy".to_string(),
                    RelationTarget {
                        kind: "Group".to_string(),
                        name: "team-a".to_string(),
                        namespace: "default".to_string(),
                    }
                ),
                (
                    "dependsOn".to_string(),
                    RelationTarget {
                        kind: "Component".to_string(),
                        name: "svc-b".to_string(),
                        namespace: "default".to_string(),
                    }
                ),
                (
                    "dependsOn".to_string(),
                    RelationTarget {
                        kind: "Resource".to_string(),
                        name: "db-main".to_string(),
                        namespace: "team-x".to_string(),
                    }
                ),
                (
                    "providesApi".to_string(),
                    RelationTarget {
                        kind: "API".to_string(),
                        name: "payments-api".to_string(),
                        namespace: "default".to_string(),
                    }
                ),
            ],
            relations
        );
    }

    #[tokio::test]
    async fn component_fields_are_decoded() {
        let normalized = normalize(raw(COMPONENT), None).await.unwrap();
        let entity = normalized.entity;
        let spec = entity.spec.as_component().unwrap();

        assert_eq!(Kind::Component, entity.kind);
        assert_eq!("service", spec.component_type);
        assert_eq!("checkout", spec.system);
        assert_eq!("docs", spec.techdocs.dir);
        assert_eq!("v1.0.0", spec.repository.tags[0].name);
        assert!(spec.project_url.is_empty());
        assert_eq!(0, normalized.failed_fetches);
    }

    #[tokio::test]
    async fn malformed_relations_block_is_ignored() {
        let entity = raw(
            r#"
kind: Component
metadata:
  name: orders
spec:
  relations: "not a list"
  repository:
    tags: 42
  dependsOn: [payments]
"#,
        );

        let normalized = normalize(entity, None).await.unwrap();
        let spec = normalized.entity.spec.as_component().unwrap();

        assert_eq!(1, spec.relations.len());
        assert_eq!("payments", spec.relations[0].target.name);
        assert!(spec.repository.tags.is_empty());
    }

    #[tokio::test]
    async fn wrong_field_type_fails_the_entity() {
        let entity = raw(
            r#"
kind: Component
metadata:
  name: broken
spec:
  deployments: "yesterday"
"#,
        );

        let result = normalize(entity, None).await;

        assert!(matches!(
            result,
            Err(CatalogError::SpecDecode { ref name, .. }) if name == "broken"
        ));
    }

    #[tokio::test]
    async fn resource_spec_is_decoded_directly() {
        let entity = raw(
            r#"
kind: Resource
metadata:
  name: orders-db
spec:
  type: database
  owner: team-b
  dependsOn: [ignored]
"#,
        );

        let normalized = normalize(entity, None).await.unwrap();

        match normalized.entity.spec {
            EntitySpec::Resource(spec) => {
                assert_eq!("database", spec.resource_type);
                assert_eq!("team-b", spec.owner);
            }
            other => panic!("expected resource spec, got {other:?}"),
        }
        assert_eq!(vec!["resource"], normalized.entity.metadata.tags);
    }

    #[tokio::test]
    async fn unknown_kind_gets_empty_spec() {
        let entity = raw(
            r#"
kind: API
metadata:
  name: payments-api
spec:
  definition: "openapi: 3.0.0"
"#,
        );

        let normalized = normalize(entity, None).await.unwrap();

        assert_eq!(EntitySpec::Unknown {}, normalized.entity.spec);
    }

    #[tokio::test]
    async fn remote_components_are_enriched() {
        let orders = project("Orders_Service");
        let remote = FakeRemote::default()
            .with_file(&orders, "README.md", "# Orders")
            .failing("list_tags");

        let normalized = normalize(
            raw(COMPONENT),
            Some(RemoteContext {
                remote: &remote,
                project: &orders,
            }),
        )
        .await
        .unwrap();
        let spec = normalized.entity.spec.as_component().unwrap();

        assert_eq!("https://gitlab.example.com/acme/Orders_Service", spec.project_url);
        assert_eq!("# Orders", spec.readme_content);
        assert_eq!("orders-service", spec.deployment_target);
        // the failed tag fetch leaves the manifest's tags in place
        assert_eq!("v1.0.0", spec.repository.tags[0].name);
        assert_eq!(1, normalized.failed_fetches);
    }
}
