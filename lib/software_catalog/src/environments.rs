use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::entities::{Entity, EntitySpec};
use crate::store::{EntityStore, StoreResult};

pub const DEFAULT_PAGE_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvironmentDefinition {
    /// Identifier deployments are recorded against
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const ENVIRONMENTS: [EnvironmentDefinition; 4] = [
    EnvironmentDefinition {
        id: "wg_adquirencia_prod",
        name: "production",
        description: "Production environment.",
    },
    EnvironmentDefinition {
        id: "wg_adquirencia_uat",
        name: "uat",
        description: "User acceptance testing environment.",
    },
    EnvironmentDefinition {
        id: "wg_adquirencia_qa",
        name: "qa",
        description: "Quality assurance environment.",
    },
    EnvironmentDefinition {
        id: "wg_adquirencia_dev",
        name: "development",
        description: "Development environment for new features.",
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentVersion {
    pub version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entidad: Option<String>,
    #[serde(rename = "projectURL", skip_serializing_if = "String::is_empty")]
    pub project_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedComponent {
    pub component_name: String,
    pub deployments: Vec<DeploymentVersion>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PaginatedGroupedComponents {
    pub components: Vec<GroupedComponent>,
    /// Number of groups before pagination
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvironmentView {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub result: PaginatedGroupedComponents,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComponentDeployment {
    pub environment: String,
    pub version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entidad: Option<String>,
}

/// 1-based page over grouped components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    /// Pages below 1 read as the first page and a non-positive limit as [`DEFAULT_PAGE_LIMIT`].
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: usize::try_from(page).unwrap_or(0).max(1),
            limit: usize::try_from(limit)
                .ok()
                .filter(|l| *l > 0)
                .unwrap_or(DEFAULT_PAGE_LIMIT),
        }
    }

    fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let total = items.len();
        let start = (self.page - 1).saturating_mul(self.limit).min(total);
        let end = start.saturating_add(self.limit).min(total);
        items[start..end].to_vec()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Group the deployments of every component matching `search` by environment and component.
/// Groups are ordered by component name and `total` counts groups, not deployments.
pub fn aggregate_environments(
    entities: &[Entity],
    search: &str,
    pagination: Pagination,
) -> Vec<EnvironmentView> {
    let search = search.to_lowercase();

    // environment id -> component name -> versions
    let mut by_environment: BTreeMap<&str, BTreeMap<&str, Vec<DeploymentVersion>>> =
        BTreeMap::new();
    for entity in entities {
        if !search.is_empty() && !entity.name().to_lowercase().contains(&search) {
            continue;
        }

        let EntitySpec::Component(spec) = &entity.spec else {
            continue;
        };

        for deployment in &spec.deployments {
            by_environment
                .entry(deployment.environment.as_str())
                .or_default()
                .entry(entity.name())
                .or_default()
                .push(DeploymentVersion {
                    version: deployment.version.clone(),
                    timestamp: deployment.timestamp.clone(),
                    entidad: deployment.entidad.clone(),
                    project_url: spec.project_url.clone(),
                });
        }
    }

    ENVIRONMENTS
        .iter()
        .map(|environment| {
            let groups: Vec<GroupedComponent> = by_environment
                .remove(environment.id)
                .unwrap_or_default()
                .into_iter()
                .map(|(name, deployments)| GroupedComponent {
                    component_name: name.to_string(),
                    deployments,
                })
                .collect();

            EnvironmentView {
                name: environment.name.to_string(),
                description: environment.description.to_string(),
                result: PaginatedGroupedComponents {
                    components: pagination.apply(&groups),
                    total: groups.len(),
                },
            }
        })
        .collect()
}

/// Deployments of the component named exactly `name`. Unknown components and entities without
/// a component spec yield an empty list.
pub fn component_deployments(entities: &[Entity], name: &str) -> Vec<ComponentDeployment> {
    let Some(entity) = entities.iter().find(|e| e.name() == name) else {
        debug!("component {name} not found");
        return Vec::new();
    };

    entity
        .spec
        .as_component()
        .map(|spec| {
            spec.deployments
                .iter()
                .map(|d| ComponentDeployment {
                    environment: d.environment.clone(),
                    version: d.version.clone(),
                    timestamp: d.timestamp.clone(),
                    entidad: d.entidad.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Read side of the catalog grouped by deployment environment. Every call recomputes from the
/// store's current contents.
pub struct EnvironmentService {
    store: Arc<dyn EntityStore>,
}

impl EnvironmentService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn environments(
        &self,
        search: &str,
        pagination: Pagination,
    ) -> StoreResult<Vec<EnvironmentView>> {
        let entities = self.store.find_all("", "")?;
        Ok(aggregate_environments(&entities, search, pagination))
    }

    pub fn component_environments(&self, name: &str) -> StoreResult<Vec<ComponentDeployment>> {
        let entities = self.store.find_all("", "")?;
        Ok(component_deployments(&entities, name))
    }
}
