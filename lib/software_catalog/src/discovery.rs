use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::entities::Entity;
use crate::manifest::{ManifestDocuments, RawEntity};
use crate::normalizer::{normalize, NormalizedEntity, RemoteContext};
use crate::remote::{RemoteProject, RemoteRepository};
use crate::store::EntityStore;
use crate::{CatalogError, CatalogResult};

/// Manifest file names looked up in each remote project, in order of preference.
pub const CATALOG_FILE_CANDIDATES: [&str; 4] = [
    "catalog-info.yaml",
    "catalog-info.yml",
    "devcompass.yaml",
    "devcompass.yml",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalManifest {
    pub path: PathBuf,
    /// Entities from external sources are tagged `external`
    pub external: bool,
}

impl LocalManifest {
    pub fn new<P: Into<PathBuf>>(path: P, external: bool) -> Self {
        Self {
            path: path.into(),
            external,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Group id, path or full URL of the group whose projects are scanned
    pub group_to_scan: Option<String>,
    pub local_manifests: Vec<LocalManifest>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub group: String,
    pub local_entities: usize,
    pub remote_entities: usize,
    pub projects_scanned: usize,
    pub projects_without_manifest: usize,
    pub failed_entities: usize,
    pub failed_fetches: usize,
}

impl DiscoveryReport {
    pub fn total_entities(&self) -> usize {
        self.local_entities + self.remote_entities
    }
}

/// Group path to hand to the API. A full group URL is reduced to its path.
pub fn resolve_group(group_to_scan: Option<&str>) -> CatalogResult<String> {
    let group = group_to_scan
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or(CatalogError::MissingGroupToScan)?;

    let resolved = match Url::parse(group) {
        Ok(url) if url.has_host() => url.path().trim_matches('/').to_string(),
        _ => group.to_string(),
    };

    if resolved.is_empty() {
        return Err(CatalogError::MissingGroupToScan);
    }
    Ok(resolved)
}

/// Entities of the run being built. Names are unique; the first entity staged under a name is
/// kept.
#[derive(Debug, Default)]
struct CatalogStaging {
    entities: Vec<Entity>,
    names: HashSet<String>,
}

impl CatalogStaging {
    fn stage(&mut self, entity: Entity) -> CatalogResult<()> {
        if !self.names.insert(entity.name().to_string()) {
            return Err(CatalogError::DuplicateEntity(entity.name().to_string()));
        }
        self.entities.push(entity);
        Ok(())
    }
}

/// Rebuilds the catalog from local manifests and the projects of a GitLab group.
pub struct DiscoveryService {
    settings: DiscoverySettings,
    remote: Arc<dyn RemoteRepository>,
    store: Arc<dyn EntityStore>,
}

impl DiscoveryService {
    pub fn new(
        settings: DiscoverySettings,
        remote: Arc<dyn RemoteRepository>,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        Self {
            settings,
            remote,
            store,
        }
    }

    /// Run a full discovery. The new catalog is built aside and swapped into the store only once
    /// complete, so a failed run leaves the previous catalog untouched.
    pub async fn run(&self) -> CatalogResult<DiscoveryReport> {
        let group = resolve_group(self.settings.group_to_scan.as_deref())?;
        let mut report = DiscoveryReport {
            group: group.clone(),
            ..Default::default()
        };
        let mut staging = CatalogStaging::default();

        for manifest in &self.settings.local_manifests {
            self.ingest_local(manifest, &mut staging, &mut report).await;
        }

        info!("starting GitLab discovery in group {group}");
        let projects = self
            .remote
            .list_group_projects(&group)
            .await
            .map_err(|source| CatalogError::ListProjects {
                group: group.clone(),
                source,
            })?;
        info!("found {} projects to scan", projects.len());

        for project in &projects {
            self.ingest_project(project, &mut staging, &mut report)
                .await;
        }

        self.store.replace_all(staging.entities)?;
        info!(
            "discovery finished: {} entities cataloged, {} failed",
            report.total_entities(),
            report.failed_entities
        );
        Ok(report)
    }

    async fn ingest_local(
        &self,
        manifest: &LocalManifest,
        staging: &mut CatalogStaging,
        report: &mut DiscoveryReport,
    ) {
        info!("ingesting local file {}", manifest.path.display());
        let documents = match ManifestDocuments::from_path(&manifest.path, manifest.external) {
            Ok(documents) => documents,
            Err(e) => {
                warn!("failed to ingest {}: {e}", manifest.path.display());
                return;
            }
        };

        for raw in documents.iter() {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("skipping document in {}: {e}", manifest.path.display());
                    report.failed_entities += 1;
                    continue;
                }
            };

            if stage(normalize(raw, None).await, staging, report, &manifest.path) {
                report.local_entities += 1;
            }
        }
    }

    async fn ingest_project(
        &self,
        project: &RemoteProject,
        staging: &mut CatalogStaging,
        report: &mut DiscoveryReport,
    ) {
        info!("scanning project {}", project.path_with_namespace);
        report.projects_scanned += 1;

        let Some((file, content)) = self.find_catalog_file(project).await else {
            debug!(
                "could not find a catalog file in {}",
                project.path_with_namespace
            );
            report.projects_without_manifest += 1;
            return;
        };

        let raw = match first_entity(&content) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("{file} in {} declares no entity", project.path_with_namespace);
                report.projects_without_manifest += 1;
                return;
            }
            Err(e) => {
                error!(
                    "failed to parse {file} for {}: {e}",
                    project.path_with_namespace
                );
                report.failed_entities += 1;
                return;
            }
        };

        let context = RemoteContext {
            remote: self.remote.as_ref(),
            project,
        };
        let source = Path::new(&project.path_with_namespace).join(file);
        if stage(normalize(raw, Some(context)).await, staging, report, &source) {
            report.remote_entities += 1;
        }
    }

    async fn find_catalog_file(&self, project: &RemoteProject) -> Option<(&'static str, String)> {
        for file in CATALOG_FILE_CANDIDATES {
            match self.remote.get_file(project, file).await {
                Ok(content) => return Some((file, content)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    debug!(
                        "could not read {file} in {}: {e}",
                        project.path_with_namespace
                    );
                }
            }
        }
        None
    }
}

/// First entity in a project's catalog file. A project describes a single component.
fn first_entity(content: &str) -> CatalogResult<Option<RawEntity>> {
    let documents = ManifestDocuments::parse(content, false);
    if documents.len() > 1 {
        debug!(
            "catalog file has {} documents, only the first is used",
            documents.len()
        );
    }
    let first = documents.iter().next();
    first.transpose()
}

fn stage(
    normalized: CatalogResult<NormalizedEntity>,
    staging: &mut CatalogStaging,
    report: &mut DiscoveryReport,
    source: &Path,
) -> bool {
    let normalized = match normalized {
        Ok(normalized) => normalized,
        Err(e) => {
            warn!("failed to process entity from {}: {e}", source.display());
            report.failed_entities += 1;
            return false;
        }
    };

    report.failed_fetches += normalized.failed_fetches;
    let name = normalized.entity.name().to_string();
    let kind = normalized.entity.kind.clone();
    match staging.stage(normalized.entity) {
        Ok(()) => {
            info!("ingested entity {name} ({kind})");
            true
        }
        Err(e) => {
            warn!("failed to save entity from {}: {e}", source.display());
            report.failed_entities += 1;
            false
        }
    }
}
