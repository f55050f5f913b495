use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use gitlab_client::deployments::Deployment as RemoteDeployment;
use gitlab_client::pipelines::Pipeline;

use crate::entities::{CiStatus, ComponentSpec, Deployment, RepositoryTag};
use crate::environments::ENVIRONMENTS;
use crate::infrastructure;
use crate::remote::{RemoteProject, RemoteRepository, RemoteResult};

pub const MAX_DEPLOYMENTS_PER_ENVIRONMENT: usize = 10;
const DEPLOYMENTS_PAGE_SIZE: u32 = 100;
const TAGS_PAGE_SIZE: u32 = 10;
const DEPLOY_JOB_PREFIX: &str = "deploy";
/// Dedup key of deployments whose job name carries no entidad
const GLOBAL_DEPLOYMENT_KEY: &str = "global";
const UNKNOWN_VERSION: &str = "N/A";
const WARNING_STATUS: &str = "warning";

const README_FILE: &str = "README.md";
const DOCKERFILES: [&str; 2] = ["Dockerfile", "dockerfile"];
const CI_FILE: &str = ".gitlab-ci.yml";
const DEPLOYMENT_DESCRIPTOR_FILE: &str = "deploy-ecs-fargate.yml";

lazy_static! {
    static ref ENTIDAD_SUFFIX: Regex = Regex::new(r"\s\[(\d+)\]$").unwrap();
}

/// How a single enrichment fetch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    /// The remote answered but the item does not exist, or a prerequisite was unavailable
    Missing,
    Failed(String),
}

/// Result of one best-effort fetch. Failures carry the zero value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub outcome: FetchOutcome,
}

impl<T: Default> Fetched<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            outcome: FetchOutcome::Fetched,
        }
    }

    pub fn missing() -> Self {
        Self {
            value: T::default(),
            outcome: FetchOutcome::Missing,
        }
    }

    pub fn failed(reason: impl ToString) -> Self {
        Self {
            value: T::default(),
            outcome: FetchOutcome::Failed(reason.to_string()),
        }
    }

    fn from_result(result: RemoteResult<T>, what: &str, project: &RemoteProject) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) if e.is_not_found() => {
                debug!(
                    "{what} not found for {}, continuing without it",
                    project.path_with_namespace
                );
                Self::missing()
            }
            Err(e) => {
                warn!(
                    "could not fetch {what} for {}: {e}",
                    project.path_with_namespace
                );
                Self::failed(e)
            }
        }
    }

    pub fn is_fetched(&self) -> bool {
        self.outcome == FetchOutcome::Fetched
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Failed(_))
    }

    fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            outcome: self.outcome,
        }
    }
}

/// Everything fetched for one component. Each field is independent of the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentEnrichment {
    /// One entry per environment, in environment table order
    pub deployments: Vec<Fetched<Vec<Deployment>>>,
    pub readme: Fetched<String>,
    pub repository_tags: Fetched<Vec<RepositoryTag>>,
    pub ci: Fetched<Option<CiStatus>>,
    pub base_image: Fetched<Option<String>>,
    pub ci_file: Fetched<String>,
    pub deployment_descriptor: Fetched<String>,
    pub deployment_target: String,
}

impl ComponentEnrichment {
    /// Fetch every enrichment field for `project`, one call at a time.
    pub async fn fetch(remote: &dyn RemoteRepository, project: &RemoteProject) -> Self {
        let mut deployments = Vec::with_capacity(ENVIRONMENTS.len());
        for environment in &ENVIRONMENTS {
            deployments.push(fetch_deployments(remote, project, environment.id).await);
        }

        let readme = Fetched::from_result(
            remote.get_file(project, README_FILE).await,
            README_FILE,
            project,
        );
        let (repository_tags, ci) = fetch_tags_and_ci(remote, project).await;
        let base_image = fetch_base_image(remote, project).await;
        let ci_file =
            Fetched::from_result(remote.get_file(project, CI_FILE).await, CI_FILE, project);
        let deployment_descriptor = Fetched::from_result(
            remote.get_file(project, DEPLOYMENT_DESCRIPTOR_FILE).await,
            DEPLOYMENT_DESCRIPTOR_FILE,
            project,
        );

        Self {
            deployments,
            readme,
            repository_tags,
            ci,
            base_image,
            ci_file,
            deployment_descriptor,
            deployment_target: deployment_target(&project.name),
        }
    }

    /// Number of fetches that failed for reasons other than absence.
    pub fn failures(&self) -> usize {
        self.deployments.iter().filter(|d| d.is_failed()).count()
            + [
                self.readme.is_failed(),
                self.repository_tags.is_failed(),
                self.ci.is_failed(),
                self.base_image.is_failed(),
                self.ci_file.is_failed(),
                self.deployment_descriptor.is_failed(),
            ]
            .into_iter()
            .filter(|failed| *failed)
            .count()
    }

    /// Merge into `spec`. Deployments are replaced by what the environments report; other
    /// fields only change when their fetch produced a value.
    pub fn apply(self, spec: &mut ComponentSpec) {
        let mut deployments: Vec<Deployment> = self
            .deployments
            .into_iter()
            .flat_map(|fetched| fetched.value)
            .collect();

        if self.ci_file.is_fetched() {
            if infrastructure::uses_deployment_matrix(&self.ci_file.value) {
                debug!("deployment matrix detected, dropping deployments without entidad");
                deployments = reconcile_matrix_deployments(deployments);
            }

            let stages = infrastructure::ci_stages(&self.ci_file.value);
            if !stages.is_empty() {
                spec.ci_stages = stages;
            }
        }
        spec.deployments = deployments;

        if !self.readme.value.is_empty() {
            spec.readme_content = self.readme.value;
        }

        if self.repository_tags.is_fetched() {
            spec.repository.tags = self.repository_tags.value;
        }

        if let Some(ci) = self.ci.value {
            spec.ci = ci;
        }

        if let Some(base_image) = self.base_image.value {
            spec.base_image = base_image;
        }

        if self.deployment_descriptor.is_fetched() {
            if let Some(template) =
                infrastructure::parse_template(&self.deployment_descriptor.value)
            {
                spec.environment_variables = infrastructure::container_environment(&template);
                spec.parameter_store_paths = infrastructure::parameter_store_paths(&template);
            }
        }

        spec.deployment_target = self.deployment_target;
    }
}

/// Fetch and merge every enrichment field of `project` into `spec`.
pub async fn enrich_component(
    remote: &dyn RemoteRepository,
    project: &RemoteProject,
    spec: &mut ComponentSpec,
) -> ComponentEnrichmentSummary {
    let enrichment = ComponentEnrichment::fetch(remote, project).await;
    let failures = enrichment.failures();
    enrichment.apply(spec);

    ComponentEnrichmentSummary { failures }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComponentEnrichmentSummary {
    pub failures: usize,
}

async fn fetch_deployments(
    remote: &dyn RemoteRepository,
    project: &RemoteProject,
    environment: &str,
) -> Fetched<Vec<Deployment>> {
    let result = remote
        .list_deployments(project, environment, DEPLOYMENTS_PAGE_SIZE)
        .await;
    if let Ok(deployments) = &result {
        info!(
            "project [{}] env [{environment}]: found {} successful deployments to process",
            project.path_with_namespace,
            deployments.len()
        );
    }

    Fetched::from_result(result, &format!("{environment} deployments"), project)
        .map(|deployments| select_deployments(environment, &deployments))
}

/// Keep the newest deployment per entidad from a newest-first listing. Only jobs whose name
/// starts with `deploy` count and at most [`MAX_DEPLOYMENTS_PER_ENVIRONMENT`] are kept.
pub fn select_deployments(environment: &str, deployments: &[RemoteDeployment]) -> Vec<Deployment> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for deployment in deployments {
        if selected.len() >= MAX_DEPLOYMENTS_PER_ENVIRONMENT {
            break;
        }

        let Some(job) = deployment.deployable.as_ref().filter(|job| job.id != 0) else {
            continue;
        };

        if !job.name.starts_with(DEPLOY_JOB_PREFIX) {
            continue;
        }

        let entidad = parse_entidad(&job.name);
        let key = entidad
            .clone()
            .unwrap_or_else(|| GLOBAL_DEPLOYMENT_KEY.to_string());
        if !seen.insert(key) {
            continue;
        }

        let version = deployment_version(deployment);
        debug!(
            "parsed deployment: env={environment}, entidad={}, version={version}",
            entidad.as_deref().unwrap_or_default()
        );
        selected.push(Deployment {
            environment: environment.to_string(),
            version,
            timestamp: deployment.created_at.to_rfc3339(),
            entidad,
        });
    }

    selected
}

/// Entidad from a trailing ` [N]` in a job name.
pub fn parse_entidad(job_name: &str) -> Option<String> {
    ENTIDAD_SUFFIX
        .captures(job_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Tag name for tag deployments, otherwise the short commit sha.
pub fn deployment_version(deployment: &RemoteDeployment) -> String {
    let tagged = deployment
        .deployable
        .as_ref()
        .map(|job| job.tag)
        .unwrap_or(false);
    if tagged {
        return deployment.reference.clone();
    }

    deployment
        .sha
        .get(..7)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
}

/// Drop deployments without an entidad. Used when deployments fan out over a matrix and a
/// global deployment would be misleading.
pub fn reconcile_matrix_deployments(deployments: Vec<Deployment>) -> Vec<Deployment> {
    deployments
        .into_iter()
        .filter(|d| d.entidad.as_deref().is_some_and(|e| !e.is_empty()))
        .collect()
}

pub fn deployment_target(project_name: &str) -> String {
    project_name.to_lowercase().replace('_', "-")
}

/// CI status of a detailed pipeline. A label mentioning warnings overrides the status.
pub fn pipeline_status(pipeline: &Pipeline) -> CiStatus {
    let status = match &pipeline.detailed_status {
        Some(detailed) if detailed.label.contains(WARNING_STATUS) => {
            debug!(
                "overriding status to warning based on detailed status label '{}'",
                detailed.label
            );
            WARNING_STATUS.to_string()
        }
        _ => pipeline.status.clone(),
    };

    CiStatus {
        last_run_status: status,
        pipeline_url: pipeline.web_url.clone(),
    }
}

async fn fetch_tags_and_ci(
    remote: &dyn RemoteRepository,
    project: &RemoteProject,
) -> (Fetched<Vec<RepositoryTag>>, Fetched<Option<CiStatus>>) {
    let tags = match remote.list_tags(project, TAGS_PAGE_SIZE).await {
        Ok(tags) => tags,
        Err(e) => {
            warn!(
                "could not fetch tags for project {}: {e}",
                project.path_with_namespace
            );
            return (Fetched::failed(&e), Fetched::missing());
        }
    };

    let repository_tags = tags
        .iter()
        .filter_map(|tag| {
            tag.commit.as_ref().map(|commit| RepositoryTag {
                name: tag.name.clone(),
                timestamp: commit
                    .created_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            })
        })
        .collect();

    let Some(commit) = tags.first().and_then(|tag| tag.commit.as_ref()) else {
        return (Fetched::ok(repository_tags), Fetched::missing());
    };

    debug!("finding pipeline for latest tag commit {}", commit.id);
    let ci = match remote.find_pipeline_for_commit(project, &commit.id).await {
        Ok(Some(basic)) => match remote.get_pipeline(project, basic.id).await {
            Ok(detailed) => Fetched::ok(Some(pipeline_status(&detailed))),
            Err(e) => {
                warn!(
                    "could not get detailed pipeline {}, falling back to basic status: {e}",
                    basic.id
                );
                Fetched::ok(Some(CiStatus {
                    last_run_status: basic.status,
                    pipeline_url: basic.web_url,
                }))
            }
        },
        Ok(None) => {
            debug!("no pipeline found for commit {}", commit.id);
            Fetched::missing()
        }
        Err(e) => {
            warn!("could not fetch pipeline list for commit {}: {e}", commit.id);
            Fetched::failed(e)
        }
    };

    (Fetched::ok(repository_tags), ci)
}

async fn fetch_base_image(
    remote: &dyn RemoteRepository,
    project: &RemoteProject,
) -> Fetched<Option<String>> {
    let mut last = Fetched::missing();
    for dockerfile in DOCKERFILES {
        last = Fetched::from_result(remote.get_file(project, dockerfile).await, dockerfile, project);
        if last.is_fetched() {
            break;
        }
    }

    last.map(|content| {
        let image = infrastructure::base_image(&content);
        if let Some(image) = &image {
            debug!("found base image '{image}'");
        }
        image
    })
}
