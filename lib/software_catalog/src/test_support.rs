use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use gitlab_client::deployments::{Deployable, Deployment};
use gitlab_client::pipelines::{DetailedStatus, Pipeline, PipelineInfo};
use gitlab_client::tags::{Commit, Tag};
use gitlab_client::ClientError;

use crate::remote::{RemoteError, RemoteProject, RemoteRepository, RemoteResult};

pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_709_287_200 + seconds, 0).unwrap()
}

pub(crate) fn project(name: &str) -> RemoteProject {
    RemoteProject {
        id: format!("acme/{name}"),
        name: name.to_string(),
        path_with_namespace: format!("acme/{name}"),
        default_branch: "main".to_string(),
        web_url: format!("https://gitlab.example.com/acme/{name}"),
    }
}

pub(crate) fn deployment(id: u64, job: &str, seconds: i64) -> Deployment {
    Deployment {
        id,
        iid: id,
        reference: "main".to_string(),
        sha: format!("{id:07}deadbeefcafe"),
        created_at: at(seconds),
        updated_at: None,
        status: Some("success".to_string()),
        deployable: Some(Deployable {
            id: id + 1000,
            name: job.to_string(),
            status: Some("success".to_string()),
            stage: Some("deploy".to_string()),
            reference: "main".to_string(),
            tag: false,
        }),
    }
}

pub(crate) fn tag(name: &str, sha: &str, seconds: i64) -> Tag {
    Tag {
        name: name.to_string(),
        message: None,
        target: sha.to_string(),
        commit: Some(Commit {
            id: sha.to_string(),
            short_id: sha.chars().take(8).collect(),
            title: format!("Release {name}"),
            created_at: Some(at(seconds)),
            committed_date: Some(at(seconds)),
            web_url: None,
        }),
        protected: false,
    }
}

pub(crate) fn pipeline(id: u64, sha: &str, status: &str, label: &str) -> Pipeline {
    Pipeline {
        id,
        sha: sha.to_string(),
        reference: "main".to_string(),
        status: status.to_string(),
        web_url: format!("https://gitlab.example.com/acme/pipelines/{id}"),
        detailed_status: Some(DetailedStatus {
            label: label.to_string(),
            ..Default::default()
        }),
    }
}

/// In-memory stand-in for GitLab. Anything not configured is not found and every operation named
/// in `failing` returns a client error.
#[derive(Default)]
pub(crate) struct FakeRemote {
    pub projects: Vec<RemoteProject>,
    /// (project id, path) -> content
    pub files: HashMap<(String, String), String>,
    /// (project id, environment) -> deployments, newest first
    pub deployments: HashMap<(String, String), Vec<Deployment>>,
    pub tags: HashMap<String, Vec<Tag>>,
    pub pipelines: HashMap<String, Pipeline>,
    pub failing: HashSet<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn with_file(mut self, project: &RemoteProject, path: &str, content: &str) -> Self {
        self.files.insert(
            (project.id.clone(), path.to_string()),
            content.to_string(),
        );
        self
    }

    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, detail: &str) -> RemoteResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation} {detail}"));

        if self.failing.contains(operation) {
            let malformed = serde_json::from_str::<u64>("unavailable").unwrap_err();
            return Err(RemoteError::Client(ClientError::SerdeJsonError(malformed)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteRepository for FakeRemote {
    async fn list_group_projects(&self, group: &str) -> RemoteResult<Vec<RemoteProject>> {
        self.record("list_group_projects", group)?;
        Ok(self.projects.clone())
    }

    async fn get_file(&self, project: &RemoteProject, path: &str) -> RemoteResult<String> {
        self.record("get_file", path)?;
        self.files
            .get(&(project.id.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn list_deployments(
        &self,
        project: &RemoteProject,
        environment: &str,
        _per_page: u32,
    ) -> RemoteResult<Vec<Deployment>> {
        self.record("list_deployments", environment)?;
        Ok(self
            .deployments
            .get(&(project.id.clone(), environment.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_tags(&self, project: &RemoteProject, per_page: u32) -> RemoteResult<Vec<Tag>> {
        self.record("list_tags", &project.id)?;
        Ok(self
            .tags
            .get(&project.id)
            .map(|tags| tags.iter().take(per_page as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_pipeline_for_commit(
        &self,
        _project: &RemoteProject,
        sha: &str,
    ) -> RemoteResult<Option<PipelineInfo>> {
        self.record("find_pipeline_for_commit", sha)?;
        Ok(self.pipelines.get(sha).map(|p| PipelineInfo {
            id: p.id,
            iid: p.id,
            project_id: 1,
            sha: p.sha.clone(),
            reference: p.reference.clone(),
            status: p.status.clone(),
            web_url: p.web_url.clone(),
            created_at: None,
            updated_at: None,
        }))
    }

    async fn get_pipeline(
        &self,
        _project: &RemoteProject,
        pipeline_id: u64,
    ) -> RemoteResult<Pipeline> {
        self.record("get_pipeline", &pipeline_id.to_string())?;
        self.pipelines
            .values()
            .find(|p| p.id == pipeline_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("pipeline {pipeline_id}")))
    }
}
