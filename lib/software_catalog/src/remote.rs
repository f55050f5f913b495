use gitlab_client::deployments::{Deployment, ListProjectDeploymentsOptions};
use gitlab_client::groups::Project;
use gitlab_client::pipelines::{Pipeline, PipelineInfo};
use gitlab_client::tags::Tag;
use gitlab_client::{Client, ClientError, OffsetBasedPagination};
use thiserror::Error;

const PROJECTS_PAGE_SIZE: u32 = 100;
const DEFAULT_BRANCH: &str = "HEAD";

#[remain::sorted]
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0} not found")]
    NotFound(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        match self {
            RemoteError::Client(e) => e.is_not_found(),
            RemoteError::NotFound(_) => true,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The slice of a remote project the pipeline works with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    pub path_with_namespace: String,
    pub default_branch: String,
    pub web_url: String,
}

impl From<Project> for RemoteProject {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name,
            path_with_namespace: project.path_with_namespace,
            default_branch: project
                .default_branch
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            web_url: project.web_url,
        }
    }
}

/// Remote operations discovery and enrichment depend on.
#[async_trait::async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Projects in `group` including those of its subgroups.
    async fn list_group_projects(&self, group: &str) -> RemoteResult<Vec<RemoteProject>>;

    /// Decoded content of `path` on the project's default branch.
    async fn get_file(&self, project: &RemoteProject, path: &str) -> RemoteResult<String>;

    /// Successful deployments to `environment`, newest first.
    async fn list_deployments(
        &self,
        project: &RemoteProject,
        environment: &str,
        per_page: u32,
    ) -> RemoteResult<Vec<Deployment>>;

    /// Repository tags, most recently updated first.
    async fn list_tags(&self, project: &RemoteProject, per_page: u32) -> RemoteResult<Vec<Tag>>;

    async fn find_pipeline_for_commit(
        &self,
        project: &RemoteProject,
        sha: &str,
    ) -> RemoteResult<Option<PipelineInfo>>;

    async fn get_pipeline(&self, project: &RemoteProject, pipeline_id: u64)
        -> RemoteResult<Pipeline>;
}

/// [`RemoteRepository`] backed by the GitLab REST API.
#[derive(Clone, Debug)]
pub struct GitLabRemote {
    client: Client,
}

impl GitLabRemote {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RemoteRepository for GitLabRemote {
    async fn list_group_projects(&self, group: &str) -> RemoteResult<Vec<RemoteProject>> {
        let projects = self
            .client
            .groups()
            .list_group_projects(
                group,
                true,
                Some(OffsetBasedPagination::per_page(PROJECTS_PAGE_SIZE)),
            )
            .await?
            .body;

        Ok(projects.into_iter().map(RemoteProject::from).collect())
    }

    async fn get_file(&self, project: &RemoteProject, path: &str) -> RemoteResult<String> {
        let file = self
            .client
            .repository_files()
            .get_file(&project.id, path, &project.default_branch)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    RemoteError::NotFound(format!("{path} in {}", project.path_with_namespace))
                } else {
                    RemoteError::Client(e)
                }
            })?
            .body;

        Ok(file.decoded_content()?)
    }

    async fn list_deployments(
        &self,
        project: &RemoteProject,
        environment: &str,
        per_page: u32,
    ) -> RemoteResult<Vec<Deployment>> {
        let options = ListProjectDeploymentsOptions {
            environment: Some(environment.to_string()),
            status: Some("success".to_string()),
            order_by: Some("id".to_string()),
            sort: Some("desc".to_string()),
            pagination: Some(OffsetBasedPagination::per_page(per_page)),
        };

        Ok(self
            .client
            .deployments()
            .list_project_deployments(&project.id, &options)
            .await?
            .body)
    }

    async fn list_tags(&self, project: &RemoteProject, per_page: u32) -> RemoteResult<Vec<Tag>> {
        Ok(self
            .client
            .tags()
            .list_tags(
                &project.id,
                Some("updated"),
                Some("desc"),
                Some(OffsetBasedPagination::per_page(per_page)),
            )
            .await?
            .body)
    }

    async fn find_pipeline_for_commit(
        &self,
        project: &RemoteProject,
        sha: &str,
    ) -> RemoteResult<Option<PipelineInfo>> {
        let pipelines = self
            .client
            .pipelines()
            .list_project_pipelines(&project.id, Some(sha), Some(OffsetBasedPagination::per_page(1)))
            .await?
            .body;

        Ok(pipelines.into_iter().next())
    }

    async fn get_pipeline(
        &self,
        project: &RemoteProject,
        pipeline_id: u64,
    ) -> RemoteResult<Pipeline> {
        Ok(self
            .client
            .pipelines()
            .get_pipeline(&project.id, pipeline_id)
            .await?
            .body)
    }
}

#[cfg(test)]
mod tests {
    use gitlab_client::groups::Project;

    use super::{RemoteError, RemoteProject};

    #[test]
    fn project_without_default_branch_reads_head() {
        let project = RemoteProject::from(Project {
            id: 42,
            name: "Payments_API".to_string(),
            path_with_namespace: "acme/payments-api".to_string(),
            web_url: "https://gitlab.example.com/acme/payments-api".to_string(),
            ..Default::default()
        });

        assert_eq!("42", project.id);
        assert_eq!("HEAD", project.default_branch);
    }

    #[test]
    fn not_found_is_recognised() {
        assert!(RemoteError::NotFound("README.md".to_string()).is_not_found());
    }
}
