use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Client, ClientResult, Message, OffsetBasedPagination, Response};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: u64,
    #[serde(default)]
    pub iid: u64,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub sha: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    // TODO: could make into an enum
    #[serde(default)]
    pub status: Option<String>,
    /// The job that performed the deployment. Missing for deployments created through the API.
    #[serde(default)]
    pub deployable: Option<Deployable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deployable {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: String,
    /// Whether the job ran for a tag
    #[serde(default)]
    pub tag: bool,
}

/// Filters for [`Deployments::list_project_deployments`].
#[derive(Debug, Clone, Default)]
pub struct ListProjectDeploymentsOptions {
    pub environment: Option<String>,
    /// created, running, success, failed, canceled, or blocked
    pub status: Option<String>,
    /// id, iid, created_at, updated_at, finished_at or ref. Default is id
    pub order_by: Option<String>,
    /// asc or desc
    pub sort: Option<String>,
    pub pagination: Option<OffsetBasedPagination>,
}

pub struct Deployments {
    pub client: Client,
}

impl Deployments {
    pub fn new(client: Client) -> Self {
        Deployments { client }
    }

    /// Get a list of deployments in a project.
    ///
    /// This function performs a `GET` to `/projects/:id/deployments`
    /// From https://docs.gitlab.com/api/deployments/#list-project-deployments
    ///
    /// **Parameters**
    ///
    /// * project_id - The ID or URL-encoded path of the project
    /// * options - environment, status, ordering and pagination filters
    pub async fn list_project_deployments(
        &self,
        project_id: &str,
        options: &ListProjectDeploymentsOptions,
    ) -> ClientResult<Response<Vec<Deployment>>> {
        let mut query_args: Vec<(String, String)> = Default::default();
        if let Some(environment) = &options.environment {
            query_args.push(("environment".to_string(), environment.clone()));
        }

        if let Some(status) = &options.status {
            query_args.push(("status".to_string(), status.clone()));
        }

        if let Some(order_by) = &options.order_by {
            query_args.push(("order_by".to_string(), order_by.clone()));
        }

        if let Some(sort) = &options.sort {
            query_args.push(("sort".to_string(), sort.clone()));
        }

        if let Some(pagination) = &options.pagination {
            pagination.append_to(&mut query_args);
        }

        let url = self.client.url(
            &format!(
                "/projects/{}/deployments",
                crate::support::encode_path(project_id)
            ),
            &query_args,
        )?;
        self.client.get(&url, Message::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::Deployment;

    #[test]
    fn deserialize_deployments() {
        let deployments: Vec<Deployment> = serde_json::from_str(
            r#"[
                {
                    "id": 42,
                    "iid": 2,
                    "ref": "v1.4.0",
                    "sha": "a91957a858320c0e17f3a0eca7cfacbff50ea29a",
                    "created_at": "2024-03-01T10:15:30.000Z",
                    "status": "success",
                    "deployable": {
                        "id": 17,
                        "name": "deploy-prod [3]",
                        "status": "success",
                        "stage": "deploy",
                        "ref": "v1.4.0",
                        "tag": true
                    }
                },
                {
                    "id": 41,
                    "iid": 1,
                    "ref": "main",
                    "sha": "b83d6e391c22777fca1ed3012fce84f633d7fed0",
                    "created_at": "2024-02-01T10:15:30.000Z",
                    "status": "success",
                    "deployable": null
                }
            ]"#,
        )
        .unwrap();

        assert_eq!(2, deployments.len());
        let deployable = deployments[0].deployable.as_ref().unwrap();
        assert!(deployable.tag);
        assert_eq!("deploy-prod [3]", deployable.name);
        assert_eq!("v1.4.0", deployments[0].reference);
        assert!(deployments[1].deployable.is_none());
    }
}
