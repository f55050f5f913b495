use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Client, ClientResult, Message, OffsetBasedPagination, Response};

/// Pipeline as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub id: u64,
    #[serde(default)]
    pub iid: u64,
    #[serde(default)]
    pub project_id: u64,
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Single pipeline including its detailed status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub detailed_status: Option<DetailedStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedStatus {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub text: String,
    /// e.g. "passed", "passed with warnings", "failed"
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub tooltip: String,
    #[serde(default)]
    pub has_details: bool,
    #[serde(default)]
    pub details_path: String,
}

pub struct Pipelines {
    pub client: Client,
}

impl Pipelines {
    pub fn new(client: Client) -> Self {
        Pipelines { client }
    }

    /// List pipelines in a project.
    ///
    /// This function performs a `GET` to `/projects/:id/pipelines`
    /// From https://docs.gitlab.com/api/pipelines/#list-project-pipelines
    ///
    /// **Parameters**
    ///
    /// * project_id - The ID or URL-encoded path of the project
    /// * sha - The SHA of pipelines
    pub async fn list_project_pipelines(
        &self,
        project_id: &str,
        sha: Option<&str>,
        pagination: Option<OffsetBasedPagination>,
    ) -> ClientResult<Response<Vec<PipelineInfo>>> {
        let mut query_args: Vec<(String, String)> = Default::default();
        if let Some(sha) = sha {
            query_args.push(("sha".to_string(), sha.to_string()));
        }

        if let Some(pagination) = pagination {
            pagination.append_to(&mut query_args);
        }

        let url = self.client.url(
            &format!(
                "/projects/{}/pipelines",
                crate::support::encode_path(project_id)
            ),
            &query_args,
        )?;
        self.client.get(&url, Message::default()).await
    }

    /// Get one pipeline of a project.
    ///
    /// This function performs a `GET` to `/projects/:id/pipelines/:pipeline_id`
    /// From https://docs.gitlab.com/api/pipelines/#get-a-single-pipeline
    pub async fn get_pipeline(
        &self,
        project_id: &str,
        pipeline_id: u64,
    ) -> ClientResult<Response<Pipeline>> {
        let url = self.client.url(
            &format!(
                "/projects/{}/pipelines/{}",
                crate::support::encode_path(project_id),
                pipeline_id,
            ),
            &[],
        )?;
        self.client.get(&url, Message::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::Pipeline;

    #[test]
    fn deserialize_pipeline_with_detailed_status() {
        let pipeline: Pipeline = serde_json::from_str(
            r#"{
                "id": 287,
                "iid": 144,
                "project_id": 21,
                "sha": "50f0acb76a40e34a4ff304f7347dcc6587da8a14",
                "ref": "v1.2.0",
                "status": "success",
                "web_url": "https://gitlab.example.com/acme/payments/-/pipelines/287",
                "detailed_status": {
                    "icon": "status_warning",
                    "text": "Warning",
                    "label": "passed with warnings",
                    "group": "success-with-warnings",
                    "tooltip": "passed",
                    "has_details": true,
                    "details_path": "/acme/payments/-/pipelines/287"
                }
            }"#,
        )
        .unwrap();

        assert_eq!("success", pipeline.status);
        assert_eq!(
            "passed with warnings",
            pipeline.detailed_status.unwrap().label
        );
    }
}
