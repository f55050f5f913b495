use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Client, ClientResult, Message, OffsetBasedPagination, Response};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub commit: Option<Commit>,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub committed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub web_url: Option<String>,
}

pub struct Tags {
    pub client: Client,
}

impl Tags {
    pub fn new(client: Client) -> Self {
        Tags { client }
    }

    /// Get a list of repository tags from a project.
    ///
    /// This function performs a `GET` to `/projects/:id/repository/tags`
    /// From https://docs.gitlab.com/api/tags/#list-project-repository-tags
    ///
    /// **Parameters**
    ///
    /// * project_id - The ID or URL-encoded path of the project
    /// * order_by - Return tags ordered by name, updated, or version. Default is updated
    /// * sort - asc or desc
    pub async fn list_tags(
        &self,
        project_id: &str,
        order_by: Option<&str>,
        sort: Option<&str>,
        pagination: Option<OffsetBasedPagination>,
    ) -> ClientResult<Response<Vec<Tag>>> {
        let mut query_args: Vec<(String, String)> = Default::default();
        if let Some(order_by) = order_by {
            query_args.push(("order_by".to_string(), order_by.to_string()));
        }

        if let Some(sort) = sort {
            query_args.push(("sort".to_string(), sort.to_string()));
        }

        if let Some(pagination) = pagination {
            pagination.append_to(&mut query_args);
        }

        let url = self.client.url(
            &format!(
                "/projects/{}/repository/tags",
                crate::support::encode_path(project_id)
            ),
            &query_args,
        )?;
        self.client.get(&url, Message::default()).await
    }
}
