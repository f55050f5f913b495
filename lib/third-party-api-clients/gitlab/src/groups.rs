use serde::{Deserialize, Serialize};

use crate::{Client, ClientResult, Message, OffsetBasedPagination, Response};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub web_url: String,
}

pub struct Groups {
    pub client: Client,
}

impl Groups {
    pub fn new(client: Client) -> Self {
        Groups { client }
    }

    /// Get a list of projects in this group.
    ///
    /// This function performs a `GET` to `/groups/:id/projects`
    /// From https://docs.gitlab.com/api/groups/#list-projects
    ///
    /// **Parameters**
    ///
    /// * group_id - The ID or URL-encoded path of the group
    /// * include_subgroups - Include projects in subgroups of this group
    pub async fn list_group_projects(
        &self,
        group_id: &str,
        include_subgroups: bool,
        pagination: Option<OffsetBasedPagination>,
    ) -> ClientResult<Response<Vec<Project>>> {
        let mut query_args: Vec<(String, String)> = Default::default();
        if include_subgroups {
            query_args.push(("include_subgroups".to_string(), "true".to_string()));
        }

        if let Some(pagination) = pagination {
            pagination.append_to(&mut query_args);
        }

        let url = self.client.url(
            &format!(
                "/groups/{}/projects",
                crate::support::encode_path(group_id)
            ),
            &query_args,
        )?;
        self.client.get(&url, Message::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::Project;

    #[test]
    fn deserialize_project() {
        let project: Project = serde_json::from_str(
            r#"{
                "id": 42,
                "name": "Payments_API",
                "path": "payments-api",
                "path_with_namespace": "acme/payments/payments-api",
                "default_branch": "main",
                "web_url": "https://gitlab.example.com/acme/payments/payments-api",
                "visibility": "private"
            }"#,
        )
        .unwrap();

        assert_eq!(42, project.id);
        assert_eq!("Payments_API", project.name);
        assert_eq!(Some("main".to_string()), project.default_branch);
        assert_eq!(None, project.description);
    }
}
