use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{Client, ClientResult, Message, Response};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryFile {
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub blob_id: String,
    #[serde(default)]
    pub commit_id: String,
    #[serde(default)]
    pub last_commit_id: String,
}

impl RepositoryFile {
    /// File content as text. GitLab returns base64 unless `encoding` says otherwise. Bytes that
    /// are not valid UTF-8 are replaced rather than rejected.
    pub fn decoded_content(&self) -> ClientResult<String> {
        if !self.encoding.is_empty() && self.encoding != "base64" {
            return Ok(self.content.clone());
        }

        // GitLab wraps long base64 payloads
        let compact: String = self.content.split_whitespace().collect();
        let bytes = STANDARD.decode(compact)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub struct RepositoryFiles {
    pub client: Client,
}

impl RepositoryFiles {
    pub fn new(client: Client) -> Self {
        RepositoryFiles { client }
    }

    /// Get information on a file in the repository, including its base64 encoded content.
    ///
    /// This function performs a `GET` to `/projects/:id/repository/files/:file_path`
    /// From https://docs.gitlab.com/api/repository_files/#get-file-from-repository
    ///
    /// **Parameters**
    ///
    /// * project_id - The ID or URL-encoded path of the project
    /// * file_path - Path of the file relative to the repository root
    /// * reference - The name of branch, tag or commit
    pub async fn get_file(
        &self,
        project_id: &str,
        file_path: &str,
        reference: &str,
    ) -> ClientResult<Response<RepositoryFile>> {
        let query_args = vec![("ref".to_string(), reference.to_string())];

        let url = self.client.url(
            &format!(
                "/projects/{}/repository/files/{}",
                crate::support::encode_path(project_id),
                crate::support::encode_path(file_path),
            ),
            &query_args,
        )?;
        self.client.get(&url, Message::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::RepositoryFile;

    #[test]
    fn decodes_base64_content() {
        let file: RepositoryFile = serde_json::from_str(
            r#"{
                "file_name": "Dockerfile",
                "file_path": "Dockerfile",
                "size": 28,
                "encoding": "base64",
                "content": "RlJPTSBnb2xhbmc6MS4yMQpG\nUk9NIHNjcmF0Y2g=",
                "ref": "main",
                "blob_id": "79f7bbd25901e8334750839545a9bd021f0e4c83",
                "commit_id": "d5a3ff139356ce33e37e73add446f16869741b50",
                "last_commit_id": "570e7b2abdd848b95f2f578043fc23bd6f6fd24d"
            }"#,
        )
        .unwrap();

        assert_eq!("main", file.reference);
        assert_eq!("FROM golang:1.21\nFROM scratch", file.decoded_content().unwrap());
    }

    #[test]
    fn invalid_base64_is_an_error() {
        let file = RepositoryFile {
            file_name: "README.md".to_string(),
            file_path: "README.md".to_string(),
            encoding: "base64".to_string(),
            content: "not base64!".to_string(),
            ..Default::default()
        };

        assert!(file.decoded_content().is_err());
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        // "FROM caf\xe9" with a Latin-1 e-acute
        let file = RepositoryFile {
            file_name: "Dockerfile".to_string(),
            file_path: "Dockerfile".to_string(),
            encoding: "base64".to_string(),
            content: "RlJPTSBjYWbp".to_string(),
            ..Default::default()
        };

        assert_eq!("FROM caf\u{FFFD}", file.decoded_content().unwrap());
    }
}
