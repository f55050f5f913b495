pub mod deployments;
pub mod groups;
pub mod pipelines;
pub mod repository_files;
pub mod tags;

// I liked the look of the design from https://github.com/oxidecomputer/third-party-api-clients/tree/main
// Good portion of code lifted from that
use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_HOST: &str = "https://gitlab.com";
const API_PATH: &str = "/api/v4";
const DEFAULT_CLIENT_AGENT: &str = "software-catalog";

pub(crate) mod support {
    use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

    /// GitLab accepts either a numeric id or the URL-encoded path of a project/group/file. The
    /// whole value is a single segment so `/` has to be encoded as well.
    const SEGMENT_SET: &AsciiSet = &CONTROLS
        .add(b' ')
        .add(b'"')
        .add(b'#')
        .add(b'%')
        .add(b'/')
        .add(b'<')
        .add(b'>')
        .add(b'?')
        .add(b'`')
        .add(b'{')
        .add(b'}');

    pub(crate) fn encode_path(pc: &str) -> String {
        utf8_percent_encode(pc, SEGMENT_SET).to_string()
    }
}

#[derive(Debug)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

impl<T> Response<T> {
    pub fn new(status: StatusCode, headers: HeaderMap, body: T) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}

/// Errors returned by the client
#[remain::sorted]
#[derive(Debug, Error)]
pub enum ClientError {
    /// Repository file content was not valid base64
    #[error("base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Generic HTTP Error
    #[error("HTTP Error. Code: {status}, message: {error}")]
    HttpError {
        status: StatusCode,
        headers: HeaderMap,
        error: String,
    },

    /// Errors returned by reqwest
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// Serde JSON parsing error
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// Query string serialization error
    #[error(transparent)]
    UrlEncodedError(#[from] serde_urlencoded::ser::Error),

    /// URL Parsing Error
    #[error(transparent)]
    UrlParserError(#[from] url::ParseError),
}

impl ClientError {
    /// GitLab answers 404 for missing files, projects and refs alike
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::HttpError { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Default)]
pub(crate) struct Message {
    pub body: Option<reqwest::Body>,
    pub content_type: Option<String>,
}

#[derive(Clone, Copy, Default)]
pub enum MediaType {
    /// Return json (the default)
    #[default]
    Json,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaType::Json => write!(f, "application/json"),
        }
    }
}

/// Various forms of authentication credentials supported by GitLab.
#[derive(PartialEq, Clone)]
pub enum Credentials {
    /// CI job token sent as the `JOB-TOKEN` header
    JobToken(String),
    /// OAuth 2.0 access token sent as a bearer token
    OAuthToken(String),
    /// Personal, project or group access token sent as the `PRIVATE-TOKEN` header
    PrivateToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::JobToken(value) => f
                .debug_tuple("Credentials::JobToken")
                .field(&"*".repeat(value.len()))
                .finish(),
            Credentials::OAuthToken(value) => f
                .debug_tuple("Credentials::OAuthToken")
                .field(&"*".repeat(value.len()))
                .finish(),
            Credentials::PrivateToken(value) => f
                .debug_tuple("Credentials::PrivateToken")
                .field(&"*".repeat(value.len()))
                .finish(),
        }
    }
}

/// Offset-based pagination parameters shared by the list endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct OffsetBasedPagination {
    /// Number of results to include per page. GitLab defaults to 20 and caps at 100.
    pub per_page: Option<u32>,
    /// Page of results to retrieve.
    pub page: Option<u32>,
}

impl OffsetBasedPagination {
    pub fn per_page(per_page: u32) -> Self {
        Self {
            per_page: Some(per_page),
            page: None,
        }
    }

    pub(crate) fn append_to(&self, query_args: &mut Vec<(String, String)>) {
        if let Some(per_page) = self.per_page {
            query_args.push(("per_page".to_string(), per_page.to_string()));
        }

        if let Some(page) = self.page {
            query_args.push(("page".to_string(), page.to_string()));
        }
    }
}

/// Entrypoint for interacting with the API client.
#[derive(Clone)]
pub struct Client {
    host: String,
    agent: String,
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("agent", &self.agent)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl Client {
    pub fn new<A, C>(agent: A, credentials: C) -> ClientResult<Self>
    where
        A: Into<String>,
        C: Into<Option<Credentials>>,
    {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            agent: agent.into(),
            client: http,
            credentials: credentials.into(),
        })
    }

    /// Client for gitlab.com authenticated with a private token.
    pub fn with_private_token<T: Into<String>>(token: T) -> ClientResult<Self> {
        Self::new(DEFAULT_CLIENT_AGENT, Credentials::PrivateToken(token.into()))
    }

    /// Point the client at a self-managed instance. Trailing slashes are ignored.
    pub fn with_host<H: AsRef<str>>(mut self, host: H) -> Self {
        self.host = host.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn url(&self, path: &str, query: &[(String, String)]) -> ClientResult<String> {
        let mut url = format!("{}{}{}", self.host, API_PATH, path);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&serde_urlencoded::to_string(query)?);
        }

        Ok(url)
    }

    // TODO: support the Link / x-next-page headers so list calls can walk every page
    async fn request<Out>(
        &self,
        method: http::Method,
        uri: &str,
        message: Message,
        media_type: MediaType,
    ) -> ClientResult<Response<Out>>
    where
        Out: serde::de::DeserializeOwned + 'static + Send,
    {
        let req = self.build_request(method.clone(), uri, message, media_type)?;

        debug!(%method, uri, "sending gitlab request");
        let response = req.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response.bytes().await?;

        if status.is_success() {
            debug!("Received successful response. Read payload.");

            let parsed_response = if status == StatusCode::NO_CONTENT
                || std::any::TypeId::of::<Out>() == std::any::TypeId::of::<()>()
            {
                serde_json::from_str("null")?
            } else {
                serde_json::from_slice::<Out>(&response_body)?
            };
            Ok(Response::new(status, headers, parsed_response))
        } else {
            let error = if response_body.is_empty() {
                ClientError::HttpError {
                    status,
                    headers,
                    error: "empty response".into(),
                }
            } else {
                ClientError::HttpError {
                    status,
                    headers,
                    error: String::from_utf8_lossy(&response_body).into(),
                }
            };
            Err(error)
        }
    }

    pub(crate) async fn get<D>(&self, uri: &str, message: Message) -> ClientResult<Response<D>>
    where
        D: serde::de::DeserializeOwned + 'static + Send,
    {
        self.request(http::Method::GET, uri, message, MediaType::Json)
            .await
    }

    fn build_request(
        &self,
        method: http::Method,
        uri: &str,
        message: Message,
        media_type: MediaType,
    ) -> ClientResult<reqwest::RequestBuilder> {
        let url = uri.parse::<reqwest::Url>()?;

        let mut req = self.client.request(method, url);

        if let Some(content_type) = &message.content_type {
            req = req.header(http::header::CONTENT_TYPE, content_type.clone());
        }

        req = req.header(http::header::USER_AGENT, &*self.agent);
        req = req.header(http::header::ACCEPT, &media_type.to_string());

        req = match &self.credentials {
            Some(Credentials::JobToken(token)) => req.header("JOB-TOKEN", token.as_str()),
            Some(Credentials::PrivateToken(token)) => req.header("PRIVATE-TOKEN", token.as_str()),
            Some(Credentials::OAuthToken(token)) => {
                req.header(http::header::AUTHORIZATION, format!("Bearer {token}"))
            }
            None => req,
        };

        if let Some(body) = message.body {
            req = req.body(body);
        }

        Ok(req)
    }

    pub fn groups(&self) -> groups::Groups {
        groups::Groups::new(self.clone())
    }

    pub fn repository_files(&self) -> repository_files::RepositoryFiles {
        repository_files::RepositoryFiles::new(self.clone())
    }

    pub fn deployments(&self) -> deployments::Deployments {
        deployments::Deployments::new(self.clone())
    }

    pub fn tags(&self) -> tags::Tags {
        tags::Tags::new(self.clone())
    }

    pub fn pipelines(&self) -> pipelines::Pipelines {
        pipelines::Pipelines::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    use super::{support, Client, ClientError, Credentials, OffsetBasedPagination};

    #[test]
    fn encodes_nested_paths_as_a_single_segment() {
        assert_eq!("group%2Fsub%2Fproject", support::encode_path("group/sub/project"));
        assert_eq!("deploy%20file.yml", support::encode_path("deploy file.yml"));
    }

    #[test]
    fn url_includes_api_prefix_and_query() {
        let client = Client::new("test", None)
            .unwrap()
            .with_host("https://gitlab.example.com/");

        let mut query = vec![("ref".to_string(), "main".to_string())];
        OffsetBasedPagination::per_page(10).append_to(&mut query);

        assert_eq!(
            "https://gitlab.example.com/api/v4/projects/1/repository/files/README.md?ref=main&per_page=10",
            client
                .url("/projects/1/repository/files/README.md", &query)
                .unwrap()
        );
    }

    #[test]
    fn credentials_debug_masks_secret() {
        let debug = format!("{:?}", Credentials::PrivateToken("secret".to_string()));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("******"));
    }

    #[test]
    fn not_found_detection() {
        let not_found = ClientError::HttpError {
            status: StatusCode::NOT_FOUND,
            headers: HeaderMap::new(),
            error: "404 File Not Found".to_string(),
        };
        let forbidden = ClientError::HttpError {
            status: StatusCode::FORBIDDEN,
            headers: HeaderMap::new(),
            error: "403 Forbidden".to_string(),
        };

        assert!(not_found.is_not_found());
        assert!(!forbidden.is_not_found());
    }
}
