use crate::core::document::{DocumentError, DocumentStore, VersionedDocument};
use async_trait::async_trait;
use base64::prelude::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Stores documents as files in a GitHub repository via the contents API.
/// The blob sha is the version token.
pub struct GithubDocumentStore {
    base_url: String,
    repo: String,
    branch: String,
    token: String,
    client: reqwest::Client,
}

impl GithubDocumentStore {
    pub fn new(base_url: &str, repo: &str, branch: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("wonfolio/1.0")
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            token: token.to_string(),
            client,
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.base_url, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[derive(Deserialize, Debug)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize, Debug)]
struct UpdateRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct UpdateResponse {
    content: UpdatedContent,
}

#[derive(Deserialize, Debug)]
struct UpdatedContent {
    sha: String,
}

#[async_trait]
impl DocumentStore for GithubDocumentStore {
    #[instrument(name = "GithubFetch", skip(self))]
    async fn fetch(&self, path: &str) -> Result<Option<VersionedDocument>, DocumentError> {
        let url = format!("{}?ref={}", self.contents_url(path), self.branch);
        debug!("Fetching document from {}", url);

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document {} does not exist yet", path);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DocumentError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        let body: ContentsResponse = response.json().await?;
        // The API wraps base64 content at 60 columns
        let encoded: String = body
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| DocumentError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let content = String::from_utf8(bytes).map_err(|e| DocumentError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        Ok(Some(VersionedDocument {
            content,
            version: body.sha,
        }))
    }

    #[instrument(name = "GithubPut", skip(self, content))]
    async fn put(
        &self,
        path: &str,
        content: &str,
        version: Option<&str>,
    ) -> Result<String, DocumentError> {
        let url = self.contents_url(path);
        let request = UpdateRequest {
            message: format!("Update {path}"),
            content: BASE64_STANDARD.encode(content),
            branch: &self.branch,
            sha: version,
        };
        debug!("Writing document to {}", url);

        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body: UpdateResponse = response.json().await?;
                Ok(body.content.sha)
            }
            // 409 for a stale sha, 422 when creating over an existing file
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(DocumentError::Conflict {
                    path: path.to_string(),
                })
            }
            status => Err(DocumentError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GithubDocumentStore {
        GithubDocumentStore::new(&server.uri(), "alice/portfolio-data", "main", "secret")
    }

    #[tokio::test]
    async fn test_fetch_decodes_wrapped_base64() {
        let mock_server = MockServer::start().await;
        let encoded = BASE64_STANDARD.encode(r#"[{"date":"2024-01-02","value":100.0}]"#);
        let wrapped = format!("{}\n{}\n", &encoded[..20], &encoded[20..]);
        Mock::given(method("GET"))
            .and(path("/repos/alice/portfolio-data/contents/history.json"))
            .and(query_param("ref", "main"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc123",
                "content": wrapped,
                "encoding": "base64"
            })))
            .mount(&mock_server)
            .await;

        let doc = store(&mock_server)
            .fetch("history.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, "abc123");
        assert_eq!(doc.content, r#"[{"date":"2024-01-02","value":100.0}]"#);
    }

    #[tokio::test]
    async fn test_fetch_missing_document() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/portfolio-data/contents/portfolio.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        assert!(
            store(&mock_server)
                .fetch("portfolio.json")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/alice/portfolio-data/contents/portfolio.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = store(&mock_server)
            .fetch("portfolio.json")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Document store returned 401 for portfolio.json"
        );
    }

    #[tokio::test]
    async fn test_put_sends_sha_and_returns_new_version() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/alice/portfolio-data/contents/portfolio.json"))
            .and(body_partial_json(serde_json::json!({
                "sha": "old",
                "branch": "main",
                "content": BASE64_STANDARD.encode("[]")
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": {"sha": "new"},
                "commit": {"sha": "c0ffee"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let version = store(&mock_server)
            .put("portfolio.json", "[]", Some("old"))
            .await
            .unwrap();
        assert_eq!(version, "new");
    }

    #[tokio::test]
    async fn test_put_with_stale_sha_is_conflict() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/repos/alice/portfolio-data/contents/portfolio.json"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&mock_server)
            .await;

        let result = store(&mock_server)
            .put("portfolio.json", "[]", Some("stale"))
            .await;
        assert!(matches!(result, Err(DocumentError::Conflict { .. })));
    }
}
