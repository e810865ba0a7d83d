//! REST collaborators of the admin client.
//!
//! The chat view never depends on these. They back the terminal commands
//! (`/users`, `/kick`, `/updates`) and device registration.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from REST collaborators.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: StatusCode, url: String },

    /// The configured base URL cannot carry a path.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// Rejected before sending.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// An entry of the update feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntry {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// Title and content of an update being created or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateDraft {
    pub title: String,
    pub content: String,
}

impl UpdateDraft {
    /// Trim both fields; neither may end up empty.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Empty`] naming the first blank field.
    pub fn new(title: &str, content: &str) -> Result<Self, ServiceError> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(ServiceError::Empty("title"));
        }
        if content.is_empty() {
            return Err(ServiceError::Empty("content"));
        }
        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }
}

/// A user currently present in the shared space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedUser {
    pub nickname: String,
    #[serde(default)]
    pub character_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRegistration<'a> {
    user_id: &'a str,
    token: &'a str,
}

/// Announcement feed shown to players.
#[async_trait]
pub trait UpdateFeed: Send + Sync {
    async fn list(&self) -> Result<Vec<UpdateEntry>, ServiceError>;
    async fn create(&self, draft: &UpdateDraft) -> Result<(), ServiceError>;
    /// Replace an entry, returning the stored version.
    async fn update(&self, id: i64, draft: &UpdateDraft) -> Result<UpdateEntry, ServiceError>;
    async fn delete(&self, id: i64) -> Result<(), ServiceError>;
}

/// Who is connected right now.
#[async_trait]
pub trait UserRoster: Send + Sync {
    async fn connected(&self) -> Result<Vec<ConnectedUser>, ServiceError>;
    /// Force a user out of the space.
    async fn remove(&self, nickname: &str) -> Result<(), ServiceError>;
}

/// Push notification device registration.
#[async_trait]
pub trait PushRegistry: Send + Sync {
    async fn register(&self, user_id: &str, token: &str) -> Result<(), ServiceError>;
}

/// `reqwest`-backed implementation of every collaborator.
#[derive(Debug, Clone)]
pub struct HttpServices {
    client: Client,
    base_url: Url,
}

impl HttpServices {
    /// Create a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ServiceError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ServiceError> {
        let url = self.url(segments)?;
        debug!(method = %method, url = %url, "API request");
        Ok(self.client.request(method, url))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            warn!(status = %status, url = %url, "API request failed");
            return Err(ServiceError::Status { status, url });
        }
        Ok(response)
    }
}

#[async_trait]
impl UpdateFeed for HttpServices {
    async fn list(&self) -> Result<Vec<UpdateEntry>, ServiceError> {
        let request = self.request(Method::GET, &["api", "npc", "getUpdates"])?;
        Ok(self.execute(request).await?.json().await?)
    }

    async fn create(&self, draft: &UpdateDraft) -> Result<(), ServiceError> {
        let request = self
            .request(Method::POST, &["api", "npc", "setUpdate"])?
            .json(draft);
        self.execute(request).await?;
        Ok(())
    }

    async fn update(&self, id: i64, draft: &UpdateDraft) -> Result<UpdateEntry, ServiceError> {
        let id = id.to_string();
        let request = self
            .request(Method::PUT, &["api", "npc", "updateUpdate", &id])?
            .json(draft);
        Ok(self.execute(request).await?.json().await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let id = id.to_string();
        let request = self.request(Method::DELETE, &["api", "npc", "deleteUpdate", &id])?;
        self.execute(request).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRoster for HttpServices {
    async fn connected(&self) -> Result<Vec<ConnectedUser>, ServiceError> {
        let request = self.request(Method::GET, &["api", "member", "connected"])?;
        Ok(self.execute(request).await?.json().await?)
    }

    async fn remove(&self, nickname: &str) -> Result<(), ServiceError> {
        let request = self.request(Method::DELETE, &["api", "member", nickname])?;
        self.execute(request).await?;
        Ok(())
    }
}

#[async_trait]
impl PushRegistry for HttpServices {
    async fn register(&self, user_id: &str, token: &str) -> Result<(), ServiceError> {
        let request = self
            .request(Method::POST, &["api", "notification", "register"])?
            .json(&PushRegistration { user_id, token });
        self.execute(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn services() -> HttpServices {
        HttpServices::new("http://127.0.0.1:5000", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_building() {
        let services = services();
        assert_eq!(
            services.url(&["api", "member", "connected"]).unwrap().as_str(),
            "http://127.0.0.1:5000/api/member/connected"
        );
        assert_eq!(
            services.url(&["api", "member", "a/b c"]).unwrap().as_str(),
            "http://127.0.0.1:5000/api/member/a%2Fb%20c"
        );
    }

    #[test]
    fn test_base_url_with_path() {
        let services = HttpServices::new("https://admin.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            services.url(&["api", "npc", "getUpdates"]).unwrap().as_str(),
            "https://admin.example/api/npc/getUpdates"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpServices::new("not a url", Duration::from_secs(1)),
            Err(ServiceError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpServices::new("mailto:ops@example.com", Duration::from_secs(1)),
            Err(ServiceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_update_draft_validation() {
        let draft = UpdateDraft::new("  Patch 1.2 ", " Fixes ").unwrap();
        assert_eq!(draft.title, "Patch 1.2");
        assert_eq!(draft.content, "Fixes");
        assert!(matches!(UpdateDraft::new(" ", "x"), Err(ServiceError::Empty("title"))));
        assert!(matches!(UpdateDraft::new("x", ""), Err(ServiceError::Empty("content"))));
    }

    #[test]
    fn test_payload_shapes() {
        let users: Vec<ConnectedUser> =
            serde_json::from_str(r#"[{"nickname":"A","characterId":3},{"nickname":"B"}]"#).unwrap();
        assert_eq!(users[0].character_id, 3);
        assert_eq!(users[1].character_id, 0);

        let registration = serde_json::to_value(PushRegistration {
            user_id: "device-1",
            token: "tok",
        })
        .unwrap();
        assert_eq!(registration, serde_json::json!({"userId": "device-1", "token": "tok"}));
    }

    async fn stub() -> (MockServer, HttpServices) {
        let server = MockServer::start().await;
        let services = HttpServices::new(&server.uri(), Duration::from_secs(5)).unwrap();
        (server, services)
    }

    #[tokio::test]
    async fn test_update_feed_requests() {
        let (server, services) = stub().await;
        let draft = UpdateDraft::new("Patch", "Fixes").unwrap();
        let stored = serde_json::json!({"id": 7, "title": "Patch", "content": "Fixes"});

        Mock::given(method("POST"))
            .and(path("/api/npc/setUpdate"))
            .and(body_json(serde_json::json!({"title": "Patch", "content": "Fixes"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/npc/updateUpdate/7"))
            .and(body_json(serde_json::json!({"title": "Patch", "content": "Fixes"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(&stored))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/npc/deleteUpdate/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/npc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([stored])))
            .expect(1)
            .mount(&server)
            .await;

        services.create(&draft).await.unwrap();
        let updated = services.update(7, &draft).await.unwrap();
        assert_eq!(updated.id, 7);
        assert_eq!(updated.date, None);
        services.delete(7).await.unwrap();
        assert_eq!(services.list().await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_roster_and_push_requests() {
        let (server, services) = stub().await;

        Mock::given(method("GET"))
            .and(path("/api/member/connected"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"nickname": "ops", "characterId": 2}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/member/ops"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/notification/register"))
            .and(body_json(serde_json::json!({"userId": "admin", "token": "tok-1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let users = services.connected().await.unwrap();
        assert_eq!(
            users,
            vec![ConnectedUser {
                nickname: "ops".into(),
                character_id: 2
            }]
        );
        services.remove("ops").await.unwrap();
        services.register("admin", "tok-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status() {
        let (server, services) = stub().await;
        Mock::given(method("DELETE"))
            .and(path("/api/member/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        match services.remove("ghost").await {
            Err(ServiceError::Status { status, url }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(url.ends_with("/api/member/ghost"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Port 9 (discard) is closed on test machines.
        let services = HttpServices::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            UserRoster::connected(&services).await,
            Err(ServiceError::Request(_))
        ));
    }
}
