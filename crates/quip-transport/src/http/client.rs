//! Web API client.

use async_trait::async_trait;
use quip_core::{
    ApiError, ApiResult, Channel, DirectConversation, MessageEventData, Page, PostEphemeral,
    PostMessage, PostedMessage, SessionInfo, User, WebApi,
};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

/// Base URL of the public Web API.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Listing page size requested from the platform.
const PAGE_LIMIT: &str = "999";

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    team_id: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<MessageEventData>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse<T> {
    #[serde(default = "Vec::new")]
    channels: Vec<T>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    #[serde(default)]
    members: Vec<User>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

// =============================================================================
// WebClient
// =============================================================================

/// A [`WebApi`] over HTTP, authenticated with a bot token.
///
/// Write methods send JSON bodies; read methods send query strings. Every
/// answer with `ok: false` becomes [`ApiError::Platform`].
#[derive(Clone)]
pub struct WebClient {
    http: Client,
    api_base: String,
    token: String,
}

impl WebClient {
    /// Creates a client for the public Web API.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), token)
    }

    /// Creates a client on top of a configured `reqwest` client.
    pub fn with_http_client(http: Client, token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into().trim().to_string(),
        }
    }

    /// Points the client at another API base URL.
    pub fn with_api_base(mut self, api_base: impl AsRef<str>) -> Self {
        self.api_base = api_base.as_ref().trim_end_matches('/').to_string();
        self
    }

    /// Identifies the bot and its workspace (`auth.test`).
    pub async fn auth_test(&self) -> ApiResult<SessionInfo> {
        let auth: AuthTestResponse = self.post("auth.test", &self.token, None).await?;
        Ok(SessionInfo {
            user_id: auth.user_id,
            user_name: auth.user,
            team_id: auth.team_id,
            team_name: auth.team,
            url: auth.url,
        })
    }

    /// Requests a socket-mode URL (`apps.connections.open`).
    ///
    /// Authenticated with the app-level token, not the bot token.
    pub async fn open_connection(&self, app_token: &str) -> ApiResult<String> {
        let opened: OpenConnectionResponse =
            self.post("apps.connections.open", app_token.trim(), None).await?;
        Ok(opened.url)
    }

    fn method_url(&self, method: &str) -> ApiResult<Url> {
        Url::parse(&format!("{}/{method}", self.api_base))
            .map_err(|e| ApiError::Other(format!("invalid API URL for {method}: {e}")))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let mut request = self.http.post(self.method_url(method)?).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        trace!(method, "Calling Web API");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        Self::decode(method, response).await
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        let mut url = self.method_url(method)?;
        url.query_pairs_mut().extend_pairs(query);

        trace!(method, "Calling Web API");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Http(format!(
                "{method} returned HTTP {}: {text}",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        check_ok(method, body)
    }
}

impl std::fmt::Debug for WebClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// Turns an `ok: false` answer into a platform error, else decodes it.
fn check_ok<T: DeserializeOwned>(method: &str, body: Value) -> ApiResult<T> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        debug!(method, error, "Web API call failed");
        return Err(ApiError::platform(method, error));
    }
    Ok(serde_json::from_value(body)?)
}

fn page<T>(items: Vec<T>, metadata: ResponseMetadata) -> Page<T> {
    Page {
        items,
        next_cursor: metadata.next_cursor.filter(|c| !c.is_empty()),
    }
}

#[async_trait]
impl WebApi for WebClient {
    async fn post_message(&self, message: &PostMessage) -> ApiResult<PostedMessage> {
        let body = serde_json::to_value(message)?;
        self.post("chat.postMessage", &self.token, Some(body)).await
    }

    async fn post_ephemeral(&self, message: &PostEphemeral) -> ApiResult<()> {
        let body = serde_json::to_value(message)?;
        let _: Value = self
            .post("chat.postEphemeral", &self.token, Some(body))
            .await?;
        Ok(())
    }

    async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> ApiResult<()> {
        let body = json!({ "channel": channel, "timestamp": timestamp, "name": name });
        let _: Value = self.post("reactions.add", &self.token, Some(body)).await?;
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: &str,
        timestamp: &str,
    ) -> ApiResult<Option<MessageEventData>> {
        let history: HistoryResponse = self
            .get(
                "conversations.history",
                &[
                    ("channel", channel),
                    ("latest", timestamp),
                    ("inclusive", "true"),
                    ("limit", "1"),
                ],
            )
            .await?;

        // History entries do not name their conversation.
        Ok(history.messages.into_iter().next().map(|mut message| {
            message.channel = channel.to_string();
            message
        }))
    }

    async fn list_channels(&self, cursor: Option<&str>) -> ApiResult<Page<Channel>> {
        let mut query = vec![
            ("types", "public_channel,private_channel"),
            ("exclude_archived", "true"),
            ("limit", PAGE_LIMIT),
        ];
        query.extend(cursor.map(|c| ("cursor", c)));

        let listed: ChannelsResponse<Channel> = self.get("conversations.list", &query).await?;
        Ok(page(listed.channels, listed.response_metadata))
    }

    async fn list_direct_conversations(
        &self,
        cursor: Option<&str>,
    ) -> ApiResult<Page<DirectConversation>> {
        let mut query = vec![("types", "im"), ("limit", PAGE_LIMIT)];
        query.extend(cursor.map(|c| ("cursor", c)));

        let listed: ChannelsResponse<DirectConversation> =
            self.get("conversations.list", &query).await?;
        Ok(page(listed.channels, listed.response_metadata))
    }

    async fn list_users(&self, cursor: Option<&str>) -> ApiResult<Page<User>> {
        let mut query = vec![("limit", PAGE_LIMIT)];
        query.extend(cursor.map(|c| ("cursor", c)));

        let listed: MembersResponse = self.get("users.list", &query).await?;
        Ok(page(listed.members, listed.response_metadata))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer) -> WebClient {
        WebClient::new("xoxb-test").with_api_base(server.base_url())
    }

    #[tokio::test]
    async fn test_auth_test_builds_session() {
        let server = MockServer::start_async().await;
        let auth = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth.test")
                    .header("authorization", "Bearer xoxb-test");
                then.status(200).json_body(json!({
                    "ok": true, "user_id": "UBOT", "user": "quip",
                    "team_id": "T1", "team": "Acme", "url": "https://acme.example/"
                }));
            })
            .await;

        let session = client(&server).auth_test().await.unwrap();

        assert_eq!(session.user_id, "UBOT");
        assert_eq!(session.team_name, "Acme");
        auth.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_connection_uses_app_token() {
        let server = MockServer::start_async().await;
        let open = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/apps.connections.open")
                    .header("authorization", "Bearer xapp-test");
                then.status(200)
                    .json_body(json!({ "ok": true, "url": "wss://socket.example/link" }));
            })
            .await;

        let url = client(&server).open_connection("xapp-test").await.unwrap();

        assert_eq!(url, "wss://socket.example/link");
        open.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_message_sends_thread_and_blocks() {
        let server = MockServer::start_async().await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage").json_body(json!({
                    "channel": "C1",
                    "text": "hi",
                    "blocks": [{ "type": "divider" }],
                    "thread_ts": "1.0"
                }));
                then.status(200)
                    .json_body(json!({ "ok": true, "channel": "C1", "ts": "2.0" }));
            })
            .await;

        let posted = client(&server)
            .post_message(&PostMessage {
                channel: "C1".into(),
                text: "hi".into(),
                blocks: vec![json!({ "type": "divider" })],
                thread_ts: Some("1.0".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(posted.ts, "2.0");
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_platform_error_names_method() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/reactions.add");
                then.status(200)
                    .json_body(json!({ "ok": false, "error": "already_reacted" }));
            })
            .await;

        let err = client(&server)
            .add_reaction("C1", "1.0", "tada")
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            ApiError::Platform { method, error } if method == "reactions.add" && error == "already_reacted"
        ));
    }

    #[tokio::test]
    async fn test_http_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postEphemeral");
                then.status(500).body("oops");
            })
            .await;

        let err = client(&server)
            .post_ephemeral(&PostEphemeral {
                channel: "C1".into(),
                user: "U1".into(),
                text: "psst".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Http(_)));
    }

    #[tokio::test]
    async fn test_fetch_message_fills_channel() {
        let server = MockServer::start_async().await;
        let history = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/conversations.history")
                    .query_param("channel", "C1")
                    .query_param("latest", "5.5")
                    .query_param("inclusive", "true")
                    .query_param("limit", "1");
                then.status(200).json_body(json!({
                    "ok": true,
                    "messages": [{ "ts": "5.5", "text": "original", "user": "U2" }]
                }));
            })
            .await;

        let message = client(&server)
            .fetch_message("C1", "5.5")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(message.channel, "C1");
        assert_eq!(message.text.as_deref(), Some("original"));
        history.assert_async().await;
    }

    #[tokio::test]
    async fn test_listings_report_cursor() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/conversations.list")
                    .query_param("types", "im");
                then.status(200).json_body(json!({
                    "ok": true,
                    "channels": [{ "id": "D1", "user": "U1" }],
                    "response_metadata": { "next_cursor": "" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/users.list").query_param("cursor", "p2");
                then.status(200).json_body(json!({
                    "ok": true,
                    "members": [{ "id": "U1", "name": "ada" }],
                    "response_metadata": { "next_cursor": "p3" }
                }));
            })
            .await;

        let client = client(&server);
        let dms = client.list_direct_conversations(None).await.unwrap();
        let users = client.list_users(Some("p2")).await.unwrap();

        assert_eq!(dms.items[0].user, "U1");
        assert_eq!(dms.next_cursor, None);
        assert_eq!(users.items[0].name, "ada");
        assert_eq!(users.next_cursor.as_deref(), Some("p3"));
    }
}
