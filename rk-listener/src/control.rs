//! Control API client
//!
//! REST calls toward the broadcast server: initial state fetch, playlist
//! fetch, login, and owner commands. Dispatch is fire-and-forget; every
//! request produces exactly one [`ControlReply`] that comes back into the
//! session loop. Nothing is retried and nothing is applied optimistically.

use crate::error::{Error, Result};
use crate::session::Input;
use crate::state::Credential;
use rk_common::events::{PlayerState, QueueEntry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

/// Control request toward the REST API
#[derive(Clone, PartialEq)]
pub enum ControlRequest {
    FetchPlayerState,
    FetchQueue,
    Login { username: String, password: String },
    Play,
    Pause,
    Next,
    Prev,
    SetVolume(f32),
    AddTrack(String),
}

impl std::fmt::Debug for ControlRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlRequest::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ControlRequest::SetVolume(v) => write!(f, "SetVolume({})", v),
            ControlRequest::AddTrack(url) => write!(f, "AddTrack({})", url),
            other => write!(f, "{}", other.kind().label()),
        }
    }
}

/// Request kind without payload, carried by replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    FetchPlayerState,
    FetchQueue,
    Login,
    Play,
    Pause,
    Next,
    Prev,
    SetVolume,
    AddTrack,
}

impl ControlKind {
    /// Notice title and log label
    pub fn label(&self) -> &'static str {
        match self {
            ControlKind::FetchPlayerState => "Player",
            ControlKind::FetchQueue => "Playlist",
            ControlKind::Login => "Login",
            ControlKind::Play => "Play",
            ControlKind::Pause => "Pause",
            ControlKind::Next => "Next",
            ControlKind::Prev => "Prev",
            ControlKind::SetVolume => "Volume",
            ControlKind::AddTrack => "Add",
        }
    }
}

impl ControlRequest {
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlRequest::FetchPlayerState => ControlKind::FetchPlayerState,
            ControlRequest::FetchQueue => ControlKind::FetchQueue,
            ControlRequest::Login { .. } => ControlKind::Login,
            ControlRequest::Play => ControlKind::Play,
            ControlRequest::Pause => ControlKind::Pause,
            ControlRequest::Next => ControlKind::Next,
            ControlRequest::Prev => ControlKind::Prev,
            ControlRequest::SetVolume(_) => ControlKind::SetVolume,
            ControlRequest::AddTrack(_) => ControlKind::AddTrack,
        }
    }
}

/// Successful control response
#[derive(Clone, PartialEq)]
pub enum ControlResponse {
    /// Command acknowledged
    Ack,
    PlayerState(PlayerState),
    Queue(Vec<QueueEntry>),
    Token(Credential),
}

impl std::fmt::Debug for ControlResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlResponse::Ack => write!(f, "Ack"),
            ControlResponse::PlayerState(state) => f.debug_tuple("PlayerState").field(state).finish(),
            ControlResponse::Queue(queue) => write!(f, "Queue({} entries)", queue.len()),
            ControlResponse::Token(credential) => f.debug_tuple("Token").field(credential).finish(),
        }
    }
}

/// Outcome of one control request, delivered as [`Input::Control`]
#[derive(Debug, Clone, PartialEq)]
pub struct ControlReply {
    pub kind: ControlKind,
    /// Error rendered for display
    pub result: std::result::Result<ControlResponse, String>,
}

/// Sends control requests without waiting for them
pub trait ControlDispatcher {
    fn dispatch(&mut self, request: ControlRequest, credential: Option<&Credential>);
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// reqwest-backed control client
pub struct HttpControlClient {
    client: reqwest::Client,
    base_url: Url,
    tx: mpsc::UnboundedSender<Input>,
}

impl HttpControlClient {
    pub fn new(client: reqwest::Client, base_url: Url, tx: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            client,
            base_url,
            tx,
        }
    }
}

impl ControlDispatcher for HttpControlClient {
    fn dispatch(&mut self, request: ControlRequest, credential: Option<&Credential>) {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let token = credential.cloned();
        let tx = self.tx.clone();
        let kind = request.kind();
        debug!("Dispatching {:?}", request);

        tokio::spawn(async move {
            let result = execute(&client, &base_url, request, token.as_ref())
                .await
                .map_err(|e| {
                    warn!("{} request failed: {}", kind.label(), e);
                    e.to_string()
                });
            let _ = tx.send(Input::Control(ControlReply { kind, result }));
        });
    }
}

/// Run one request to completion
pub async fn execute(
    client: &reqwest::Client,
    base_url: &Url,
    request: ControlRequest,
    token: Option<&Credential>,
) -> Result<ControlResponse> {
    match request {
        ControlRequest::FetchPlayerState => {
            let state: PlayerState =
                send_json(client.get(endpoint(base_url, "/api/player/state")?), token).await?;
            state.validate().map_err(Error::InvalidResponse)?;
            Ok(ControlResponse::PlayerState(state))
        }
        ControlRequest::FetchQueue => {
            let queue: Vec<QueueEntry> =
                send_json(client.get(endpoint(base_url, "/api/playlist")?), token).await?;
            Ok(ControlResponse::Queue(queue))
        }
        ControlRequest::Login { username, password } => {
            let body = LoginBody {
                username: &username,
                password: &password,
            };
            let reply: LoginResponse = send_json(
                client.post(endpoint(base_url, "/api/auth/login")?).json(&body),
                None,
            )
            .await?;
            Ok(ControlResponse::Token(Credential::new(reply.token)))
        }
        ControlRequest::Play => post_command(client, base_url, "/api/player/play", None, token).await,
        ControlRequest::Pause => post_command(client, base_url, "/api/player/pause", None, token).await,
        ControlRequest::Next => post_command(client, base_url, "/api/player/next", None, token).await,
        ControlRequest::Prev => post_command(client, base_url, "/api/player/prev", None, token).await,
        ControlRequest::SetVolume(volume) => {
            let body = json!({ "volume": volume });
            post_command(client, base_url, "/api/player/volume", Some(body), token).await
        }
        ControlRequest::AddTrack(url) => {
            let body = json!({ "url": url });
            post_command(client, base_url, "/api/playlist/add", Some(body), token).await
        }
    }
}

/// Join an absolute API path onto the configured base
pub fn endpoint(base_url: &Url, path: &str) -> Result<Url> {
    Ok(base_url.join(path)?)
}

async fn post_command(
    client: &reqwest::Client,
    base_url: &Url,
    path: &str,
    body: Option<serde_json::Value>,
    token: Option<&Credential>,
) -> Result<ControlResponse> {
    let mut builder = client.post(endpoint(base_url, path)?);
    if let Some(body) = body {
        builder = builder.json(&body);
    }
    // Response body ({ok: true} or empty) carries nothing we use
    send(builder, token).await?;
    Ok(ControlResponse::Ack)
}

async fn send_json<T: serde::de::DeserializeOwned>(
    builder: reqwest::RequestBuilder,
    token: Option<&Credential>,
) -> Result<T> {
    let response = send(builder, token).await?;
    Ok(response.json::<T>().await?)
}

async fn send(
    builder: reqwest::RequestBuilder,
    token: Option<&Credential>,
) -> Result<reqwest::Response> {
    let builder = match token {
        Some(token) => builder.bearer_auth(token.as_str()),
        None => builder,
    };
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = if text.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text.trim().to_string()
    };
    Err(Error::Control {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let base = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            endpoint(&base, "/api/player/state").unwrap().as_str(),
            "http://localhost:8080/api/player/state"
        );

        let nested = Url::parse("https://radio.example/rk/").unwrap();
        assert_eq!(
            endpoint(&nested, "/api/playlist").unwrap().as_str(),
            "https://radio.example/api/playlist"
        );
    }

    #[test]
    fn test_request_debug_hides_password() {
        let request = ControlRequest::Login {
            username: "dj".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", request);
        assert!(rendered.contains("dj"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(format!("{:?}", ControlRequest::Next), "Next");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let client = reqwest::Client::new();
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let result = execute(&client, &base, ControlRequest::Play, None).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }
}
