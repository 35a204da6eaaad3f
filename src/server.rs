//! Webhook HTTP server

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Form, MatchedPath, Multipart, Path, Query, State},
    http::{header, HeaderMap, Method, Request},
    middleware::{self, Next},
    response::{Html, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use serde::Deserialize;
use tracing::info;

use crate::auth;
use crate::config::HttpConfig;
use crate::error::RelayError;
use crate::pages;
use crate::relay::Relay;
use crate::webhook::WebhookEvent;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub http: Arc<HttpConfig>,
    pub relay: Arc<Relay>,
}

/// Request fields of the message routes, from the query string or a form body
#[derive(Debug, Default, Deserialize)]
pub struct MessageParams {
    chat_id: Option<String>,
    msg: Option<String>,
    shared_secret: Option<String>,
    md5: Option<String>,
}

impl MessageParams {
    /// Form fields take precedence over query fields.
    fn merge(query: Self, form: Option<Self>) -> Self {
        let Some(form) = form else {
            return query;
        };
        Self {
            chat_id: form.chat_id.or(query.chat_id),
            msg: form.msg.or(query.msg),
            shared_secret: form.shared_secret.or(query.shared_secret),
            md5: form.md5.or(query.md5),
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "chat_id" => Some(&mut self.chat_id),
            "msg" => Some(&mut self.msg),
            "shared_secret" => Some(&mut self.shared_secret),
            "md5" => Some(&mut self.md5),
            _ => None,
        }
    }
}

/// Message fields sent in the request body.
///
/// Urlencoded and multipart bodies are accepted. A request without a body
/// yields `None`; any other body is a decode error.
struct FormFields(Option<MessageParams>);

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = RelayError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET || req.method() == Method::HEAD {
            return Ok(Self(None));
        }

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| RelayError::decode(format!("invalid multipart body: {}", e)))?;
            return read_multipart(multipart).await.map(|p| Self(Some(p)));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(params) = Form::<MessageParams>::from_request(req, state)
                .await
                .map_err(|e| RelayError::decode(format!("invalid form body: {}", e)))?;
            return Ok(Self(Some(params)));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| RelayError::decode(format!("unreadable body: {}", e)))?;
        if body.trim_ascii().is_empty() {
            Ok(Self(None))
        } else {
            Err(RelayError::decode(format!(
                "unsupported body content type '{}', send a form",
                content_type
            )))
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<MessageParams, RelayError> {
    let mut params = MessageParams::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::decode(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let Some(slot) = params.slot(&name) else {
            continue;
        };
        if slot.is_some() {
            return Err(RelayError::decode(format!("duplicate field `{}`", name)));
        }
        let value = field
            .text()
            .await
            .map_err(|e| RelayError::decode(format!("invalid multipart field `{}`: {}", name, e)))?;
        *slot = Some(value);
    }
    Ok(params)
}

pub fn router(state: AppState) -> Router {
    let routes: Vec<(&str, MethodRouter<AppState>)> = vec![
        ("/chats/{secret}/", get(list_chats)),
        ("/chat_message/{secret}/{chat_id}/", get(chat_message_form)),
        ("/message/", get(send_message).post(send_message)),
        (
            "/message/{chat_id}/",
            get(send_message_to_chat).post(send_message_to_chat),
        ),
        (
            "/message/{chat_id}/{secret}/",
            get(send_message_with_secret).post(send_message_with_secret),
        ),
        ("/msg2/", get(send_signed_message).post(send_signed_message)),
        ("/github-post-commit/{chat_id}/{secret}/", post(github_post_commit)),
        ("/teamcity/{chat_id}/{secret}/", post(teamcity_build)),
    ];

    let mut app = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check));

    // Serve each route with and without the trailing slash; webhook senders
    // do not follow redirects for POST bodies.
    for (path, method_router) in routes {
        app = app
            .route(path, method_router.clone())
            .route(path.trim_end_matches('/'), method_router);
    }

    app.layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn run_server(
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = state.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Webhook server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    Ok(())
}

/// Logs route templates rather than raw paths, which carry shared secrets.
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "<unmatched>".to_string());

    let response = next.run(req).await;

    info!("HTTP {} {} -> {}", method, route, response.status());
    response
}

fn require_secret(state: &AppState, provided: &str) -> Result<(), RelayError> {
    if auth::authorize(provided, &state.http.shared_secret) {
        Ok(())
    } else {
        Err(RelayError::Unauthorized)
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(pages::index(&state.http.host, state.http.port))
}

async fn list_chats(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> Result<Html<String>, RelayError> {
    require_secret(&state, &secret)?;
    let chats = state.relay.open_chats().await?;
    Ok(Html(pages::chats(&chats, &secret)))
}

async fn chat_message_form(
    State(state): State<AppState>,
    Path((secret, chat_id)): Path<(String, String)>,
) -> Result<Html<String>, RelayError> {
    require_secret(&state, &secret)?;
    Ok(Html(pages::chat_message(&chat_id, &secret)))
}

async fn relay_message(
    state: &AppState,
    chat_id: Option<String>,
    secret: Option<String>,
    params: MessageParams,
) -> Result<&'static str, RelayError> {
    let secret = secret.or(params.shared_secret).unwrap_or_default();
    require_secret(state, &secret)?;

    let event = WebhookEvent::message(params.msg)?;
    let chat_id = chat_id.or(params.chat_id);
    state
        .relay
        .dispatch(chat_id.as_deref(), &event.summary())
        .await?;
    Ok("OK")
}

async fn send_message(
    State(state): State<AppState>,
    Query(query): Query<MessageParams>,
    FormFields(form): FormFields,
) -> Result<&'static str, RelayError> {
    let params = MessageParams::merge(query, form);
    relay_message(&state, None, None, params).await
}

async fn send_message_to_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(query): Query<MessageParams>,
    FormFields(form): FormFields,
) -> Result<&'static str, RelayError> {
    let params = MessageParams::merge(query, form);
    relay_message(&state, Some(chat_id), None, params).await
}

async fn send_message_with_secret(
    State(state): State<AppState>,
    Path((chat_id, secret)): Path<(String, String)>,
    Query(query): Query<MessageParams>,
    FormFields(form): FormFields,
) -> Result<&'static str, RelayError> {
    let params = MessageParams::merge(query, form);
    relay_message(&state, Some(chat_id), Some(secret), params).await
}

/// `/msg2/`: the caller signs the message with `md5(secret + msg)`
async fn send_signed_message(
    State(state): State<AppState>,
    Query(query): Query<MessageParams>,
    FormFields(form): FormFields,
) -> Result<&'static str, RelayError> {
    let params = MessageParams::merge(query, form);

    let signature = params.md5.as_deref().unwrap_or_default();
    let text = params.msg.as_deref().unwrap_or_default();
    if !auth::authorize_md5(signature, &state.http.shared_secret, text) {
        return Err(RelayError::Unauthorized);
    }

    let event = WebhookEvent::message(params.msg)?;
    state
        .relay
        .dispatch(params.chat_id.as_deref(), &event.summary())
        .await?;
    Ok("OK")
}

async fn github_post_commit(
    State(state): State<AppState>,
    Path((chat_id, secret)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, RelayError> {
    require_secret(&state, &secret)?;

    // Legacy service hooks send no event header and only fire on pushes
    match headers.get("x-github-event").and_then(|v| v.to_str().ok()) {
        None | Some("push") => {}
        Some("ping") => {
            info!("GitHub ping for chat {}, hook is set up", chat_id);
            return Ok("OK");
        }
        Some(other) => {
            return Err(RelayError::decode(format!(
                "unsupported GitHub event '{}', only push is relayed",
                other
            )));
        }
    }

    let event = WebhookEvent::github(&body)?;
    state.relay.dispatch(Some(chat_id.as_str()), &event.summary()).await?;
    Ok("OK")
}

async fn teamcity_build(
    State(state): State<AppState>,
    Path((chat_id, secret)): Path<(String, String)>,
    body: Bytes,
) -> Result<&'static str, RelayError> {
    require_secret(&state, &secret)?;
    let event = WebhookEvent::teamcity(&body)?;
    state.relay.dispatch(Some(chat_id.as_str()), &event.summary()).await?;
    Ok("OK")
}
