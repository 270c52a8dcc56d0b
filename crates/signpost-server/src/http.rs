//! HTTP redirect front end.
//!
//! Each accepted connection carries exactly one request. The request target's
//! query string names the key (`username`) and the caller's fallback URL
//! (`pageUrl`); the answer is a `302` to the resolved URL or a `502` with a
//! plain-text explanation. The connection is closed after the response.

use axum::extract::{RawQuery, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use signpost_core::{
    CacheStore, ConnectionHandle, DurableConnector, Key, LookupResult, ResolveError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, trace, warn};
use url::Url;

pub const USERNAME_PARAM: &str = "username";
pub const FALLBACK_PARAM: &str = "pageUrl";

/// Upper bound on the size of a request head. Larger heads get a `431`.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;
/// Time a client gets to deliver its request head before the worker drops it.
pub const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

const USAGE: &str = "Correct format: /?username=<username>&pageUrl=<fallback URL>";

/// Connection-level limits applied to every accepted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub header_read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
        }
    }
}

/// A worker's handle, reachable from the router it serves with.
///
/// Only the worker's own in-flight connection ever locks it.
pub type SharedHandle<D, C> = Arc<Mutex<ConnectionHandle<D, C>>>;

/// The outcome of one redirect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub reason: &'static str,
    pub location: Option<String>,
    pub body: String,
}

impl Reply {
    pub fn redirect(location: &str) -> Self {
        Self {
            status: StatusCode::FOUND,
            reason: "Found",
            location: Some(location.to_string()),
            body: format!("Redirecting to {location}\r\n"),
        }
    }

    pub fn incorrect_query() -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            reason: "Incorrect query",
            location: None,
            body: format!("Incorrect query.\r\n{USAGE}\r\n"),
        }
    }

    pub fn connection_error(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            reason: "Database connection error",
            location: None,
            body: format!("Database connection error: {message}\r\n"),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let location = self
            .location
            .as_deref()
            .map(|location| HeaderValue::from_bytes(location.as_bytes()));
        let location = match location {
            Some(Ok(location)) => Some(location),
            Some(Err(e)) => {
                debug!(error = %e, "redirect target is not a valid header value");
                return Reply::incorrect_query().into_response();
            }
            None => None,
        };

        let mut response = (
            self.status,
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
            self.body,
        )
            .into_response();
        if let Some(location) = location {
            response.headers_mut().insert(LOCATION, location);
        }
        response
            .extensions_mut()
            .insert(ReasonPhrase::from_static(self.reason.as_bytes()));
        response
    }
}

/// The parameters of a redirect request. A repeated name keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectQuery {
    pub username: String,
    pub fallback: String,
}

impl RedirectQuery {
    /// Extracts both parameters from a raw query string; `None` when either
    /// is absent.
    pub fn parse(query: &str) -> Option<Self> {
        let mut username = None;
        let mut fallback = None;

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                USERNAME_PARAM => username = Some(value.into_owned()),
                FALLBACK_PARAM => fallback = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self {
            username: username?,
            fallback: fallback?,
        })
    }
}

/// An acceptable redirect target: an absolute URL with a host and no
/// whitespace or control characters.
pub fn is_valid_url(candidate: &str) -> bool {
    if candidate
        .bytes()
        .any(|b| b.is_ascii_control() || b.is_ascii_whitespace())
    {
        return false;
    }

    match Url::parse(candidate) {
        Ok(url) => url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Decides the reply for one request query.
///
/// A stored URL that is missing or unusable is replaced by the caller's
/// fallback, which is then cached under the key. Durable-store failures are
/// reported without touching the cache.
pub async fn respond<D, C>(query: Option<&str>, handle: &mut ConnectionHandle<D, C>) -> Reply
where
    D: DurableConnector,
    C: CacheStore,
{
    let Some(params) = query.and_then(RedirectQuery::parse) else {
        debug!(query = query.unwrap_or_default(), "request is missing parameters");
        return Reply::incorrect_query();
    };

    let key = match Key::new(params.username) {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "request carries an invalid key");
            return Reply::incorrect_query();
        }
    };

    match handle.resolve(&key).await {
        LookupResult::Found(url) if is_valid_url(url) => return Reply::redirect(url),
        LookupResult::Found(url) => {
            warn!(key = %key, url, "stored URL is invalid, using fallback");
        }
        LookupResult::NotFound => {
            trace!(key = %key, "no stored URL, using fallback");
        }
        LookupResult::Error(ResolveError::ConnectFailed(message)) => {
            return Reply::connection_error(&message);
        }
        LookupResult::Error(ResolveError::Invalid(message)) => {
            debug!(key = %key, error = %message, "lookup rejected");
            return Reply::incorrect_query();
        }
    }

    if !is_valid_url(&params.fallback) {
        debug!(key = %key, fallback = %params.fallback, "fallback URL is invalid");
        return Reply::incorrect_query();
    }

    handle.remember(&key, &params.fallback).await;
    Reply::redirect(&params.fallback)
}

/// Routes every `GET` to [`respond`]; other methods get a `405`.
pub fn router<D, C>(handle: SharedHandle<D, C>) -> Router
where
    D: DurableConnector,
    C: CacheStore,
{
    Router::new()
        .route("/", get(redirect::<D, C>))
        .route("/{*path}", get(redirect::<D, C>))
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

async fn redirect<D, C>(
    State(handle): State<SharedHandle<D, C>>,
    RawQuery(query): RawQuery,
) -> Reply
where
    D: DurableConnector,
    C: CacheStore,
{
    let mut handle = handle.lock().await;
    respond(query.as_deref(), &mut handle).await
}

/// Serves the single request carried by `stream`, then closes it.
///
/// A client that has not delivered its request head within
/// `settings.header_read_timeout` is disconnected.
pub async fn serve_connection<S>(stream: S, app: Router, settings: &HttpSettings)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(settings.header_read_timeout)
        .keep_alive(false)
        .max_buf_size(MAX_HEAD_BYTES)
        .title_case_headers(true);

    let service = TowerToHyperService::new(app);
    if let Err(e) = builder.serve_connection(TokioIo::new(stream), service).await {
        debug!(error = %e, "connection ended with an error");
    }
}
