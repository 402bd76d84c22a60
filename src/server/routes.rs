//! HTTP surface
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET / HEAD / OPTIONS | `/api/play/{station}` | container (ADTS) stream |
//! | GET | `/api/play/{station}/pcm` | raw s16le stereo 48 kHz |
//! | GET | `/api/status` | live streams and their listener counts |

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::media::StreamProfile;
use crate::registry::{StationId, StationRegistry};
use crate::session::{client_id, ChannelSink, ClientSession};
use crate::stats::StreamStatus;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Streams served on `/api/play/{station}`
    pub container: Arc<StationRegistry>,
    /// Streams served on `/api/play/{station}/pcm`
    pub pcm: Arc<StationRegistry>,
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/play/{station}",
            get(play_container)
                .head(head_container)
                .options(options_container)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/play/{station}/pcm",
            get(play_pcm)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route("/api/status", get(status))
        .with_state(state)
}

/// Origin address of a request
///
/// Priority: `CF-Connecting-IP`, `X-Real-IP`, first `X-Forwarded-For`
/// entry, then the socket address.
pub fn resolve_client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(ip) = header_value(headers, "cf-connecting-ip") {
        return ip.to_string();
    }
    if let Some(ip) = header_value(headers, "x-real-ip") {
        return ip.to_string();
    }
    if let Some(ip) = header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ip.to_string();
    }
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn play_container(
    State(state): State<AppState>,
    Path(station): Path<String>,
    request: Request,
) -> Response {
    let client_id = request_client_id(&request);
    open_stream(&state.container, StationId::new(station), client_id).await
}

async fn play_pcm(
    State(state): State<AppState>,
    Path(station): Path<String>,
    request: Request,
) -> Response {
    let client_id = request_client_id(&request);
    open_stream(&state.pcm, StationId::new(station), client_id).await
}

async fn head_container(State(state): State<AppState>, Path(station): Path<String>) -> Response {
    let profile = StreamProfile::ContainerPassthrough;
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, profile.content_type())
        .header(header::ACCEPT_RANGES, "none");
    for (name, value) in profile.format_headers(&station, &state.container.config().stream_name_prefix) {
        response = response.header(name, value);
    }
    finish(response, Body::empty())
}

async fn options_container() -> impl IntoResponse {
    (StatusCode::OK, [(header::ALLOW, "GET, HEAD, OPTIONS")])
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn status(State(state): State<AppState>) -> Json<BTreeMap<String, StreamStatus>> {
    let mut streams = state.container.status().await;
    streams.extend(state.pcm.status().await);
    Json(streams)
}

fn request_client_id(request: &Request) -> String {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    client_id(&resolve_client_ip(request.headers(), remote))
}

async fn open_stream(registry: &Arc<StationRegistry>, station: StationId, client_id: String) -> Response {
    let profile = registry.profile();
    tracing::info!(station = %station, profile = %profile, client_id = %client_id, "Play request");

    let stream = match registry.get_or_create(&station).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(station = %station, profile = %profile, error = %e, "Failed to start stream");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let (sink, rx) = ChannelSink::new(profile.client_buffer());
    let session = Arc::new(ClientSession::new(client_id.clone(), sink));
    let cancel = CancellationToken::new();
    let body = SessionBody {
        chunks: ReceiverStream::new(rx),
        _disconnect: cancel.clone().drop_guard(),
    };

    tokio::spawn(async move {
        stream.add_client(session, cancel).await;
        tracing::debug!(client_id = %client_id, "Client session ended");
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, profile.content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header(header::ACCEPT_RANGES, "none");
    for (name, value) in profile.format_headers(station.as_str(), &registry.config().stream_name_prefix) {
        response = response.header(name, value);
    }
    finish(response, Body::from_stream(body))
}

fn finish(builder: axum::http::response::Builder, body: Body) -> Response {
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Response body of one listener
///
/// Dropping it (client went away) cancels the session.
struct SessionBody {
    chunks: ReceiverStream<Bytes>,
    _disconnect: DropGuard,
}

impl Stream for SessionBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.chunks).poll_next(cx).map(|chunk| chunk.map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_client_ip_priority() {
        let remote: SocketAddr = "192.0.2.10:51000".parse().unwrap();

        let all = headers(&[
            ("cf-connecting-ip", "203.0.113.1"),
            ("x-real-ip", "203.0.113.2"),
            ("x-forwarded-for", "203.0.113.3, 10.0.0.1"),
        ]);
        assert_eq!(resolve_client_ip(&all, Some(remote)), "203.0.113.1");

        let no_cdn = headers(&[
            ("x-real-ip", "203.0.113.2"),
            ("x-forwarded-for", "203.0.113.3, 10.0.0.1"),
        ]);
        assert_eq!(resolve_client_ip(&no_cdn, Some(remote)), "203.0.113.2");

        let forwarded = headers(&[("x-forwarded-for", " 203.0.113.3 , 10.0.0.1")]);
        assert_eq!(resolve_client_ip(&forwarded, Some(remote)), "203.0.113.3");

        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(remote)), "192.0.2.10");
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_empty_headers_are_skipped() {
        let map = headers(&[("cf-connecting-ip", ""), ("x-real-ip", "203.0.113.2")]);
        assert_eq!(resolve_client_ip(&map, None), "203.0.113.2");
    }
}
