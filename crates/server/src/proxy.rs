//! Intercepting HTTP listener.
//!
//! Every request is turned into a [`Request`], handed to the controlling
//! worker and, if the worker does not intercept it, fetched upstream
//! directly. Origin-form targets (`/path`) resolve against the configured
//! origin; absolute-form targets (`http://host/path`) are used as-is so the
//! listener can also act as a forward proxy for the backend hosts.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;
use vokabel_client::fetch::resolve_upstream;
use vokabel_client::{EventOutcome, WorkerEvent};
use vokabel_core::{AppConfig, Destination, Error, Fetch, Request, ResponseSnapshot};

use crate::host::WorkerHost;

pub fn app(host: Arc<WorkerHost>) -> axum::Router {
    axum::Router::new().fallback(forward).with_state(host)
}

async fn forward(
    State(host): State<Arc<WorkerHost>>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes,
) -> Response {
    let request = match build_request(host.config(), &method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match serve(&host, request).await {
        Ok(snapshot) => into_response(snapshot),
        Err(e) => {
            tracing::warn!(%method, %uri, error = %e, "upstream unavailable");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Run the request through the controlling worker, falling back to a plain
/// upstream fetch when nothing intercepts it.
pub(crate) async fn serve(host: &WorkerHost, request: Request) -> Result<ResponseSnapshot, Error> {
    if let Some(worker) = host.worker().await
        && let EventOutcome::Response(Some(response)) = worker.dispatch(WorkerEvent::Fetch(request.clone())).await?
    {
        return Ok(response);
    }
    host.network().fetch(&request).await
}

pub(crate) fn build_request(
    config: &AppConfig, method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes,
) -> Result<Request, Error> {
    let url = if uri.scheme().is_some() {
        Url::parse(&uri.to_string()).map_err(|e| Error::InvalidUrl(format!("{uri}: {e}")))?
    } else {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        resolve_upstream(&origin, target)?
    };

    let destination = headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .map(Destination::from_header)
        .unwrap_or_default();

    let headers = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    Ok(Request { method: method.as_str().to_string(), url, destination, headers, body })
}

pub(crate) fn into_response(snapshot: ResponseSnapshot) -> Response {
    let status = StatusCode::from_u16(snapshot.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(snapshot.body));
    *response.status_mut() = status;

    let out = response.headers_mut();
    for (name, value) in &snapshot.headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                out.append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping invalid response header"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{ORIGIN, host};

    fn config() -> AppConfig {
        AppConfig { origin: ORIGIN.into(), ..AppConfig::default() }
    }

    fn navigation(path: &str) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        build_request(&config(), &Method::GET, &path.parse().unwrap(), &headers, Bytes::new()).unwrap()
    }

    #[test]
    fn test_build_request_origin_form() {
        let uri: Uri = "/vocab/english/voc2_4.json?v=3".parse().unwrap();
        let request = build_request(&config(), &Method::GET, &uri, &HeaderMap::new(), Bytes::new()).unwrap();
        assert_eq!(request.url.as_str(), "https://vokabeln.example.org/vocab/english/voc2_4.json?v=3");
        assert_eq!(request.destination, Destination::Empty);
        assert!(request.is_get());
    }

    #[test]
    fn test_build_request_absolute_form() {
        let uri: Uri = "https://vokabel-db.firebaseio.com/scores.json".parse().unwrap();
        let request = build_request(&config(), &Method::POST, &uri, &HeaderMap::new(), Bytes::from("{}")).unwrap();
        assert_eq!(request.url.host_str(), Some("vokabel-db.firebaseio.com"));
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, Bytes::from("{}"));
    }

    #[test]
    fn test_build_request_reads_destination() {
        assert_eq!(navigation("/overview.html").destination, Destination::Document);
    }

    #[test]
    fn test_build_request_double_slash_stays_on_origin() {
        let uri: Uri = "//vokabel.firebaseio.example/steal?x=1".parse().unwrap();
        let request = build_request(&config(), &Method::GET, &uri, &HeaderMap::new(), Bytes::new()).unwrap();
        assert_eq!(request.url.host_str(), Some("vokabeln.example.org"));
        assert_eq!(request.url.as_str(), "https://vokabeln.example.org//vokabel.firebaseio.example/steal?x=1");
    }

    #[test]
    fn test_into_response_keeps_status_and_headers() {
        let snapshot = ResponseSnapshot::new(503, "Offline").with_header("Content-Type", "text/plain");
        let response = into_response(snapshot);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn test_into_response_drops_invalid_headers() {
        let snapshot = ResponseSnapshot::new(200, "ok").with_header("bad header", "x");
        let response = into_response(snapshot);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
    }

    #[tokio::test]
    async fn test_serve_without_controller_fetches_directly() {
        let (host, _) = host().await;
        let response = serve(&host, navigation("/index.html")).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(host.db().cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_serve_offline_navigation_gets_app_shell() {
        let (host, upstream) = host().await;
        host.boot_worker().await.unwrap();
        upstream.set_offline(true);

        let response = serve(&host, navigation("/irrverbtrainer.html")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from("<html>shell</html>"));
    }

    #[tokio::test]
    async fn test_serve_live_failure_is_an_error() {
        let (host, upstream) = host().await;
        host.boot_worker().await.unwrap();
        upstream.set_offline(true);

        let uri: Uri = "https://vokabel-db.firebaseio.com/scores.json".parse().unwrap();
        let request = build_request(host.config(), &Method::GET, &uri, &HeaderMap::new(), Bytes::new()).unwrap();
        assert!(matches!(serve(&host, request).await, Err(Error::Network(_))));
    }
}
