//! HTTP front-end.
//!
//! Serves the fixed index and message pages, static files below the site
//! root, and hands every posted body to a [`SubmissionSink`].
//!
//! | Request            | Response                                        |
//! |--------------------|-------------------------------------------------|
//! | `GET /`            | `index.html`, 200                               |
//! | `GET /message`     | `message.html`, 200                             |
//! | `GET /<path>`      | the file if it exists below the root, else 404  |
//! | `POST /<any path>` | body relayed, 302 to `/`                        |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Router;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::relay::{SubmissionSink, UdpRelay};
use crate::shutdown::Shutdown;

/// Document served for `/`.
pub const INDEX_DOCUMENT: &str = "index.html";
/// Document served for `/message`.
pub const MESSAGE_DOCUMENT: &str = "message.html";
/// Document served with every 404.
pub const ERROR_DOCUMENT: &str = "error.html";

const HTML: &str = "text/html";
const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// A request the front-end could not answer normally.
#[derive(Debug, Error)]
pub enum FrontendError {
    /// A POST arrived without a `Content-Length` header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// The `Content-Length` header is not a byte count.
    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength {
        /// Header value as received.
        value: String,
    },

    /// The request body could not be read in full.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// A document or static file could not be read.
    #[error("failed to read {path}: {source}")]
    Document {
        /// File that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl FrontendError {
    /// Status code sent for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingContentLength => StatusCode::LENGTH_REQUIRED,
            Self::InvalidContentLength { .. } | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Document { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FrontendError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        (status, self.to_string()).into_response()
    }
}

/// The directory static content is served from.
#[derive(Debug, Clone)]
pub struct Site {
    root: PathBuf,
}

impl Site {
    /// Open a site rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or is not a directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|err| {
            Error::config(format!("http.root {} is not accessible: {err}", root.display()))
        })?;
        if !canonical.is_dir() {
            return Err(Error::config(format!(
                "http.root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root: canonical })
    }

    /// Get the canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a regular file below the root.
    ///
    /// The path is percent-decoded and resolved with symlinks followed.
    /// Anything that does not exist, is not a regular file, or resolves
    /// outside the root yields `None`.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let relative = decoded.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        let resolved = self.root.join(relative).canonicalize().ok()?;
        if !resolved.starts_with(&self.root) {
            warn!("Rejected path escaping the site root: {request_path}");
            return None;
        }
        resolved.is_file().then_some(resolved)
    }

    async fn document(
        &self,
        name: &str,
        status: StatusCode,
    ) -> std::result::Result<Response, FrontendError> {
        serve_file(&self.root.join(name), status, HTML).await
    }
}

async fn serve_file(
    path: &Path,
    status: StatusCode,
    content_type: &'static str,
) -> std::result::Result<Response, FrontendError> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|source| FrontendError::Document {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((status, [(header::CONTENT_TYPE, content_type)], body).into_response())
}

#[derive(Debug, Clone)]
struct AppState {
    site: Arc<Site>,
    sink: Arc<dyn SubmissionSink>,
}

/// Build the front-end router.
pub fn router(site: Site, sink: Arc<dyn SubmissionSink>) -> Router {
    let state = AppState {
        site: Arc::new(site),
        sink,
    };

    Router::new()
        .route("/", fixed_page(index))
        .route("/message", fixed_page(message))
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn fixed_page<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: axum::handler::Handler<T, AppState>,
    T: 'static,
{
    get(handler).post(submit).fallback(unsupported)
}

async fn index(State(state): State<AppState>) -> std::result::Result<Response, FrontendError> {
    state.site.document(INDEX_DOCUMENT, StatusCode::OK).await
}

async fn message(State(state): State<AppState>) -> std::result::Result<Response, FrontendError> {
    state.site.document(MESSAGE_DOCUMENT, StatusCode::OK).await
}

async fn fallback(
    state: State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Response, FrontendError> {
    match method {
        Method::GET | Method::HEAD => static_file(state, uri).await,
        Method::POST => submit(state, headers, body).await,
        _ => Ok(unsupported().await),
    }
}

async fn static_file(
    State(state): State<AppState>,
    uri: Uri,
) -> std::result::Result<Response, FrontendError> {
    match state.site.resolve(uri.path()) {
        Some(path) => {
            let content_type = mime_guess::from_path(&path)
                .first_raw()
                .unwrap_or(FALLBACK_CONTENT_TYPE);
            debug!("Serving {} as {content_type}", path.display());
            serve_file(&path, StatusCode::OK, content_type).await
        }
        None => {
            debug!("No file for {}", uri.path());
            state
                .site
                .document(ERROR_DOCUMENT, StatusCode::NOT_FOUND)
                .await
        }
    }
}

fn content_length(headers: &HeaderMap) -> std::result::Result<usize, FrontendError> {
    let value = headers
        .get(header::CONTENT_LENGTH)
        .ok_or(FrontendError::MissingContentLength)?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| FrontendError::InvalidContentLength {
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> std::result::Result<Response, FrontendError> {
    let length = content_length(&headers)?;
    let payload = to_bytes(body, length)
        .await
        .map_err(|err| FrontendError::Body(err.to_string()))?;
    if payload.len() != length {
        return Err(FrontendError::Body(format!(
            "expected {length} bytes, got {}",
            payload.len()
        )));
    }

    info!("Received submission of {length} bytes");
    if let Err(err) = state.sink.send(&payload).await {
        error!("{err}");
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, "/")]).into_response())
}

async fn unsupported() -> Response {
    StatusCode::NOT_IMPLEMENTED.into_response()
}

/// The HTTP front-end bound to its listening socket.
#[derive(Debug)]
pub struct FrontEnd {
    listener: TcpListener,
    router: Router,
}

impl FrontEnd {
    /// Bind the front-end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, site: Site, sink: Arc<dyn SubmissionSink>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            component: "front-end",
            addr,
            source,
        })?;
        Ok(Self {
            listener,
            router: router(site, sink),
        })
    }

    /// Bind the front-end with a UDP relay to the configured collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the site root or relay address is invalid, or the
    /// listening address cannot be bound.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let site = Site::open(&config.http.root)?;
        let relay = UdpRelay::new(config.relay_addr()?);
        Self::bind(config.http_addr(), site, Arc::new(relay)).await
    }

    /// Get the address the front-end is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        info!("Starting HTTP server on {}", self.local_addr()?);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        info!("HTTP server interrupted, shutting down");
        Ok(())
    }
}
