//! Static file hosting for requests no route claimed.
//!
//! - `/sitemap.xml` and `/robots.txt` come from the public directory in
//!   every mode, each with its own not-found message.
//! - In production, files under the built frontend are served and any other
//!   `GET`/`HEAD` receives the SPA entry document so client-side routing
//!   can take over.
//! - Everything else is a 404.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::{
    body::{Body, HttpBody},
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::ServerConfig;
use crate::error::AppError;

/// A well-known document served from the public directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicDocument {
    Sitemap,
    Robots,
}

impl PublicDocument {
    /// The document addressed by `path`, if any.
    #[must_use]
    pub fn for_path(path: &str) -> Option<Self> {
        match path {
            "/sitemap.xml" => Some(Self::Sitemap),
            "/robots.txt" => Some(Self::Robots),
            _ => None,
        }
    }

    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap.xml",
            Self::Robots => "robots.txt",
        }
    }

    /// Name used in the 404 message, e.g. `Robots.txt not found`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sitemap => "Sitemap",
            Self::Robots => "Robots.txt",
        }
    }
}

/// Serves the public documents and, in production, the built frontend.
#[derive(Debug, Clone)]
pub struct StaticGateway {
    public_dir: PathBuf,
    /// `Some` only in production.
    assets: Option<SpaAssets>,
}

#[derive(Debug, Clone)]
struct SpaAssets {
    root: PathBuf,
    entry: PathBuf,
}

impl StaticGateway {
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let assets = config.environment.is_production().then(|| SpaAssets {
            root: config.static_asset_root.clone(),
            entry: config.entry_document(),
        });
        Self {
            public_dir: config.public_dir.clone(),
            assets,
        }
    }

    /// Whether built assets and the SPA fallback are served.
    #[must_use]
    pub const fn serves_assets(&self) -> bool {
        self.assets.is_some()
    }

    /// Answer a request that matched no route.
    pub async fn serve(&self, request: Request) -> Response {
        let readable = matches!(*request.method(), Method::GET | Method::HEAD);
        if !readable {
            return route_not_found();
        }

        if let Some(document) = PublicDocument::for_path(request.uri().path()) {
            return self.serve_public(document, request).await;
        }

        match &self.assets {
            Some(assets) => serve_spa(assets, request).await,
            None => route_not_found(),
        }
    }

    async fn serve_public(&self, document: PublicDocument, request: Request) -> Response {
        let path = self.public_dir.join(document.file_name());

        if !is_file(&path).await {
            tracing::debug!(path = %path.display(), "Public document missing");
            return public_not_found(document);
        }

        stream_public(document, &path, request).await
    }
}

/// Stream a public document that was present when checked.
async fn stream_public(document: PublicDocument, path: &Path, request: Request) -> Response {
    let response = oneshot(ServeFile::new(path), request).await;
    // Removed between the check and the read.
    if response.status() == StatusCode::NOT_FOUND {
        tracing::warn!(path = %path.display(), "Public document disappeared while serving");
        return public_not_found(document);
    }
    response
}

fn public_not_found(document: PublicDocument) -> Response {
    AppError::NotFound(document.label().to_string()).into_response()
}

async fn serve_spa(assets: &SpaAssets, request: Request) -> Response {
    let service = ServeDir::new(&assets.root).fallback(ServeFile::new(&assets.entry));
    let response = oneshot(service, request).await;

    if response.status() == StatusCode::NOT_FOUND {
        tracing::error!(entry = %assets.entry.display(), "SPA entry document missing");
        return route_not_found();
    }
    response
}

async fn oneshot<S, B>(service: S, request: Request) -> Response
where
    S: tower::Service<Request, Response = axum::http::Response<B>, Error = Infallible>,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    service
        .oneshot(request)
        .await
        .map_or_else(|never| match never {}, |response| response.map(Body::new))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

fn route_not_found() -> Response {
    AppError::NotFound("Route".to_string()).into_response()
}
