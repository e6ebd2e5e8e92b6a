//! HTTP edge for the portfolio site: static assets, page rendering
//! fallback, health probe, and an in-process request / visitor metrics
//! pipeline with a text exposition endpoint and a client that turns it
//! back into visitor analytics.

use std::path::PathBuf;
use std::sync::Arc;

pub mod analytics;
pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod render;
pub mod server;
pub mod visitor;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Active or no-op metric store, picked once at start-up.
    pub registry: metrics::SharedRegistry,

    /// Request / duration / visitor instruments registered on `registry`.
    pub instruments: metrics::HttpInstruments,

    /// Visitor classification and country lookup.
    pub filter: visitor::VisitorFilter,

    /// Page renderer used for every route the asset directory misses.
    pub renderer: Arc<dyn render::Renderer>,

    /// Directory holding the built browser assets.
    pub static_dir: PathBuf,

    /// Document handed to the renderer.
    pub document: PathBuf,
}

impl AppState {
    pub fn new(
        registry: metrics::SharedRegistry,
        filter: visitor::VisitorFilter,
        renderer: Arc<dyn render::Renderer>,
        static_dir: PathBuf,
        document: PathBuf,
    ) -> Self {
        let instruments = metrics::HttpInstruments::register(registry.as_ref());
        Self {
            registry,
            instruments,
            filter,
            renderer,
            static_dir,
            document,
        }
    }
}
