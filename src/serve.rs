//! Development server with live reload support.
//!
//! A small `tiny_http` server over the destination tree:
//!
//! - Static file serving, `index.html` resolution for directories
//! - The configured `page404` served with status 404 for unknown paths
//! - File watching and incremental rebuilds on a separate thread
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  owns the Site   │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Serve files             site.update(changed)
//! └─────────────────────────────────────────────┘
//!                    │
//!                    ▼
//!              build.dest (_site/)
//! ```

use crate::{
    log,
    site::Site,
    watch::{WatchMessage, watch_for_changes_blocking},
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the destination tree of an already built `site`.
///
/// The site moves to the watcher thread when `serve.watch` is on. Blocks
/// until Ctrl+C.
pub fn serve_site(site: Site) -> Result<()> {
    let serve = site.config().serve.clone();
    let root = site.paths().dest_root().to_path_buf();
    let page404 = site.paths().dest(&serve.page404);

    let interface: IpAddr = serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", serve.interface))?;
    let (server, addr) = try_bind_port(interface, serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let (tx, rx) = mpsc::channel();

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    let tx_for_signal = tx.clone();
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        tx_for_signal.send(WatchMessage::Shutdown).ok();
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    let watcher = serve.watch.then(|| {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(site, tx, &rx) {
                log!("watch"; "{err:#}");
            }
        })
    });

    // Handle requests in main thread (blocks until Ctrl+C)
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &root, &page404) {
            log!("serve"; "request error: {e}");
        }
    }

    if let Some(handle) = watcher {
        handle.join().ok();
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_err = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Map a request URL to a file under `root`.
///
/// 1. Exact file match → that file
/// 2. Directory with `index.html` → the index
/// 3. Anything else, or a path escaping `root` → `None`
fn resolve_request(root: &Path, url: &str) -> Option<PathBuf> {
    // Decode URL-encoded characters (e.g., %20 → space)
    let decoded = urlencoding::decode(url).map(std::borrow::Cow::into_owned).ok()?;

    // Strip query string and fragment (cache-busting `?t=123`)
    let path = decoded.split(['?', '#']).next().unwrap_or_default();

    let mut local = root.to_path_buf();
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." {
            return None;
        }
        local.push(segment);
    }

    if local.is_file() {
        return Some(local);
    }
    let index = local.join("index.html");
    index.is_file().then_some(index)
}

/// Handle a single HTTP request.
fn handle_request(request: Request, root: &Path, page404: &Path) -> Result<()> {
    match resolve_request(root, request.url()) {
        Some(path) => serve_file(request, &path, StatusCode(200)),
        None if page404.is_file() => serve_file(request, page404, StatusCode(404)),
        None => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header value `{value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path, status: StatusCode) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content)
        .with_status_code(status)
        .with_header(content_type(guess_content_type(path))?);

    request.respond(response)?;
    Ok(())
}

/// Serve a plain 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let body = "404 Not Found";
    let response = Response::new(
        StatusCode(404),
        vec![content_type("text/plain")?],
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}
