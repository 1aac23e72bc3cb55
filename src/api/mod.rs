//! HTTP detection API.
//!
//! Routes:
//! - `POST /api/v1/detect`: multipart upload (field `video`), detection result
//! - `POST /api/v1/detect/enhanced`: same plus pose analysis
//! - `GET /api/v1/model/info`: model parameters
//! - `GET /api/v1/categories`: behavior categories with descriptions
//! - `GET /health`: liveness
//!
//! The accept loop runs on its own thread and hands each connection to a
//! fresh thread, up to `max_concurrent_requests` at once; connections past
//! that cap are answered 503 on the accept thread. Requests serialize on the
//! shared engine's model locks.

mod http;
mod multipart;
mod upload;

pub use upload::{save_upload, secure_filename};

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::engine::SharedEngine;
use http::{finish_connection, read_request, set_timeouts, write_json_response, HttpRequest};

const SERVICE_NAME: &str = "RRB Detection ML Service";
const VIDEO_FIELD: &str = "video";
const BUSY_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A request failure with the status code it maps to.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            message: "Endpoint not found".to_string(),
            detail: None,
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: 405,
            message: "Method not allowed".to_string(),
            detail: None,
        }
    }

    pub fn payload_too_large(limit: u64) -> Self {
        Self {
            status: 413,
            message: format!(
                "File too large. Maximum size is {}MB",
                limit / (1024 * 1024)
            ),
            detail: None,
        }
    }

    pub fn busy() -> Self {
        Self {
            status: 503,
            message: "Server busy, retry later".to_string(),
            detail: None,
        }
    }

    /// Unexpected failure. The message stays generic; the error chain is kept
    /// as detail for debug deployments.
    pub fn internal(err: anyhow::Error) -> Self {
        log::error!("request failed: {:#}", err);
        Self {
            status: 500,
            message: "Internal server error".to_string(),
            detail: Some(format!("{:#}", err)),
        }
    }

    fn body(&self, expose_details: bool) -> Value {
        let mut body = json!({"success": false, "error": self.message});
        if expose_details {
            if let Some(detail) = &self.detail {
                body["detail"] = Value::String(detail.clone());
            }
        }
        body
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Stop accepting connections. In-flight requests finish on their own
    /// threads.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

struct ApiContext {
    cfg: ServiceConfig,
    engine: Arc<SharedEngine>,
}

pub struct ApiServer {
    cfg: ServiceConfig,
    engine: Arc<SharedEngine>,
}

impl ApiServer {
    pub fn new(cfg: ServiceConfig, engine: Arc<SharedEngine>) -> Self {
        Self { cfg, engine }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .api_addr
            .parse()
            .map_err(|e| anyhow!("invalid api address '{}': {}", self.cfg.api_addr, e))?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let ctx = Arc::new(ApiContext {
            cfg: self.cfg,
            engine: self.engine,
        });
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, ctx, shutdown_thread) {
                log::error!("detection api stopped: {}", err);
            }
        });
        log::info!("detection api listening on {}", addr);

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

/// Releases one in-flight slot when the handler thread finishes.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_api(listener: TcpListener, ctx: Arc<ApiContext>, shutdown: Arc<AtomicBool>) -> Result<()> {
    let in_flight = Arc::new(AtomicUsize::new(0));
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                // Only this thread increments, so check-then-add cannot overshoot.
                let active = in_flight.load(Ordering::SeqCst);
                if active >= ctx.cfg.max_concurrent_requests {
                    log::warn!(
                        "rejecting connection from {}: {} requests in flight",
                        peer,
                        active
                    );
                    if let Err(err) = reject_busy(stream, &ctx) {
                        log::debug!("busy response to {} failed: {}", peer, err);
                    }
                    continue;
                }
                in_flight.fetch_add(1, Ordering::SeqCst);
                let guard = InFlightGuard(in_flight.clone());
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    let _guard = guard;
                    if let Err(err) = handle_connection(stream, &ctx) {
                        log::warn!("connection from {} failed: {}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn reject_busy(mut stream: TcpStream, ctx: &ApiContext) -> Result<()> {
    stream.set_nonblocking(false)?;
    set_timeouts(&stream)?;
    let err = ApiError::busy();
    write_json_response(&mut stream, err.status, &err.body(ctx.cfg.expose_error_details))?;
    finish_connection(&mut stream, BUSY_DRAIN_TIMEOUT);
    Ok(())
}

fn handle_connection(mut stream: TcpStream, ctx: &ApiContext) -> Result<()> {
    stream.set_nonblocking(false)?;
    set_timeouts(&stream)?;
    let outcome = read_request(&mut stream, ctx.cfg.max_upload_size)
        .and_then(|request| route(&request, ctx));
    let written = match outcome {
        Ok(body) => write_json_response(&mut stream, 200, &body),
        Err(err) => {
            if err.status < 500 {
                log::info!("request rejected ({}): {}", err.status, err.message);
            }
            write_json_response(&mut stream, err.status, &err.body(ctx.cfg.expose_error_details))
        }
    };
    finish_connection(&mut stream, DRAIN_TIMEOUT);
    written
}

fn route(request: &HttpRequest, ctx: &ApiContext) -> Result<Value, ApiError> {
    let allowed = match request.path.as_str() {
        "/health" | "/api/v1/model/info" | "/api/v1/categories" => "GET",
        "/api/v1/detect" | "/api/v1/detect/enhanced" => "POST",
        _ => return Err(ApiError::not_found()),
    };
    if request.method != allowed {
        return Err(ApiError::method_not_allowed());
    }
    match request.path.as_str() {
        "/health" => Ok(health()),
        "/api/v1/model/info" => model_info(ctx),
        "/api/v1/categories" => Ok(categories(&ctx.cfg)),
        "/api/v1/detect" => detect(request, ctx, false),
        _ => detect(request, ctx, true),
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn health() -> Value {
    json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": timestamp(),
    })
}

fn model_info(ctx: &ApiContext) -> Result<Value, ApiError> {
    let engine = ctx.engine.get().map_err(ApiError::internal)?;
    Ok(json!({
        "success": true,
        "model_info": engine.model_info(),
    }))
}

fn category_description(category: &str) -> &'static str {
    match category {
        "hand_flapping" => "Repetitive hand or arm movements",
        "head_banging" => "Repetitive head hitting or banging movements",
        "head_nodding" => "Repetitive head nodding movements",
        "spinning" => "Repetitive spinning or rotating movements",
        "atypical_hand_movements" => "Other atypical hand movements",
        "normal" => "No restricted or repetitive behaviors detected",
        _ => "",
    }
}

fn categories(cfg: &ServiceConfig) -> Value {
    let descriptions: serde_json::Map<String, Value> = cfg
        .categories
        .iter()
        .map(|c| (c.clone(), Value::String(category_description(c).to_string())))
        .collect();
    json!({
        "success": true,
        "categories": cfg.categories,
        "descriptions": descriptions,
    })
}

fn detect(request: &HttpRequest, ctx: &ApiContext, enhanced: bool) -> Result<Value, ApiError> {
    let boundary = request
        .header("content-type")
        .and_then(multipart::boundary)
        .ok_or_else(|| ApiError::bad_request("No video file provided"))?;
    let parts = multipart::parse(&request.body, &boundary)
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?;
    let part = multipart::file_part(&parts, VIDEO_FIELD)
        .ok_or_else(|| ApiError::bad_request("No video file provided"))?;
    let client_name = part.filename.as_deref().unwrap_or_default();
    if client_name.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !ctx.cfg.is_allowed_file(client_name) {
        return Err(ApiError::bad_request(format!(
            "Invalid file type. Allowed types: {}",
            ctx.cfg.allowed_extensions.join(", ")
        )));
    }

    let filename = secure_filename(client_name);
    let upload = save_upload(&ctx.cfg.upload_dir, &filename, part.data)
        .map_err(ApiError::internal)?;
    let engine = ctx.engine.get().map_err(ApiError::internal)?;
    log::info!(
        "analyzing upload '{}' ({} bytes{})",
        filename,
        part.data.len(),
        if enhanced { ", enhanced" } else { "" }
    );

    let (result, pose_analysis) = if enhanced {
        let enhanced = engine
            .detect_with_pose_analysis(upload.path())
            .map_err(ApiError::internal)?;
        (enhanced.result, Some(enhanced.pose_analysis))
    } else {
        let result = engine.detect(upload.path()).map_err(ApiError::internal)?;
        (result, None)
    };
    drop(upload);

    let mut body = json!({
        "success": true,
        "timestamp": timestamp(),
        "filename": filename,
        "detection": {
            "detected": result.detected,
            "primary_behavior": result.primary_behavior,
            "confidence": result.confidence,
            "behaviors": result.behaviors,
        },
        "metadata": {
            "video_duration": result.video_info.duration,
            "video_fps": result.video_info.fps,
            "sequences_analyzed": result.total_sequences_analyzed,
            "sequences_with_detections": result.sequences_with_detections,
        },
    });
    if let Some(pose_analysis) = pose_analysis {
        body["pose_analysis"] = serde_json::to_value(pose_analysis)
            .map_err(|e| ApiError::internal(e.into()))?;
    }
    Ok(body)
}
