//! Local REST API over [`MountService`].
//!
//! Every route lives under `/api`. Request bodies are optional JSON; an
//! empty body (or `null`) means "use the defaults".

use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::ServiceError;
use crate::service::{MountAppRequest, MountRequest, MountService};

fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn ok<T: Serialize>(body: &T) -> Response {
    reply(StatusCode::OK, body)
}

/// 400 `{success: false, message, stderr}` for request-level failures.
fn service_error(err: &ServiceError) -> Response {
    let status = if err.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = err.to_string();
    reply(
        status,
        &json!({ "success": false, "message": message, "stderr": message }),
    )
}

// ── Body parsing ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct InvalidBody(String);

impl warp::reject::Reject for InvalidBody {}

fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Default + Send,
{
    warp::body::bytes().and_then(|body: Bytes| async move {
        parse_body::<T>(&body).map_err(|e| warp::reject::custom(InvalidBody(e.to_string())))
    })
}

fn with_service(
    service: MountService,
) -> impl Filter<Extract = (MountService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

// ── Routes ──────────────────────────────────────────────────────────────────

/// All API routes with CORS and JSON error replies applied.
pub fn routes(
    service: MountService,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let api = warp::path("api");

    let check_device = api
        .and(warp::path("check-device"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move { ok(&service.check_device().await) });

    let pair_device = api
        .and(warp::path("pair-device"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move { ok(&service.pair_device().await) });

    let mount = api
        .and(warp::path("mount"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body::<MountRequest>())
        .then(|service: MountService, request: MountRequest| async move {
            ok(&service.mount(&request).await)
        });

    let unmount = api
        .and(warp::path("unmount"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body::<MountRequest>())
        .then(|service: MountService, request: MountRequest| async move {
            ok(&service.unmount(&request).await)
        });

    let one_click = api
        .and(warp::path("one-click-mount"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body::<MountRequest>())
        .then(|service: MountService, request: MountRequest| async move {
            ok(&service.one_click_mount(&request).await)
        });

    let device_info = api
        .and(warp::path("device-info"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move {
            match service.device_info().await {
                Ok(info) => ok(&info),
                Err(e) => ok(&json!({ "error": e.to_string() })),
            }
        });

    let open_folder = api
        .and(warp::path("open-folder"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body::<MountRequest>())
        .then(|service: MountService, request: MountRequest| async move {
            match service.open_folder(&request).await {
                Ok(result) => ok(&result),
                Err(e) => service_error(&e),
            }
        });

    let is_mounted = api
        .and(warp::path("is-mounted"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service.clone()))
        .and(json_body::<MountRequest>())
        .map(|service: MountService, request: MountRequest| {
            ok(&json!({ "mounted": service.is_mounted(&request) }))
        });

    let get_logs = api
        .and(warp::path("logs"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move {
            match service.logs().await {
                Ok(entries) => ok(&entries),
                Err(e) => reply(StatusCode::BAD_REQUEST, &json!({ "error": e.to_string() })),
            }
        });

    let clear_logs = api
        .and(warp::path("logs"))
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move {
            match service.clear_logs().await {
                Ok(()) => ok(&json!({ "success": true })),
                Err(e) => reply(
                    StatusCode::BAD_REQUEST,
                    &json!({ "success": false, "error": e.to_string() }),
                ),
            }
        });

    let health = api
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .map(|| ok(&json!({ "status": "ok" })));

    let list_apps = api
        .and(warp::path("list-apps"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service.clone()))
        .then(|service: MountService| async move {
            let outcome = service.list_apps().await;
            if outcome.result.success {
                ok(&json!({
                    "success": true,
                    "apps": outcome.raw_lines(),
                    "entries": outcome.listing.entries,
                }))
            } else {
                reply(
                    StatusCode::BAD_REQUEST,
                    &json!({ "success": false, "error": outcome.result.output() }),
                )
            }
        });

    let mount_app = api
        .and(warp::path("mount-app"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(service))
        .and(json_body::<MountAppRequest>())
        .then(|service: MountService, request: MountAppRequest| async move {
            match service.mount_app(&request).await {
                Ok(result) => ok(&result),
                Err(e) => service_error(&e),
            }
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    check_device
        .or(pair_device)
        .unify()
        .or(mount)
        .unify()
        .or(unmount)
        .unify()
        .or(one_click)
        .unify()
        .or(device_info)
        .unify()
        .or(open_folder)
        .unify()
        .or(is_mounted)
        .unify()
        .or(get_logs)
        .unify()
        .or(clear_logs)
        .unify()
        .or(health)
        .unify()
        .or(list_apps)
        .unify()
        .or(mount_app)
        .unify()
        .with(cors)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(InvalidBody(message)) = err.find::<InvalidBody>() {
        return Ok(reply(
            StatusCode::BAD_REQUEST,
            &json!({ "success": false, "message": message }),
        ));
    }
    if err.is_not_found() {
        return Ok(reply(StatusCode::NOT_FOUND, &json!({ "error": "Not found" })));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(reply(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed" }),
        ));
    }
    if let Some(forbidden) = err.find::<warp::filters::cors::CorsForbidden>() {
        return Ok(reply(
            StatusCode::FORBIDDEN,
            &json!({ "error": forbidden.to_string() }),
        ));
    }

    tracing::warn!(rejection = ?err, "unhandled rejection");
    Ok(reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": "Internal server error" }),
    ))
}

/// Serve until `cancel` fires.
pub async fn run_server(
    service: MountService,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<()> {
    let (bound, server) = warp::serve(routes(service))
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(%bound, "listening");
    server.await;
    tracing::info!("server stopped");
    Ok(())
}
