//! HTTP routes
//!
//! ```text
//! GET    /device?category=N
//! GET    /device/refresh
//! GET    /device/{id}
//! POST   /device
//! PUT    /device/{id}
//! DELETE /device/{id}
//! POST   /device/{id}/power/{on|off}
//! POST   /lights/wake/{name}
//! POST   /lights/shutdown/{name}
//! GET    /ws
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use roomctl_drivers::PowerAction;
use roomctl_state::{
    Category, DeviceFilter, DeviceId, DevicePatch, DeviceService, NewDevice, RefreshOutcome,
    StateError,
};
use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::broadcaster::Broadcaster;
use crate::error::{handle_rejection, ApiError};
use crate::ws;

/// Shared handles every route needs.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeviceService>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(service: Arc<DeviceService>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            service,
            broadcaster,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

/// All routes, with rejections rendered as JSON.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let list = warp::path("device")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_state(state.clone()))
        .and_then(list_devices);

    let refresh = warp::path("device")
        .and(warp::path!("refresh"))
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(refresh_devices);

    let get = warp::path("device")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_device);

    let create = warp::path("device")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<NewDevice>())
        .and(with_state(state.clone()))
        .and_then(create_device);

    let update = warp::path("device")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::put())
        .and(warp::body::json::<DevicePatch>())
        .and(with_state(state.clone()))
        .and_then(update_device);

    let delete = warp::path("device")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(delete_device);

    let power = warp::path!("device" / String / "power" / String)
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(power_device);

    let lights = warp::path!("lights" / String / String)
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(switch_light);

    let realtime = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_state(state))
        .map(|upgrade: warp::ws::Ws, state: AppState| {
            upgrade.on_upgrade(move |socket| ws::session(socket, state.service, state.broadcaster))
        });

    list.or(refresh)
        .or(get)
        .or(create)
        .or(update)
        .or(delete)
        .or(power)
        .or(lights)
        .or(realtime)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn list_devices(query: ListQuery, state: AppState) -> Result<impl Reply, Rejection> {
    let filter = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(code) => DeviceFilter::by_category(code.parse::<Category>().map_err(ApiError::reject)?),
        None => DeviceFilter::all(),
    };
    let devices = state.service.list(&filter).await.map_err(ApiError::reject)?;
    Ok(warp::reply::json(&devices))
}

async fn refresh_devices(state: AppState) -> Result<impl Reply, Rejection> {
    match state.service.refresh().await.map_err(ApiError::reject)? {
        RefreshOutcome::Completed(report) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({
                "message": format!("Checked {} devices", report.checked),
                "updated": report.updated,
                "failed": report.failed,
            })),
            StatusCode::OK,
        )),
        RefreshOutcome::AlreadyRunning => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "message": "Refresh already running" })),
            StatusCode::ACCEPTED,
        )),
    }
}

async fn get_device(id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let device = state
        .service
        .get(&DeviceId::new(id))
        .await
        .map_err(ApiError::reject)?;
    Ok(warp::reply::json(&device))
}

async fn create_device(new: NewDevice, state: AppState) -> Result<impl Reply, Rejection> {
    let device = state.service.create(new).await.map_err(ApiError::reject)?;
    Ok(warp::reply::with_status(
        warp::reply::json(&device),
        StatusCode::CREATED,
    ))
}

async fn update_device(
    id: String,
    patch: DevicePatch,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let device = state
        .service
        .update(&DeviceId::new(id), patch)
        .await
        .map_err(ApiError::reject)?;
    Ok(warp::reply::json(&device))
}

async fn delete_device(id: String, state: AppState) -> Result<impl Reply, Rejection> {
    state
        .service
        .delete(&DeviceId::new(id))
        .await
        .map_err(ApiError::reject)?;
    Ok(warp::reply::json(&json!({ "message": "Device deleted" })))
}

async fn power_device(id: String, action: String, state: AppState) -> Result<impl Reply, Rejection> {
    let action = match action.as_str() {
        "on" => PowerAction::On,
        "off" => PowerAction::Off,
        _ => {
            return Err(ApiError::reject(StateError::Validation(
                "Action needs to be on or off".to_string(),
            )))
        }
    };
    let new_state = state
        .service
        .power(&DeviceId::new(id), action)
        .await
        .map_err(ApiError::reject)?;
    Ok(warp::reply::json(&json!({ "state": new_state })))
}

async fn switch_light(verb: String, raw_name: String, state: AppState) -> Result<impl Reply, Rejection> {
    // names may contain spaces
    let name = urlencoding::decode(&raw_name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| raw_name.clone());
    let (action, done) = match verb.as_str() {
        "wake" => (PowerAction::On, "on"),
        "shutdown" => (PowerAction::Off, "off"),
        _ => return Err(warp::reject::not_found()),
    };
    state
        .service
        .light_power(&name, action)
        .await
        .map_err(ApiError::reject)?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": format!("{name} successfully turned {done}."),
    })))
}
