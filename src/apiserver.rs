// apiserver.rs

use askama::Template;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    response::{Html, IntoResponse},
    routing::*,
};
use axum_macros::debug_handler;
use tower_http::trace::TraceLayer;

use crate::*;

pub struct SensorRow {
    pub name: String,
    pub enabled: bool,
    pub value: String,
}

#[derive(Template)]
#[template(path = "index.html.ask", escape = "html")]
pub struct IndexPage {
    pub title: String,
    pub version: String,
    pub last_update: String,
    pub uptime_s: String,
    pub sensors: Vec<SensorRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorStatus {
    pub name: String,
    pub enabled: bool,
}

pub fn api_router(state: Arc<MyState>) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/uptime", get(get_uptime))
        .route("/data", get(get_data))
        .route("/sensors", get(get_sensors))
        .route("/config", get(get_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(state: Arc<MyState>) -> anyhow::Result<()> {
    let listen = format!("0.0.0.0:{}", state.config.api.port);
    let addr = listen.parse::<net::SocketAddr>()?;

    let app = api_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    Ok(axum::serve(listener, app.into_make_service()).await?)
}

pub async fn get_index(State(state): State<Arc<MyState>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_index()");

    let data = state.data.read().await;
    let sensors = state
        .sensors
        .sensors()
        .iter()
        .map(|(name, slot)| {
            let value = slot
                .as_ref()
                .and_then(|s| data.measurements.iter().find(|m| m.kind == s.kind()))
                .map(|m| format!("{} {}", m.value, m.unit))
                .unwrap_or_else(|| "-".into());
            SensorRow {
                name: name.clone(),
                enabled: slot.is_some(),
                value,
            }
        })
        .collect();

    let page = IndexPage {
        title: APP_TITLE.into(),
        version: APP_VERSION.into(),
        last_update: data.last_update.clone(),
        uptime_s: format_uptime(*state.uptime.read().await),
        sensors,
    };
    match page.render() {
        Ok(s) => (StatusCode::OK, Html(s)).into_response(),
        Err(e) => {
            let err_msg = format!("Index template error: {e:?}\n");
            error!("{err_msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, err_msg).into_response()
        }
    }
}

pub async fn get_uptime(State(state): State<Arc<MyState>>) -> (StatusCode, Json<Uptime>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_uptime()");

    (StatusCode::OK, Json(Uptime::new(*state.uptime.read().await)))
}

#[debug_handler]
pub async fn get_data(State(state): State<Arc<MyState>>) -> (StatusCode, Json<SensorValues>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_data()");

    let ret = state.data.read().await.clone();
    (StatusCode::OK, Json(ret))
}

pub async fn get_sensors(State(state): State<Arc<MyState>>) -> (StatusCode, Json<Vec<SensorStatus>>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_sensors()");

    let ret = state
        .sensors
        .sensors()
        .iter()
        .map(|(name, slot)| SensorStatus {
            name: name.clone(),
            enabled: slot.is_some(),
        })
        .collect();
    (StatusCode::OK, Json(ret))
}

pub async fn get_config(State(state): State<Arc<MyState>>) -> (StatusCode, Json<MyConfig>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_config()");
    (StatusCode::OK, Json(state.config.clone()))
}


// EOF
