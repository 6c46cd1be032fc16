// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use crate::config;

use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http,
    response::{Html, IntoResponse},
    routing::{get, post, IntoMakeService},
    Json, Router, Server,
};
use hyper::server::conn::AddrIncoming;
use serde_json::Value;
use tower::layer::util::Stack;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_livereload::{LiveReloadLayer, Reloader};

fn create_server(
    livereload: LiveReloadLayer,
    state: Db,
) -> Result<Server<AddrIncoming, IntoMakeService<Router>>, anyhow::Error> {
    let app = create_app(livereload, state);

    let addr = get_address()?;
    eprintln!("Copy the address http://{}/ into your mobile browser", addr);

    let server = Server::try_bind(&addr)?.serve(app.into_make_service());

    Ok(server)
}

fn create_app(livereload: LiveReloadLayer, state: Db) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/style.css", get(style))
        .route("/script.js", get(script))
        .route("/post", post(post_handler))
        .route("/buckets/:bucket/collections/:collection/records", get(rs))
        .route(
            "/v1/buckets/:bucket/collections/:collection/records",
            get(rs),
        )
        .layer(livereload)
        .layer(no_cache_layer())
        .with_state(state)
}

fn create_state(livereload: &LiveReloadLayer) -> Db {
    let reloader = livereload.reloader();
    Arc::new(RwLock::new(InMemoryDb::new(reloader)))
}

#[tokio::main]
pub(crate) async fn start_server() -> Result<bool> {
    let livereload = LiveReloadLayer::new();
    let state = create_state(&livereload);
    let server = create_server(livereload, state)?;
    server.await?;
    Ok(true)
}

pub(crate) fn post_deeplink(
    platform: &str,
    deeplink: &str,
    experiments: Option<&Value>,
) -> Result<bool> {
    let payload = StartAppPostPayload::new(platform, deeplink, experiments);
    let addr = get_address()?;
    let _ret = post_payload(&payload, &addr.to_string())?;
    Ok(true)
}

type Db = Arc<RwLock<InMemoryDb>>;

pub(crate) fn get_address() -> Result<SocketAddr> {
    let host = config::server_host();
    let port = config::server_port();

    let port = port
        .parse::<u16>()
        .map_err(|_| anyhow!("NIMBUS_CLI_SERVER_PORT must be numeric"))?;
    let host = host
        .parse::<IpAddr>()
        .map_err(|_| anyhow!("NIMBUS_CLI_SERVER_HOST must be an IP address"))?;

    Ok((host, port).into())
}

async fn index(State(db): State<Db>) -> Html<String> {
    let mut html =
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/index.html")).to_string();
    let li_template = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/assets/li-template.html"
    ));

    let state = db.write().unwrap();
    for p in ["android", "ios", "web"] {
        let ppat = format!("{{{p}}}");
        match state.url(p) {
            Some(url) => {
                let li = li_template.replace("{platform}", p).replace("{url}", url);
                html = html.replace(&ppat, &li);
            }
            _ => {
                html = html.replace(&ppat, "");
            }
        }
    }

    Html(html)
}

async fn style(State(_): State<Db>) -> &'static str {
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/style.css"))
}

async fn script(State(_): State<Db>) -> &'static str {
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/script.js"))
}

async fn rs(
    State(db): State<Db>,
    Path((_bucket, _collection)): Path<(String, String)>,
) -> impl IntoResponse {
    let state = db.write().unwrap();

    let latest = state.latest();
    if let Some(latest) = latest {
        if let Some(e) = &latest.experiments {
            (StatusCode::OK, Json(e.clone()))
        } else {
            // The server's latest content has no experiments; e.g.
            // nimbus-cli open --pbpaste
            (StatusCode::NOT_MODIFIED, Json(Value::Null))
        }
    } else {
        // The server is up and running, but the first invocation of a --pbpaste
        // has not come in yet.
        (StatusCode::SERVICE_UNAVAILABLE, Json(Value::Null))
    }
}

async fn post_handler(
    State(db): State<Db>,
    Json(payload): Json<StartAppPostPayload>,
) -> impl IntoResponse {
    eprintln!("Updating {platform} URL", platform = payload.platform);
    let mut state = db.write().unwrap();
    state.update(payload);
    // This will be converted into a JSON response
    // with a status code of `201 Created`
    (StatusCode::CREATED, Json(()))
}

#[derive(Deserialize, Serialize)]
struct StartAppPostPayload {
    platform: String,
    url: String,
    experiments: Option<Value>,
}

impl StartAppPostPayload {
    fn new(platform: &str, url: &str, experiments: Option<&Value>) -> Self {
        Self {
            platform: platform.to_string(),
            url: url.to_string(),
            experiments: experiments.cloned(),
        }
    }
}

fn post_payload<T: Serialize>(payload: &T, addr: &str) -> Result<String> {
    let url = format!("http://{addr}/post");
    let body = serde_json::to_string(payload)?;
    let req = reqwest::blocking::Client::new()
        .post(url)
        .header("Content-type", "application/json; charset=UTF-8")
        .header("accept", "application/json")
        .body(body);
    let resp = req.send()?;

    Ok(resp.text()?)
}

struct InMemoryDb {
    reloader: Reloader,
    payloads: HashMap<String, StartAppPostPayload>,
    latest: Option<String>,
}

impl InMemoryDb {
    fn new(reloader: Reloader) -> Self {
        Self {
            reloader,
            payloads: Default::default(),
            latest: None,
        }
    }

    fn url(&self, platform: &str) -> Option<&str> {
        Some(self.payloads.get(platform)?.url.as_str())
    }

    fn update(&mut self, payload: StartAppPostPayload) {
        self.latest = Some(payload.platform.clone());
        self.payloads.insert(payload.platform.clone(), payload);
        self.reloader.reload();
    }

    fn latest(&self) -> Option<&StartAppPostPayload> {
        let key = self.latest.as_ref()?;
        self.payloads.get(key)
    }
}

type Srhl = SetResponseHeaderLayer<http::HeaderValue>;

fn no_cache_layer() -> Stack<Srhl, Stack<Srhl, Srhl>> {
    Stack::new(
        SetResponseHeaderLayer::overriding(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ),
        Stack::new(
            SetResponseHeaderLayer::overriding(
                http::header::PRAGMA,
                http::HeaderValue::from_static("no-cache"),
            ),
            SetResponseHeaderLayer::overriding(
                http::header::EXPIRES,
                http::HeaderValue::from_static("0"),
            ),
        ),
    )
}
