use std::{error::Error, sync::Arc};

use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use tokio::{fs, net};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use helpdesk_dispatch::{
    backend, db, http, realtime, realtime::AssignmentStore, Config, Desk,
    Timeouts,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let tickets = Arc::new(backend::Client::new(config.backend.clone())?);
    let assignments: Arc<dyn AssignmentStore> = match config.realtime.url {
        Some(_) => {
            Arc::new(db::Store::connect(config.realtime.clone()).await?)
        }
        None => {
            tracing::warn!("no real-time store configured, using in-process");
            Arc::new(realtime::memory::Store::new())
        }
    };

    let timeouts = Timeouts::from(&config);
    let desk = Desk::start(tickets, assignments, timeouts).await;

    let origins = config
        .http
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(origins);

    let app = http::router(Arc::new(desk)).layer(cors);

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!("listening on {}", config.http.server.addr);
    axum::serve(listener, app).await?;

    Ok(())
}
