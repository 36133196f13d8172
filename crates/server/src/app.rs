use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::bootstrap::Application;
use crate::{chat, health};

pub fn router(app: &Application) -> Result<Router, InvalidHeaderValue> {
    let cors = cors_layer(&app.config.server.allowed_origins)?;

    Ok(Router::new()
        .merge(chat::router(app.driver.clone()))
        .merge(health::router(app.integrations))
        .layer(cors))
}

/// `*` anywhere in the list opens the API to every origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let allow_origin = if origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .map(|origin| origin.trim().parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()?,
        )
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(3600)))
}
