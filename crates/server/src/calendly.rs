//! Calendly REST transport for availability and single-use scheduling links.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use sdr_assist_agent::tools::scheduling::SchedulingGateway;
use sdr_assist_core::config::SchedulingSettings;
use sdr_assist_core::domain::scheduling::{Slot, TimeWindow};
use sdr_assist_core::errors::GatewayError;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CalendlyGateway {
    client: Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct AvailableTimes {
    #[serde(default)]
    collection: Vec<AvailableTime>,
}

#[derive(Debug, Deserialize)]
struct AvailableTime {
    start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SchedulingLinkEnvelope {
    resource: Option<SchedulingLink>,
}

#[derive(Debug, Deserialize)]
struct SchedulingLink {
    booking_url: Option<String>,
}

impl CalendlyGateway {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self { client, api_url: api_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SchedulingGateway for CalendlyGateway {
    async fn available_times(
        &self,
        settings: &SchedulingSettings,
        window: &TimeWindow,
    ) -> Result<Vec<Slot>, GatewayError> {
        let start_time = window.start_param();
        let end_time = window.end_param();
        debug!(
            event_name = "server.calendly.available_times",
            start_time = %start_time,
            end_time = %end_time,
            "querying available times"
        );

        let response = self
            .client
            .get(self.url("event_type_available_times"))
            .bearer_auth(settings.api_key.expose_secret())
            .query(&[
                ("event_type", settings.event_type_uri.as_str()),
                ("start_time", start_time.as_str()),
                ("end_time", end_time.as_str()),
            ])
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let times: AvailableTimes = decode(response).await?;
        Ok(times.collection.into_iter().map(|time| Slot::new(time.start_time)).collect())
    }

    async fn create_single_use_link(
        &self,
        settings: &SchedulingSettings,
    ) -> Result<Option<String>, GatewayError> {
        let response = self
            .client
            .post(self.url("scheduling_links"))
            .bearer_auth(settings.api_key.expose_secret())
            .json(&json!({
                "max_event_count": 1,
                "owner": settings.event_type_uri,
                "owner_type": "EventType",
            }))
            .send()
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        let envelope: SchedulingLinkEnvelope = decode(response).await?;
        Ok(envelope.resource.and_then(|resource| resource.booking_url))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status { status: status.as_u16(), body });
    }
    response.json::<T>().await.map_err(|error| GatewayError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use chrono::{TimeZone, Utc};
    use reqwest::Client;
    use sdr_assist_agent::tools::scheduling::SchedulingGateway;
    use sdr_assist_core::config::SchedulingSettings;
    use sdr_assist_core::domain::scheduling::TimeWindow;
    use serde_json::{json, Value};

    use super::CalendlyGateway;

    #[derive(Clone, Default)]
    struct Recorded {
        queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        links: Arc<Mutex<Vec<Value>>>,
    }

    async fn spawn_fake_calendly(times: Value, link: (StatusCode, Value)) -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route(
                "/event_type_available_times",
                get(
                    move |State(recorded): State<Recorded>,
                          Query(query): Query<HashMap<String, String>>| {
                        let times = times.clone();
                        async move {
                            recorded.queries.lock().expect("queries lock").push(query);
                            Json(times)
                        }
                    },
                ),
            )
            .route(
                "/scheduling_links",
                post(move |State(recorded): State<Recorded>, Json(body): Json<Value>| {
                    let (status, reply) = link.clone();
                    async move {
                        recorded.links.lock().expect("links lock").push(body);
                        (status, Json(reply))
                    }
                }),
            )
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake calendly");
        });
        (format!("http://{address}"), recorded)
    }

    fn settings() -> SchedulingSettings {
        SchedulingSettings {
            api_key: "calendly-token".to_string().into(),
            event_type_uri: "https://api.calendly.com/event_types/ABC".to_string(),
        }
    }

    #[tokio::test]
    async fn available_times_sends_window_and_keeps_order() {
        let times = json!({
            "collection": [
                { "status": "available", "start_time": "2025-10-30T14:00:00.000000Z" },
                { "status": "available", "start_time": "2025-10-30T15:30:00.000000Z" }
            ]
        });
        let (url, recorded) =
            spawn_fake_calendly(times, (StatusCode::CREATED, json!({}))).await;
        let gateway = CalendlyGateway::new(Client::new(), url);
        let now = Utc.with_ymd_and_hms(2025, 10, 28, 12, 0, 0).single().expect("valid");

        let slots = gateway
            .available_times(&settings(), &TimeWindow::upcoming(now))
            .await
            .expect("slots");

        let starts: Vec<_> = slots.iter().map(|slot| slot.start_time.to_rfc3339()).collect();
        assert_eq!(starts, vec!["2025-10-30T14:00:00+00:00", "2025-10-30T15:30:00+00:00"]);

        let queries = recorded.queries.lock().expect("queries lock");
        assert_eq!(queries[0]["event_type"], "https://api.calendly.com/event_types/ABC");
        assert_eq!(queries[0]["start_time"], "2025-10-28T12:05:00.000Z");
        assert_eq!(queries[0]["end_time"], "2025-11-04T12:05:00.000Z");
    }

    #[tokio::test]
    async fn scheduling_link_is_single_use_for_the_event_type() {
        let link = json!({ "resource": { "booking_url": "https://calendly.com/d/abc-123", "owner_type": "EventType" } });
        let (url, recorded) =
            spawn_fake_calendly(json!({ "collection": [] }), (StatusCode::CREATED, link)).await;
        let gateway = CalendlyGateway::new(Client::new(), url);

        let booking_url = gateway.create_single_use_link(&settings()).await.expect("link");

        assert_eq!(booking_url.as_deref(), Some("https://calendly.com/d/abc-123"));
        let links = recorded.links.lock().expect("links lock");
        assert_eq!(
            links[0],
            json!({
                "max_event_count": 1,
                "owner": "https://api.calendly.com/event_types/ABC",
                "owner_type": "EventType"
            })
        );
    }

    #[tokio::test]
    async fn missing_booking_url_is_none() {
        let (url, _) =
            spawn_fake_calendly(json!({}), (StatusCode::CREATED, json!({ "resource": {} }))).await;

        let booking_url =
            CalendlyGateway::new(Client::new(), url).create_single_use_link(&settings()).await;

        assert_eq!(booking_url, Ok(None));
    }

    #[tokio::test]
    async fn provider_errors_surface_status() {
        let (url, _) = spawn_fake_calendly(
            json!({}),
            (StatusCode::FORBIDDEN, json!({ "title": "Permission Denied" })),
        )
        .await;

        let error = CalendlyGateway::new(Client::new(), url)
            .create_single_use_link(&settings())
            .await
            .expect_err("403 fails");

        assert_eq!(error.status_code(), Some(403));
    }
}
