use std::env;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};

use axum::{http::StatusCode, routing::post, Json, Router};
use sdr_assist_cli::commands::{config, doctor, provision};
use serde_json::{json, Value};

#[test]
fn provision_returns_config_failure_without_api_key() {
    with_env(&[], || {
        let result = provision::run(true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "provision");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn provision_human_failure_names_command_and_class() {
    with_env(&[], || {
        let result = provision::run(false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("provision failed (config_validation): configuration issue:"));
        assert!(serde_json::from_str::<Value>(&result.output).is_err());
    });
}

#[test]
fn provision_creates_assistant_with_persona_and_tools() {
    let (address, received) = spawn_fake_assistants(StatusCode::OK, json!({ "id": "asst_new" }));
    let base_url = format!("http://{address}/v1");

    with_env(&[("OPENAI_API_KEY", "sk-test"), ("OPENAI_BASE_URL", &base_url)], || {
        let result = provision::run(true);
        assert_eq!(result.exit_code, 0, "expected provisioning to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "provision");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "Assistente criado com o ID: asst_new");
    });

    let body = received.recv().expect("assistant creation request");
    assert_eq!(body["name"], "Assistente SDR Verzel");
    assert_eq!(body["model"], "gpt-4o");
    let tool_names: Vec<_> = body["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .map(|tool| tool["function"]["name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(tool_names, vec!["registrarLead", "oferecerHorarios", "agendarReuniao"]);
}

#[test]
fn provision_human_output_names_the_env_var() {
    let (address, _received) = spawn_fake_assistants(StatusCode::OK, json!({ "id": "asst_human" }));
    let base_url = format!("http://{address}/v1");

    with_env(&[("OPENAI_API_KEY", "sk-test"), ("OPENAI_BASE_URL", &base_url)], || {
        let result = provision::run(false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.starts_with("Assistente criado com o ID: asst_human"));
        assert!(result.output.contains("ASSISTANT_ID=asst_human"));
    });
}

#[test]
fn provision_reports_remote_rejection() {
    let (address, _received) = spawn_fake_assistants(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "message": "Incorrect API key provided" } }),
    );
    let base_url = format!("http://{address}/v1");

    with_env(&[("OPENAI_API_KEY", "sk-wrong"), ("OPENAI_BASE_URL", &base_url)], || {
        let result = provision::run(true);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "assistant_provision");
        assert!(payload["message"].as_str().unwrap_or_default().contains("401"));
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(
        &[
            ("OPENAI_API_KEY", "sk-proj-secret"),
            ("PIPEFY_API_KEY", "eyJhbGciOiJIUzUxMiJ9.payload"),
            ("SDR_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- assistant.api_key = sk-*** (source: env (OPENAI_API_KEY))"));
            assert!(output.contains("- crm.api_key = <redacted> (source: env (PIPEFY_API_KEY))"));
            assert!(output.contains("- crm.pipe_id = <unset> (source: default)"));
            assert!(output.contains("- logging.level = debug (source: env (SDR_LOG_LEVEL))"));
            assert!(output.contains("- server.port = 8000 (source: default)"));
            assert!(!output.contains("secret"));
            assert!(!output.contains("payload"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
        assert!(output.contains("OPENAI_API_KEY"));
    });
}

#[test]
fn doctor_json_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let statuses: Vec<_> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .map(|check| (check["name"].as_str().unwrap_or_default(), check["status"].as_str().unwrap_or_default()))
            .map(|(name, status)| (name.to_string(), status.to_string()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("config_validation".to_string(), "fail".to_string()),
                ("assistant_id".to_string(), "skipped".to_string()),
                ("crm_credentials".to_string(), "skipped".to_string()),
                ("scheduling_credentials".to_string(), "skipped".to_string()),
            ]
        );
    });
}

#[test]
fn doctor_warns_for_missing_integrations() {
    with_env(&[("OPENAI_API_KEY", "sk-test"), ("ASSISTANT_ID", "asst_123")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "missing integrations do not block the server");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "warn");
        assert_eq!(payload["checks"][2]["status"], "warn");
        assert_eq!(payload["checks"][3]["status"], "warn");
    });
}

#[test]
fn doctor_passes_with_full_configuration() {
    with_env(
        &[
            ("OPENAI_API_KEY", "sk-test"),
            ("ASSISTANT_ID", "asst_123"),
            ("PIPEFY_API_KEY", "pipefy-token"),
            ("PIPEFY_PIPE_ID", "302"),
            ("CALENDLY_API_KEY", "calendly-token"),
            ("CALENDLY_EVENT_TYPE_URI", "https://api.calendly.com/event_types/ABC"),
        ],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 0);
            assert!(result.output.starts_with("doctor: all readiness checks passed"));
            assert!(result.output.contains("- [ok] scheduling_credentials:"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Serves `POST /v1/assistants` on a background runtime and forwards each
/// request body to the returned channel.
fn spawn_fake_assistants(status: StatusCode, reply: Value) -> (SocketAddr, mpsc::Receiver<Value>) {
    let (address_tx, address_rx) = mpsc::channel();
    let (body_tx, body_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("fake server runtime");
        runtime.block_on(async move {
            let body_tx = Arc::new(Mutex::new(body_tx));
            let app = Router::new().route(
                "/v1/assistants",
                post(move |Json(body): Json<Value>| {
                    let reply = reply.clone();
                    let body_tx = body_tx.clone();
                    async move {
                        let _ = body_tx.lock().expect("body channel").send(body);
                        (status, Json(reply))
                    }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
            address_tx.send(listener.local_addr().expect("address")).expect("address channel");
            axum::serve(listener, app).await.expect("fake assistants server");
        });
    });

    (address_rx.recv().expect("fake server address"), body_rx)
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "OPENAI_API_KEY",
        "ASSISTANT_ID",
        "OPENAI_BASE_URL",
        "SDR_ASSISTANT_POLL_INTERVAL_MS",
        "SDR_ASSISTANT_MAX_STALLED_POLLS",
        "SDR_ASSISTANT_TIMEOUT_SECS",
        "PIPEFY_API_KEY",
        "PIPEFY_PIPE_ID",
        "PIPEFY_API_URL",
        "CALENDLY_API_KEY",
        "CALENDLY_EVENT_TYPE_URI",
        "CALENDLY_API_URL",
        "SDR_SERVER_BIND_ADDRESS",
        "SDR_SERVER_PORT",
        "SDR_SERVER_ALLOWED_ORIGINS",
        "SDR_LOGGING_LEVEL",
        "SDR_LOGGING_FORMAT",
        "SDR_LOG_LEVEL",
        "SDR_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
