//! Webhook listener — receives provider events and routes them to the
//! pipeline, plus a read-only health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::inbound::{EVENT_MESSAGE_RECEIVED, InboundEmail, WebhookEvent};
use crate::pipeline::MailPipeline;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MailPipeline>,
    pub from_address: String,
}

/// GET /health
///
/// Service identity and configured outbound address. No core logic.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "receive": "AgentMail",
        "send": "Resend",
        "from": state.from_address,
    }))
}

/// POST /webhook
///
/// Processes `message.received` events through the pipeline. Every other
/// event type is acknowledged without processing. Each delivery is handled
/// independently; failures are contained by the pipeline and reported in
/// the response body, never as an HTTP error.
async fn webhook(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> impl IntoResponse {
    match (event.event_type.as_str(), event.message) {
        (EVENT_MESSAGE_RECEIVED, Some(message)) => {
            let email = InboundEmail::from_webhook(message);
            let outcome = state.pipeline.process(email).await;

            let mut body = serde_json::to_value(&outcome)
                .unwrap_or_else(|_| serde_json::json!({}));
            body["ok"] = serde_json::json!(true);
            Json(body)
        }
        (other, _) => {
            tracing::debug!(event_type = %other, "Acknowledging unrecognized event");
            Json(serde_json::json!({
                "ok": true,
                "processed": false,
                "type": other,
            }))
        }
    }
}

/// Build the bridge's router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use crate::dispatch::ProcessDispatcher;
    use crate::identity::FileIdentityStore;
    use crate::outbound::ResendClient;
    use crate::session::FileSessionRegistry;

    /// Router over real collaborators pointed at nothing: the identity
    /// table is empty, so every sender is rejected before any dispatch
    /// or network call.
    fn test_router() -> Router {
        let pipeline = MailPipeline::new(
            Arc::new(FileIdentityStore::new("/nonexistent/links.json")),
            Arc::new(FileSessionRegistry::new("/nonexistent/sessions.json")),
            Arc::new(ProcessDispatcher::new("/nonexistent/agent")),
            Arc::new(ResendClient::new(
                secrecy::SecretString::from("re_test".to_string()),
                "noreply@test.example",
            )),
            None,
        );
        routes(AppState {
            pipeline: Arc::new(pipeline),
            from_address: "noreply@test.example".into(),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["receive"], "AgentMail");
        assert_eq!(json["send"], "Resend");
        assert_eq!(json["from"], "noreply@test.example");
    }

    #[tokio::test]
    async fn unrecognized_event_is_acknowledged_unprocessed() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"event_type":"message.bounced"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["processed"], false);
        assert_eq!(json["type"], "message.bounced");
    }

    #[tokio::test]
    async fn received_event_with_unknown_sender_reports_rejection() {
        let payload = serde_json::json!({
            "event_type": "message.received",
            "message": {
                "message_id": "m1",
                "from_": "stranger@example.com",
                "subject": "Hello",
                "text": "Hi there",
            },
        });
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unknown sender");
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_at_the_boundary() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn root_path_also_accepts_webhooks() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"event_type":"ping"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
