//! A failed chat request must produce exactly one error-level log line.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use llama_chat_server::{router, BackendClient, GatewayConfig};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct ErrorEvents(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for ErrorEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0
                .lock()
                .unwrap()
                .push(event.metadata().target().to_string());
        }
    }
}

#[tokio::test]
async fn backend_failure_is_logged_once_at_error() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&backend)
        .await;

    let events = ErrorEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = GatewayConfig {
        backend_url: backend.uri(),
        request_timeout: Duration::from_secs(5),
        ..GatewayConfig::default()
    };
    let app = router(Arc::new(BackendClient::new(&config).unwrap()));
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({"message": "Hello"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let targets = events.0.lock().unwrap().clone();
    assert_eq!(targets, vec!["llama_chat_server::routes".to_string()]);
}
