//! End-to-end test over a real socket, so the peer address comes from the
//! connection rather than a test-injected extension.

use intake_gateway::config::FormsConfig;
use intake_gateway::handlers::router;
use intake_gateway::policy::FormPolicies;
use intake_gateway::reclaimer::Reclaimer;
use intake_gateway::state::AppState;
use intake_gateway::submission::TracingSink;
use intake_gateway::visitor::VisitorStore;
use reqwest::StatusCode;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const FORMS: &str = r#"{
    "forms": {
        "contact": {
            "referral_url": "https://example.com/contact",
            "allowed_origins": ["https://example.com"],
            "rate_limit": { "requests": 3, "duration": "10s" }
        }
    }
}"#;

#[tokio::test]
async fn serves_admission_over_tcp() {
    let store = Arc::new(VisitorStore::new());
    let reclaimer = Reclaimer::new(Arc::clone(&store), Duration::from_secs(60), Duration::from_secs(60)).spawn();
    let state = AppState::new(
        Arc::clone(&store),
        Arc::new(FormPolicies::new(FormsConfig::from_json(FORMS).unwrap())),
        Arc::new(TracingSink),
        Some("e2e-token".to_string()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            router(Arc::new(state)).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/forms");
    let mut statuses = Vec::new();
    for _ in 0..4 {
        let response = client
            .post(&url)
            .header("Origin", "https://example.com")
            .header("Referer", "https://example.com/contact")
            .form(&[("formid", "contact"), ("email", "a@example.com")])
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );

    // A foreign page is refused before it can spend quota
    let response = client
        .post(&url)
        .header("Origin", "https://evil.example")
        .header("Referer", "https://evil.example/contact")
        .form(&[("formid", "contact")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let listing: Value = client
        .get(format!("http://{addr}/api/rate-limits"))
        .bearer_auth("e2e-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["127.0.0.1"].as_array().unwrap().len(), 3);

    let response = client
        .delete(format!("http://{addr}/api/rate-limits/127.0.0.1"))
        .bearer_auth("e2e-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(store.is_empty());

    server.abort();
    reclaimer.shutdown().await;
}
