//! Product evaluation and service routes through a running gateway.

use serde_json::{json, Value};

use catalog_gateway::config::GatewayConfig;

mod common;

fn config_with_model(model_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.model.base_url = model_url.to_string();
    config
}

#[tokio::test]
async fn test_evaluate_success() {
    let model = common::start_mock_backend(
        200,
        common::completion(
            "```json\n{\"score\": 85, \"decision\": \"APPROVED\", \"reasoning\": \"Fits the catalog\", \
             \"category_match\": \"Strong\", \"market_potential\": \"High\"}\n```",
        ),
    )
    .await;
    let gateway = common::start_gateway(config_with_model(&model.url())).await;

    let res = gateway.evaluate(&common::product()).await;
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["evaluation"]["score"], 85);
    assert_eq!(body["evaluation"]["decision"], "APPROVED");
    assert_eq!(body["evaluation"]["reasoning"], "Fits the catalog");
    assert_eq!(body["evaluation"]["market_potential"], "High");
    assert_eq!(body["evaluation"]["evaluation_method"], "ai_model");
    assert_eq!(body["evaluation"]["intercepted"], true);
    assert_eq!(body["metadata"]["model"], "ai/llama3.2:latest");
    assert!(body["metadata"]["processing_time_ms"].is_u64());

    let requests = model.bodies();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "ai/llama3.2:latest");
    let messages = requests[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[1]["content"].as_str().unwrap().contains("Desk Lamp"));
}

#[tokio::test]
async fn test_decision_follows_threshold_when_missing() {
    let model = common::start_mock_backend(200, common::completion(r#"{"score": 72}"#)).await;

    let mut config = config_with_model(&model.url());
    config.model.evaluation_threshold = 80;
    let gateway = common::start_gateway(config).await;

    let body: Value = gateway.evaluate(&common::product()).await.json().await.unwrap();
    assert_eq!(body["evaluation"]["score"], 72);
    assert_eq!(body["evaluation"]["decision"], "REJECTED");
}

#[tokio::test]
async fn test_missing_fields_rejected_without_model_call() {
    let model = common::start_mock_backend(200, common::completion("{}")).await;
    let gateway = common::start_gateway(config_with_model(&model.url())).await;

    let res = gateway
        .evaluate(&json!({"productName": "Desk Lamp", "description": "   "}))
        .await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_mistyped_optional_field_is_still_evaluated() {
    let model = common::start_mock_backend(200, common::completion(r#"{"score": 81}"#)).await;
    let gateway = common::start_gateway(config_with_model(&model.url())).await;

    let res = gateway
        .evaluate(&json!({
            "productName": "Desk Lamp",
            "description": "Adjustable LED desk lamp",
            "vendorName": 123,
            "price": "39.99"
        }))
        .await;
    assert_eq!(res.status(), 200);

    let requests = model.bodies();
    let prompt = requests[0]["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("- Vendor: 123"));
    assert!(prompt.contains("- Price: $39.99"));
}

#[tokio::test]
async fn test_unreachable_history_sinks_do_not_change_response() {
    let model = common::start_mock_backend(200, common::completion(r#"{"score": 90}"#)).await;

    let mut config = config_with_model(&model.url());
    config.persistence.enabled = true;
    config.persistence.mongodb_url = "mongodb://127.0.0.1:9/history".into();
    config.persistence.timeout_ms = 200;
    config.publishing.enabled = true;
    config.publishing.brokers = vec!["127.0.0.1:9".into()];
    config.publishing.timeout_ms = 200;
    let gateway = common::start_gateway(config).await;

    let res = gateway.evaluate(&common::product()).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["evaluation"]["score"], 90);
    assert_eq!(body["evaluation"]["decision"], "APPROVED");

    let res = gateway.client.get(gateway.url("/health")).send().await.unwrap();
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["interceptors"]["persistence"], true);
    assert_eq!(health["interceptors"]["publishing"], true);
}

#[tokio::test]
async fn test_model_failure_returns_fallback() {
    let model = common::start_mock_backend(500, json!({"error": "overloaded"})).await;
    let gateway = common::start_gateway(config_with_model(&model.url())).await;

    let res = gateway.evaluate(&common::product()).await;
    assert_eq!(res.status(), 500);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["fallback_evaluation"]["score"], 75);
    assert_eq!(body["fallback_evaluation"]["decision"], "APPROVED");
    assert_eq!(body["fallback_evaluation"]["evaluation_method"], "error_fallback");
    assert_eq!(body["metadata"]["error_occurred"], true);
}

#[tokio::test]
async fn test_unparseable_reply_returns_fallback() {
    let model =
        common::start_mock_backend(200, common::completion("I think it is a fine product.")).await;
    let gateway = common::start_gateway(config_with_model(&model.url())).await;

    let res = gateway.evaluate(&common::product()).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["fallback_evaluation"]["error"], true);
}

#[tokio::test]
async fn test_health() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;

    let res = gateway.client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["threshold"], 70);
    assert_eq!(body["interceptors"]["security"], false);
    assert_eq!(body["interceptors"]["rate_limiting"], true);
    assert_eq!(body["interceptors"]["audit"], false);
    assert_eq!(body["interceptors"]["persistence"], false);
    assert_eq!(body["interceptors"]["publishing"], false);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let mut config = GatewayConfig::default();
    config.rate_limit.max_requests = 1;
    let gateway = common::start_gateway(config).await;

    for _ in 0..3 {
        let res = gateway.client.get(gateway.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }
}

#[tokio::test]
async fn test_unknown_route() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;

    let res = gateway.client.get(gateway.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
}
