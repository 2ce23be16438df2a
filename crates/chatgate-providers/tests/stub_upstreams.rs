use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Path;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chatgate_core::{ChatMessage, ErrorCode, InlineImage, ProviderRequest, ProviderResult};
use chatgate_providers::{
    Credentials, Dispatcher, Endpoints, HttpCaller, ModelRouter, ProviderSettings,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

type Captured = Arc<Mutex<Vec<(String, Value)>>>;

async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .unwrap();
    });

    (base_url, handle)
}

fn credentials() -> Credentials {
    Credentials {
        gemini_key: Some("gemini-test-key".into()),
        deepseek_key: Some("deepseek-test-key".into()),
        kimi_token: Some("kimi-test-token".into()),
        hf_token: Some("hf-test-token".into()),
        cf_account_id: Some("acct-1".into()),
        cf_api_token: Some("cf-test-token".into()),
    }
}

fn dispatcher(base_url: &str) -> Dispatcher {
    let settings = ProviderSettings {
        credentials: credentials(),
        endpoints: Endpoints::all(base_url),
        timeout: Duration::from_secs(5),
    };
    let http = HttpCaller::new(settings.timeout).unwrap();
    Dispatcher::new(ModelRouter::standard(&settings, http))
}

fn gemini_route(captured: Captured, reply: (StatusCode, Value)) -> Router {
    Router::new().route(
        "/v1beta/models/{*rest}",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            let reply = reply.clone();
            async move {
                let key = headers
                    .get("x-goog-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                captured.lock().unwrap().push((key, body));
                (reply.0, Json(reply.1))
            }
        }),
    )
}

fn completions_route(captured: Captured, reply: (StatusCode, Value)) -> Router {
    Router::new().route(
        "/chat/completions",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            let reply = reply.clone();
            async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                captured.lock().unwrap().push((auth, body));
                (reply.0, Json(reply.1))
            }
        }),
    )
}

/// Edge stub answering text models with `text_reply` and the image model
/// with a fixed JSON image.
fn edge_route(captured: Captured, text_reply: (StatusCode, Value)) -> Router {
    Router::new().route(
        "/accounts/{account}/ai/run/{*model}",
        post(
            move |Path((account, model)): Path<(String, String)>, Json(body): Json<Value>| {
                let captured = captured.clone();
                let text_reply = text_reply.clone();
                async move {
                    captured
                        .lock()
                        .unwrap()
                        .push((format!("{}/{}", account, model), body));
                    if model.ends_with("flux-1-schnell") {
                        (
                            StatusCode::OK,
                            Json(json!({"result": {"image": "iVBORw0KGgo="}, "success": true})),
                        )
                    } else {
                        (text_reply.0, Json(text_reply.1))
                    }
                }
            },
        ),
    )
}

fn edge_ok() -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({"result": {"response": "Hello from the edge"}, "success": true, "errors": []}),
    )
}

fn completion(content: &str) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]}),
    )
}

#[tokio::test]
async fn test_deepseek_returns_first_choice() {
    let captured: Captured = Arc::default();
    let (base_url, handle) =
        spawn_upstream(completions_route(captured.clone(), completion("Hi there!"))).await;

    let dispatch = dispatcher(&base_url)
        .dispatch("deepseek", &ProviderRequest::from_prompt("hello"))
        .await
        .unwrap();

    assert_eq!(dispatch.result, ProviderResult::text("Hi there!"));
    assert_eq!(dispatch.served_by, "deepseek");
    assert!(!dispatch.fallback_used);

    let calls = captured.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Bearer deepseek-test-key");
    assert_eq!(calls[0].1["model"], "deepseek-chat");
    assert_eq!(
        calls[0].1["messages"],
        json!([{"role": "user", "content": "hello"}])
    );
    handle.abort();
}

#[tokio::test]
async fn test_kimi_forwards_message_history() {
    let captured: Captured = Arc::default();
    let (base_url, handle) =
        spawn_upstream(completions_route(captured.clone(), completion("Sure."))).await;

    let request = ProviderRequest {
        prompt: String::new(),
        messages: vec![
            ChatMessage::user("first"),
            ChatMessage {
                role: chatgate_core::MessageRole::Assistant,
                content: "reply".into(),
            },
            ChatMessage::user("second"),
        ],
        image: None,
    };
    let dispatch = dispatcher(&base_url).dispatch("kimi", &request).await.unwrap();

    assert_eq!(dispatch.result, ProviderResult::text("Sure."));
    let calls = captured.lock().unwrap().clone();
    assert_eq!(calls[0].0, "Bearer kimi-test-token");
    assert_eq!(calls[0].1["model"], "kimi-k2-instruct");
    assert_eq!(calls[0].1["messages"].as_array().unwrap().len(), 3);
    handle.abort();
}

#[tokio::test]
async fn test_prompt_follows_history_for_chat_upstream() {
    let captured: Captured = Arc::default();
    let (base_url, handle) =
        spawn_upstream(completions_route(captured.clone(), completion("Noted."))).await;

    let request = ProviderRequest {
        prompt: "new question".into(),
        messages: vec![ChatMessage::user("earlier turn")],
        image: None,
    };
    let dispatch = dispatcher(&base_url)
        .dispatch("deepseek", &request)
        .await
        .unwrap();

    assert_eq!(dispatch.result, ProviderResult::text("Noted."));
    let calls = captured.lock().unwrap().clone();
    assert_eq!(
        calls[0].1["messages"],
        json!([
            {"role": "user", "content": "earlier turn"},
            {"role": "user", "content": "new question"}
        ])
    );
    handle.abort();
}

#[tokio::test]
async fn test_gemini_quota_exhaustion_falls_back_to_edge_model() {
    let gemini_calls: Captured = Arc::default();
    let edge_calls: Captured = Arc::default();
    let exhausted = (
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}),
    );
    let app = gemini_route(gemini_calls.clone(), exhausted)
        .merge(edge_route(edge_calls.clone(), edge_ok()));
    let (base_url, handle) = spawn_upstream(app).await;

    let dispatch = dispatcher(&base_url)
        .dispatch("gemini", &ProviderRequest::from_prompt("hello"))
        .await
        .unwrap();

    assert_eq!(dispatch.result, ProviderResult::text("Hello from the edge"));
    assert_eq!(dispatch.served_by, "cf-llama-daily");
    assert!(dispatch.fallback_used);

    assert_eq!(gemini_calls.lock().unwrap()[0].0, "gemini-test-key");
    let edge = edge_calls.lock().unwrap().clone();
    assert_eq!(edge.len(), 1);
    assert_eq!(edge[0].0, "acct-1/@cf/meta/llama-3.1-8b-instruct");
    assert_eq!(edge[0].1, json!({"prompt": "hello"}));
    handle.abort();
}

#[tokio::test]
async fn test_failing_fallback_error_is_returned_verbatim() {
    let edge_calls: Captured = Arc::default();
    let insufficient = (
        StatusCode::PAYMENT_REQUIRED,
        json!({"error": {"message": "Insufficient Balance", "type": "unknown_error"}}),
    );
    let edge_exhausted = (
        StatusCode::TOO_MANY_REQUESTS,
        json!({"success": false, "errors": [{"code": 3036, "message": "Daily free allocation used up"}], "result": null}),
    );
    let app = completions_route(Arc::default(), insufficient)
        .merge(edge_route(edge_calls.clone(), edge_exhausted));
    let (base_url, handle) = spawn_upstream(app).await;

    let dispatch = dispatcher(&base_url)
        .dispatch("deepseek", &ProviderRequest::from_prompt("hello"))
        .await
        .unwrap();

    assert_eq!(
        dispatch.result,
        ProviderResult::error("Daily free allocation used up", Some(ErrorCode::Exhausted))
    );
    assert!(dispatch.fallback_used);
    assert_eq!(edge_calls.lock().unwrap().len(), 1);
    handle.abort();
}

#[tokio::test]
async fn test_gemini_attaches_inline_image_to_user_turn() {
    let captured: Captured = Arc::default();
    let ok = (
        StatusCode::OK,
        json!({"candidates": [{"content": {"parts": [{"text": "A cat."}], "role": "model"}}]}),
    );
    let (base_url, handle) = spawn_upstream(gemini_route(captured.clone(), ok)).await;

    let request = ProviderRequest {
        prompt: "What is this?".into(),
        messages: Vec::new(),
        image: Some(InlineImage::parse("data:image/png;base64,iVBORw0KGgo=")),
    };
    let dispatch = dispatcher(&base_url).dispatch("gemini", &request).await.unwrap();

    assert_eq!(dispatch.result, ProviderResult::text("A cat."));
    let body = captured.lock().unwrap()[0].1.clone();
    assert_eq!(
        body["contents"][0]["parts"][1]["inlineData"],
        json!({"mimeType": "image/png", "data": "iVBORw0KGgo="})
    );
    handle.abort();
}

#[tokio::test]
async fn test_flux_image_bytes_become_base64() {
    let app = Router::new().route(
        "/models/{*model}",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["inputs"], "a lighthouse at dusk");
            (
                [(header::CONTENT_TYPE, "image/jpeg")],
                vec![0xffu8, 0xd8, 0xff, 0xe0],
            )
                .into_response()
        }),
    );
    let (base_url, handle) = spawn_upstream(app).await;

    let dispatch = dispatcher(&base_url)
        .dispatch("flux", &ProviderRequest::from_prompt("a lighthouse at dusk"))
        .await
        .unwrap();

    assert_eq!(dispatch.result, ProviderResult::image("/9j/4A=="));
    handle.abort();
}

#[tokio::test]
async fn test_edge_image_model_returns_image_without_prefix() {
    let edge_calls: Captured = Arc::default();
    let (base_url, handle) = spawn_upstream(edge_route(edge_calls.clone(), edge_ok())).await;

    let dispatch = dispatcher(&base_url)
        .dispatch("cf-flux", &ProviderRequest::from_prompt("a fox"))
        .await
        .unwrap();

    match dispatch.result {
        ProviderResult::Image { base64_image } => {
            assert_eq!(base64_image, "iVBORw0KGgo=");
        }
        other => panic!("expected image, got {:?}", other),
    }
    let body = edge_calls.lock().unwrap()[0].1.clone();
    assert_eq!(
        body,
        json!({"prompt": "a fox", "guidance_scale": 7.5, "num_steps": 4})
    );
    handle.abort();
}

#[tokio::test]
async fn test_unreachable_upstream_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = dispatcher(&base_url)
        .dispatch("deepseek", &ProviderRequest::from_prompt("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, chatgate_core::ProxyError::Http(_)));
}
