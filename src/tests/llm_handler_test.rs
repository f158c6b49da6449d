use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};

use super::{setup, setup_with};

fn ask(cookie: &actix_web::cookie::Cookie<'static>, body: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/llm")
        .cookie(cookie.clone())
        .set_json(body)
}

#[actix_rt::test]
async fn test_rate_limit_counts_every_request() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    // No API key is configured, so every admitted request fails upstream.
    for _ in 0..10 {
        let req = ask(&cookie, json!({ "prompt": "hi" })).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    let req = ask(&cookie, json!({ "prompt": "hi" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // Limits are per user.
    let other = register_user!(app, "other_user");
    let req = ask(&other, json!({ "prompt": "hi" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_rt::test]
async fn test_invalid_requests() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    for body in [
        json!({ "prompt": "   " }),
        json!({ "prompt": "hi", "action": "translate" }),
        json!({ "context": "fn main() {}" }),
        json!({ "prompt": "hi", "temperature": 2 }),
    ] {
        let resp = test::call_service(&app, ask(&cookie, body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::post()
        .uri("/api/llm")
        .cookie(cookie)
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_authentication_is_checked_first() {
    let ctx = setup_with(|s| crate::config::Settings {
        llm_rate_limit: 0,
        ..s
    })
    .await;
    let app = init_app!(ctx.data);

    let req = test::TestRequest::post()
        .uri("/api/llm")
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let cookie = register_user!(app, "test_user");
    let req = test::TestRequest::post()
        .uri("/api/llm")
        .cookie(cookie)
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

async fn fake_completion(body: web::Json<Value>) -> HttpResponse {
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
    let reply = json!({
        "message": format!("explained: {}", user.lines().next().unwrap_or_default()),
        "code": "fn add(a: i32, b: i32) -> i32 { a + b }",
        "suggestions": [if system.contains("Explain") { "explain" } else { "chat" }],
    });
    HttpResponse::Ok().json(json!({
        "choices": [{ "message": { "role": "assistant", "content": reply.to_string() } }]
    }))
}

#[actix_rt::test]
async fn test_completion_round_trip() {
    let srv = HttpServer::new(|| {
        App::new().route("/v1/chat/completions", web::post().to(fake_completion))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = srv.addrs()[0];
    let server = srv.run();
    let handle = server.handle();
    actix_rt::spawn(server);

    let ctx = setup_with(|s| crate::config::Settings {
        openai_api_key: Some(String::from("sk-test")),
        openai_base_url: format!("http://{}/v1", addr),
        ..s
    })
    .await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    let req = ask(
        &cookie,
        json!({
            "prompt": "What does this do?",
            "context": "fn add(a: i32, b: i32) -> i32 { a + b }",
            "action": "explain"
        }),
    )
    .to_request();
    let reply: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(reply["message"], "explained: What does this do?");
    assert_eq!(reply["code"], "fn add(a: i32, b: i32) -> i32 { a + b }");
    assert_eq!(reply["suggestions"], json!(["explain"]));

    handle.stop(false).await;
}
