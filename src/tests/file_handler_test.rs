use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use super::setup;

#[actix_rt::test]
async fn test_write_then_read_round_trips() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");
    let content = "export const greet = (name: string) => `hi ${name}`;\n\ttabs\r\nand unicode: ✓\n";

    let req = test::TestRequest::post()
        .uri("/api/files")
        .cookie(cookie.clone())
        .set_json(json!({ "path": "src/greet.ts", "content": content, "operation": "write" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);

    let req = test::TestRequest::post()
        .uri("/api/files")
        .cookie(cookie)
        .set_json(json!({ "path": "src/greet.ts", "operation": "read" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["content"], content);

    let on_disk = std::fs::read_to_string(ctx.workspace.path().join("src/greet.ts")).unwrap();
    assert_eq!(on_disk, content);
}

#[actix_rt::test]
async fn test_paths_outside_workspace_are_rejected() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    for (path, operation) in [
        ("../outside.txt", "write"),
        ("../../etc/passwd", "read"),
        ("src/../../secret", "delete"),
        ("..", "list"),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/files")
            .cookie(cookie.clone())
            .set_json(json!({ "path": path, "content": "x", "operation": operation }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{operation} {path}");
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("outside the workspace"));
    }

    let escaped = ctx.workspace.path().parent().unwrap().join("outside.txt");
    assert!(!escaped.exists());
}

#[actix_rt::test]
async fn test_schema_validation_failures() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    for body in [
        json!({ "path": "a.txt", "operation": "rename" }),
        json!({ "operation": "read" }),
        json!({ "path": "a.txt", "operation": "write" }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/files")
            .cookie(cookie.clone())
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[actix_rt::test]
async fn test_list_delete_and_missing_files() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");
    std::fs::create_dir_all(ctx.workspace.path().join("src")).unwrap();
    std::fs::write(ctx.workspace.path().join("src/a.rs"), "a").unwrap();
    std::fs::write(ctx.workspace.path().join("src/b.rs"), "bb").unwrap();

    let req = test::TestRequest::post()
        .uri("/api/files")
        .cookie(cookie.clone())
        .set_json(json!({ "path": "src", "operation": "list" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["path"], "src/a.rs");
    assert_eq!(files[1]["size"], 2);
    assert_eq!(files[1]["type"], "file");

    let req = test::TestRequest::post()
        .uri("/api/files")
        .cookie(cookie.clone())
        .set_json(json!({ "path": "src/a.rs", "operation": "delete" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!ctx.workspace.path().join("src/a.rs").exists());

    let req = test::TestRequest::post()
        .uri("/api/files")
        .cookie(cookie)
        .set_json(json!({ "path": "src/a.rs", "operation": "read" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_tree_and_folder() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    let req = test::TestRequest::post()
        .uri("/api/files/folder")
        .cookie(cookie.clone())
        .set_json(json!({ "path": "components/ui" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    std::fs::write(ctx.workspace.path().join("README.md"), "# hi").unwrap();

    let req = test::TestRequest::get()
        .uri("/api/files/tree")
        .cookie(cookie)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let tree = body["tree"].as_array().unwrap();
    // The workspace is a git repository; .git is hidden from the tree.
    assert_eq!(tree.len(), 2);
    assert_eq!(tree[0]["name"], "components");
    assert_eq!(tree[0]["children"][0]["path"], "components/ui");
    assert_eq!(tree[1]["name"], "README.md");
    assert!(tree[1].get("children").is_none());
}

#[actix_rt::test]
async fn test_search() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");
    std::fs::write(ctx.workspace.path().join("main.py"), "def main():\n    print('TODO')\n").unwrap();

    let req = test::TestRequest::post()
        .uri("/api/files/search")
        .cookie(cookie.clone())
        .set_json(json!({ "query": "todo", "case_sensitive": false }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["path"], "main.py");
    assert_eq!(results[0]["line"], 2);

    let req = test::TestRequest::post()
        .uri("/api/files/search")
        .cookie(cookie)
        .set_json(json!({ "query": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
