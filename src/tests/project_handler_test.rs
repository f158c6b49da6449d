use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use super::setup;

#[actix_rt::test]
async fn test_project_lifecycle() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(cookie.clone())
        .set_json(json!({ "name": "  demo  ", "description": "scratch space" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let project: Value = test::read_body_json(resp).await;
    assert_eq!(project["name"], "demo");
    let id = project["id"].as_i64().unwrap();

    for (path, content) in [("src/main.rs", "fn main() {}"), ("README.md", "# demo")] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/projects/{}/files", id))
            .cookie(cookie.clone())
            .set_json(json!({ "path": path, "content": content }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // Saving an existing path replaces its content.
    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/files", id))
        .cookie(cookie.clone())
        .set_json(json!({ "path": "README.md", "content": "# renamed" }))
        .to_request();
    let readme: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(readme["content"], "# renamed");

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", id))
        .cookie(cookie.clone())
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["name"], "demo");
    assert_eq!(detail["description"], "scratch space");
    let files = detail["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["path"], "README.md");
    assert_eq!(files[1]["path"], "src/main.rs");

    let req = test::TestRequest::get()
        .uri("/api/projects")
        .cookie(cookie.clone())
        .to_request();
    let projects: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(projects.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{}", id))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE project_id = ?")
        .bind(id)
        .fetch_one(ctx.data.pool.get_ref())
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", id))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_projects_are_private() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let owner = register_user!(app, "owner");
    let intruder = register_user!(app, "intruder");

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(owner.clone())
        .set_json(json!({ "name": "secret" }))
        .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;
    let id = project["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/projects")
        .cookie(intruder.clone())
        .to_request();
    let projects: Value = test::call_and_read_body_json(&app, req).await;
    assert!(projects.as_array().unwrap().is_empty());

    let requests = [
        test::TestRequest::get().uri(&format!("/api/projects/{}", id)),
        test::TestRequest::delete().uri(&format!("/api/projects/{}", id)),
        test::TestRequest::get().uri(&format!("/api/projects/{}/files", id)),
        test::TestRequest::put()
            .uri(&format!("/api/projects/{}/files", id))
            .set_json(json!({ "path": "x.txt", "content": "x" })),
    ];
    for req in requests {
        let resp = test::call_service(&app, req.cookie(intruder.clone()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", id))
        .cookie(owner)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_delete_file_and_validation() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(cookie.clone())
        .set_json(json!({ "name": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(cookie.clone())
        .set_json(json!({ "name": "demo" }))
        .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;
    let id = project["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/files", id))
        .cookie(cookie.clone())
        .set_json(json!({ "path": "notes.txt", "content": "hello" }))
        .to_request();
    let file: Value = test::call_and_read_body_json(&app, req).await;
    let file_id = file["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/files", id))
        .cookie(cookie.clone())
        .set_json(json!({ "path": " ", "content": "hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let uri = format!("/api/projects/{}/files/{}", id, file_id);
    let req = test::TestRequest::delete()
        .uri(&uri)
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}/files", id))
        .cookie(cookie)
        .to_request();
    let files: Value = test::call_and_read_body_json(&app, req).await;
    assert!(files.as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_schema_cascades_project_files() {
    let ctx = setup().await;
    let app = init_app!(ctx.data);
    let cookie = register_user!(app, "test_user");

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .cookie(cookie.clone())
        .set_json(json!({ "name": "demo" }))
        .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;
    let id = project["id"].as_i64().unwrap();

    for path in ["a.txt", "b.txt"] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/projects/{}/files", id))
            .cookie(cookie.clone())
            .set_json(json!({ "path": path, "content": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let pool = ctx.data.pool.get_ref();
    // Bypass Project::delete so only the foreign key can remove the files.
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files WHERE project_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
