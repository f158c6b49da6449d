use tempfile::TempDir;

use crate::app::AppData;
use crate::config::Settings;
use crate::db;

/// Builds a test service wired like the real server.
macro_rules! init_app {
    ($data:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(crate::utils::middleware::SessionAuth)
                .configure(|cfg| $data.configure(cfg)),
        )
        .await
    };
}

/// Registers `$username` and returns the session cookie.
macro_rules! register_user {
    ($app:expr, $username:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/register")
            .set_json(serde_json::json!({ "username": $username, "password": "password1" }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        resp.response()
            .cookies()
            .find(|c| c.name() == crate::utils::auth::SESSION_COOKIE)
            .expect("register should set a session cookie")
            .into_owned()
    }};
}

mod file_handler_test;
mod llm_handler_test;
mod project_handler_test;

/// Lowest cost bcrypt accepts; keeps registration fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestContext {
    pub data: AppData,
    pub workspace: TempDir,
}

pub fn test_settings(workspace: &TempDir) -> Settings {
    Settings {
        workspace_root: workspace.path().to_path_buf(),
        static_dir: workspace.path().join("no-such-static-dir"),
        bcrypt_cost: TEST_BCRYPT_COST,
        ..Settings::default()
    }
}

pub async fn setup_with(settings: impl FnOnce(Settings) -> Settings) -> TestContext {
    let workspace = tempfile::tempdir().expect("Could not create workspace");
    let pool = db::connect_in_memory().await.expect("Could not open database");
    let data = AppData::new(pool, settings(test_settings(&workspace))).expect("Could not build app");
    TestContext { data, workspace }
}

pub async fn setup() -> TestContext {
    setup_with(|s| s).await
}
