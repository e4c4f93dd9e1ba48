use axum::http::StatusCode;
use axum::http::header::LOCATION;

use super::*;
use crate::state::test_helpers::{sign_in, test_app_state};

async fn visit(state: &AppState, path: &str) -> Response {
    page(State(state.clone()), path.parse::<Uri>().unwrap()).await
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn signed_out_protected_pages_redirect_to_login() {
    let state = test_app_state();
    for path in ["/dashboard", "/assistant", "/dashboard/"] {
        let response = visit(&state, path).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/login", "{path}");
    }
}

#[tokio::test]
async fn signed_in_login_redirects_to_dashboard() {
    let state = test_app_state();
    sign_in(&state).await;
    let response = visit(&state, "/login").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn signed_in_reviews_is_honored_with_chrome() {
    let state = test_app_state();
    sign_in(&state).await;
    let response = visit(&state, "/reviews").await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = body_json(response).await;
    assert_eq!(view["path"], "/reviews");
    assert_eq!(view["title"], "Customer Reviews");
    assert_eq!(view["chrome"]["show_nav"], true);
    assert_eq!(view["chrome"]["show_footer"], true);
    assert_eq!(view["user_email"], "operator@example.com");
    let active: Vec<&serde_json::Value> = view["nav"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["active"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["path"], "/reviews");
}

#[tokio::test]
async fn signed_out_public_page_has_no_chrome() {
    let state = test_app_state();
    let response = visit(&state, "/dyann").await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = body_json(response).await;
    assert_eq!(view["title"], "Upload Your Sales Data");
    assert_eq!(view["chrome"]["show_nav"], false);
    assert_eq!(view["nav"].as_array().unwrap().len(), 0);
    assert!(view["user_email"].is_null());
}

#[tokio::test]
async fn signed_out_login_is_honored() {
    let state = test_app_state();
    let response = visit(&state, "/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["path"], "/login");
}

#[tokio::test]
async fn unknown_page_is_not_found() {
    let state = test_app_state();
    let response = visit(&state, "/pricing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "E_NOT_FOUND");
}
