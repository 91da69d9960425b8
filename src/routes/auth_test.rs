use serde_json::{Value, json};

use super::*;
use crate::services::callback::CallbackError;
use crate::services::status::SessionStatus;
use crate::state::test_helpers::{github_user, spawn_app, test_app_state};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn signup_body(email: &str) -> Value {
    json!({
        "firstname": "Grace",
        "lastname": "Hopper",
        "email": email,
        "password": "cobol-1959",
    })
}

// =============================================================================
// session_error_status
// =============================================================================

#[test]
fn identity_errors_map_by_kind() {
    let rejected = SessionError::Identity(IdentityError::Rejected { status: 400, message: "bad".into() });
    assert_eq!(session_error_status(&rejected), StatusCode::UNAUTHORIZED);
    assert_eq!(session_error_status(&IdentityError::MissingUserId.into()), StatusCode::UNAUTHORIZED);
    assert_eq!(
        session_error_status(&IdentityError::UnsupportedProvider("gitlab".into()).into()),
        StatusCode::NOT_FOUND
    );
    assert_eq!(session_error_status(&IdentityError::Request("timeout".into()).into()), StatusCode::BAD_GATEWAY);
}

#[test]
fn profile_errors_map_by_kind() {
    assert_eq!(session_error_status(&ProfileStoreError::Conflict("u1".into()).into()), StatusCode::CONFLICT);
    assert_eq!(session_error_status(&ProfileStoreError::NotFound("u1".into()).into()), StatusCode::NOT_FOUND);
    assert_eq!(
        session_error_status(&ProfileStoreError::Response { status: 500, body: String::new() }.into()),
        StatusCode::BAD_GATEWAY
    );
}

#[test]
fn callback_and_unknown_errors_map() {
    assert_eq!(session_error_status(&CallbackError::MissingToken.into()), StatusCode::BAD_REQUEST);
    assert_eq!(session_error_status(&SessionError::Unknown("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// credentials over HTTP
// =============================================================================

#[tokio::test]
async fn register_login_and_me() {
    let (state, _h) = test_app_state();
    let addr = spawn_app(state).await;
    let http = client();

    let resp = http
        .post(format!("http://{addr}/api/auth/register"))
        .json(&signup_body("grace@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["firstname"], "Grace");
    assert_eq!(created["phonenumber"], "");

    let resp = http
        .post(format!("http://{addr}/api/auth/login"))
        .json(&json!({"email": "grace@example.com", "password": "cobol-1959"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let logged_in: Value = resp.json().await.unwrap();
    assert_eq!(logged_in["id"], created["id"]);

    let me: Value = http
        .get(format!("http://{addr}/api/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], "grace@example.com");

    let status: Value = http
        .get(format!("http://{addr}/api/auth/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "success");
    assert_eq!(status["message"], "Login successful!");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (state, _h) = test_app_state();
    let addr = spawn_app(state).await;

    let resp = client()
        .post(format!("http://{addr}/api/auth/login"))
        .json(&json!({"email": "nobody@example.com", "password": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "E_IDENTITY_REJECTED");
    assert_eq!(body["message"], "Invalid login credentials");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn duplicate_registration_is_unauthorized_with_provider_message() {
    let (state, _h) = test_app_state();
    let addr = spawn_app(state).await;
    let http = client();

    for expected in [reqwest::StatusCode::CREATED, reqwest::StatusCode::UNAUTHORIZED] {
        let resp = http
            .post(format!("http://{addr}/api/auth/register"))
            .json(&signup_body("dup@example.com"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected);
    }
}

#[tokio::test]
async fn me_without_session_is_not_found() {
    let (state, _h) = test_app_state();
    let resp = me(State(state)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// federated login over HTTP
// =============================================================================

#[tokio::test]
async fn oauth_start_redirects_and_leaves_status_loading() {
    let (state, h) = test_app_state();
    let addr = spawn_app(state).await;

    let resp = client().get(format!("http://{addr}/auth/GitHub")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get(reqwest::header::LOCATION).unwrap(),
        "https://auth.test/authorize?provider=github"
    );
    assert_eq!(h.service.status().status, SessionStatus::Loading);
}

#[tokio::test]
async fn oauth_start_unknown_provider_is_not_found() {
    let (state, h) = test_app_state();
    let resp = oauth_start(State(state), Path("myspace".to_owned())).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.service.status().seq, 0);
}

#[tokio::test]
async fn callback_query_completes_federated_login() {
    let (state, h) = test_app_state();
    h.identity.grant("jwt-gh", github_user("gh-7", Some("Linus Torvalds")));
    let addr = spawn_app(state).await;

    let resp = client()
        .get(format!("http://{addr}/auth/callback?access_token=jwt-gh&token_type=bearer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let profile: Value = resp.json().await.unwrap();
    assert_eq!(profile["id"], "gh-7");
    assert_eq!(profile["firstname"], "Linus");
    assert_eq!(profile["lastname"], "Torvalds");
    assert_eq!(h.profiles.count("gh-7"), 1);
}

#[tokio::test]
async fn callback_query_denied_is_bad_request() {
    let (state, h) = test_app_state();
    let addr = spawn_app(state).await;

    let resp = client()
        .get(format!("http://{addr}/auth/callback?error=access_denied&error_description=User+cancelled"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "E_CALLBACK_DENIED");
    assert_eq!(
        h.service.status().status,
        SessionStatus::Error("federated login denied: User cancelled".into())
    );
}

#[tokio::test]
async fn callback_post_reads_fragment_tokens() {
    let (state, h) = test_app_state();
    h.identity.grant("jwt-frag", github_user("gh-8", None));

    let resp = callback_url(
        State(state),
        Json(CallbackUrl { url: "account://login-callback#access_token=jwt-frag&expires_in=3600".into() }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.profiles.count("gh-8"), 1);
}

#[tokio::test]
async fn callback_post_without_token_is_bad_request_and_status_untouched() {
    let (state, h) = test_app_state();
    let resp = callback_url(State(state), Json(CallbackUrl { url: "https://app.example.com/home".into() })).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.service.status().seq, 0);
}

#[tokio::test]
async fn oauth_complete_retries_profile_sync_for_existing_session() {
    let (state, h) = test_app_state();
    h.identity.sign_in_as(github_user("gh-10", Some("Margaret Hamilton")));
    h.profiles.fail_inserts.store(true, std::sync::atomic::Ordering::SeqCst);
    let addr = spawn_app(state).await;
    let http = client();

    let resp = http.post(format!("http://{addr}/api/auth/oauth/complete")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(h.profiles.count("gh-10"), 0);

    h.profiles.fail_inserts.store(false, std::sync::atomic::Ordering::SeqCst);
    let resp = http.post(format!("http://{addr}/api/auth/oauth/complete")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let profile: Value = resp.json().await.unwrap();
    assert_eq!(profile["lastname"], "Hamilton");
    assert_eq!(h.profiles.count("gh-10"), 1);
}

#[tokio::test]
async fn oauth_complete_without_session_is_unauthorized() {
    let (state, _h) = test_app_state();
    let resp = oauth_complete(State(state)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_clears_session_and_resets_status() {
    let (state, h) = test_app_state();
    h.identity.sign_in_as(github_user("gh-9", None));
    let addr = spawn_app(state).await;

    let resp = client().post(format!("http://{addr}/api/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(!h.identity.has_session());
    assert_eq!(h.service.status().status, SessionStatus::Idle);
}

#[tokio::test]
async fn logout_provider_failure_reports_bad_gateway_but_still_resets() {
    let (state, h) = test_app_state();
    h.identity.fail_sign_out.store(true, std::sync::atomic::Ordering::SeqCst);
    let _ = h.service.authenticate("nobody@example.com", "pw").await;

    let resp = logout(State(state)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(h.service.status().status, SessionStatus::Idle);
}
