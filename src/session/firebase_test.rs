use std::collections::VecDeque;

use super::*;

/// Answers refreshes from a script and records the tokens it was handed.
#[derive(Default)]
struct ScriptedRefresher {
    answers: Mutex<VecDeque<Result<TokenGrant, RefreshError>>>,
    presented: Mutex<Vec<String>>,
}

impl ScriptedRefresher {
    fn answering(answers: Vec<Result<TokenGrant, RefreshError>>) -> Arc<Self> {
        Arc::new(Self { answers: Mutex::new(answers.into()), presented: Mutex::default() })
    }

    fn presented(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        self.presented.lock().unwrap().push(refresh_token.to_owned());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::Transient("script exhausted".into())))
    }
}

fn provider_with(refresher: Arc<ScriptedRefresher>) -> FirebaseIdentity {
    FirebaseIdentity::with_refresher(reqwest::Client::new(), "key".into(), DEFAULT_IDENTITY_BASE_URL, refresher)
}

fn hour_grant(refresh_token: Option<&str>) -> Grant {
    Grant {
        session: Session::new("uid-9", "a@b.com").unwrap(),
        lifetime: Duration::from_secs(3600),
        refresh_token: refresh_token.map(str::to_owned),
    }
}

fn renewed(refresh_token: &str) -> Result<TokenGrant, RefreshError> {
    Ok(TokenGrant { lifetime: Duration::from_secs(3600), refresh_token: refresh_token.into() })
}

/// Let spawned timer tasks run after the clock moves.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn error_body(message: &str) -> String {
    serde_json::json!({
        "error": { "code": 400, "message": message, "errors": [] }
    })
    .to_string()
}

#[test]
fn parse_grant_success() {
    let body = serde_json::json!({
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": "uid-123",
        "email": "a@b.com",
        "idToken": "tok",
        "refreshToken": "ref",
        "expiresIn": "1800"
    })
    .to_string();
    let grant = parse_grant(200, &body).unwrap();
    assert_eq!(grant.session, Session::new("uid-123", "a@b.com").unwrap());
    assert_eq!(grant.lifetime, Duration::from_secs(1800));
    assert_eq!(grant.refresh_token.as_deref(), Some("ref"));
}

#[test]
fn parse_grant_defaults_lifetime() {
    let body = serde_json::json!({ "localId": "uid-1", "email": "a@b.com" }).to_string();
    let grant = parse_grant(200, &body).unwrap();
    assert_eq!(grant.lifetime, Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS));
    assert!(grant.refresh_token.is_none());
}

#[test]
fn parse_grant_rejects_blank_identity() {
    let body = serde_json::json!({ "localId": "", "email": "a@b.com" }).to_string();
    assert!(matches!(parse_grant(200, &body), Err(AuthError::Unknown(_))));
}

#[test]
fn parse_grant_maps_bad_password() {
    let err = parse_grant(400, &error_body("INVALID_PASSWORD")).unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[test]
fn parse_grant_maps_login_credentials() {
    let err = parse_grant(400, &error_body("INVALID_LOGIN_CREDENTIALS")).unwrap_err();
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[test]
fn parse_grant_non_json_error_is_unknown() {
    let err = parse_grant(502, "<html>bad gateway</html>").unwrap_err();
    assert!(matches!(err, AuthError::Unknown(msg) if msg.contains("502")));
}

#[test]
fn map_error_message_strips_detail_suffix() {
    let err = map_error_message("WEAK_PASSWORD : Password should be at least 6 characters");
    assert!(matches!(err, AuthError::InvalidInput(_)));
}

#[test]
fn map_error_message_email_exists() {
    let err = map_error_message("EMAIL_EXISTS");
    assert!(matches!(err, AuthError::Unknown(msg) if msg == "email already in use"));
}

#[test]
fn map_error_message_unknown_code_kept_verbatim() {
    let err = map_error_message("OPERATION_NOT_ALLOWED");
    assert!(matches!(err, AuthError::Unknown(msg) if msg == "OPERATION_NOT_ALLOWED"));
}

#[test]
fn parse_refresh_success() {
    let body = serde_json::json!({
        "expires_in": "3600",
        "token_type": "Bearer",
        "refresh_token": "ref-2",
        "id_token": "tok-2",
        "user_id": "uid-123",
        "project_id": "1234"
    })
    .to_string();
    assert_eq!(parse_refresh(200, &body).unwrap(), TokenGrant {
        lifetime: Duration::from_secs(3600),
        refresh_token: "ref-2".into()
    });
}

#[test]
fn parse_refresh_client_errors_are_rejections() {
    assert_eq!(parse_refresh(400, &error_body("TOKEN_EXPIRED")), Err(RefreshError::Rejected("TOKEN_EXPIRED".into())));
    assert_eq!(parse_refresh(400, &error_body("USER_DISABLED")), Err(RefreshError::Rejected("USER_DISABLED".into())));
    assert!(matches!(parse_refresh(403, "forbidden"), Err(RefreshError::Rejected(_))));
}

#[test]
fn parse_refresh_server_errors_are_transient() {
    assert!(matches!(parse_refresh(503, "unavailable"), Err(RefreshError::Transient(msg)) if msg.contains("503")));
    assert!(matches!(parse_refresh(200, "{}"), Err(RefreshError::Transient(_))));
}

// =============================================================================
// REFRESH TIMER
// =============================================================================

#[tokio::test(start_paused = true)]
async fn token_is_refreshed_before_it_lapses() {
    let refresher = ScriptedRefresher::answering(vec![renewed("ref-2"), renewed("ref-3")]);
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(Some("ref-1")));
    settle().await;

    tokio::time::advance(Duration::from_secs(3301)).await;
    settle().await;
    assert_eq!(refresher.presented(), vec!["ref-1".to_owned()]);

    tokio::time::advance(Duration::from_secs(3301)).await;
    settle().await;
    assert_eq!(refresher.presented(), vec!["ref-1".to_owned(), "ref-2".to_owned()]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn rejected_refresh_reports_expiry() {
    let refresher = ScriptedRefresher::answering(vec![
        renewed("ref-2"),
        Err(RefreshError::Rejected("TOKEN_EXPIRED".into())),
    ]);
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(Some("ref-1")));

    assert_eq!(rx.recv().await.unwrap(), ProviderEvent::Expired { session_id: "uid-9".into() });
    assert_eq!(refresher.presented(), vec!["ref-1".to_owned(), "ref-2".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn transient_refresh_failure_is_retried() {
    let refresher = ScriptedRefresher::answering(vec![
        Err(RefreshError::Transient("status 503".into())),
        renewed("ref-2"),
    ]);
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(Some("ref-1")));
    settle().await;

    tokio::time::advance(Duration::from_secs(3301)).await;
    settle().await;
    tokio::time::advance(REFRESH_RETRY_DELAY + Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(refresher.presented(), vec!["ref-1".to_owned(), "ref-1".to_owned()]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn repeated_transient_failures_report_expiry() {
    let refresher = ScriptedRefresher::answering(Vec::new());
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(Some("ref-1")));

    assert_eq!(rx.recv().await.unwrap(), ProviderEvent::Expired { session_id: "uid-9".into() });
    assert_eq!(refresher.presented().len(), MAX_REFRESH_ATTEMPTS as usize);
}

#[tokio::test(start_paused = true)]
async fn grant_without_refresh_token_expires_with_id_token() {
    let refresher = ScriptedRefresher::answering(Vec::new());
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(None));
    settle().await;

    tokio::time::advance(Duration::from_secs(3599)).await;
    settle().await;
    assert!(rx.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(rx.recv().await.unwrap(), ProviderEvent::Expired { session_id: "uid-9".into() });
    assert!(refresher.presented().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sign_out_cancels_refresh_timer() {
    let refresher = ScriptedRefresher::answering(vec![Err(RefreshError::Rejected("TOKEN_EXPIRED".into()))]);
    let provider = provider_with(refresher.clone());
    let mut rx = provider.changes();
    provider.schedule_expiry(&hour_grant(Some("ref-1")));
    provider.sign_out().await.unwrap();

    tokio::time::advance(Duration::from_secs(7200)).await;
    settle().await;
    assert!(rx.try_recv().is_err());
    assert!(refresher.presented().is_empty());
}
