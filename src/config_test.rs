use super::*;
use std::sync::Mutex;

/// Serializes tests that touch the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: [&str; 8] = [
    "HOST",
    "PORT",
    "AUTH_TIMEOUT_SECS",
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_BASE_URL",
    "FIREBASE_TOKEN_URL",
    "FIREBASE_DATABASE_URL",
    "REVIEWS_POLL_SECS",
];

/// # Safety
/// Callers hold `ENV_LOCK`, so no other test in this module mutates env concurrently.
unsafe fn clear_app_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_app_env() };

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.bind_address(), "127.0.0.1:3000");
    assert_eq!(cfg.auth_timeout, Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS));
    assert!(cfg.firebase_auth.is_none());
    assert!(cfg.realtime_db.is_none());
}

#[test]
fn from_env_reads_hosted_adapters() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_app_env();
        std::env::set_var("HOST", "0.0.0.0");
        std::env::set_var("PORT", "8080");
        std::env::set_var("AUTH_TIMEOUT_SECS", "3");
        std::env::set_var("FIREBASE_API_KEY", "fb-key");
        std::env::set_var("FIREBASE_DATABASE_URL", "https://demo-default-rtdb.firebaseio.com/");
        std::env::set_var("REVIEWS_POLL_SECS", "30");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
    assert_eq!(cfg.auth_timeout, Duration::from_secs(3));
    let auth = cfg.firebase_auth.unwrap();
    assert_eq!(auth.api_key, "fb-key");
    assert_eq!(auth.identity_base_url, DEFAULT_IDENTITY_BASE_URL);
    assert_eq!(auth.token_url, DEFAULT_SECURE_TOKEN_URL);
    let db = cfg.realtime_db.unwrap();
    assert_eq!(db.database_url, "https://demo-default-rtdb.firebaseio.com");
    assert_eq!(db.poll_interval, Duration::from_secs(30));

    unsafe { clear_app_env() };
}

#[test]
fn unparseable_numbers_fall_back() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_app_env();
        std::env::set_var("PORT", "eighty");
        std::env::set_var("AUTH_TIMEOUT_SECS", "-1");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.auth_timeout, Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS));

    unsafe { clear_app_env() };
}

#[test]
fn invalid_host_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_app_env();
        std::env::set_var("HOST", "not a host");
    }

    assert!(matches!(AppConfig::from_env(), Err(ConfigError::InvalidBindAddress(_))));

    unsafe { clear_app_env() };
}

#[test]
fn host_names_and_ipv6_literals_bind() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_app_env();
        std::env::set_var("HOST", "localhost");
    }
    assert_eq!(AppConfig::from_env().unwrap().bind_address(), "localhost:3000");

    unsafe { std::env::set_var("HOST", "::1") };
    assert_eq!(AppConfig::from_env().unwrap().bind_address(), "[::1]:3000");

    unsafe { std::env::set_var("HOST", "[::]") };
    assert_eq!(AppConfig::from_env().unwrap().bind_address(), "[::]:3000");

    unsafe { clear_app_env() };
}

#[tokio::test]
async fn ipv6_loopback_address_is_bindable() {
    let cfg = AppConfig {
        host: "::1".into(),
        port: 0,
        auth_timeout: Duration::from_secs(1),
        firebase_auth: None,
        realtime_db: None,
    };
    // Hosts without IPv6 loopback cannot bind; the address must still parse.
    if let Err(e) = tokio::net::TcpListener::bind(cfg.bind_address()).await {
        assert_ne!(e.kind(), std::io::ErrorKind::InvalidInput, "{e}");
    }
}

#[test]
fn non_http_database_url_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_app_env();
        std::env::set_var("FIREBASE_DATABASE_URL", "demo-default-rtdb");
    }

    let err = AppConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("FIREBASE_DATABASE_URL"));

    unsafe { clear_app_env() };
}

#[test]
fn debug_hides_firebase_key() {
    let cfg = FirebaseAuthConfig {
        api_key: "fb-secret".into(),
        identity_base_url: DEFAULT_IDENTITY_BASE_URL.into(),
        token_url: DEFAULT_SECURE_TOKEN_URL.into(),
    };
    assert!(!format!("{cfg:?}").contains("fb-secret"));
}
