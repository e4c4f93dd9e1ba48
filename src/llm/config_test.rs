use super::*;
use std::sync::Mutex;

/// Serializes tests that touch the process environment.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK`, so no other test in this module mutates env concurrently.
unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("GEMINI_API_KEY_ENV");
        std::env::remove_var("GEMINI_API_KEY");
        std::env::remove_var("GEMINI_MODEL");
        std::env::remove_var("GEMINI_BASE_URL");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("TEST_GEMINI_KEY");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.api_key, "secret");
    assert_eq!(cfg.model, DEFAULT_GEMINI_MODEL);
    assert_eq!(cfg.base_url, DEFAULT_GEMINI_BASE_URL);
    assert_eq!(
        cfg.timeouts,
        LlmTimeouts { request_secs: DEFAULT_LLM_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS }
    );

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY_ENV", "TEST_GEMINI_KEY");
        std::env::set_var("TEST_GEMINI_KEY", "k-test");
        std::env::set_var("GEMINI_MODEL", "gemini-2.0-flash");
        std::env::set_var("GEMINI_BASE_URL", "https://example.test/v1beta/");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.api_key, "k-test");
    assert_eq!(cfg.model, "gemini-2.0-flash");
    assert_eq!(cfg.base_url, "https://example.test/v1beta");
    assert_eq!(cfg.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_missing_key_names_the_variable() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY_ENV", "TEST_GEMINI_KEY");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { ref var } if var == "TEST_GEMINI_KEY"));

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_rejects_model_with_path() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "secret");
        std::env::set_var("GEMINI_MODEL", "models/evil");
    }

    let err = LlmConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("invalid GEMINI_MODEL"));

    unsafe { clear_llm_env() };
}

#[test]
fn bad_timeout_falls_back_to_default() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("GEMINI_API_KEY", "secret");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_LLM_REQUEST_TIMEOUT_SECS);

    unsafe { clear_llm_env() };
}

#[test]
fn debug_hides_api_key() {
    let cfg = LlmConfig {
        api_key: "super-secret".into(),
        model: DEFAULT_GEMINI_MODEL.into(),
        base_url: DEFAULT_GEMINI_BASE_URL.into(),
        timeouts: LlmTimeouts { request_secs: 1, connect_secs: 1 },
    };
    assert!(!format!("{cfg:?}").contains("super-secret"));
}
