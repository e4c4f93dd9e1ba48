//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the one session store of this process, the review store, the
//! optional generative model, the latest uploaded sales summary, and the
//! assistant transcript. The transcript is reset whenever the session ends,
//! through a session subscription that lives as long as the state.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use crate::llm::TextGenerator;
use crate::services::analytics::{self, DashboardView};
use crate::services::assistant::Transcript;
use crate::services::reviews::ReviewStore;
use crate::services::upload::SalesSummary;
use crate::session::{SessionStore, Subscription};

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionStore>,
    pub reviews: Arc<dyn ReviewStore>,
    /// Optional model client. `None` if the model env vars are not configured.
    pub llm: Option<Arc<dyn TextGenerator>>,
    /// Latest successful upload. `None` until one succeeds.
    pub sales: Arc<RwLock<Option<SalesSummary>>>,
    pub chat: Arc<Mutex<Transcript>>,
    /// Fires on process shutdown so long-lived responses can end.
    pub shutdown: CancellationToken,
    _chat_reset: Arc<Subscription>,
}

impl AppState {
    #[must_use]
    pub fn new(
        session: Arc<SessionStore>,
        reviews: Arc<dyn ReviewStore>,
        llm: Option<Arc<dyn TextGenerator>>,
        shutdown: CancellationToken,
    ) -> Self {
        let chat = Arc::new(Mutex::new(Transcript::new()));
        let chat_reset = {
            let chat = Arc::downgrade(&chat);
            session.subscribe(move |next| {
                if next.is_some() {
                    return;
                }
                if let Some(chat) = chat.upgrade() {
                    chat.lock().unwrap_or_else(PoisonError::into_inner).reset();
                }
            })
        };

        Self {
            session,
            reviews,
            llm,
            sales: Arc::new(RwLock::new(None)),
            chat,
            shutdown,
            _chat_reset: Arc::new(chat_reset),
        }
    }

    /// The model as a borrowed trait object, for service calls.
    #[must_use]
    pub fn llm(&self) -> Option<&dyn TextGenerator> {
        self.llm.as_deref()
    }

    /// Dashboard figures from the latest upload, or the sample data.
    #[must_use]
    pub fn dashboard(&self) -> DashboardView {
        let sales = self.sales.read().unwrap_or_else(PoisonError::into_inner);
        analytics::dashboard(sales.as_ref())
    }

    pub fn replace_sales(&self, summary: SalesSummary) {
        *self.sales.write().unwrap_or_else(PoisonError::into_inner) = Some(summary);
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::llm::LlmError;
    use crate::services::reviews::MemoryReviewStore;
    use crate::session::local::LocalIdentity;
    use crate::session::{DEFAULT_AUTH_TIMEOUT, Session};

    pub const TEST_EMAIL: &str = "operator@example.com";
    pub const TEST_SECRET: &str = "hunter22";

    /// Create a test `AppState` with an in-process identity provider and no model.
    #[must_use]
    pub fn test_app_state() -> AppState {
        build(None)
    }

    /// Create a test `AppState` with a mock model.
    #[must_use]
    pub fn test_app_state_with_llm(llm: Arc<dyn TextGenerator>) -> AppState {
        build(Some(llm))
    }

    /// Sign the test operator up (and therefore in).
    pub async fn sign_in(state: &AppState) -> Session {
        state
            .session
            .sign_up(TEST_EMAIL, TEST_SECRET)
            .await
            .expect("test sign-up should succeed")
    }

    /// Model double that answers every prompt with the same text and
    /// records what it was asked.
    pub struct ScriptedModel {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(text.to_owned()), prompts: Mutex::new(Vec::new()) })
        }

        /// Every call fails with an HTTP error of `status`.
        pub fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self { reply: Err(status), prompts: Mutex::new(Vec::new()) })
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_owned());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::ApiResponse { status: *status, body: String::new() }),
            }
        }
    }

    fn build(llm: Option<Arc<dyn TextGenerator>>) -> AppState {
        let session = Arc::new(SessionStore::new(Arc::new(LocalIdentity::new()), DEFAULT_AUTH_TIMEOUT));
        AppState::new(session, Arc::new(MemoryReviewStore::new()), llm, CancellationToken::new())
    }
}
