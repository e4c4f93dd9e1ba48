use std::sync::Mutex;

use super::*;
use crate::llm::LlmError;

struct MockGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    fn new(reply: Option<&str>) -> Self {
        Self { reply: reply.map(str::to_owned), prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        self.reply.clone().ok_or(LlmError::EmptyResponse)
    }
}

// =============================================================================
// TRANSCRIPT
// =============================================================================

#[test]
fn new_transcript_starts_with_greeting() {
    let transcript = Transcript::new();
    assert_eq!(transcript.messages().len(), 1);
    assert_eq!(transcript.messages()[0].role, Role::Assistant);
    assert!(transcript.messages()[0].content.starts_with("Hello! I'm Dyann AI"));
}

#[test]
fn push_user_trims_and_rejects_blank() {
    let mut transcript = Transcript::new();
    assert!(matches!(transcript.push_user("   \n"), Err(ChatError::EmptyMessage)));
    assert_eq!(transcript.messages().len(), 1);

    let message = transcript.push_user("  hi there ").unwrap();
    assert_eq!(message.content, "hi there");
    assert_eq!(message.role, Role::User);
    assert_eq!(transcript.messages().len(), 2);
}

#[test]
fn reset_restores_greeting_only() {
    let mut transcript = Transcript::new();
    transcript.push_user("hello").unwrap();
    transcript.push_assistant("hi");
    transcript.reset();
    assert_eq!(transcript.messages().len(), 1);
    assert_eq!(transcript.messages()[0].content, GREETING);
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[test]
fn export_uses_type_field() {
    let mut transcript = Transcript::new();
    transcript.push_user("sales?").unwrap();

    let json = serde_json::to_value(transcript.export()).unwrap();
    assert_eq!(json[0]["type"], "assistant");
    assert_eq!(json[1]["type"], "user");
    assert_eq!(json[1]["content"], "sales?");
    assert!(json[1]["timestamp"].is_i64());
}

#[test]
fn import_replaces_transcript() {
    let mut source = Transcript::new();
    source.push_user("question").unwrap();
    source.push_assistant("answer");
    let file = serde_json::to_string(&source.export()).unwrap();

    let mut target = Transcript::new();
    assert_eq!(target.import(&file).unwrap(), 3);
    let contents: Vec<&str> = target.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec![GREETING, "question", "answer"]);
    assert_eq!(target.messages()[1].timestamp, source.messages()[1].timestamp);
}

#[test]
fn import_accepts_iso_timestamps() {
    let mut transcript = Transcript::new();
    let file = r#"[
        {"timestamp": "2024-01-02T03:04:05.678Z", "type": "user", "content": "from a browser"},
        {"timestamp": 1704164645900, "type": "assistant", "content": "from an export"}
    ]"#;
    assert_eq!(transcript.import(file).unwrap(), 2);
    assert_eq!(transcript.messages()[0].timestamp, 1_704_164_645_678);
    assert_eq!(transcript.messages()[1].timestamp, 1_704_164_645_900);
}

#[test]
fn import_rejects_unreadable_timestamp_text() {
    let mut transcript = Transcript::new();
    let file = r#"[{"timestamp": "yesterday", "type": "user", "content": "hi"}]"#;
    let err = transcript.import(file).unwrap_err();
    assert!(matches!(err, ChatError::InvalidImport(ref m) if m.contains("yesterday")));
    assert_eq!(transcript.messages().len(), 1);
}

#[test]
fn import_rejects_whole_file_on_one_bad_entry() {
    let mut transcript = Transcript::new();
    transcript.push_user("keep me").unwrap();

    let file = r#"[
        {"timestamp": 1, "type": "user", "content": "fine"},
        {"timestamp": 2, "type": "robot", "content": "bad role"}
    ]"#;
    assert!(matches!(transcript.import(file), Err(ChatError::InvalidImport(_))));
    assert_eq!(transcript.messages().len(), 2);
    assert_eq!(transcript.messages()[1].content, "keep me");
}

#[test]
fn import_rejects_blank_content_and_empty_files() {
    let mut transcript = Transcript::new();
    let blank = r#"[{"timestamp": 1, "type": "user", "content": "  "}]"#;
    let err = transcript.import(blank).unwrap_err();
    assert!(matches!(err, ChatError::InvalidImport(ref m) if m.contains("entry 0")));

    assert!(matches!(transcript.import("[]"), Err(ChatError::InvalidImport(_))));
    assert!(matches!(transcript.import("{}"), Err(ChatError::InvalidImport(_))));
    assert_eq!(err.error_code(), "E_INVALID_IMPORT");
}

// =============================================================================
// REPLIES
// =============================================================================

#[test]
fn keyword_replies() {
    assert!(keyword_reply("Show me the SALES trend").contains("positive upward trend"));
    assert!(keyword_reply("any customer complaints?").contains("4.6/5.0"));
    assert!(keyword_reply("feedback summary").contains("4.6/5.0"));
    assert!(keyword_reply("what about profit").contains("$28,000"));
    assert!(keyword_reply("give me a forecast").contains("8-12%"));
    assert!(keyword_reply("hello").starts_with("I'd be happy to help"));
}

#[test]
fn sales_without_trend_is_not_the_trend_reply() {
    assert!(keyword_reply("sales").starts_with("I'd be happy to help"));
}

#[tokio::test]
async fn reply_without_model_uses_keywords() {
    let mut transcript = Transcript::new();
    transcript.push_user("revenue please").unwrap();
    let text = reply(None, transcript.messages(), "{}").await;
    assert!(text.contains("$28,000"));
}

#[tokio::test]
async fn reply_uses_model_with_history_and_context() {
    let llm = MockGenerator::new(Some("  Sales look strong.  "));
    let mut transcript = Transcript::new();
    transcript.push_user("how are we doing?").unwrap();

    let text = reply(Some(&llm), transcript.messages(), "{\"total_sales\": 125000}").await;
    assert_eq!(text, "Sales look strong.");

    let prompt = llm.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Dyann: Hello! I'm Dyann AI"));
    assert!(prompt.contains("User: how are we doing?"));
    assert!(prompt.contains("\"total_sales\": 125000"));
    assert!(prompt.ends_with("Dyann:"));
}

#[tokio::test]
async fn reply_falls_back_when_model_fails() {
    let llm = MockGenerator::new(None);
    let mut transcript = Transcript::new();
    transcript.push_user("forecast next quarter").unwrap();
    let text = reply(Some(&llm), transcript.messages(), "{}").await;
    assert!(text.contains("8-12%"));
}

#[test]
fn prompt_keeps_recent_history_only() {
    let mut transcript = Transcript::new();
    for i in 0..15 {
        transcript.push_user(&format!("question {i}")).unwrap();
    }
    let prompt = chat_prompt(transcript.messages(), "{}");
    assert!(!prompt.contains("question 4\n"));
    assert!(prompt.contains("question 5\n"));
    assert!(prompt.contains("question 14\n"));
    assert!(!prompt.contains("Hello! I'm Dyann AI"));
}
