//! Client for a hosted, OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    NotConfigured,
    #[error("LLM request failed: {0}")]
    Transport(String),
    #[error("LLM API returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("LLM API rate limit exceeded")]
    UpstreamRateLimited,
    #[error("Unexpected LLM response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmAction {
    Explain,
    Refactor,
    GenerateTests,
    Optimize,
}

/// Incoming assistant request. `action: None` is a plain chat message.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub action: Option<LlmAction>,
}

/// Structured reply the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: String::from("system"),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: String::from("user"),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

const REPLY_FORMAT: &str = "Always answer with a single JSON object of the form \
{\"message\": string, \"code\": string or null, \"suggestions\": array of strings}. \
Put prose in \"message\", any complete code in \"code\", and short follow-up ideas in \"suggestions\".";

fn system_prompt(action: Option<LlmAction>) -> String {
    let task = match action {
        None => "You are a helpful programming assistant embedded in a code editor. \
                 Answer the user's question concisely.",
        Some(LlmAction::Explain) => "You are an expert programmer. Explain what the given code \
                 does, step by step, including any non-obvious behavior or pitfalls.",
        Some(LlmAction::Refactor) => "You are an expert programmer. Refactor the given code for \
                 readability and maintainability without changing its behavior. Return the full \
                 refactored code and summarize the changes.",
        Some(LlmAction::GenerateTests) => "You are an expert in software testing. Write thorough \
                 unit tests for the given code using the idiomatic test framework for its \
                 language. Cover normal cases, edge cases and error handling.",
        Some(LlmAction::Optimize) => "You are a performance engineer. Optimize the given code for \
                 speed and memory use without changing its behavior. Return the optimized code \
                 and list each improvement as a suggestion.",
    };
    format!("{} {}", task, REPLY_FORMAT)
}

/// Builds the system and user messages for one request.
pub fn build_messages(request: &AssistantRequest) -> Vec<ChatMessage> {
    let mut user = request.prompt.trim().to_string();
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        user.push_str("\n\nCode:\n```\n");
        user.push_str(context);
        if !context.ends_with('\n') {
            user.push('\n');
        }
        user.push_str("```");
    }
    vec![ChatMessage::system(system_prompt(request.action)), ChatMessage::user(user)]
}

/// Contents of a markdown code fence that wraps the entire text, if any.
/// Fences inside the text are left alone.
fn strip_outer_fence(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("```")?.strip_suffix("```")?;
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let (first_line, rest) = inner.split_once('\n')?;
    if first_line.trim().chars().any(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

/// Interprets the model's text. Anything that is not the expected JSON
/// object is passed through as the message.
pub fn parse_reply(content: &str) -> AssistantReply {
    let direct = serde_json::from_str::<AssistantReply>(content.trim());
    let parsed = match direct {
        Ok(reply) => Ok(reply),
        Err(e) => match strip_outer_fence(content) {
            Some(inner) => serde_json::from_str::<AssistantReply>(inner),
            None => Err(e),
        },
    };

    match parsed {
        Ok(reply) => reply,
        Err(e) => {
            log::warn!("LLM reply was not structured JSON ({}), returning raw text", e);
            AssistantReply {
                message: content.trim().to_string(),
                code: None,
                suggestions: Vec::new(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiAssistant {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl AiAssistant {
    pub fn new(api_key: Option<String>, base_url: &str, model: &str) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("codeforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(AiAssistant {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn complete(&self, request: &AssistantRequest) -> Result<AssistantReply, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let messages = build_messages(request);
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat { kind: "json_object" },
        };

        log::info!(
            "sending {} request to {}",
            request
                .action
                .map(|a| format!("{:?}", a))
                .unwrap_or_else(|| String::from("chat")),
            self.model
        );

        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                let completion: CompletionResponse = res
                    .json()
                    .await
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
                let content = completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| LlmError::InvalidResponse(String::from("no content in response")))?;
                Ok(parse_reply(&content))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(LlmError::UpstreamRateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(LlmError::Http { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: Option<LlmAction>, context: Option<&str>) -> AssistantRequest {
        AssistantRequest {
            prompt: String::from("  what does this do?  "),
            context: context.map(String::from),
            action,
        }
    }

    #[test]
    fn action_names_use_kebab_case() {
        let parsed: AssistantRequest =
            serde_json::from_str(r#"{"prompt": "x", "action": "generate-tests"}"#).unwrap();
        assert_eq!(parsed.action, Some(LlmAction::GenerateTests));
        assert!(serde_json::from_str::<AssistantRequest>(r#"{"prompt": "x", "action": "dance"}"#).is_err());
        assert!(serde_json::from_str::<AssistantRequest>(r#"{"context": "x"}"#).is_err());
    }

    #[test]
    fn each_action_gets_its_own_system_prompt() {
        let prompts: Vec<String> = [
            None,
            Some(LlmAction::Explain),
            Some(LlmAction::Refactor),
            Some(LlmAction::GenerateTests),
            Some(LlmAction::Optimize),
        ]
        .into_iter()
        .map(|a| build_messages(&request(a, None))[0].content.clone())
        .collect();

        for (i, a) in prompts.iter().enumerate() {
            assert!(a.contains("JSON"));
            for b in &prompts[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn context_is_fenced_in_user_message() {
        let messages = build_messages(&request(Some(LlmAction::Explain), Some("fn f() {}")));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(
            messages[1].content,
            "what does this do?\n\nCode:\n```\nfn f() {}\n```"
        );
    }

    #[test]
    fn blank_context_is_ignored() {
        let messages = build_messages(&request(None, Some("   ")));
        assert_eq!(messages[1].content, "what does this do?");
    }

    #[test]
    fn outer_fence_is_stripped() {
        let reply = parse_reply("```json\n{\"message\": \"hi\", \"suggestions\": []}\n```");
        assert_eq!(reply.message, "hi");
        assert_eq!(strip_outer_fence("```\n{}\n```"), Some("{}"));
        assert_eq!(strip_outer_fence("{\"a\": 1}"), None);
        assert_eq!(strip_outer_fence("Here you go:\n```json\n{}\n```"), None);
    }

    #[test]
    fn fenced_code_inside_message_is_kept() {
        let content = r#"{"message": "Use it like:\n```rust\nlet x = add(1, 2);\n```\nDone.", "code": "fn add(a: i32, b: i32) -> i32 { a + b }", "suggestions": ["add docs"]}"#;
        let reply = parse_reply(content);
        assert_eq!(reply.message, "Use it like:\n```rust\nlet x = add(1, 2);\n```\nDone.");
        assert_eq!(reply.code.as_deref(), Some("fn add(a: i32, b: i32) -> i32 { a + b }"));
        assert_eq!(reply.suggestions, vec!["add docs".to_string()]);
    }

    #[test]
    fn parse_structured_reply() {
        let reply = parse_reply(r#"{"message": "done", "code": "let x = 1;", "suggestions": ["add docs"]}"#);
        assert_eq!(reply.message, "done");
        assert_eq!(reply.code.as_deref(), Some("let x = 1;"));
        assert_eq!(reply.suggestions, vec!["add docs".to_string()]);
    }

    #[test]
    fn plain_text_reply_passes_through() {
        let reply = parse_reply("Just some prose.\n");
        assert_eq!(reply.message, "Just some prose.");
        assert!(reply.code.is_none());
        assert!(reply.suggestions.is_empty());
    }

    #[actix_rt::test]
    async fn missing_key_is_not_configured() {
        let assistant = AiAssistant::new(None, "http://localhost:1/v1", "test-model").unwrap();
        assert!(!assistant.is_configured());
        let err = assistant.complete(&request(None, None)).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
