use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

const SYSTEM_PROMPT: &str = concat!(
    "You generate valid Mermaid flowcharts for C code. ",
    "CRITICAL: Never use quotes inside node labels. ",
    "Use simple text without quotes or special characters. ",
    "Focus on main program flow."
);

const STUB_FLOWCHART: &str = "flowchart TD\n  Start([Start]) --> Process{{Analyze Code}}\n  Process --> End([End])";

/// Turns C source into Mermaid flowchart text.
#[async_trait]
pub trait FlowchartGenerator: Send + Sync {
    async fn generate(&self, code: &str) -> Result<String, GenerationError>;
}

/// Pick the Azure client when credentials are configured, otherwise the stub.
pub fn from_config(config: &AppConfig) -> Arc<dyn FlowchartGenerator> {
    match AzureOpenAiClient::from_config(config) {
        Some(client) => {
            tracing::info!(deployment = %client.deployment, "Using Azure OpenAI generator");
            Arc::new(client)
        }
        None => {
            tracing::warn!("Azure OpenAI not configured, using stub flowchart generator");
            Arc::new(StubGenerator)
        }
    }
}

/// Client for an Azure OpenAI chat deployment.
pub struct AzureOpenAiClient {
    http: Client,
    endpoint: String,
    deployment: String,
    api_key: String,
    api_version: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAiClient {
    pub fn new(endpoint: String, deployment: String, api_key: String, api_version: String) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_key,
            api_version,
        }
    }

    /// `None` unless endpoint, deployment and key are all set.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let endpoint = config.azure_api_endpoint.clone()?;
        let deployment = config.azure_deployment.clone()?;
        let api_key = config.azure_api_key.clone()?;
        Some(Self::new(
            endpoint,
            deployment,
            api_key,
            config.azure_api_version.clone(),
        ))
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl FlowchartGenerator for AzureOpenAiClient {
    async fn generate(&self, code: &str) -> Result<String, GenerationError> {
        let prompt = user_prompt(code);
        let body = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

fn user_prompt(code: &str) -> String {
    format!(
        "Analyze the following C code and produce a Mermaid flowchart representing the program flow.\n\n\
         IMPORTANT RULES for valid Mermaid syntax:\n\
         - Use flowchart TD syntax\n\
         - NEVER use quotes inside node labels\n\
         - Use simple descriptive text without quotes\n\
         - Example: A[Read input] not A[Read \"input\"]\n\n\
         Return ONLY a mermaid fenced block.\n\n\
         C code:\n{code}"
    )
}

/// Generator used when no model is configured.
pub struct StubGenerator;

#[async_trait]
impl FlowchartGenerator for StubGenerator {
    async fn generate(&self, _code: &str) -> Result<String, GenerationError> {
        Ok(STUB_FLOWCHART.to_string())
    }
}

/// Body of the first fenced block, or the whole text when there is none.
pub fn extract_mermaid(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?i)```(?:mermaid)?\s*([\s\S]*?)```").expect("fence pattern is valid")
    });

    match fence.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Strip double quotes from inside `[...]` and `(...)` node labels.
pub fn sanitize_mermaid(text: &str) -> String {
    text.lines()
        .map(|line| {
            // Each bracket kind is tracked on its own, so a `)` inside a
            // `[...]` label does not end the label.
            let (mut square, mut paren) = (0usize, 0usize);
            line.chars()
                .filter(|&c| {
                    match c {
                        '[' => square += 1,
                        ']' => square = square.saturating_sub(1),
                        '(' => paren += 1,
                        ')' => paren = paren.saturating_sub(1),
                        '"' if square > 0 || paren > 0 => return false,
                        _ => {}
                    }
                    true
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Model output in the shape the pipeline stores.
pub fn normalize(raw: &str) -> String {
    sanitize_mermaid(&extract_mermaid(raw))
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM call failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM call failed with status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}
