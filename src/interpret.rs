//! Client side of the language-model interpreter.
//!
//! The interpreter is expected, by convention only, to answer with one
//! `Rank:` / `Gene:` / `Interpretation:` triple per gene; see [`crate::ranks`].

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub const DEFAULT_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are a clinical geneticist analyzing research about genetic \
variants and rare diseases. Base every statement on the scientific articles provided.";

pub trait Interpreter {
    fn interpret(&self, genes: &str, phenotypes: &str, context: &str) -> Result<String>;
}

pub fn build_prompt(genes: &str, phenotypes: &str, context: &str) -> String {
    format!(
        "Based on the following scientific articles:\n\n{context}\n\n\
         Rank the candidate genes {genes} by how well they explain the phenotypes: {phenotypes}.\n\
         For every gene answer with exactly these lines:\n\
         Rank: <number>\nGene: <symbol>\nInterpretation: <evidence-based explanation>"
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client (OpenRouter by default).
pub struct ChatInterpreter {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl ChatInterpreter {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, temperature: f32) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(600)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
            temperature,
        })
    }
}

impl Interpreter for ChatInterpreter {
    #[instrument(skip(self, context), fields(model = %self.model))]
    fn interpret(&self, genes: &str, phenotypes: &str, context: &str) -> Result<String> {
        let prompt = build_prompt(genes, phenotypes, context);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            debug!(%status, %detail, "interpreter request failed");
            return Err(Error::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Interpreter("response has no message content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_inputs() {
        let prompt = build_prompt("BRCA1, TP53", "breast cancer", "Title: X");
        assert!(prompt.contains("Title: X"));
        assert!(prompt.contains("BRCA1, TP53"));
        assert!(prompt.contains("phenotypes: breast cancer."));
        assert!(prompt.ends_with("Interpretation: <evidence-based explanation>"));
    }

    #[test]
    fn test_parse_chat_response() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Rank: 1\nGene: BRCA1"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Rank: 1\nGene: BRCA1")
        );
    }
}
