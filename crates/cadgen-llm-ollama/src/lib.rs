use anyhow::{Context, Result, anyhow};
use cadgen_llm::{CompletionRequest, TextCompletion};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct OllamaClient {
    pub base_url: String,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            probe_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn is_reachable(&self) -> bool {
        let client = match Client::builder().timeout(self.probe_timeout).build() {
            Ok(c) => c,
            Err(_) => return false,
        };

        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        client
            .get(url)
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl TextCompletion for OllamaClient {
    fn complete(&self, req: &CompletionRequest, model: &str) -> Result<String> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let response = client
            .post(url)
            .json(&GenerateRequest {
                model,
                prompt: &req.prompt,
                stream: false,
            })
            .send()
            .with_context(|| format!("failed calling Ollama for {}", req.request_id))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(anyhow!("Ollama request failed ({status}): {body}"));
        }

        let parsed: GenerateResponse = response
            .json()
            .context("failed to decode Ollama response")?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::OllamaClient;
    use cadgen_llm::{CompletionRequest, TextCompletion};

    #[test]
    fn unreachable_endpoint_fails_probe() {
        let client = OllamaClient::new("http://127.0.0.1:1".to_string());
        assert!(!client.is_reachable());
    }

    #[test]
    #[ignore]
    fn live_ollama_completion_if_enabled() {
        if std::env::var("CADGEN_RUN_LIVE_TESTS").ok().as_deref() != Some("1") {
            return;
        }

        let base = std::env::var("CADGEN_OLLAMA_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        let model = std::env::var("CADGEN_MODEL")
            .unwrap_or_else(|_| "qwen2.5-coder:7b".to_string());

        let client = OllamaClient::new(base);
        let req = CompletionRequest {
            prompt: "Reply with the single word: ok".to_string(),
            request_id: "live-probe".to_string(),
        };

        let out = client
            .complete(&req, &model)
            .expect("ollama live request should succeed");
        assert!(!out.trim().is_empty());
    }
}
