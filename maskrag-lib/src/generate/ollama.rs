use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generate::Generator;
use crate::{Error, Result};

/// Settings for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base URL of the server, without the API path
    pub endpoint: String,
    /// Model name as known to the server
    pub model: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "flan-t5-base".to_string(),
            max_tokens: 64,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generator backed by an Ollama-compatible HTTP server.
///
/// Decoding is greedy (temperature 0) so reruns over the same prompts give the
/// same answers.
pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    config: GeneratorConfig,
}

impl OllamaGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Generation(format!("failed to build HTTP client: {e}")))?;

        let url = format!("{}/api/generate", config.endpoint.trim_end_matches('/'));

        Ok(Self { client, url, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.config.max_tokens,
                temperature: 0.0,
            },
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&mut self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("HTTP {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid response body: {e}")))?;

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let generator = OllamaGenerator::new(GeneratorConfig {
            endpoint: "http://example.test:11434/".to_string(),
            ..GeneratorConfig::default()
        })
        .unwrap();
        assert_eq!(generator.url, "http://example.test:11434/api/generate");
    }

    #[test]
    fn test_request_body_shape() {
        let generator = OllamaGenerator::new(GeneratorConfig::default()).unwrap();
        let body = serde_json::to_value(generator.request("Context: x")).unwrap();

        assert_eq!(body["model"], "flan-t5-base");
        assert_eq!(body["prompt"], "Context: x");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_response_decoding() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"  Paris \n","done":true}"#).unwrap();
        assert_eq!(body.response.trim(), "Paris");
    }

    #[tokio::test]
    #[ignore] // Requires a running generation server
    async fn test_live_generation() {
        let mut generator = OllamaGenerator::new(GeneratorConfig::default()).unwrap();
        let answer = generator
            .generate(&crate::generate::build_prompt("The capital is Paris.", "What is the capital?"))
            .await
            .unwrap();
        assert!(!answer.is_empty());
    }
}
