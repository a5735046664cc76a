use crate::traits::{ChatMessage, Completion, CompletionRequest, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    response_format: OpenAIResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat<'a> {
    r#type: &'a str,
    json_schema: OpenAIJsonSchema<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIJsonSchema<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<Completion> {
        let openai_request = OpenAIRequest {
            model: &self.model,
            messages: request.messages,
            temperature: self.temperature,
            response_format: OpenAIResponseFormat {
                r#type: "json_schema",
                json_schema: OpenAIJsonSchema {
                    name: &request.schema.name,
                    schema: &request.schema.schema,
                    strict: false,
                },
            },
        };

        debug!(model = %self.model, messages = request.messages.len(), "OpenAI completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "OpenAI API error {}: {}",
                status,
                error_text
            ));
        }

        let openai_response: OpenAIResponse = response.json().await?;

        let message = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?
            .message;

        // A refusal or empty body is still a reply; the reasoner decides
        // whether it is usable.
        let text = message
            .content
            .filter(|c| !c.trim().is_empty())
            .or(message.refusal)
            .unwrap_or_default();

        Ok(Completion::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ResponseSchema;
    use serde_json::json;

    #[test]
    fn request_carries_json_schema_format() {
        let messages = vec![ChatMessage::user("hi")];
        let schema = ResponseSchema::new("next_step", json!({"type": "object"}));
        let request = OpenAIRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.0,
            response_format: OpenAIResponseFormat {
                r#type: "json_schema",
                json_schema: OpenAIJsonSchema {
                    name: &schema.name,
                    schema: &schema.schema,
                    strict: false,
                },
            },
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "next_step");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenAIProvider::new("sk").with_base_url("http://localhost:8000/v1/");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }
}
