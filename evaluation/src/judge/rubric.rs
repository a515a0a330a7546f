//! LLM-backed rubric judge over the Anthropic Messages API.

use super::{JudgeError, JudgeRequest, Score};
use flowforge_core::config::RubricJudgeConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You are a strict evaluator of graph-analysis answers. \
Score factual correctness, graph-domain precision, and task completion. \
An answer to an unanswerable question must abstain. \
Reply with JSON only: {\"score\": <0..1>, \"rationale\": \"<one sentence>\"}";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    score: f64,
    #[serde(default)]
    rationale: String,
}

/// Judge that asks a hosted model to grade the answer against a rubric.
#[derive(Debug, Clone)]
pub struct RubricJudge {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl RubricJudge {
    /// Create a judge from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError::MissingApiKey`] when no API key is configured.
    pub fn from_config(config: &RubricJudgeConfig) -> Result<Self, JudgeError> {
        let api_key = config.api_key.clone().ok_or(JudgeError::MissingApiKey)?;
        Ok(Self {
            client: Client::new(),
            api_key,
            api_url: format!("{}/v1", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Score one answer.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError`] for transport failures, API errors, or a reply
    /// that does not contain a JSON verdict.
    pub async fn score(&self, request: &JudgeRequest<'_>) -> Result<Score, JudgeError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: prompt(request),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.api_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::RequestFailed(e.to_string()))?;

        let response = match response.status() {
            StatusCode::OK => response
                .json::<MessagesResponse>()
                .await
                .map_err(|e| JudgeError::ResponseParseFailed(e.to_string()))?,
            StatusCode::TOO_MANY_REQUESTS => return Err(JudgeError::RateLimited),
            StatusCode::UNAUTHORIZED => return Err(JudgeError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(JudgeError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
        };

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        parse_verdict(&text)
    }
}

fn prompt(request: &JudgeRequest<'_>) -> String {
    format!(
        "Question: {}\nExpected: {}\nPrediction: {}\nUnanswerable by construction: {}",
        request.question, request.expected, request.produced, request.hard_negative
    )
}

/// Extract the JSON verdict from a model reply, tolerating surrounding prose.
fn parse_verdict(text: &str) -> Result<Score, JudgeError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(JudgeError::ResponseParseFailed(format!(
                "no JSON object in reply: {}",
                text.chars().take(120).collect::<String>()
            )));
        }
    };

    let verdict: Verdict =
        serde_json::from_str(json).map_err(|e| JudgeError::ResponseParseFailed(e.to_string()))?;
    if !verdict.score.is_finite() {
        return Err(JudgeError::ResponseParseFailed(
            "score is not a finite number".to_string(),
        ));
    }
    Ok(Score::new(verdict.score.clamp(0.0, 1.0), verdict.rationale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn judge(server: &MockServer) -> RubricJudge {
        RubricJudge::from_config(&RubricJudgeConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            ..RubricJudgeConfig::default()
        })
        .unwrap()
    }

    fn request() -> JudgeRequest<'static> {
        JudgeRequest {
            question: "Find each Person connected through OWNS",
            expected: "query: Person OWNS",
            produced: "query: Person OWNS (evidence from CypherExecutor)",
            hard_negative: false,
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 10}
        })
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = RubricJudge::from_config(&RubricJudgeConfig::default()).unwrap_err();
        assert!(matches!(err, JudgeError::MissingApiKey));
    }

    #[test]
    fn test_parse_verdict_tolerates_prose_and_clamps() {
        let score = parse_verdict("Sure. {\"score\": 1.4, \"rationale\": \"correct\"} Done.").unwrap();
        assert!((score.value - 1.0).abs() < f64::EPSILON);
        assert_eq!(score.rationale, "correct");
        assert!(parse_verdict("no verdict").is_err());
    }

    #[tokio::test]
    async fn test_scores_from_api_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply("{\"score\": 0.8, \"rationale\": \"grounded\"}")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let score = judge(&server).score(&request()).await.unwrap();
        assert!((score.value - 0.8).abs() < 1e-9);
        assert_eq!(score.rationale, "grounded");
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = judge(&server).score(&request()).await.unwrap_err();
        assert!(matches!(err, JudgeError::RateLimited));
    }
}
