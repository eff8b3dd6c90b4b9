//! 언어 모델 완성 모듈 - Gemini generateContent API
//!
//! 프롬프트를 받아 답변 텍스트를 생성합니다.
//! 호출당 지연/비용이 발생하므로 실패 시에만 제한적으로 재시도합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 언어 모델 완성 프로바이더 트레이트
///
/// 실제 HTTP 구현과 테스트용 결정적 스텁을 같은 인터페이스로 교체할 수 있습니다.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 프롬프트에 대한 완성 텍스트 생성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Completion
// ============================================================================

/// Gemini 텍스트 생성 API 엔드포인트
/// source: https://ai.google.dev/gemini-api/docs/text-generation
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// HTTP 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// 일시적 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 2;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;
/// 답변 일관성을 위한 낮은 temperature
const TEMPERATURE: f32 = 0.2;

/// Google Gemini 완성 구현체
#[derive(Debug)]
pub struct GeminiCompletion {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiCompletion {
    /// 새 Gemini 완성 인스턴스 생성
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QaError::Generation(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { api_key, client })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        let api_key = crate::embedding::get_api_key()
            .map_err(|e| QaError::Generation(e.to_string()))?;
        Self::new(api_key)
    }
}

/// Gemini generateContent 요청 본문
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// Gemini generateContent 응답
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiApiError {
    error: GeminiApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiApiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl CompletionProvider for GeminiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        };

        let mut last_error: Option<QaError> = None;

        for attempt in 0..=MAX_RETRIES {
            let response = match self
                .client
                .post(GEMINI_GENERATE_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(QaError::Generation(format!(
                        "Failed to send generation request: {}",
                        e
                    )));
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Generation request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| QaError::Generation(format!("Failed to read response body: {}", e)))?;

            if status.is_success() {
                let generate_response: GenerateResponse =
                    serde_json::from_str(&body).map_err(|e| {
                        QaError::Generation(format!("Failed to parse generation response: {}", e))
                    })?;

                let answer: String = generate_response
                    .candidates
                    .into_iter()
                    .next()
                    .map(|c| {
                        c.content
                            .parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();

                if answer.trim().is_empty() {
                    return Err(QaError::Generation(
                        "Model returned an empty answer".to_string(),
                    ));
                }
                return Ok(answer);
            }

            // 429 Rate Limit 에러 - 재시도
            if status.as_u16() == 429 {
                last_error = Some(QaError::Generation("Rate limit exceeded (429)".to_string()));
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<GeminiApiError>(&body) {
                    return Err(QaError::Generation(format!(
                        "Gemini API error ({}): {}",
                        error.error.status, error.error.message
                    )));
                }
                return Err(QaError::Generation(format!(
                    "Gemini API error ({}): {}",
                    status, body
                )));
            }
        }

        Err(last_error.unwrap_or_else(|| {
            QaError::Generation(format!("Generation failed after {} retries", MAX_RETRIES))
        }))
    }

    fn name(&self) -> &str {
        "gemini-2.0-flash"
    }
}

// ============================================================================
// Tests
// ============================================================================
