//! # OpenAI TTS Integration
//!
//! Клиент OpenAI Text-to-Speech. Повторяет запрос с экспоненциальной
//! задержкой при 429, 5xx и сетевых ошибках.

use bytes::Bytes;
use log::{debug, error, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{AudioEncoding, TtsConfig, TtsModel};
use crate::errors::{AppError, AppResult};
use crate::services::tts::SpeechBackend;

const MAX_BACKOFF_SECS: u64 = 60;

/// Параметры запроса к API OpenAI TTS
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

pub struct OpenAiSpeechClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: TtsModel,
    speed: f32,
    encoding: AudioEncoding,
    max_attempts: u32,
}

impl OpenAiSpeechClient {
    pub fn new(config: &TtsConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/audio/speech", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            speed: config.speed,
            encoding: config.response_format,
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// 2^attempt секунд, не больше минуты
    fn backoff(attempt: u32) -> Duration {
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
    }
}

/// Достаёт `error.message` из тела ответа, иначе возвращает тело целиком
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait::async_trait]
impl SpeechBackend for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str, voice: &str) -> AppResult<Bytes> {
        let request = TtsRequest {
            model: self.model.as_str(),
            input: text,
            voice,
            speed: self.speed,
            response_format: self.encoding.as_str(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                "TTS request ({} chars, voice {}), attempt {}/{}",
                text.len(),
                voice,
                attempt,
                self.max_attempts
            );

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let audio = resp.bytes().await?;
                    debug!("Received {} bytes of audio", audio.len());
                    return Ok(audio);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let message = api_error_message(&body);
                    error!("OpenAI TTS error (status {}): {}", status, message);

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt >= self.max_attempts {
                        return Err(AppError::ApiError(format!("TTS API ({}): {}", status, message)));
                    }
                }
                Err(e) => {
                    error!("HTTP error calling OpenAI TTS: {}", e);
                    if attempt >= self.max_attempts {
                        return Err(e.into());
                    }
                }
            }

            let wait = Self::backoff(attempt);
            warn!("Retrying TTS request in {} s", wait.as_secs());
            tokio::time::sleep(wait).await;
        }
    }
}
