//! Request/response calls to the challenge REST endpoints

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::challenge::models::{ChallengeLookup, JoinResponse, ProgressSnapshot};
use crate::config::ClientConfig;
use crate::error::{KahootError, Result};

/// The calls the challenge poller depends on
#[async_trait]
pub trait ChallengeApi: Send + Sync {
    /// Look a challenge up by its pin
    async fn resolve_pin(&self, pin: &str) -> Result<ChallengeLookup>;
    /// Fetch the shared progress, optionally only up to a question index
    async fn progress(&self, challenge_id: &str, up_to_question: Option<usize>) -> Result<ProgressSnapshot>;
    async fn join(&self, challenge_id: &str, nickname: &str) -> Result<JoinResponse>;
    async fn submit_answers(&self, challenge_id: &str, payload: &Value) -> Result<()>;
}

/// HTTP implementation backed by a shared `reqwest::Client`
pub struct ReqwestChallengeApi {
    client: reqwest::Client,
    base: Url,
}

impl ReqwestChallengeApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.device.user_agent)
                .map_err(|e| KahootError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(REFERER, HeaderValue::from_static("https://kahoot.it/"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.8"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_budget())
            .build()?;

        Ok(Self::with_client(client, config.challenge_base()?))
    }

    /// Use a preconfigured dispatcher (proxying, TLS and redirects are its
    /// concern)
    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KahootError::HttpError(format!("{}: {}", status, body)));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ChallengeApi for ReqwestChallengeApi {
    async fn resolve_pin(&self, pin: &str) -> Result<ChallengeLookup> {
        let url = self.endpoint(&format!("pin/{}", pin))?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn progress(&self, challenge_id: &str, up_to_question: Option<usize>) -> Result<ProgressSnapshot> {
        let mut url = self.endpoint(&format!("{}/progress", challenge_id))?;
        if let Some(question) = up_to_question {
            url.query_pairs_mut()
                .append_pair("upToQuestion", &question.to_string());
        }
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn join(&self, challenge_id: &str, nickname: &str) -> Result<JoinResponse> {
        let mut url = self.endpoint(&format!("{}/join/", challenge_id))?;
        url.query_pairs_mut().append_pair("nickname", nickname);
        debug!("POST {}", url);
        let response = self.client.post(url).send().await?;
        Self::read_json(response).await
    }

    async fn submit_answers(&self, challenge_id: &str, payload: &Value) -> Result<()> {
        let url = self.endpoint(&format!("{}/answers", challenge_id))?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KahootError::HttpError(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_resolve_under_challenge_base() {
        let api = ReqwestChallengeApi::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            api.endpoint("pin/0123456").unwrap().as_str(),
            "https://kahoot.it/rest/challenges/pin/0123456"
        );
        assert_eq!(
            api.endpoint("abc/answers").unwrap().as_str(),
            "https://kahoot.it/rest/challenges/abc/answers"
        );
    }
}
