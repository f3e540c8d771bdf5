//! Azure Cognitive Services text-to-speech
//!
//! Uses a short-lived bearer token issued for the subscription key. The
//! token is fetched lazily, reused until it expires, and refreshed once more
//! if the TTS endpoint rejects it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use super::{Synthesizer, VoiceParams};
use crate::{Error, Result};

/// Issued tokens are valid for 10 minutes; refresh well before that
const TOKEN_LIFETIME: Duration = Duration::from_secs(8 * 60);

const USER_AGENT: &str = concat!("tipster/", env!("CARGO_PKG_VERSION"));

/// Cached bearer token
struct TokenInfo {
    access_token: String,
    expires_at: Instant,
}

/// Azure TTS client
pub struct AzureSynthesizer {
    client: reqwest::Client,
    subscription_key: SecretString,
    token_url: String,
    tts_url: String,
    token: Mutex<Option<TokenInfo>>,
}

impl AzureSynthesizer {
    /// Create a client for the given region
    ///
    /// # Errors
    ///
    /// Returns error if the key or region is missing, or the HTTP client
    /// cannot be built
    pub fn new(subscription_key: SecretString, region: &str) -> Result<Self> {
        if subscription_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Azure speech subscription key required".to_string(),
            ));
        }
        if region.is_empty() {
            return Err(Error::Config("Azure speech region required".to_string()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            subscription_key,
            token_url: format!("https://{region}.api.cognitive.microsoft.com/sts/v1.0/issueToken"),
            tts_url: format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1"),
            token: Mutex::new(None),
        })
    }

    /// Point the client at different token and synthesis endpoints
    #[must_use]
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        tts_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.tts_url = tts_url.into();
        self
    }

    /// Get the cached token or fetch a new one
    async fn access_token(&self) -> Result<String> {
        {
            let guard = self.token.lock().await;
            if let Some(ref info) = *guard {
                if Instant::now() < info.expires_at {
                    tracing::trace!("using cached speech token");
                    return Ok(info.access_token.clone());
                }
            }
        }

        tracing::debug!("speech token expired, fetching new token");

        let response = self
            .client
            .post(&self.token_url)
            .header("Ocp-Apim-Subscription-Key", self.subscription_key.expose_secret())
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token request failed: {status} - {body}")));
        }

        let access_token = response.text().await?;
        if access_token.is_empty() {
            return Err(Error::Auth("token endpoint returned empty token".to_string()));
        }

        {
            let mut guard = self.token.lock().await;
            *guard = Some(TokenInfo {
                access_token: access_token.clone(),
                expires_at: Instant::now() + TOKEN_LIFETIME,
            });
        }

        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request(
        &self,
        token: &str,
        body: String,
        params: &VoiceParams,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.tts_url)
            .bearer_auth(token)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &params.output_format)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl Synthesizer for AzureSynthesizer {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let ssml = build_ssml(text, params);

        let token = self.access_token().await?;
        let mut response = self.request(&token, ssml.clone(), params).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("speech token rejected, refreshing and retrying once");
            self.invalidate_token().await;
            let token = self.access_token().await?;
            response = self.request(&token, ssml, params).await?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(Error::Auth("speech service rejected refreshed token".to_string()));
            }
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("Azure TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}

/// Wrap `text` in an SSML document for the requested voice
#[must_use]
pub fn build_ssml(text: &str, params: &VoiceParams) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'>\
         <voice xml:lang='{lang}' xml:gender='{gender}' name='{voice}'>{text}</voice>\
         </speak>",
        lang = escape_xml(&params.language),
        gender = escape_xml(&params.gender),
        voice = escape_xml(&params.voice),
        text = escape_xml(text),
    )
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssml_carries_voice_params() {
        let ssml = build_ssml("Keep your distance", &VoiceParams::default());
        assert!(ssml.starts_with("<speak version='1.0' xml:lang='en-US'>"));
        assert!(ssml.contains("xml:gender='Female'"));
        assert!(ssml.contains("name='en-US-JennyNeural'"));
        assert!(ssml.contains(">Keep your distance</voice>"));
    }

    #[test]
    fn ssml_escapes_markup() {
        let ssml = build_ssml("Tom & Jerry's <duel>", &VoiceParams::default());
        assert!(ssml.contains("Tom &amp; Jerry&apos;s &lt;duel&gt;"));
    }

    #[test]
    fn rejects_missing_credentials() {
        let err = AzureSynthesizer::new(SecretString::from(String::new()), "westus")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = AzureSynthesizer::new(SecretString::from("key".to_string()), "")
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn endpoints_use_region() {
        let synth = AzureSynthesizer::new(SecretString::from("key".to_string()), "eastus").unwrap();
        assert_eq!(
            synth.token_url,
            "https://eastus.api.cognitive.microsoft.com/sts/v1.0/issueToken"
        );
        assert_eq!(
            synth.tts_url,
            "https://eastus.tts.speech.microsoft.com/cognitiveservices/v1"
        );
    }

    #[test]
    fn endpoints_can_be_overridden() {
        let synth = AzureSynthesizer::new(SecretString::from("key".to_string()), "eastus")
            .unwrap()
            .with_endpoints("http://127.0.0.1:9/token", "http://127.0.0.1:9/tts");
        assert_eq!(synth.token_url, "http://127.0.0.1:9/token");
        assert_eq!(synth.tts_url, "http://127.0.0.1:9/tts");
    }
}
