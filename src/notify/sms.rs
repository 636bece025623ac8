// src/notify/sms.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::AlertSink;
use crate::config::TwilioCredentials;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";
/// Two SMS segments.
const MAX_BODY_CHARS: usize = 320;

#[derive(Clone)]
pub struct TwilioSms {
    creds: TwilioCredentials,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSms {
    pub fn new(creds: TwilioCredentials) -> Self {
        Self {
            creds,
            api_base: TWILIO_API.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Points the sink at another API root (test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.creds.account_sid
        )
    }
}

/// Cuts `body` to the SMS budget on a char boundary.
pub fn clamp_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(MAX_BODY_CHARS - 1).collect();
    out.push('…');
    out
}

#[async_trait]
impl AlertSink for TwilioSms {
    async fn dispatch(&self, body: &str) -> Result<()> {
        let url = self.messages_url();
        let text = clamp_body(body);
        let form = [
            ("To", self.creds.to_number.as_str()),
            ("From", self.creds.from_number.as_str()),
            ("Body", text.as_str()),
        ];

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .basic_auth(&self.creds.account_sid, Some(&self.creds.auth_token))
                .timeout(self.timeout)
                .form(&form)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(rsp) => {
                        let sid = rsp
                            .json::<MessageResource>()
                            .await
                            .map(|m| m.sid)
                            .unwrap_or_default();
                        tracing::info!(target: "notify", %sid, "sms dispatched");
                        return Ok(());
                    }
                    Err(e) => anyhow!("twilio HTTP error: {e}"),
                },
                Err(e) => anyhow!("twilio request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "twilio-sms"
    }
}
