//! TikWM-backed lookup.

use std::time::Duration;

use mediashrink_common::config::LookupConfig;
use mediashrink_common::error::{ShrinkError, ShrinkResult};
use serde::Deserialize;

use crate::{validate_link, LinkLookup, VideoMetadata};

/// Envelope every TikWM reply is wrapped in. `code == 0` means success.
#[derive(Debug, Deserialize)]
struct TikwmResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<VideoMetadata>,
}

/// Looks links up through the public TikWM API.
pub struct TikwmLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl TikwmLookup {
    pub fn new(config: &LookupConfig) -> ShrinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShrinkError::lookup(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, link: &str) -> reqwest::RequestBuilder {
        self.client.get(&self.endpoint).query(&[("url", link)])
    }
}

#[async_trait::async_trait]
impl LinkLookup for TikwmLookup {
    fn name(&self) -> &str {
        "tikwm"
    }

    async fn lookup(&self, url: &str) -> ShrinkResult<VideoMetadata> {
        validate_link(url)?;
        tracing::debug!(endpoint = %self.endpoint, link = url, "Looking up link");

        let response = self
            .request(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ShrinkError::lookup(format!("lookup request failed: {e}")))?;
        let body: TikwmResponse = response
            .json()
            .await
            .map_err(|e| ShrinkError::lookup(format!("unreadable lookup response: {e}")))?;

        match body {
            TikwmResponse {
                code: 0,
                data: Some(data),
                ..
            } => {
                tracing::info!(title = %data.title, author = %data.author.nickname, "Link resolved");
                Ok(data)
            }
            TikwmResponse { code, msg, .. } => Err(ShrinkError::lookup(format!(
                "video not found or service busy (code {code}: {})",
                msg.unwrap_or_default()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_travels_as_a_single_url_parameter() {
        let lookup = TikwmLookup::new(&LookupConfig::default()).unwrap();
        let link = "https://vm.tiktok.com/ZM a/?lang=en&is_copy_url=1";
        let request = lookup.request(link).build().unwrap();

        assert_eq!(request.url().path(), "/api/");
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("url".to_string(), link.to_string())]);
    }
}
