//! HTTP client for the delivery provider's REST API.

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{ProviderError, ProviderGateway, StatusResponse, Template};

/// `reqwest`-backed implementation of [`ProviderGateway`].
///
/// Authenticates with a bearer API key. All failures are folded into
/// [`ProviderError`]; callers never see raw `reqwest` errors.
pub struct HttpProviderGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpProviderGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn post_send(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let send: SendResponse = response.json().await?;
        Ok(send.id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Turn a non-success response into `ProviderError::Api`, extracting the
    /// provider's error message from the JSON body when one is present.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        Err(ProviderError::Api { status, message })
    }
}

impl ProviderGateway for HttpProviderGateway {
    async fn send_email(
        &self,
        template_id: Uuid,
        recipient: &str,
        merge_fields: &serde_json::Value,
        reference: Option<&str>,
    ) -> Result<String, ProviderError> {
        let id = self
            .post_send(
                "/v2/notifications/email",
                json!({
                    "template_id": template_id,
                    "email_address": recipient,
                    "personalisation": merge_fields,
                    "reference": reference,
                }),
            )
            .await?;

        tracing::debug!(provider_id = %id, "Email accepted by provider");
        Ok(id)
    }

    async fn send_sms(
        &self,
        template_id: Uuid,
        recipient: &str,
        merge_fields: &serde_json::Value,
        reference: Option<&str>,
    ) -> Result<String, ProviderError> {
        let id = self
            .post_send(
                "/v2/notifications/sms",
                json!({
                    "template_id": template_id,
                    "phone_number": recipient,
                    "personalisation": merge_fields,
                    "reference": reference,
                }),
            )
            .await?;

        tracing::debug!(provider_id = %id, "SMS accepted by provider");
        Ok(id)
    }

    async fn notification_status(&self, provider_id: &str) -> Result<StatusResponse, ProviderError> {
        self.get_json(&format!("/v2/notifications/{provider_id}"))
            .await
    }

    async fn template(&self, template_id: Uuid) -> Result<Template, ProviderError> {
        self.get_json(&format!("/v2/template/{template_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let gateway = HttpProviderGateway::new("https://provider.example/", "key");
        assert_eq!(gateway.base_url, "https://provider.example");
    }
}
