//! Payment gateway collaborator
//!
//! The gateway is a black box speaking a payment-intent protocol:
//!
//! - `POST /payment_intents` create an intent (amount in minor units)
//! - `POST /payment_intents/{id}/attach` attach a payment method
//! - `GET  /payment_intents/{id}` read the current status

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PaymentsConfig;
use crate::{CoreError, CoreResult};

/// Intent creation parameters
#[derive(Debug, Clone, Serialize)]
pub struct CreateIntentRequest {
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    pub payment_method_types: Vec<String>,
    #[serde(skip)]
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayError {
    pub message: Option<String>,
}

/// Intent as reported by the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub last_payment_error: Option<GatewayError>,
}

impl GatewayIntent {
    pub fn failure_message(&self) -> Option<&str> {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.message.as_deref())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: &CreateIntentRequest) -> CoreResult<GatewayIntent>;

    async fn attach_method(&self, intent_id: &str, payment_method_id: &str) -> CoreResult<GatewayIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> CoreResult<GatewayIntent>;
}

/// HTTP gateway client
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(config: &PaymentsConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoreError::Config(format!("gateway client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_intent(response: reqwest::Response) -> CoreResult<GatewayIntent> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Payment gateway rejected request");
            return Err(CoreError::Gateway(format!("{}: {}", status, body)));
        }
        response
            .json::<GatewayIntent>()
            .await
            .map_err(|e| CoreError::Gateway(format!("unreadable response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_intent(&self, request: &CreateIntentRequest) -> CoreResult<GatewayIntent> {
        debug!(amount = request.amount, currency = %request.currency, "Creating payment intent");
        let response = self
            .client
            .post(self.url("/payment_intents"))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;
        Self::read_intent(response).await
    }

    async fn attach_method(&self, intent_id: &str, payment_method_id: &str) -> CoreResult<GatewayIntent> {
        let response = self
            .client
            .post(self.url(&format!("/payment_intents/{}/attach", intent_id)))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "payment_method": payment_method_id }))
            .send()
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;
        Self::read_intent(response).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> CoreResult<GatewayIntent> {
        let response = self
            .client
            .get(self.url(&format!("/payment_intents/{}", intent_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| CoreError::Gateway(e.to_string()))?;
        Self::read_intent(response).await
    }
}
