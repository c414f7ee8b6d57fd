use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use crate::{
    error::{AppError, Result},
    services::printer::settings::PrinterSettings,
    utils::security::sign_hex,
};

const SERVICE: &str = "printer";

/// Raw answer from the print house.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VendorReply {
    Accepted,
    /// The vendor already holds this external key.
    Duplicate,
    Rejected { message: String },
}

impl VendorResponse {
    pub fn classify(&self) -> VendorReply {
        let code = self.body.get("code").and_then(Value::as_i64);

        if self.status == StatusCode::CONFLICT.as_u16()
            || self.body.get("duplicate").and_then(Value::as_bool) == Some(true)
            || code == Some(409)
        {
            return VendorReply::Duplicate;
        }

        if (200..300).contains(&self.status)
            && (self.body.get("success").and_then(Value::as_bool) == Some(true) || code == Some(0))
        {
            return VendorReply::Accepted;
        }

        let message = ["message", "msg", "error"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", self.status));

        VendorReply::Rejected { message }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self.classify(), VendorReply::Accepted | VendorReply::Duplicate)
    }
}

#[async_trait]
pub trait PrinterClient: Send + Sync {
    async fn submit_order(
        &self,
        settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse>;

    async fn cancel_order(
        &self,
        settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse>;
}

pub struct HttpPrinterClient {
    client: Client,
}

impl HttpPrinterClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    async fn post(
        &self,
        settings: &PrinterSettings,
        url: &str,
        payload: &Value,
    ) -> Result<VendorResponse> {
        let body = serde_json::to_vec(payload)?;

        let mut request = self
            .client
            .post(url)
            .timeout(settings.request_timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(secret) = settings.signing_secret.as_deref() {
            request = request.header("X-Signature", sign_hex(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::external(SERVICE, e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::external(SERVICE, e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        Ok(VendorResponse { status, body })
    }
}

#[async_trait]
impl PrinterClient for HttpPrinterClient {
    async fn submit_order(
        &self,
        settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse> {
        self.post(settings, &settings.api_url, payload).await
    }

    async fn cancel_order(
        &self,
        settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse> {
        self.post(settings, &settings.cancel_url, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: Value) -> VendorResponse {
        VendorResponse { status, body }
    }

    #[test]
    fn classifies_vendor_answers() {
        assert_eq!(
            response(200, json!({ "success": true })).classify(),
            VendorReply::Accepted
        );
        assert_eq!(response(200, json!({ "code": 0 })).classify(), VendorReply::Accepted);
        assert_eq!(response(409, json!({})).classify(), VendorReply::Duplicate);
        assert_eq!(
            response(200, json!({ "success": false, "duplicate": true })).classify(),
            VendorReply::Duplicate
        );
        assert_eq!(
            response(503, json!({ "raw": "unavailable" })).classify(),
            VendorReply::Rejected {
                message: "HTTP 503".into()
            }
        );
        assert_eq!(
            response(200, json!({ "code": 1, "msg": "bad shop" })).classify(),
            VendorReply::Rejected {
                message: "bad shop".into()
            }
        );
    }
}
