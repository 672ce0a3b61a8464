use crate::config::PayPhoneConfig;
use crate::domain::payment::{PaymentIntent, VendorPaymentStatus};
use crate::error::VendorError;
use crate::vendors::{
    string_field, PaymentVendor, VendorAuth, VendorCheckout, VendorClient, VendorConfirmation, VendorPayload,
};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;

pub struct PayPhoneGateway {
    pub api_url: String,
    pub confirm_url: String,
    pub token: String,
    pub store_id: String,
    pub client: VendorClient,
}

impl PayPhoneGateway {
    pub fn new(cfg: &PayPhoneConfig, client: VendorClient) -> Self {
        Self {
            api_url: cfg.api_url.clone(),
            confirm_url: cfg.confirm_url.clone(),
            token: cfg.token.clone(),
            store_id: cfg.store_id.clone(),
            client,
        }
    }

    fn auth(&self) -> VendorAuth {
        VendorAuth::Bearer(self.token.clone())
    }

    pub fn create_payload(&self, intent: &PaymentIntent) -> serde_json::Value {
        let amount = intent.amount.to_f64().unwrap_or_default();
        json!({
            "amount": amount,
            "amountWithoutTax": amount,
            "amountWithTax": 0,
            "tax": 0,
            "service": 0,
            "tip": 0,
            "currency": intent.currency,
            "reference": intent.booking_id.to_string(),
            "clientTransactionId": intent.client_transaction_id(),
            "storeId": self.store_id,
            "email": intent.customer_email,
            "phoneNumber": intent.customer_phone,
            "documentId": "",
            "cancellationUrl": intent.cancellation_url,
            "responseUrl": intent.response_url,
        })
    }
}

#[async_trait::async_trait]
impl PaymentVendor for PayPhoneGateway {
    fn name(&self) -> &'static str {
        "payphone"
    }

    async fn create_payment(&self, intent: &PaymentIntent) -> Result<VendorCheckout, VendorError> {
        let resp = self
            .client
            .send(&self.api_url, VendorPayload::Json(self.create_payload(intent)), &self.auth())
            .await?;

        Ok(VendorCheckout {
            payment_url: string_field(&resp.body, "paymentUrl")
                .or_else(|| string_field(&resp.body, "payWithCard")),
            transaction_id: string_field(&resp.body, "transactionId"),
            raw: resp.body,
        })
    }

    async fn confirm_payment(
        &self,
        transaction_id: &str,
        client_transaction_id: &str,
    ) -> Result<VendorConfirmation, VendorError> {
        // The confirm endpoint wants the numeric id when PayPhone issued one.
        let id = transaction_id
            .parse::<i64>()
            .map(|n| json!(n))
            .unwrap_or_else(|_| json!(transaction_id));
        let payload = json!({ "id": id, "clientTxId": client_transaction_id });

        let resp = self
            .client
            .send(&self.confirm_url, VendorPayload::Json(payload), &self.auth())
            .await?;

        let status_code = resp.body.get("statusCode").and_then(|v| v.as_i64());
        let transaction_status = resp
            .body
            .get("transactionStatus")
            .or_else(|| resp.body.get("status"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(VendorConfirmation {
            status: VendorPaymentStatus::from_vendor(status_code, transaction_status.as_deref()),
            status_code,
            transaction_status,
            raw: resp.body,
        })
    }
}
