use async_trait::async_trait;
use chrono::Utc;
use pesa_transport::{Call, CallMeta, Pipeline, RequestRecorder, Timeouts, endpoint};
use pesa_types::amount;
use pesa_types::error::CallError;
use pesa_types::payment::{Payment, PaymentType};
use pesa_types::provider::{ProviderAdapter, StatusQuery};
use pesa_types::request::Operation;
use pesa_types::short_code::{Service, ShortCode};
use reqwest_middleware as rqm;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use crate::signer::HmacSigner;
use crate::types::*;

pub const CHARGE_PATH: &str = "v1/mpesa/charge";
pub const PAYOUT_PATH: &str = "v1/mpesa/payouts";
pub const TRANSFER_PATH: &str = "v1/mpesa/transfers";
pub const TRANSACTION_SEARCH_PATH: &str = "v1/mpesa/searches/transaction";
pub const BALANCE_SEARCH_PATH: &str = "v1/mpesa/searches/balance";

/// Quikk operations for one short code. Requests are HMAC-signed by [`HmacSigner`].
pub struct QuikkAdapter {
    short_code: ShortCode,
    base_url: Url,
    pipeline: Pipeline,
    timeouts: Timeouts,
}

impl QuikkAdapter {
    pub fn new(
        short_code: ShortCode,
        base_url: Url,
        recorder: RequestRecorder,
        http: reqwest::Client,
        timeouts: Timeouts,
    ) -> Self {
        let client = rqm::ClientBuilder::new(http)
            .with(HmacSigner::new(&short_code.key, &short_code.secret))
            .build();
        Self {
            short_code,
            base_url,
            pipeline: Pipeline::new(client).with_stage(recorder),
            timeouts,
        }
    }

    pub fn short_code(&self) -> &ShortCode {
        &self.short_code
    }

    async fn send<A: Serialize>(
        &self,
        operation: Operation,
        path: &str,
        payment: Option<&Payment>,
        envelope: Envelope<A>,
        cancel: &CancellationToken,
    ) -> Result<Acknowledgement, CallError> {
        let mut meta = CallMeta::new(Service::Quikk, operation);
        if let Some(payment) = payment {
            meta = meta.for_payment(payment.id);
        }
        let call = Call::post(endpoint(&self.base_url, path)?, meta)
            .timeout(self.timeouts.for_operation(operation))
            .cancellation(cancel)
            .error_decoder(decode_error)
            .json(&envelope)?;
        let ack: Acknowledgement = self.pipeline.execute(call).await?;
        tracing::info!(resource_id = %ack.data.id, kind = %ack.data.kind, "quikk accepted request");
        Ok(ack)
    }

    /// Requests the short code's balance. The result arrives on the `search` callback.
    #[instrument(skip_all, fields(short_code = %self.short_code.short_code), err)]
    pub async fn balance(&self, cancel: &CancellationToken) -> Result<(), CallError> {
        let envelope = Envelope::new(
            TYPE_SEARCH,
            BalanceSearchAttributes {
                short_code: self.short_code.short_code.clone(),
                posted_at: Utc::now(),
            },
        );
        self.send(Operation::Balance, BALANCE_SEARCH_PATH, None, envelope, cancel)
            .await
            .map(|_| ())
    }
}

fn whole_units(payment: &Payment) -> Result<u64, CallError> {
    amount::whole_units(payment.amount)
        .ok_or_else(|| CallError::Build(format!("amount {} is not a whole number of units", payment.amount)))
}

#[async_trait]
impl ProviderAdapter for QuikkAdapter {
    fn service(&self) -> Service {
        Service::Quikk
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn c2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let envelope = Envelope::new(
            TYPE_CHARGE,
            ChargeAttributes {
                amount: whole_units(payment)?,
                customer_no: payment.source_account_number.clone(),
                reference: payment.client_transaction_id.clone(),
                customer_type: CUSTOMER_TYPE_MSISDN,
                short_code: self.short_code.short_code.clone(),
                posted_at: Utc::now(),
            },
        );
        self.send(Operation::C2b, CHARGE_PATH, Some(payment), envelope, cancel)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn b2c(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let envelope = Envelope::new(
            TYPE_PAYOUT,
            PayoutAttributes {
                amount: whole_units(payment)?,
                recipient_no: payment.destination_account_number.clone(),
                recipient_type: CUSTOMER_TYPE_MSISDN,
                short_code: self.short_code.short_code.clone(),
                posted_at: Utc::now(),
            },
        );
        self.send(Operation::B2c, PAYOUT_PATH, Some(payment), envelope, cancel)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn b2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let envelope = Envelope::new(
            TYPE_TRANSFER,
            TransferAttributes {
                amount: whole_units(payment)?,
                recipient_no: payment.destination_account_number.clone(),
                recipient_type: RECIPIENT_TYPE_SHORT_CODE,
                account_no: payment
                    .beneficiary
                    .clone()
                    .unwrap_or_else(|| payment.client_transaction_id.clone()),
                short_code: self.short_code.short_code.clone(),
                posted_at: Utc::now(),
            },
        );
        self.send(Operation::B2b, TRANSFER_PATH, Some(payment), envelope, cancel)
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(payment_id = %query.payment.id), err)]
    async fn status(
        &self,
        query: StatusQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), CallError> {
        let payment = query.payment;
        let q = query.external_id.ok_or_else(|| {
            CallError::Build("payment has no correlation id to search for".into())
        })?;
        let on = match payment.payment_type {
            PaymentType::Charge => "charge_id",
            PaymentType::Payout | PaymentType::Transfer => "response_id",
        };
        let envelope = Envelope::new(
            TYPE_SEARCH,
            TransactionSearchAttributes {
                short_code: self.short_code.short_code.clone(),
                q: q.to_string(),
                on,
                posted_at: Utc::now(),
            },
        );
        self.send(Operation::Status, TRANSACTION_SEARCH_PATH, Some(payment), envelope, cancel)
            .await
            .map(|_| ())
    }
}
