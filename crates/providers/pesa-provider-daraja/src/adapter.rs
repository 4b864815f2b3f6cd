use async_trait::async_trait;
use chrono::Utc;
use pesa_transport::{Call, CallMeta, Pipeline, RequestRecorder, Timeouts, endpoint};
use pesa_types::amount;
use pesa_types::error::CallError;
use pesa_types::payment::Payment;
use pesa_types::provider::{ProviderAdapter, StatusQuery};
use pesa_types::request::Operation;
use pesa_types::short_code::{Service, ShortCode};
use reqwest_middleware as rqm;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::auth::{Authenticator, BearerAuth};
use crate::credential::{self, CredentialEncryptor};
use crate::types::*;
use crate::webhook::Action;

pub const STK_PUSH_PATH: &str = "mpesa/stkpush/v1/processrequest";
pub const B2C_PATH: &str = "mpesa/b2c/v3/paymentrequest";
pub const B2B_PATH: &str = "mpesa/b2b/v1/paymentrequest";
pub const REVERSAL_PATH: &str = "mpesa/reversal/v1/request";
pub const TRANSACTION_STATUS_PATH: &str = "mpesa/transactionstatus/v1/query";
pub const ACCOUNT_BALANCE_PATH: &str = "mpesa/accountbalance/v1/query";

/// Daraja operations for one short code.
///
/// Owns the short code's OAuth token cache; every request is authenticated
/// by the [`BearerAuth`] middleware and recorded by the [`RequestRecorder`].
pub struct DarajaAdapter {
    short_code: ShortCode,
    base_url: Url,
    encryptor: Arc<CredentialEncryptor>,
    pipeline: Pipeline,
    timeouts: Timeouts,
}

impl DarajaAdapter {
    pub fn new(
        short_code: ShortCode,
        base_url: Url,
        encryptor: Arc<CredentialEncryptor>,
        recorder: RequestRecorder,
        http: reqwest::Client,
        timeouts: Timeouts,
    ) -> Result<Self, CallError> {
        let auth_client = rqm::ClientBuilder::new(http.clone()).build();
        let auth = Authenticator::new(
            Pipeline::new(auth_client).with_stage(recorder.clone()),
            &base_url,
            &short_code.key,
            &short_code.secret,
            timeouts.for_operation(Operation::Auth),
        )?;
        let client = rqm::ClientBuilder::new(http)
            .with(BearerAuth::new(Arc::new(auth)))
            .build();
        Ok(Self {
            short_code,
            base_url,
            encryptor,
            pipeline: Pipeline::new(client).with_stage(recorder),
            timeouts,
        })
    }

    pub fn short_code(&self) -> &ShortCode {
        &self.short_code
    }

    fn call(
        &self,
        operation: Operation,
        path: &str,
        payment: Option<&Payment>,
        cancel: &CancellationToken,
    ) -> Result<Call, CallError> {
        let mut meta = CallMeta::new(Service::Daraja, operation);
        if let Some(payment) = payment {
            meta = meta.for_payment(payment.id);
        }
        Ok(Call::post(endpoint(&self.base_url, path)?, meta)
            .timeout(self.timeouts.for_operation(operation))
            .cancellation(cancel)
            .error_decoder(decode_error))
    }

    fn callback(&self, action: Action) -> Result<String, CallError> {
        self.short_code
            .callback(action.as_str())
            .map(|url| url.to_string())
            .map_err(|e| CallError::Build(format!("invalid callback url: {e}")))
    }

    /// Initiator name and encrypted security credential.
    fn initiator(&self) -> Result<(String, String), CallError> {
        let missing = |field: &str| {
            CallError::Build(format!(
                "short code {} has no {field}",
                self.short_code.short_code
            ))
        };
        let name = self
            .short_code
            .initiator_name
            .clone()
            .ok_or_else(|| missing("initiator name"))?;
        let password = self
            .short_code
            .initiator_password
            .as_deref()
            .ok_or_else(|| missing("initiator password"))?;
        let credential = self
            .encryptor
            .encrypt(password)
            .map_err(|e| CallError::Build(e.to_string()))?;
        Ok((name, credential))
    }

    async fn acknowledge(&self, call: Call) -> Result<AsyncAcknowledgement, CallError> {
        let ack: AsyncAcknowledgement = self.pipeline.execute(call).await?;
        tracing::info!(
            originator_conversation_id = %ack.originator_conversation_id,
            conversation_id = %ack.conversation_id,
            "daraja accepted request"
        );
        Ok(ack)
    }

    /// Requests the short code's account balance. The result arrives on the
    /// `balance` callback.
    #[instrument(skip_all, fields(short_code = %self.short_code.short_code), err)]
    pub async fn balance(&self, cancel: &CancellationToken) -> Result<(), CallError> {
        let (initiator, security_credential) = self.initiator()?;
        let body = AccountBalanceRequest {
            initiator,
            security_credential,
            command_id: COMMAND_ACCOUNT_BALANCE,
            party_a: self.short_code.short_code.clone(),
            identifier_type: IDENTIFIER_SHORT_CODE,
            remarks: "balance".into(),
            queue_timeout_url: self.callback(Action::Timeout)?,
            result_url: self.callback(Action::Balance)?,
        };
        let call = self
            .call(Operation::Balance, ACCOUNT_BALANCE_PATH, None, cancel)?
            .json(&body)?;
        self.acknowledge(call).await.map(|_| ())
    }

    /// Reverses a completed payment. Requires its payment reference.
    #[instrument(skip_all, fields(payment_id = %payment.id), err)]
    pub async fn reversal(
        &self,
        payment: &Payment,
        cancel: &CancellationToken,
    ) -> Result<(), CallError> {
        let transaction_id = payment
            .payment_reference
            .clone()
            .ok_or_else(|| CallError::Build("payment has no reference to reverse".into()))?;
        let (initiator, security_credential) = self.initiator()?;
        let body = ReversalRequest {
            initiator,
            security_credential,
            command_id: COMMAND_TRANSACTION_REVERSAL,
            transaction_id,
            amount: whole_units(payment)?,
            receiver_party: self.short_code.short_code.clone(),
            reciever_identifier_type: IDENTIFIER_ORGANISATION,
            result_url: self.callback(Action::Reversal)?,
            queue_timeout_url: self.callback(Action::Timeout)?,
            remarks: payment.remarks().to_string(),
            occasion: payment.client_transaction_id.clone(),
        };
        let call = self
            .call(Operation::Reversal, REVERSAL_PATH, Some(payment), cancel)?
            .json(&body)?;
        self.acknowledge(call).await.map(|_| ())
    }
}

fn whole_units(payment: &Payment) -> Result<u64, CallError> {
    amount::whole_units(payment.amount)
        .ok_or_else(|| CallError::Build(format!("amount {} is not a whole number of units", payment.amount)))
}

#[async_trait]
impl ProviderAdapter for DarajaAdapter {
    fn service(&self) -> Service {
        Service::Daraja
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn c2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let passkey = self.short_code.passphrase.as_deref().ok_or_else(|| {
            CallError::Build(format!(
                "short code {} has no passkey",
                self.short_code.short_code
            ))
        })?;
        let timestamp = credential::timestamp(Utc::now());
        let body = StkPushRequest {
            business_short_code: self.short_code.short_code.clone(),
            password: credential::stk_password(&self.short_code.short_code, passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE_PAYBILL_ONLINE,
            amount: whole_units(payment)?,
            party_a: payment.source_account_number.clone(),
            party_b: self.short_code.short_code.clone(),
            phone_number: payment.source_account_number.clone(),
            callback_url: self.callback(Action::Express)?,
            account_reference: payment.client_transaction_id.clone(),
            transaction_desc: payment.remarks().to_string(),
        };
        let call = self
            .call(Operation::C2b, STK_PUSH_PATH, Some(payment), cancel)?
            .json(&body)?;
        let ack: StkPushResponse = self.pipeline.execute(call).await?;
        tracing::info!(
            checkout_request_id = %ack.checkout_request_id,
            merchant_request_id = %ack.merchant_request_id,
            "stk push accepted"
        );
        Ok(())
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn b2c(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let (initiator_name, security_credential) = self.initiator()?;
        let body = B2cRequest {
            originator_conversation_id: Uuid::new_v4().to_string(),
            initiator_name,
            security_credential,
            command_id: COMMAND_BUSINESS_PAYMENT,
            amount: whole_units(payment)?,
            party_a: self.short_code.short_code.clone(),
            party_b: payment.destination_account_number.clone(),
            remarks: payment.remarks().to_string(),
            queue_timeout_url: self.callback(Action::Timeout)?,
            result_url: self.callback(Action::B2c)?,
            occasion: payment.client_transaction_id.clone(),
        };
        let call = self
            .call(Operation::B2c, B2C_PATH, Some(payment), cancel)?
            .json(&body)?;
        self.acknowledge(call).await.map(|_| ())
    }

    #[instrument(skip_all, fields(payment_id = %payment.id, short_code = %self.short_code.short_code), err)]
    async fn b2b(&self, payment: &Payment, cancel: &CancellationToken) -> Result<(), CallError> {
        let (initiator, security_credential) = self.initiator()?;
        let body = B2bRequest {
            initiator,
            security_credential,
            command_id: COMMAND_BUSINESS_PAY_BILL,
            sender_identifier_type: IDENTIFIER_SHORT_CODE,
            reciever_identifier_type: IDENTIFIER_SHORT_CODE,
            amount: whole_units(payment)?,
            party_a: self.short_code.short_code.clone(),
            party_b: payment.destination_account_number.clone(),
            account_reference: payment
                .beneficiary
                .clone()
                .unwrap_or_else(|| payment.client_transaction_id.clone()),
            remarks: payment.remarks().to_string(),
            queue_timeout_url: self.callback(Action::Timeout)?,
            result_url: self.callback(Action::B2b)?,
        };
        let call = self
            .call(Operation::B2b, B2B_PATH, Some(payment), cancel)?
            .json(&body)?;
        self.acknowledge(call).await.map(|_| ())
    }

    #[instrument(skip_all, fields(payment_id = %query.payment.id), err)]
    async fn status(
        &self,
        query: StatusQuery<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), CallError> {
        let payment = query.payment;
        if query.external_id.is_none() && payment.payment_reference.is_none() {
            return Err(CallError::Build(
                "payment has neither a correlation id nor a reference to query".into(),
            ));
        }
        let (initiator, security_credential) = self.initiator()?;
        let body = TransactionStatusRequest {
            initiator,
            security_credential,
            command_id: COMMAND_TRANSACTION_STATUS,
            transaction_id: payment.payment_reference.clone().unwrap_or_default(),
            original_conversation_id: query.external_id.unwrap_or_default().to_string(),
            party_a: self.short_code.short_code.clone(),
            identifier_type: IDENTIFIER_SHORT_CODE,
            result_url: self.callback(Action::TransactionStatus)?,
            queue_timeout_url: self.callback(Action::Timeout)?,
            remarks: payment.remarks().to_string(),
            occasion: payment.client_transaction_id.clone(),
        };
        let call = self
            .call(Operation::Status, TRANSACTION_STATUS_PATH, Some(payment), cancel)?
            .json(&body)?;
        self.acknowledge(call).await.map(|_| ())
    }
}
