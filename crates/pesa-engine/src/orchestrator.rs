//! Payment creation and dispatch.
//!
//! A payment is persisted in `received` before the provider is called. A
//! provider error parks it in `initiation_failed` (non-terminal, retryable);
//! an accepted call moves it to `sent`. The webhook is the only path to a
//! terminal status. A retry first claims the payment by moving it to
//! `retrying`, so concurrent retries reach the provider at most once.

use pesa_types::error::{CallError, StoreError};
use pesa_types::ids::PaymentId;
use pesa_types::payment::{Payment, PaymentFilter, PaymentRequest, PaymentType, Status, StatusUpdate};
use pesa_types::provider::{ProviderAdapter, StatusQuery};
use pesa_types::repository::{PaymentRepository, RequestRepository};
use pesa_types::request::RequestFilter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::PaymentError;
use crate::registry::ProviderRegistry;
use crate::router::ShortCodeRouter;

/// Creates payments, dispatches them to the provider serving their short code,
/// and answers status and retry requests.
pub struct Orchestrator {
    payments: Arc<dyn PaymentRepository>,
    requests: Arc<dyn RequestRepository>,
    router: ShortCodeRouter,
    registry: Arc<ProviderRegistry>,
}

impl Orchestrator {
    /// Builds an orchestrator over the given stores. Short codes are resolved
    /// through `router` and mapped to adapters by `registry`.
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        requests: Arc<dyn RequestRepository>,
        router: ShortCodeRouter,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            payments,
            requests,
            router,
            registry,
        }
    }

    /// Collects money from a customer (C2B).
    ///
    /// Returns the payment in `sent` once the provider accepted the request. The
    /// final outcome arrives later by webhook.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Invalid`] before anything is stored.
    /// - [`PaymentError::NoShortCode`] or [`PaymentError::NoProvider`] when the
    ///   charge cannot be routed.
    /// - A duplicate `idempotencyId` as [`StoreError::Duplicate`].
    /// - The provider's [`CallError`], after the payment was parked in
    ///   `initiation_failed`.
    pub async fn charge(
        &self,
        request: PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        self.initiate(PaymentType::Charge, request, cancel).await
    }

    /// Pays money out to a customer (B2C). Fails like [`Orchestrator::charge`].
    pub async fn payout(
        &self,
        request: PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        self.initiate(PaymentType::Payout, request, cancel).await
    }

    /// Moves money to another business (B2B). Fails like [`Orchestrator::charge`].
    pub async fn transfer(
        &self,
        request: PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        self.initiate(PaymentType::Transfer, request, cancel).await
    }

    #[instrument(skip_all, fields(payment_type = %payment_type, idempotency_id = %request.idempotency_id), err)]
    async fn initiate(
        &self,
        payment_type: PaymentType,
        request: PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        request.validate()?;
        let short_code = self.router.resolve(payment_type).await?;
        // Resolved before the payment is stored, so a missing provider leaves no row behind.
        let adapter = self.registry.adapter_for(&short_code)?;
        let payment = self
            .payments
            .add(Payment::new(payment_type, request, short_code.id))
            .await?;
        tracing::info!(
            payment_id = %payment.id,
            short_code = %short_code.short_code,
            service = %short_code.service,
            "payment created"
        );
        self.dispatch(adapter.as_ref(), payment, cancel).await
    }

    /// Calls the adapter operation for the payment's type and records the outcome.
    async fn dispatch(
        &self,
        adapter: &dyn ProviderAdapter,
        payment: Payment,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        let outcome = match payment.payment_type {
            PaymentType::Charge => adapter.c2b(&payment, cancel).await,
            PaymentType::Payout => adapter.b2c(&payment, cancel).await,
            PaymentType::Transfer => adapter.b2b(&payment, cancel).await,
        };
        match outcome {
            Ok(()) => self.advance(payment.id, StatusUpdate::to(Status::Sent)).await,
            Err(error) => {
                self.record_initiation_failure(payment.id, &error).await;
                Err(error.into())
            }
        }
    }

    async fn record_initiation_failure(&self, payment_id: PaymentId, error: &CallError) {
        tracing::warn!(payment_id = %payment_id, kind = %error.kind(), "payment initiation failed: {error}");
        if let Err(e) = self
            .advance(payment_id, StatusUpdate::to(Status::InitiationFailed))
            .await
        {
            tracing::error!(payment_id = %payment_id, "failed to mark payment initiation_failed: {e}");
        }
    }

    /// Applies a non-terminal update. A payment a webhook already finalized is
    /// returned as stored.
    async fn advance(&self, id: PaymentId, update: StatusUpdate) -> Result<Payment, PaymentError> {
        match self.payments.update(id, update).await {
            Ok(payment) => Ok(payment),
            Err(StoreError::Transition { from, to }) => {
                tracing::debug!(payment_id = %id, %from, %to, "payment already settled, keeping stored status");
                Ok(self.payments.find_one(PaymentFilter::Id(id)).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current state of a payment. A non-terminal payment triggers a provider
    /// status query first; its answer arrives as a webhook.
    #[instrument(skip_all, fields(payment_id = %id), err)]
    pub async fn status(
        &self,
        id: PaymentId,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        let payment = self.payments.find_one(PaymentFilter::Id(id)).await?;
        if payment.status.is_final() {
            return Ok(payment);
        }
        let short_code = self.router.resolve_by_id(payment.short_code_id).await?;
        let adapter = self.registry.adapter_for(&short_code)?;
        let external_id = match self
            .requests
            .find_one(RequestFilter::LatestInitiation(id))
            .await
        {
            Ok(request) => request.external_id,
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        let query = StatusQuery {
            payment: &payment,
            external_id: external_id.as_deref(),
        };
        if let Err(e) = adapter.status(query, cancel).await {
            tracing::warn!(kind = %e.kind(), "status query failed: {e}");
        }
        Ok(self.payments.find_one(PaymentFilter::Id(id)).await?)
    }

    /// Re-dispatches a payment whose initiating call failed.
    ///
    /// Only `initiation_failed` payments qualify. The payment is claimed by
    /// moving it to `retrying` under the store's write lock; a concurrent retry,
    /// or one racing the first initiation, gets [`PaymentError::NotRetryable`].
    #[instrument(skip_all, fields(payment_id = %id), err)]
    pub async fn retry(
        &self,
        id: PaymentId,
        cancel: &CancellationToken,
    ) -> Result<Payment, PaymentError> {
        let payment = self.payments.find_one(PaymentFilter::Id(id)).await?;
        if payment.status != Status::InitiationFailed {
            return Err(PaymentError::NotRetryable {
                payment_id: id,
                status: payment.status,
            });
        }
        let short_code = self.router.resolve_by_id(payment.short_code_id).await?;
        let adapter = self.registry.adapter_for(&short_code)?;
        let payment = match self
            .payments
            .update(id, StatusUpdate::to(Status::Retrying))
            .await
        {
            Ok(payment) => payment,
            Err(StoreError::Transition { from, .. }) => {
                return Err(PaymentError::NotRetryable {
                    payment_id: id,
                    status: from,
                });
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(payment_id = %id, "payment claimed for retry");
        self.dispatch(adapter.as_ref(), payment, cancel).await
    }
}
