use pesa_types::ids::ShortCodeId;
use pesa_types::payment::PaymentType;
use pesa_types::repository::ShortCodeRepository;
use pesa_types::short_code::{ShortCode, ShortCodeFilter};
use std::sync::Arc;

use crate::error::PaymentError;

/// Selects the short code a payment is sent through.
#[derive(Clone)]
pub struct ShortCodeRouter {
    short_codes: Arc<dyn ShortCodeRepository>,
}

impl ShortCodeRouter {
    /// Routes over the short codes stored in `short_codes`.
    pub fn new(short_codes: Arc<dyn ShortCodeRepository>) -> Self {
        Self { short_codes }
    }

    /// The lowest-priority short code serving `payment_type`.
    ///
    /// Priorities are unique per payment type; should a store return a tie
    /// anyway, the lower id wins so the choice stays deterministic.
    pub async fn resolve(&self, payment_type: PaymentType) -> Result<ShortCode, PaymentError> {
        let candidates = self
            .short_codes
            .find_many(ShortCodeFilter::PaymentType(payment_type))
            .await?;
        candidates
            .into_iter()
            .min_by_key(|sc| (sc.priority, *sc.id.as_uuid()))
            .ok_or(PaymentError::NoShortCode(payment_type))
    }

    /// The short code a stored payment was routed through.
    pub async fn resolve_by_id(&self, id: ShortCodeId) -> Result<ShortCode, PaymentError> {
        Ok(self.short_codes.find_one(ShortCodeFilter::Id(id)).await?)
    }
}
