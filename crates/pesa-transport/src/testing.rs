use async_trait::async_trait;
use pesa_types::error::StoreError;
use pesa_types::repository::RequestRepository;
use pesa_types::request::{Request, RequestFilter};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Attempt store for unit tests. Can be switched to reject inserts.
#[derive(Default)]
pub struct Requests {
    rows: Mutex<Vec<Request>>,
    reject_adds: AtomicBool,
}

impl Requests {
    pub fn rejecting() -> Self {
        let this = Self::default();
        this.reject_adds.store(true, Ordering::SeqCst);
        this
    }

    pub fn all(&self) -> Vec<Request> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestRepository for Requests {
    async fn add(&self, request: Request) -> Result<Request, StoreError> {
        if self.reject_adds.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store offline".into()));
        }
        self.rows.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn find_one(&self, filter: RequestFilter) -> Result<Request, StoreError> {
        let rows = self.rows.lock().unwrap();
        let found = match filter {
            RequestFilter::Id(id) => rows.iter().find(|r| r.id == id),
            RequestFilter::ExternalId(external_id) => rows
                .iter()
                .find(|r| r.external_id.as_deref() == Some(external_id.as_str())),
            RequestFilter::LatestInitiation(payment_id) => rows
                .iter()
                .rev()
                .find(|r| {
                    r.payment_id == Some(payment_id)
                        && r.operation.is_initiation()
                        && r.external_id.is_some()
                }),
        };
        found.cloned().ok_or(StoreError::NotFound { entity: "request" })
    }

    async fn update(&self, request: Request) -> Result<Request, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|r| r.id == request.id)
            .ok_or(StoreError::NotFound { entity: "request" })?;
        *slot = request.clone();
        Ok(request)
    }
}
