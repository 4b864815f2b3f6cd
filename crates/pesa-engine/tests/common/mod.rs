#![allow(dead_code)]

use async_trait::async_trait;
use pesa_engine::events::BroadcastPublisher;
use pesa_engine::{Engine, ProviderRegistry, Repositories};
use pesa_provider_quikk::QuikkWebhooks;
use pesa_types::error::CallError;
use pesa_types::ids::ShortCodeId;
use pesa_types::payment::{Payment, PaymentRequest, PaymentType};
use pesa_types::provider::{BlueprintError, ProviderAdapter, ProviderBlueprint, StatusQuery};
use pesa_types::repository::RequestRepository;
use pesa_types::request::{Operation, Request, RequestStatus};
use pesa_types::short_code::{Environment, Service, ShortCode};
use pesa_types::webhook::WebhookProcessor;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const CHARGE_ID: &str = "8a1c7e3e-2b39-4f0e-9d7e-6a7f0a6a1c01";

/// Holds one initiation in flight after its attempt was recorded.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Resolves once the held call reached the provider.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the held call answer.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Records attempts the way a real adapter does and answers from a script.
pub struct FakeAdapter {
    requests: Arc<dyn RequestRepository>,
    external_id: String,
    outcomes: Mutex<VecDeque<Result<(), CallError>>>,
    gates: Mutex<VecDeque<Arc<Gate>>>,
    initiations: AtomicUsize,
    status_queries: Mutex<Vec<Option<String>>>,
}

impl FakeAdapter {
    pub fn new(requests: Arc<dyn RequestRepository>, external_id: &str) -> Self {
        Self {
            requests,
            external_id: external_id.to_string(),
            outcomes: Mutex::new(VecDeque::new()),
            gates: Mutex::new(VecDeque::new()),
            initiations: AtomicUsize::new(0),
            status_queries: Mutex::new(Vec::new()),
        }
    }

    /// The next initiation fails with `error`; later ones succeed.
    pub fn fail_next(&self, error: CallError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// The next initiation waits on the returned gate before answering.
    pub fn hold_next(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().push_back(gate.clone());
        gate
    }

    pub fn initiations(&self) -> usize {
        self.initiations.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> Vec<Option<String>> {
        self.status_queries.lock().unwrap().clone()
    }

    async fn initiate(&self, operation: Operation, payment: &Payment) -> Result<(), CallError> {
        self.initiations.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        let mut request = Request::new(Service::Quikk, operation, Some(payment.id));
        match &outcome {
            Ok(()) => {
                request.status = RequestStatus::Succeeded;
                request.external_id = Some(self.external_id.clone());
            }
            Err(e) => {
                request.status = RequestStatus::Failed;
                request.error_kind = Some(e.kind());
                request.error = Some(e.to_string());
            }
        }
        self.requests.add(request).await.map_err(CallError::Record)?;
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        outcome
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn service(&self) -> Service {
        Service::Quikk
    }

    async fn c2b(&self, payment: &Payment, _cancel: &CancellationToken) -> Result<(), CallError> {
        self.initiate(Operation::C2b, payment).await
    }

    async fn b2c(&self, payment: &Payment, _cancel: &CancellationToken) -> Result<(), CallError> {
        self.initiate(Operation::B2c, payment).await
    }

    async fn b2b(&self, payment: &Payment, _cancel: &CancellationToken) -> Result<(), CallError> {
        self.initiate(Operation::B2b, payment).await
    }

    async fn status(
        &self,
        query: StatusQuery<'_>,
        _cancel: &CancellationToken,
    ) -> Result<(), CallError> {
        self.status_queries
            .lock()
            .unwrap()
            .push(query.external_id.map(str::to_string));
        Ok(())
    }
}

/// Serves every Quikk short code with one shared [`FakeAdapter`].
pub struct FakeBlueprint {
    adapter: Arc<FakeAdapter>,
}

impl ProviderBlueprint for FakeBlueprint {
    fn service(&self) -> Service {
        Service::Quikk
    }

    fn build(&self, _short_code: &ShortCode) -> Result<Arc<dyn ProviderAdapter>, BlueprintError> {
        Ok(self.adapter.clone())
    }

    fn webhooks(&self) -> Arc<dyn WebhookProcessor> {
        Arc::new(QuikkWebhooks)
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub repositories: Repositories,
    pub adapter: Arc<FakeAdapter>,
    pub events: BroadcastPublisher,
}

impl Harness {
    /// An engine with no short codes configured.
    pub fn bare() -> Self {
        let repositories = Repositories::in_memory();
        let adapter = Arc::new(FakeAdapter::new(repositories.requests.clone(), CHARGE_ID));
        let registry = ProviderRegistry::new().and_register(FakeBlueprint {
            adapter: adapter.clone(),
        });
        let events = BroadcastPublisher::new(16);
        let engine = Engine::new(&repositories, Arc::new(registry), Arc::new(events.clone()));
        Self {
            engine: Arc::new(engine),
            repositories,
            adapter,
            events,
        }
    }

    /// An engine with one Quikk short code per payment type.
    pub async fn new() -> Self {
        let harness = Self::bare();
        for payment_type in [PaymentType::Charge, PaymentType::Payout, PaymentType::Transfer] {
            harness
                .repositories
                .short_codes
                .add(short_code(Service::Quikk, payment_type, 1))
                .await
                .unwrap();
        }
        harness
    }
}

pub fn short_code(service: Service, payment_type: PaymentType, priority: u32) -> ShortCode {
    ShortCode {
        id: ShortCodeId::new(),
        environment: Environment::Sandbox,
        short_code: format!("17437{priority}"),
        priority,
        service,
        payment_type,
        initiator_name: None,
        initiator_password: None,
        passphrase: None,
        key: "key".into(),
        secret: "secret".into(),
        callback_url: Url::parse("https://cb.example/webhooks/quikk/mpesa").unwrap(),
    }
}

pub fn request(idempotency_id: &str) -> PaymentRequest {
    PaymentRequest {
        client_transaction_id: "order-1".into(),
        idempotency_id: idempotency_id.into(),
        source_account_number: "174379".into(),
        destination_account_number: "254708374149".into(),
        beneficiary: None,
        amount: dec!(100),
        description: Some("Order 1".into()),
    }
}
