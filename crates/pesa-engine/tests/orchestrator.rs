mod common;

use common::{CHARGE_ID, Harness, request};
use pesa_engine::PaymentError;
use pesa_types::error::{CallError, ErrorKind, StoreError};
use pesa_types::payment::{InvalidRequest, Payment, PaymentFilter, PaymentType, Status, StatusUpdate};
use pesa_types::short_code::Service;
use pesa_types::webhook::WebhookOutcome;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

const CHARGE_SUCCESS: &str =
    include_str!("../../providers/pesa-provider-quikk/fixtures/charge_success.json");

/// Charges `idem` against a provider that rejects it, leaving it in `initiation_failed`.
async fn parked_charge(harness: &Harness, idem: &str) -> Payment {
    harness.adapter.fail_next(CallError::Transport {
        message: "connection reset".into(),
        temporary: true,
    });
    harness
        .engine
        .orchestrator
        .charge(request(idem), &CancellationToken::new())
        .await
        .unwrap_err();
    let parked = harness
        .repositories
        .payments
        .find_one(PaymentFilter::IdempotencyId(idem.into()))
        .await
        .unwrap();
    assert_eq!(parked.status, Status::InitiationFailed);
    parked
}

#[tokio::test]
async fn charge_is_sent_through_the_configured_short_code() {
    let harness = Harness::new().await;
    let payment = harness
        .engine
        .orchestrator
        .charge(request("idem-1"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(payment.status, Status::Sent);
    assert_eq!(payment.payment_type, PaymentType::Charge);
    assert_eq!(harness.adapter.initiations(), 1);
}

#[tokio::test]
async fn missing_short_code_creates_no_payment() {
    let harness = Harness::bare();
    let err = harness
        .engine
        .orchestrator
        .payout(request("idem-1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConfigured);
    let lookup = harness
        .repositories
        .payments
        .find_one(PaymentFilter::IdempotencyId("idem-1".into()))
        .await;
    assert!(matches!(lookup, Err(StoreError::NotFound { .. })));
    assert_eq!(harness.adapter.initiations(), 0);
}

#[tokio::test]
async fn concurrent_duplicates_send_once() {
    let harness = Harness::new().await;
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = harness.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .orchestrator
                .transfer(request("idem-race"), &CancellationToken::new())
                .await
        }));
    }
    let mut created = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Duplicate);
                duplicates += 1;
            }
        }
    }
    assert_eq!((created, duplicates), (1, 7));
    assert_eq!(harness.adapter.initiations(), 1);
}

#[tokio::test]
async fn provider_rejection_parks_payment_until_retry() {
    let harness = Harness::new().await;
    harness.adapter.fail_next(CallError::Provider {
        status: 400,
        code: "400.002.02".into(),
        message: "Bad Request - Invalid Amount".into(),
    });
    let err = harness
        .engine
        .orchestrator
        .charge(request("idem-1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Call(_)));

    let parked = harness
        .repositories
        .payments
        .find_one(PaymentFilter::IdempotencyId("idem-1".into()))
        .await
        .unwrap();
    assert_eq!(parked.status, Status::InitiationFailed);

    let retried = harness
        .engine
        .orchestrator
        .retry(parked.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(retried.id, parked.id);
    assert_eq!(retried.status, Status::Sent);
    assert_eq!(harness.adapter.initiations(), 2);
}

#[tokio::test]
async fn sent_payment_cannot_be_retried() {
    let harness = Harness::new().await;
    let cancel = CancellationToken::new();
    let payment = harness
        .engine
        .orchestrator
        .charge(request("idem-1"), &cancel)
        .await
        .unwrap();
    let err = harness
        .engine
        .orchestrator
        .retry(payment.id, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::NotRetryable {
            status: Status::Sent,
            ..
        }
    ));
    assert_eq!(harness.adapter.initiations(), 1);
}

#[tokio::test]
async fn status_of_pending_payment_queries_with_correlation_id() {
    let harness = Harness::new().await;
    let cancel = CancellationToken::new();
    let payment = harness
        .engine
        .orchestrator
        .charge(request("idem-1"), &cancel)
        .await
        .unwrap();
    let current = harness
        .engine
        .orchestrator
        .status(payment.id, &cancel)
        .await
        .unwrap();
    assert_eq!(current.status, Status::Sent);
    assert_eq!(
        harness.adapter.status_queries(),
        vec![Some(CHARGE_ID.to_string())]
    );
}

#[tokio::test]
async fn status_of_final_payment_makes_no_call() {
    let harness = Harness::new().await;
    let cancel = CancellationToken::new();
    let payment = harness
        .engine
        .orchestrator
        .charge(request("idem-1"), &cancel)
        .await
        .unwrap();
    harness
        .repositories
        .payments
        .update(payment.id, StatusUpdate::succeeded(Some("SBK7QWERTY".into())))
        .await
        .unwrap();
    let current = harness
        .engine
        .orchestrator
        .status(payment.id, &cancel)
        .await
        .unwrap();
    assert_eq!(current.status, Status::Succeeded);
    assert_eq!(current.payment_reference.as_deref(), Some("SBK7QWERTY"));
    assert!(harness.adapter.status_queries().is_empty());
}

#[tokio::test]
async fn status_of_unknown_payment_is_not_found() {
    let harness = Harness::new().await;
    let err = harness
        .engine
        .orchestrator
        .status(Default::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn fractional_amount_is_refused_before_anything_is_stored() {
    let harness = Harness::new().await;
    let mut fractional = request("idem-1");
    fractional.amount = dec!(10.50);
    let err = harness
        .engine
        .orchestrator
        .charge(fractional, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Invalid(InvalidRequest::Amount(amount)) if amount == dec!(10.50)
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    let lookup = harness
        .repositories
        .payments
        .find_one(PaymentFilter::IdempotencyId("idem-1".into()))
        .await;
    assert!(matches!(lookup, Err(StoreError::NotFound { .. })));
    assert_eq!(harness.adapter.initiations(), 0);
}

#[tokio::test]
async fn retry_is_refused_while_first_initiation_is_in_flight() {
    let harness = Harness::new().await;
    let gate = harness.adapter.hold_next();
    let engine = harness.engine.clone();
    let charge = tokio::spawn(async move {
        engine
            .orchestrator
            .charge(request("idem-1"), &CancellationToken::new())
            .await
    });
    gate.entered().await;

    let pending = harness
        .repositories
        .payments
        .find_one(PaymentFilter::IdempotencyId("idem-1".into()))
        .await
        .unwrap();
    assert_eq!(pending.status, Status::Received);
    let err = harness
        .engine
        .orchestrator
        .retry(pending.id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::NotRetryable {
            status: Status::Received,
            ..
        }
    ));

    gate.release();
    let sent = charge.await.unwrap().unwrap();
    assert_eq!(sent.status, Status::Sent);
    assert_eq!(harness.adapter.initiations(), 1);
}

#[tokio::test]
async fn retry_in_flight_holds_the_payment() {
    let harness = Harness::new().await;
    let id = parked_charge(&harness, "idem-1").await.id;
    let gate = harness.adapter.hold_next();
    let engine = harness.engine.clone();
    let first = tokio::spawn(async move {
        engine
            .orchestrator
            .retry(id, &CancellationToken::new())
            .await
    });
    gate.entered().await;

    let claimed = harness
        .repositories
        .payments
        .find_one(PaymentFilter::Id(id))
        .await
        .unwrap();
    assert_eq!(claimed.status, Status::Retrying);
    let err = harness
        .engine
        .orchestrator
        .retry(id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::NotRetryable {
            status: Status::Retrying,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    gate.release();
    assert_eq!(first.await.unwrap().unwrap().status, Status::Sent);
    assert_eq!(harness.adapter.initiations(), 2);
}

#[tokio::test]
async fn concurrent_retries_dispatch_once() {
    let harness = Harness::new().await;
    let id = parked_charge(&harness, "idem-1").await.id;
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = harness.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .orchestrator
                .retry(id, &CancellationToken::new())
                .await
        }));
    }
    let mut sent = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(payment) => {
                assert_eq!(payment.status, Status::Sent);
                sent += 1;
            }
            Err(e) => {
                assert!(matches!(e, PaymentError::NotRetryable { .. }), "{e}");
                refused += 1;
            }
        }
    }
    assert_eq!((sent, refused), (1, 7));
    assert_eq!(harness.adapter.initiations(), 2);
}

#[tokio::test]
async fn failed_retry_can_be_retried_again() {
    let harness = Harness::new().await;
    let parked = parked_charge(&harness, "idem-1").await;
    harness.adapter.fail_next(CallError::Timeout(std::time::Duration::from_secs(1)));
    let orchestrator = &harness.engine.orchestrator;
    let err = orchestrator
        .retry(parked.id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    let again = orchestrator
        .retry(parked.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.status, Status::Sent);
    assert_eq!(harness.adapter.initiations(), 3);
}

#[tokio::test]
async fn webhook_landing_before_the_initiating_call_returns_wins() {
    let harness = Harness::new().await;
    let gate = harness.adapter.hold_next();
    let engine = harness.engine.clone();
    let charge = tokio::spawn(async move {
        engine
            .orchestrator
            .charge(request("idem-1"), &CancellationToken::new())
            .await
    });
    gate.entered().await;

    let webhook = harness
        .engine
        .reconciler
        .reconcile(Service::Quikk, "charge", CHARGE_SUCCESS.into())
        .await
        .unwrap();
    assert!(matches!(
        webhook.outcome,
        Some(WebhookOutcome::Applied {
            status: Status::Succeeded,
            ..
        })
    ));

    gate.release();
    let payment = charge.await.unwrap().unwrap();
    assert_eq!(payment.status, Status::Succeeded);
    assert_eq!(payment.payment_reference.as_deref(), Some("SBK7QWERTY"));
}
