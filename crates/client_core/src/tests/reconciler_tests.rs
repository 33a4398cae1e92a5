use super::*;
use crate::test_support::{sample_result, server_error, FakeAuthority};
use shared::domain::DropColumn;

fn finished_round() -> GameResult {
    let mut result = sample_result("r1");
    result.drop_column = DropColumn::new(6);
    result
}

#[tokio::test]
async fn successful_reveal_yields_authoritative_record() {
    let authority = Arc::new(FakeAuthority::ok("r1"));
    authority.set_reveal(Ok(RevealResponse {
        server_seed: Some("s3cr3t".into()),
        client_seed: Some("revealed-client".into()),
        nonce: Some("9".into()),
    }));
    let reconciler = VerificationReconciler::new(authority.clone());

    let reconciled = reconciler
        .reconcile(&finished_round())
        .await
        .expect("reconcile");

    assert!(!reconciled.is_degraded());
    assert_eq!(reconciled.notice(), None);
    assert_eq!(
        reconciled.input,
        VerificationInput {
            server_seed: "s3cr3t".into(),
            client_seed: "revealed-client".into(),
            nonce: "9".into(),
            drop_column: "6".into(),
        }
    );
    assert_eq!(authority.calls(), vec!["reveal r1".to_string()]);
}

#[tokio::test]
async fn reveal_without_optional_fields_falls_back_to_the_round() {
    let authority = Arc::new(FakeAuthority::ok("r1"));
    authority.set_reveal(Ok(RevealResponse::default()));
    let reconciler = VerificationReconciler::new(authority);

    let reconciled = reconciler
        .reconcile(&finished_round())
        .await
        .expect("reconcile");

    assert!(!reconciled.is_degraded());
    assert_eq!(reconciled.input.server_seed, "");
    assert_eq!(reconciled.input.client_seed, "abc");
    assert_eq!(reconciled.input.nonce, "1");
    assert_eq!(reconciled.input.drop_column, "6");
}

#[tokio::test]
async fn server_error_degrades_the_record() {
    let authority = Arc::new(FakeAuthority::ok("r1"));
    authority.set_reveal(Err(server_error(500)));
    let reconciler = VerificationReconciler::new(authority);

    let reconciled = reconciler
        .reconcile(&finished_round())
        .await
        .expect("reveal failure must not propagate");

    assert!(reconciled.is_degraded());
    assert_eq!(
        reconciled.input,
        VerificationInput {
            server_seed: String::new(),
            client_seed: "abc".into(),
            nonce: "1".into(),
            drop_column: "6".into(),
        }
    );
    let notice = reconciled.notice().expect("degraded notice");
    assert!(notice.contains("(500): internal error"), "{notice}");
    assert!(notice.contains("manually"));
}

#[tokio::test]
async fn transport_faults_also_degrade() {
    for failure in [
        AuthorityError::Transport("connection refused".into()),
        AuthorityError::Timeout(std::time::Duration::from_secs(10)),
        AuthorityError::Decode("not json".into()),
        server_error(404),
    ] {
        let authority = Arc::new(FakeAuthority::ok("r1"));
        authority.set_reveal(Err(failure.clone()));
        let reconciler = VerificationReconciler::new(authority);

        let reconciled = reconciler
            .reconcile(&finished_round())
            .await
            .expect("reconcile");
        assert_eq!(
            reconciled.status,
            VerificationStatus::Degraded { failure },
            "every failure kind degrades"
        );
        assert_eq!(reconciled.input.server_seed, "");
        assert!(!reconciled.input.client_seed.is_empty());
        assert!(!reconciled.input.nonce.is_empty());
        assert!(!reconciled.input.drop_column.is_empty());
    }
}

#[tokio::test]
async fn missing_round_id_is_a_guard_error() {
    let reconciler = VerificationReconciler::new(Arc::new(FakeAuthority::ok("r1")));
    let mut result = finished_round();
    result.round_id = None;
    assert_eq!(
        reconciler.reconcile(&result).await,
        Err(RoundError::NoRoundId)
    );

    result.round_id = Some(RoundId::new("  "));
    assert_eq!(
        reconciler.reconcile(&result).await,
        Err(RoundError::NoRoundId)
    );
}

#[tokio::test]
async fn repeated_reconcile_reuses_the_first_revealed_seed() {
    let authority = Arc::new(FakeAuthority::ok("r1"));
    let reconciler = VerificationReconciler::new(authority.clone());

    let first = reconciler
        .reconcile(&finished_round())
        .await
        .expect("first reconcile");
    authority.set_reveal(Err(server_error(500)));
    let second = reconciler
        .reconcile(&finished_round())
        .await
        .expect("second reconcile");

    assert_eq!(first.input.server_seed, "server-seed-1");
    assert_eq!(first, second);
    assert_eq!(authority.count("reveal"), 1);
}

#[tokio::test]
async fn failed_reveal_is_retried_on_next_reconcile() {
    let authority = Arc::new(FakeAuthority::ok("r1"));
    authority.set_reveal(Err(server_error(503)));
    let reconciler = VerificationReconciler::new(authority.clone());

    let degraded = reconciler
        .reconcile(&finished_round())
        .await
        .expect("reconcile");
    assert!(degraded.is_degraded());

    authority.set_reveal(Ok(RevealResponse {
        server_seed: Some("late-seed".into()),
        client_seed: None,
        nonce: None,
    }));
    let recovered = reconciler
        .reconcile(&finished_round())
        .await
        .expect("reconcile");
    assert!(!recovered.is_degraded());
    assert_eq!(recovered.input.server_seed, "late-seed");
    assert_eq!(authority.count("reveal"), 2);
}
