//! # Failure Injection
//!
//! A failure at any stage after locking must roll back the open
//! transaction, return its connection and release the address lock exactly
//! once before the error is reported.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_types::{Input, Output};
    use unit_composer::adapters::{
        CallbackOutcome, ChannelCallbacks, InMemoryLedger, QueryKind, SavingCallbacks,
        UnitRecord,
    };
    use unit_composer::{
        ComposeError, CompositionRequest, LedgerError, MockSigner, SignerError, SigningPaths,
        UnitComposerApi, UnitComposerService,
    };

    use crate::integration::fixtures::*;

    const POOL: usize = 2;

    /// Ledger where a payment by A touches every snapshot query.
    fn full_path_ledger() -> Arc<InMemoryLedger> {
        let ledger = seeded_ledger(POOL);
        ledger.add_unit(UnitRecord::stable("PRIOR", 5).authored_by(addr('A')));
        ledger.add_output(
            Input {
                unit: "PRIOR".into(),
                message_index: 0,
                output_index: 0,
            },
            addr('A'),
            5_000,
        );
        ledger
    }

    fn payment_request(signer: unit_composer::SignerHandle) -> CompositionRequest {
        text_request(vec![addr('A')], signer).with_outputs(vec![Output {
            address: addr('B'),
            amount: 1_000,
        }])
    }

    fn assert_clean(svc: &UnitComposerService<InMemoryLedger>, ledger: &InMemoryLedger) {
        let locks = svc.lock_manager();
        assert_eq!(locks.held_count(), 0);
        assert_eq!(locks.releases(), locks.acquisitions());
        assert_eq!(ledger.available_connections(), POOL);
    }

    #[tokio::test]
    async fn test_baseline_succeeds() -> anyhow::Result<()> {
        let ledger = full_path_ledger();
        let svc = service(ledger.clone());
        let (_, signer) = mock_signer(&[addr('A')]);
        let composed = svc.compose(payment_request(signer)).await?;
        assert!(composed.joint.unit.authors[0].definition.is_none());
        assert_eq!(ledger.stats().committed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_each_query_failure_releases_once() {
        let kinds = [
            QueryKind::Begin,
            QueryKind::ParentProps,
            QueryKind::UnstablePredecessors,
            QueryKind::SpendableOutputs,
            QueryKind::StableUnit,
            QueryKind::DefinitionChange,
            QueryKind::Commit,
        ];
        for kind in kinds {
            let ledger = full_path_ledger();
            ledger.fail_on(kind);
            let svc = service(ledger.clone());
            let (mock, signer) = mock_signer(&[addr('A')]);

            let err = svc.compose(payment_request(signer)).await.unwrap_err();
            assert!(
                matches!(err, ComposeError::TransactionError(_)),
                "{kind:?}: unexpected {err}"
            );
            assert_eq!(svc.lock_manager().acquisitions(), 1, "{kind:?}");
            assert_eq!(svc.lock_manager().releases(), 1, "{kind:?}");
            assert_eq!(mock.sign_calls(), 0, "{kind:?}");
            assert_clean(&svc, &ledger);

            let stats = ledger.stats();
            if kind != QueryKind::Begin {
                assert_eq!(stats.rolled_back, 1, "{kind:?}");
                assert_eq!(stats.committed, 0, "{kind:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_original_error() {
        let ledger = full_path_ledger();
        ledger.fail_on(QueryKind::StableUnit);
        ledger.fail_on(QueryKind::Rollback);
        let svc = service(ledger.clone());
        let (_, signer) = mock_signer(&[addr('A')]);

        let err = svc.compose(payment_request(signer)).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::TransactionError(LedgerError::Query { ref query, .. }) if query == "stable_unit"
        ));
        assert_clean(&svc, &ledger);
    }

    #[tokio::test]
    async fn test_unknown_signer_address_rolls_back() {
        let ledger = full_path_ledger();
        let svc = service(ledger.clone());
        let (_, signer) = mock_signer(&[addr('Z')]);

        let err = svc.compose(payment_request(signer)).await.unwrap_err();
        assert!(matches!(
            err,
            ComposeError::SignerError(SignerError::UnknownAddress(_))
        ));
        assert_eq!(ledger.stats().rolled_back, 1);
        assert_clean(&svc, &ledger);
    }

    #[tokio::test]
    async fn test_refusal_aborts_whole_composition() {
        let ledger = seeded_ledger(POOL);
        let svc = service(ledger.clone());
        let (_, signer) = wrap(
            MockSigner::new()
                .with_address(addr('A'))
                .with_address(addr('B'))
                .refusing(addr('B'), "r"),
        );

        let err = svc
            .compose(text_request(vec![addr('A'), addr('B')], signer))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::SignerRefused { ref address, .. } if *address == addr('B')));
        assert!(!err.is_retryable());
        assert_eq!(svc.lock_manager().releases(), 1);
        // Snapshot already committed when signing failed.
        assert_eq!(ledger.stats().committed, 1);
        assert_clean(&svc, &ledger);
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces_verbatim() {
        let ledger = seeded_ledger(POOL);
        let svc = service(ledger.clone());
        let (_, signer) = wrap(
            MockSigner::new()
                .with_address(addr('A'))
                .failing(addr('A'), "r"),
        );

        let err = svc
            .compose(text_request(vec![addr('A')], signer))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::SignerError(SignerError::Backend(_))));
        assert!(err.to_string().contains("mock failure"));
        assert_clean(&svc, &ledger);
    }

    #[tokio::test]
    async fn test_wrong_signature_length_rejected() {
        let ledger = seeded_ledger(POOL);
        let svc = service(ledger.clone());
        let paths: SigningPaths = [("r".to_string(), 44)].into_iter().collect();
        let (_, signer) = wrap(MockSigner::new().with_paths(addr('A'), paths));

        let err = svc
            .compose(text_request(vec![addr('A')], signer))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::SignerError(SignerError::SignatureLength {
                expected: 44,
                actual: 88,
                ..
            })
        ));
        assert_clean(&svc, &ledger);
    }

    #[tokio::test]
    async fn test_refusal_reported_through_callbacks_once() -> anyhow::Result<()> {
        let ledger = seeded_ledger(POOL);
        let svc = service(ledger.clone());
        let (_, signer) = wrap(
            MockSigner::new()
                .with_address(addr('A'))
                .refusing(addr('A'), "r"),
        );
        let (callbacks, mut outcomes) = ChannelCallbacks::new();

        svc.compose_with_callbacks(text_request(vec![addr('A')], signer), &callbacks)
            .await?;
        drop(callbacks);

        let mut reported = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            reported.push(outcome);
        }
        assert_eq!(reported.len(), 1);
        assert!(matches!(&reported[0], CallbackOutcome::Error(m) if m.contains("refused")));
        assert_eq!(svc.lock_manager().releases(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_failure_releases_once() -> anyhow::Result<()> {
        let ledger = seeded_ledger(POOL);
        ledger.fail_on(QueryKind::Save);
        let svc = service(ledger.clone());
        let (user, mut outcomes) = ChannelCallbacks::new();
        let callbacks = SavingCallbacks::new(ledger.clone(), user);
        let (_, signer) = mock_signer(&[addr('A')]);

        svc.compose_with_callbacks(text_request(vec![addr('A')], signer), &callbacks)
            .await?;

        assert!(matches!(outcomes.recv().await, Some(CallbackOutcome::Error(_))));
        assert_eq!(svc.lock_manager().acquisitions(), 1);
        assert_eq!(svc.lock_manager().releases(), 1);
        assert_clean(&svc, &ledger);
        Ok(())
    }
}
