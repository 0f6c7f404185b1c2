//! # Concurrency
//!
//! Address group locking across concurrent compositions, connection
//! return before signing, and parallel signature fan-out.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use parking_lot::Mutex;
    use shared_crypto::Hash;
    use shared_types::{Address, Definition};
    use unit_composer::adapters::InMemoryLedger;
    use unit_composer::{
        ComposeError, ComposerConfig, MockSigner, SignOutcome, Signer, SignerError,
        SignerHandle, SignerMetadata, SigningPaths, UnitComposerApi, UnitComposerService,
    };

    use crate::integration::fixtures::*;

    /// Records how many pooled connections were free at each signing call.
    struct PoolProbe {
        ledger: Arc<InMemoryLedger>,
        inner: MockSigner,
        observed: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SignerMetadata for PoolProbe {
        async fn read_signing_paths(&self, address: &Address) -> Result<SigningPaths, SignerError> {
            self.inner.read_signing_paths(address).await
        }

        async fn read_definition(&self, address: &Address) -> Result<Definition, SignerError> {
            self.inner.read_definition(address).await
        }
    }

    #[async_trait]
    impl Signer for PoolProbe {
        async fn sign(&self, hash: &Hash, address: &Address, path: &str) -> SignOutcome {
            self.observed.lock().push(self.ledger.available_connections());
            self.inner.sign(hash, address, path).await
        }
    }

    #[tokio::test]
    async fn test_connection_returned_before_signing() -> anyhow::Result<()> {
        let ledger = seeded_ledger(1);
        let probe = Arc::new(PoolProbe {
            ledger: ledger.clone(),
            inner: MockSigner::new().with_address(addr('A')),
            observed: Default::default(),
        });
        let svc = service(ledger);

        svc.compose(text_request(vec![addr('A')], SignerHandle::Delegated(probe.clone())))
            .await?;
        assert_eq!(*probe.observed.lock(), vec![1]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_sets_block_until_release() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (_, first_signer) = mock_signer(&[addr('A'), addr('B')]);
        let (second_mock, second_signer) = mock_signer(&[addr('B'), addr('C')]);

        // Held through signing and beyond, until the caller releases.
        let first = svc
            .compose(text_request(vec![addr('A'), addr('B')], first_signer))
            .await?;

        let svc2 = svc.clone();
        let second = tokio::spawn(async move {
            svc2.compose(text_request(vec![addr('B'), addr('C')], second_signer))
                .await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished());
        assert_eq!(second_mock.sign_calls(), 0);
        assert!(!svc.lock_manager().is_locked(&addr('C')));

        first.lock.release();
        let second = second.await??;
        assert!(second.joint.unit_hash().is_some());
        assert_eq!(second_mock.sign_calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let svc = Arc::new(UnitComposerService::new(
            ComposerConfig {
                lock_timeout_secs: Some(1),
                ..ComposerConfig::for_testing()
            },
            seeded_ledger(1),
        ));
        let held = svc.lock_manager().try_lock(&[addr('B')]).expect("free");
        let (mock, signer) = mock_signer(&[addr('A'), addr('B')]);

        let err = svc
            .compose(text_request(vec![addr('A'), addr('B')], signer))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::LockTimeout { waited_ms, .. } if waited_ms >= 1_000));
        assert!(err.is_retryable());
        // All-or-nothing: A was never taken.
        assert!(!svc.lock_manager().is_locked(&addr('A')));
        assert_eq!(mock.sign_calls(), 0);
        drop(held);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disjoint_sets_sign_concurrently() -> anyhow::Result<()> {
        // One connection: concurrency is only possible because each
        // composition commits before it starts signing.
        let svc = service(seeded_ledger(1));
        let (mock, signer) = wrap(
            MockSigner::new()
                .with_address(addr('A'))
                .with_address(addr('C'))
                .with_delay(Duration::from_millis(200)),
        );

        let results = join_all([
            svc.compose(text_request(vec![addr('A')], signer.clone())),
            svc.compose(text_request(vec![addr('C')], signer)),
        ])
        .await;

        for result in results {
            assert!(result?.joint.unit_hash().is_some());
        }
        assert_eq!(mock.max_in_flight(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_address_compositions_serialize() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(4));
        let (mock, signer) = wrap(
            MockSigner::new()
                .with_address(addr('A'))
                .with_delay(Duration::from_millis(20)),
        );

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let svc = svc.clone();
                let signer = signer.clone();
                tokio::spawn(async move {
                    let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
                    composed.lock.release();
                    Ok::<_, ComposeError>(())
                })
            })
            .collect();

        for task in join_all(tasks).await {
            task??;
        }
        assert_eq!(mock.sign_calls(), 5);
        assert_eq!(mock.max_in_flight(), 1);
        assert_eq!(svc.lock_manager().acquisitions(), 5);
        assert_eq!(svc.lock_manager().releases(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_author_paths_signed_in_parallel() -> anyhow::Result<()> {
        let paths: SigningPaths = [("r.0".to_string(), 88), ("r.1".to_string(), 88)]
            .into_iter()
            .collect();
        let (mock, signer) = wrap(
            MockSigner::new()
                .with_paths(addr('A'), paths.clone())
                .with_paths(addr('B'), paths)
                .with_delay(Duration::from_millis(50)),
        );
        let svc = service(seeded_ledger(1));

        svc.compose(text_request(vec![addr('A'), addr('B')], signer))
            .await?;
        assert_eq!(mock.sign_calls(), 4);
        assert_eq!(mock.max_in_flight(), 4);
        Ok(())
    }
}
