//! # Composition Flows
//!
//! End-to-end compositions through `UnitComposerService` with the
//! in-memory ledger:
//!
//! 1. Definition disclosure on first use, none after stable prior usage
//! 2. Hash determinism and signatures over the hash to sign
//! 3. Regular / recovery / genesis field stamping
//! 4. Save + broadcast callback chain, and chaining on the saved unit
//! 5. Light mode parent props

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use shared_types::{Input, Output, ParentProps, POW_TYPE_TRUSTME};
    use unit_composer::adapters::{
        BroadcastCallbacks, CallbackOutcome, ChannelBroadcaster, ChannelCallbacks,
        SavingCallbacks, StaticLightVendor, UnitRecord,
    };
    use unit_composer::algorithms::{ball_hash, hash_to_sign, messages, unit_hash};
    use unit_composer::{
        ComposeError, ComposerConfig, CompositionKind, CompositionRequest, MockSigner,
        UnitComposerApi, UnitComposerService,
    };

    use crate::integration::fixtures::*;

    // =============================================================================
    // DISCLOSURE
    // =============================================================================

    #[tokio::test]
    async fn test_first_use_discloses_definition() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (mock, signer) = mock_signer(&[addr('A')]);

        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
        let author = &composed.joint.unit.authors[0];

        assert!(author.definition.is_some());
        assert_eq!(mock.definition_reads(), 1);
        assert_eq!(author.authentifiers.len(), 1);
        assert_eq!(author.authentifiers["r"].len(), shared_types::SIG_LENGTH);
        Ok(())
    }

    #[tokio::test]
    async fn test_stable_prior_unit_omits_definition() -> anyhow::Result<()> {
        let ledger = seeded_ledger(2);
        ledger.add_unit(UnitRecord::stable("PRIOR", 7).authored_with_definition(addr('A')));
        let svc = service(ledger);
        let (mock, signer) = mock_signer(&[addr('A')]);

        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
        let json = serde_json::to_value(&composed.joint)?;

        assert!(json["unit"]["authors"][0].get("definition").is_none());
        assert_eq!(mock.definition_reads(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unpersisted_definition_change_discloses() -> anyhow::Result<()> {
        let ledger = seeded_ledger(2);
        ledger.add_unit(UnitRecord::stable("PRIOR", 6).authored_by(addr('A')));
        ledger.add_unit(UnitRecord::stable("CHANGE", 8).authored_by(addr('A')));
        ledger.add_definition_change(addr('A'), "CHANGE", "UNKNOWNCHASH");
        let svc = service(ledger);
        let (_, signer) = mock_signer(&[addr('A')]);

        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
        assert!(composed.joint.unit.authors[0].definition.is_some());
        Ok(())
    }

    // =============================================================================
    // HASHING
    // =============================================================================

    #[tokio::test]
    async fn test_same_state_same_unit_hash() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (_, signer) = mock_signer(&[addr('A')]);

        let first = svc
            .compose(text_request(vec![addr('A')], signer.clone()))
            .await?;
        let first_hash = first.joint.unit_hash().map(str::to_string);
        first.lock.release();

        let second = svc.compose(text_request(vec![addr('A')], signer)).await?;
        assert_eq!(first_hash.as_deref(), second.joint.unit_hash());
        assert_eq!(
            hash_to_sign(&first.joint.unit)?,
            hash_to_sign(&second.joint.unit)?
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unit_hash_ignores_timestamp() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (_, signer) = mock_signer(&[addr('A')]);
        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;

        let mut unit = composed.joint.unit.clone();
        unit.unit = None;
        unit.timestamp = Some(1);
        assert_eq!(Some(unit_hash(&unit)?.as_str()), composed.joint.unit_hash());
        Ok(())
    }

    #[tokio::test]
    async fn test_every_path_signs_the_same_hash() -> anyhow::Result<()> {
        let paths = [("r.0".to_string(), 88), ("r.1".to_string(), 88)]
            .into_iter()
            .collect();
        let (mock, signer) = wrap(
            MockSigner::new()
                .with_paths(addr('A'), paths)
                .with_address(addr('B')),
        );
        let svc = service(seeded_ledger(2));
        let composed = svc
            .compose(text_request(vec![addr('B'), addr('A')], signer))
            .await?;

        let hash = hash_to_sign(&composed.joint.unit)?;
        for author in &composed.joint.unit.authors {
            for (path, signature) in &author.authentifiers {
                assert_eq!(
                    signature,
                    &MockSigner::signature_for(&hash, &author.address, path)
                );
            }
        }
        assert_eq!(mock.sign_calls(), 3);
        Ok(())
    }

    // =============================================================================
    // COMPOSITION KINDS
    // =============================================================================

    #[tokio::test]
    async fn test_regular_leaves_round_fields_unset() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (_, signer) = mock_signer(&[addr('A')]);
        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
        let json = serde_json::to_value(&composed.joint)?;

        for field in ["round_index", "pow_type", "hp", "phase"] {
            assert!(json["unit"].get(field).is_none(), "{field} should be absent");
        }
        assert!(json.get("ball").is_none());
        assert!(json["unit"]["timestamp"].as_u64().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_unit() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (_, signer) = mock_signer(&[addr('W')]);
        let composed = svc
            .compose(CompositionRequest::new(vec![addr('W')], signer).with_kind(CompositionKind::Recovery))
            .await?;
        let unit = &composed.joint.unit;

        assert_eq!(unit.round_index, Some(ROUND_INDEX));
        assert_eq!(unit.pow_type, Some(POW_TYPE_TRUSTME));
        assert_eq!(unit.hp, Some(LAST_BALL_MCI + 1));
        assert_eq!(unit.phase, Some(0));
        let id = composed.joint.unit_hash().unwrap_or_default();
        assert_eq!(composed.joint.ball, Some(ball_hash(id)?));
        assert_eq!(unit.messages[0].app, messages::apps::DATA_FEED);
        assert!(unit.messages[0].payload["timestamp"].is_i64());
        Ok(())
    }

    #[tokio::test]
    async fn test_genesis_unit() -> anyhow::Result<()> {
        let ledger = Arc::new(unit_composer::InMemoryLedger::new(1));
        let svc = Arc::new(UnitComposerService::new(
            ComposerConfig {
                genesis_round_index: 7,
                ..ComposerConfig::for_testing()
            },
            ledger,
        ));
        let (_, signer) = mock_signer(&[addr('A'), addr('B')]);
        let composed = svc
            .compose(
                text_request(vec![addr('A'), addr('B')], signer)
                    .with_kind(CompositionKind::Genesis),
            )
            .await?;
        let unit = &composed.joint.unit;

        assert!(unit.parent_units.is_none());
        assert!(unit.last_ball.is_none());
        assert_eq!(unit.round_index, Some(7));
        assert_eq!(unit.hp, Some(0));
        assert!(composed.joint.ball.is_some());
        assert!(unit.authors.iter().all(|a| a.definition.is_some()));
        Ok(())
    }

    // =============================================================================
    // SAVE + BROADCAST
    // =============================================================================

    #[tokio::test]
    async fn test_save_broadcast_chain() -> anyhow::Result<()> {
        let ledger = seeded_ledger(2);
        let svc = service(ledger.clone());
        let broadcaster = Arc::new(ChannelBroadcaster::default());
        let mut peers = broadcaster.subscribe();
        let (user, mut outcomes) = ChannelCallbacks::new();
        let callbacks = SavingCallbacks::new(
            ledger.clone(),
            BroadcastCallbacks::new(broadcaster.clone(), user),
        );
        let (_, signer) = mock_signer(&[addr('A')]);

        svc.compose_with_callbacks(text_request(vec![addr('A')], signer.clone()), &callbacks)
            .await?;

        let Some(CallbackOutcome::Ok { joint, unlock, .. }) = outcomes.recv().await else {
            anyhow::bail!("expected success");
        };
        let id = joint.unit_hash().unwrap_or_default().to_string();
        assert!(unlock.is_released());
        assert_eq!(peers.recv().await?.unit_hash(), Some(id.as_str()));
        assert_eq!(ledger.free_units(), vec![id.clone()]);
        assert_eq!(ledger.unit(&id).map(|u| u.level), Some(LAST_BALL_MCI + 1));

        // The next composition builds on the saved unit once it is stable.
        ledger.mark_stable(&id, LAST_BALL_MCI + 1);
        ledger.set_last_stable_ball("BALL-NEXT", id.clone(), LAST_BALL_MCI + 1);
        let next = svc.compose(text_request(vec![addr('A')], signer)).await?;
        assert_eq!(next.joint.unit.parent_units, Some(vec![id]));
        assert!(next.joint.unit.authors[0].definition.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_saved_payment_spends_inputs() -> anyhow::Result<()> {
        let ledger = seeded_ledger(2);
        ledger.add_unit(UnitRecord::stable("FUNDING", 5));
        let funding = Input {
            unit: "FUNDING".into(),
            message_index: 0,
            output_index: 0,
        };
        ledger.add_output(funding.clone(), addr('A'), 10_000);
        let svc = service(ledger.clone());
        let (user, mut outcomes) = ChannelCallbacks::new();
        let callbacks = SavingCallbacks::new(ledger.clone(), user);
        let (_, signer) = mock_signer(&[addr('A')]);

        let request = CompositionRequest::new(vec![addr('A')], signer).with_outputs(vec![Output {
            address: addr('B'),
            amount: 2_500,
        }]);
        svc.compose_with_callbacks(request, &callbacks).await?;

        let Some(CallbackOutcome::Ok { joint, .. }) = outcomes.recv().await else {
            anyhow::bail!("expected success");
        };
        let payment = &joint.unit.messages.last().expect("payment message").payload;
        assert_eq!(payment["outputs"].as_array().map(Vec::len), Some(2));
        assert_eq!(ledger.is_spent(&funding), Some(true));
        Ok(())
    }

    #[tokio::test]
    async fn test_not_enough_funds_routed_separately() -> anyhow::Result<()> {
        let svc = service(seeded_ledger(2));
        let (user, mut outcomes) = ChannelCallbacks::new();
        let (mock, signer) = mock_signer(&[addr('A')]);

        let request = CompositionRequest::new(vec![addr('A')], signer).with_outputs(vec![Output {
            address: addr('B'),
            amount: 1,
        }]);
        svc.compose_with_callbacks(request, &user).await?;

        assert!(matches!(
            outcomes.recv().await,
            Some(CallbackOutcome::NotEnoughFunds(_))
        ));
        assert_eq!(svc.lock_manager().held_count(), 0);
        assert_eq!(mock.sign_calls(), 0);
        Ok(())
    }

    // =============================================================================
    // LIGHT MODE
    // =============================================================================

    fn remote_props() -> ParentProps {
        ParentProps {
            parent_units: vec!["REMOTE-FREE".into()],
            last_stable_mc_ball: "REMOTE-BALL".into(),
            last_stable_mc_ball_unit: "REMOTE-LBU".into(),
            last_stable_mc_ball_mci: 40,
            round_index: 9,
        }
    }

    #[tokio::test]
    async fn test_light_composition_uses_vendor_props() -> anyhow::Result<()> {
        let vendor = Arc::new(StaticLightVendor::from_props(&remote_props()));
        let svc = UnitComposerService::new(ComposerConfig::light(), seeded_ledger(1))
            .with_light_vendor(vendor.clone());
        let (_, signer) = mock_signer(&[addr('A')]);

        let composed = svc.compose(text_request(vec![addr('A')], signer)).await?;
        assert_eq!(composed.joint.unit.last_ball.as_deref(), Some("REMOTE-BALL"));
        let (method, params) = vendor.last_request().expect("vendor was asked");
        assert_eq!(method, svc.config().vendor_method);
        assert_eq!(params["paying_addresses"][0], addr('A').as_str());
        Ok(())
    }

    #[tokio::test]
    async fn test_light_missing_round_index_leaves_no_lock() {
        let vendor = Arc::new(StaticLightVendor::new(json!({
            "parent_units": ["P"],
            "last_stable_mc_ball": "B",
            "last_stable_mc_ball_unit": "U",
            "last_stable_mc_ball_mci": 3
        })));
        let svc = UnitComposerService::new(ComposerConfig::light(), seeded_ledger(1))
            .with_light_vendor(vendor.clone());
        let (mock, signer) = mock_signer(&[addr('A')]);

        let err = svc
            .compose(text_request(vec![addr('A')], signer))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidParentData(_)));
        assert_eq!(vendor.calls(), 1);
        assert_eq!(svc.lock_manager().acquisitions(), 0);
        assert_eq!(svc.lock_manager().held_count(), 0);
        assert!(!svc.lock_manager().is_locked(&addr('A')));
        assert_eq!(mock.sign_calls(), 0);
    }

    #[tokio::test]
    async fn test_vendor_error_reported() {
        let vendor = Arc::new(StaticLightVendor::failing("address not known"));
        let svc = UnitComposerService::new(ComposerConfig::light(), seeded_ledger(1))
            .with_light_vendor(vendor);
        let (_, signer) = mock_signer(&[addr('A')]);
        let err = svc
            .compose(text_request(vec![addr('A')], signer))
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Vendor(m) if m.contains("not known")));
    }

    #[tokio::test]
    async fn test_prefetched_props_skip_vendor() -> anyhow::Result<()> {
        let vendor = Arc::new(StaticLightVendor::failing("must not be called"));
        let svc = UnitComposerService::new(ComposerConfig::light(), seeded_ledger(1))
            .with_light_vendor(vendor.clone());
        let (_, signer) = mock_signer(&[addr('A')]);

        let composed = svc
            .compose(text_request(vec![addr('A')], signer).with_light_props(remote_props()))
            .await?;
        assert_eq!(
            composed.joint.unit.parent_units,
            Some(vec!["REMOTE-FREE".to_string()])
        );
        assert_eq!(vendor.calls(), 0);
        Ok(())
    }

    // =============================================================================
    // METRICS
    // =============================================================================

    #[tokio::test]
    async fn test_compositions_counted() -> anyhow::Result<()> {
        composer_telemetry::register_metrics()?;
        let svc = service(seeded_ledger(2));
        let (_, signer) = mock_signer(&[addr('M')]);
        svc.compose(text_request(vec![addr('M')], signer)).await?;

        let text = composer_telemetry::encode_metrics()?;
        assert!(text.contains("composer_compositions_total"));
        assert!(text.contains("composer_signatures_collected_total"));
        Ok(())
    }
}
