//! # Unit Composer Service
//!
//! Drives one composition through the stage machine:
//!
//! 1. normalize the paying addresses (sorted, deduplicated)
//! 2. light mode: fetch parent props from the vendor, before any lock
//! 3. lock the address group
//! 4. inside one ledger transaction: parents, messages, payment, authors
//! 5. commit, so the connection is back in the pool before signing
//! 6. round fields, parallel signatures, content hash, ball, timestamp
//!
//! Any failure after step 3 releases the lock before it is reported. On
//! success the lock is handed to the caller still held.

use async_trait::async_trait;
use composer_telemetry::{time_histogram, COMPOSITIONS, COMPOSITION_DURATION};
use shared_types::{Address, ParentProps, Unit};
use std::sync::Arc;
use tracing::Instrument;

use crate::algorithms::messages::timestamp_feed;
use crate::algorithms::{
    assemble_authors, collect_signatures, compose_payment, fetch_light_props, finalize_unit,
    select_parents, stamp_round_fields, AddressLock, AddressLockManager,
};
use crate::config::{ComposerConfig, NodeMode};
use crate::domain::{
    invariant_sorted_addresses, ComposeError, CompositionKind, CompositionStage,
    CompositionTracker, ParentSelection, PrivatePayloads, SigningPlan,
};
use crate::ports::{
    ComposedUnit, CompositionCallbacks, CompositionRequest, LedgerStore, LedgerTransaction,
    LightVendor, UnitComposerApi,
};

/// Unit assembled inside the snapshot, before signing.
struct Draft {
    unit: Unit,
    selection: ParentSelection,
    plan: SigningPlan,
}

/// Unit Composer Service - orchestrates locking, snapshot reads and signing.
pub struct UnitComposerService<L: LedgerStore> {
    /// Configuration.
    config: ComposerConfig,
    /// Transactional ledger snapshot source.
    ledger: Arc<L>,
    /// Address group locks, shared by every composition of this service.
    locks: AddressLockManager,
    /// Vendor used in light mode when a request carries no props.
    light_vendor: Option<Arc<dyn LightVendor>>,
}

impl<L: LedgerStore> UnitComposerService<L> {
    /// Create a new composer service.
    pub fn new(config: ComposerConfig, ledger: Arc<L>) -> Self {
        Self {
            config,
            ledger,
            locks: AddressLockManager::new(),
            light_vendor: None,
        }
    }

    /// Attach a light vendor.
    pub fn with_light_vendor(mut self, vendor: Arc<dyn LightVendor>) -> Self {
        self.light_vendor = Some(vendor);
        self
    }

    /// Share an existing lock manager (several services over one wallet).
    pub fn with_lock_manager(mut self, locks: AddressLockManager) -> Self {
        self.locks = locks;
        self
    }

    /// The address lock manager.
    pub fn lock_manager(&self) -> &AddressLockManager {
        &self.locks
    }

    /// Configuration.
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Parent props fetched before locking, if this composition needs them.
    async fn resolve_light_props(
        &self,
        request: &CompositionRequest,
        addresses: &[Address],
    ) -> Result<Option<ParentProps>, ComposeError> {
        if !request.kind.selects_parents() {
            return Ok(None);
        }
        if let Some(props) = &request.light_props {
            return Ok(Some(props.clone()));
        }
        match (self.config.mode, &self.light_vendor) {
            (NodeMode::Full, _) => Ok(None),
            (NodeMode::Light, Some(vendor)) => Ok(Some(
                fetch_light_props(vendor.as_ref(), &self.config.vendor_method, addresses).await?,
            )),
            (NodeMode::Light, None) => Err(ComposeError::InvalidParentData(
                "no parent props for light".into(),
            )),
        }
    }

    /// Open a transaction, build the draft, commit on success and roll back
    /// on failure. Either way the connection is returned before this returns.
    async fn read_snapshot(
        &self,
        tracker: &mut CompositionTracker,
        request: &CompositionRequest,
        addresses: &[Address],
        light_props: Option<ParentProps>,
    ) -> Result<Draft, ComposeError> {
        let mut tx = self.ledger.begin().await?;
        match self
            .build_draft(tx.as_mut(), tracker, request, addresses, light_props)
            .await
        {
            Ok(draft) => {
                tx.commit().await?;
                Ok(draft)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "[composer] Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn build_draft(
        &self,
        tx: &mut dyn LedgerTransaction,
        tracker: &mut CompositionTracker,
        request: &CompositionRequest,
        addresses: &[Address],
        light_props: Option<ParentProps>,
    ) -> Result<Draft, ComposeError> {
        tracker.advance(CompositionStage::SnapshotOpen)?;

        let selection = select_parents(tx, request.kind, addresses, light_props).await?;
        tracker.advance(CompositionStage::ParentsResolved)?;

        let mut unit = Unit::default();
        selection.apply_to(&mut unit);
        unit.messages = request.messages.clone();
        if request.kind == CompositionKind::Recovery && unit.messages.is_empty() {
            unit.messages
                .push(timestamp_feed(chrono::Utc::now().timestamp_millis())?);
        }
        if let Some(payment) =
            compose_payment(tx, addresses, &request.outputs, selection.reference_mci()).await?
        {
            unit.messages.push(payment);
        }

        let authors =
            assemble_authors(tx, &request.signer, addresses, selection.reference_mci()).await?;
        let plan = authors
            .iter()
            .map(|a| (a.author.address.clone(), a.signing_paths.clone()))
            .collect();
        unit.authors = authors.into_iter().map(|a| a.author).collect();
        tracker.advance(CompositionStage::AuthorsAssembled)?;

        Ok(Draft {
            unit,
            selection,
            plan,
        })
    }

    /// Everything that runs while the address lock is held.
    async fn compose_locked(
        &self,
        tracker: &mut CompositionTracker,
        request: &CompositionRequest,
        addresses: &[Address],
        light_props: Option<ParentProps>,
    ) -> Result<shared_types::Joint, ComposeError> {
        let Draft {
            mut unit,
            selection,
            plan,
        } = self
            .read_snapshot(tracker, request, addresses, light_props)
            .await?;
        tracker.advance(CompositionStage::SnapshotClosed)?;

        stamp_round_fields(
            &mut unit,
            request.kind,
            &selection,
            self.config.genesis_round_index,
        )?;

        tracker.advance(CompositionStage::Signing)?;
        let signed = collect_signatures(&mut unit, &plan, &request.signer).await?;

        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let joint = finalize_unit(unit, request.kind, timestamp)?;
        tracker.advance(CompositionStage::Finalized)?;

        tracing::info!(
            unit = joint.unit_hash().unwrap_or_default(),
            signatures = signed,
            kind = request.kind.as_str(),
            "[composer] Unit composed"
        );
        Ok(joint)
    }

    /// One composition attempt, timed, logged and counted. Every failed
    /// attempt leaves `tracker` in `RELEASED` after passing through `ERROR`.
    async fn compose_attempt(
        &self,
        tracker: &mut CompositionTracker,
        request: CompositionRequest,
    ) -> Result<ComposedUnit, ComposeError> {
        let _timer = time_histogram!(COMPOSITION_DURATION);
        let span = composer_telemetry::composition_span!(
            "compose",
            composition_id = %tracker.id(),
            kind = request.kind.as_str(),
            mode = self.config.mode.as_str(),
        );

        let result = self.compose_tracked(tracker, request).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => {
                // Failures before the lock never reached release_on_error.
                if !tracker.stage().is_terminal() {
                    close_failed(tracker);
                }
                tracing::warn!(
                    composition_id = %tracker.id(),
                    code = e.code(),
                    error = %e,
                    "[composer] Composition failed"
                );
                match e {
                    ComposeError::NotEnoughFunds { .. } => "not_enough_funds",
                    _ => "error",
                }
            }
        };
        COMPOSITIONS
            .with_label_values(&[self.config.mode.as_str(), outcome])
            .inc();
        result
    }

    async fn compose_tracked(
        &self,
        tracker: &mut CompositionTracker,
        request: CompositionRequest,
    ) -> Result<ComposedUnit, ComposeError> {
        let addresses = invariant_sorted_addresses(&request.paying_addresses)?;
        let light_props = self.resolve_light_props(&request, &addresses).await?;

        tracker.advance(CompositionStage::Locking)?;
        let lock = self
            .locks
            .lock_with_timeout(&addresses, self.config.lock_timeout())
            .await?;

        match self
            .compose_locked(tracker, &request, &addresses, light_props)
            .await
        {
            Ok(joint) => Ok(ComposedUnit {
                joint,
                private_payloads: PrivatePayloads::new(),
                lock,
            }),
            Err(e) => {
                release_on_error(tracker, &lock);
                Err(e)
            }
        }
    }
}

fn release_on_error(tracker: &mut CompositionTracker, lock: &AddressLock) {
    lock.release();
    close_failed(tracker);
}

fn close_failed(tracker: &mut CompositionTracker) {
    tracker.fail();
    if let Err(e) = tracker.advance(CompositionStage::Released) {
        tracing::error!(error = %e, "[composer] Tracker refused release");
    }
}

#[async_trait]
impl<L: LedgerStore + 'static> UnitComposerApi for UnitComposerService<L> {
    async fn compose(&self, request: CompositionRequest) -> Result<ComposedUnit, ComposeError> {
        let mut tracker = CompositionTracker::new();
        self.compose_attempt(&mut tracker, request).await
    }

    async fn compose_with_callbacks(
        &self,
        request: CompositionRequest,
        callbacks: &dyn CompositionCallbacks,
    ) -> Result<(), ComposeError> {
        match self.compose(request).await {
            Ok(composed) => {
                callbacks
                    .if_ok(composed.joint, composed.private_payloads, composed.lock)
                    .await;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e @ ComposeError::NotEnoughFunds { .. }) => {
                callbacks.if_not_enough_funds(e.to_string()).await;
                Ok(())
            }
            Err(e) => {
                callbacks.if_error(e.to_string()).await;
                Ok(())
            }
        }
    }
}
