//! # Callback Adapters
//!
//! Decorators over [`CompositionCallbacks`]:
//!
//! - [`SavingCallbacks`] persists the joint, releases the address lock and
//!   only then reports success.
//! - [`BroadcastCallbacks`] publishes the joint before reporting success.
//! - [`ChannelCallbacks`] forwards every outcome to an mpsc channel.
//!
//! A typical full-node chain is `SavingCallbacks -> BroadcastCallbacks -> user`.

use async_trait::async_trait;
use shared_types::Joint;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::algorithms::AddressLock;
use crate::domain::PrivatePayloads;
use crate::ports::{CompositionCallbacks, JointBroadcaster, JointStore};

/// Saves the joint, then releases the lock, then calls `inner`.
pub struct SavingCallbacks<C> {
    store: Arc<dyn JointStore>,
    inner: C,
}

impl<C: CompositionCallbacks> SavingCallbacks<C> {
    /// Wrap `inner`.
    pub fn new(store: Arc<dyn JointStore>, inner: C) -> Self {
        Self { store, inner }
    }
}

#[async_trait]
impl<C: CompositionCallbacks> CompositionCallbacks for SavingCallbacks<C> {
    async fn if_ok(&self, joint: Joint, private_payloads: PrivatePayloads, unlock: AddressLock) {
        match self.store.save_joint(&joint).await {
            Ok(()) => {
                unlock.release();
                self.inner.if_ok(joint, private_payloads, unlock).await;
            }
            Err(e) => {
                tracing::warn!(
                    unit = joint.unit_hash().unwrap_or_default(),
                    error = %e,
                    "[composer] Saving composed joint failed"
                );
                unlock.release();
                self.inner.if_error(e.to_string()).await;
            }
        }
    }

    async fn if_error(&self, error: String) {
        self.inner.if_error(error).await;
    }

    async fn if_not_enough_funds(&self, error: String) {
        self.inner.if_not_enough_funds(error).await;
    }
}

/// Broadcasts the joint, then calls `inner`.
pub struct BroadcastCallbacks<C> {
    broadcaster: Arc<dyn JointBroadcaster>,
    inner: C,
}

impl<C: CompositionCallbacks> BroadcastCallbacks<C> {
    /// Wrap `inner`.
    pub fn new(broadcaster: Arc<dyn JointBroadcaster>, inner: C) -> Self {
        Self { broadcaster, inner }
    }
}

#[async_trait]
impl<C: CompositionCallbacks> CompositionCallbacks for BroadcastCallbacks<C> {
    async fn if_ok(&self, joint: Joint, private_payloads: PrivatePayloads, unlock: AddressLock) {
        self.broadcaster.broadcast_joint(&joint);
        self.inner.if_ok(joint, private_payloads, unlock).await;
    }

    async fn if_error(&self, error: String) {
        self.inner.if_error(error).await;
    }

    async fn if_not_enough_funds(&self, error: String) {
        self.inner.if_not_enough_funds(error).await;
    }
}

/// One reported composition outcome.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// `if_ok` was called.
    Ok {
        /// The joint
        joint: Joint,
        /// Private payloads
        private_payloads: PrivatePayloads,
        /// The lock handed to the callback
        unlock: AddressLock,
    },
    /// `if_error` was called.
    Error(String),
    /// `if_not_enough_funds` was called.
    NotEnoughFunds(String),
}

/// Forwards outcomes to a channel.
pub struct ChannelCallbacks {
    sender: mpsc::UnboundedSender<CallbackOutcome>,
}

impl ChannelCallbacks {
    /// Callbacks plus the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CallbackOutcome>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, outcome: CallbackOutcome) {
        if self.sender.send(outcome).is_err() {
            tracing::debug!("[composer] Callback receiver dropped");
        }
    }
}

#[async_trait]
impl CompositionCallbacks for ChannelCallbacks {
    async fn if_ok(&self, joint: Joint, private_payloads: PrivatePayloads, unlock: AddressLock) {
        self.send(CallbackOutcome::Ok {
            joint,
            private_payloads,
            unlock,
        });
    }

    async fn if_error(&self, error: String) {
        self.send(CallbackOutcome::Error(error));
    }

    async fn if_not_enough_funds(&self, error: String) {
        self.send(CallbackOutcome::NotEnoughFunds(error));
    }
}
