//! # Inbound Ports
//!
//! The composition API and the callback surface it reports through.

use async_trait::async_trait;
use shared_types::{Address, Joint, Message, Output, ParentProps};

use super::outbound::SignerHandle;
use crate::algorithms::AddressLock;
use crate::domain::{ComposeError, CompositionKind, PrivatePayloads};

/// Everything needed to compose one unit.
#[derive(Clone)]
pub struct CompositionRequest {
    /// Addresses that author (and pay for) the unit.
    pub paying_addresses: Vec<Address>,
    /// Messages to attach, in order.
    pub messages: Vec<Message>,
    /// Payment outputs; empty means no payment message.
    pub outputs: Vec<Output>,
    /// Who signs.
    pub signer: SignerHandle,
    /// Regular, recovery or genesis.
    pub kind: CompositionKind,
    /// Parent props already fetched from a light vendor.
    pub light_props: Option<ParentProps>,
}

impl CompositionRequest {
    /// Regular composition authored by `paying_addresses`.
    pub fn new(paying_addresses: Vec<Address>, signer: SignerHandle) -> Self {
        Self {
            paying_addresses,
            messages: Vec::new(),
            outputs: Vec::new(),
            signer,
            kind: CompositionKind::Regular,
            light_props: None,
        }
    }

    /// Attach one message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Attach messages.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Pay these outputs.
    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the composition kind.
    pub fn with_kind(mut self, kind: CompositionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Use pre-fetched light props instead of asking the vendor.
    pub fn with_light_props(mut self, props: ParentProps) -> Self {
        self.light_props = Some(props);
        self
    }
}

/// A finalized joint with the address lock still held.
///
/// The holder must release `lock` once follow-up work (saving, broadcast)
/// is done. Dropping it releases too.
#[derive(Debug)]
pub struct ComposedUnit {
    /// Finalized joint.
    pub joint: Joint,
    /// Private payloads (always empty for inline payloads).
    pub private_payloads: PrivatePayloads,
    /// Still-held address lock.
    pub lock: AddressLock,
}

/// Callback surface mirroring `ifOk` / `ifError` / `ifNotEnoughFunds`.
#[async_trait]
pub trait CompositionCallbacks: Send + Sync {
    /// Composition succeeded; `unlock` must be released exactly once.
    async fn if_ok(&self, joint: Joint, private_payloads: PrivatePayloads, unlock: AddressLock);

    /// Composition failed; locks are already released.
    async fn if_error(&self, error: String);

    /// Funds did not cover the outputs; locks are already released.
    async fn if_not_enough_funds(&self, error: String);
}

/// Unit composer API - inbound port.
#[async_trait]
pub trait UnitComposerApi: Send + Sync {
    /// Compose, sign and finalize a unit.
    async fn compose(&self, request: CompositionRequest) -> Result<ComposedUnit, ComposeError>;

    /// Compose and report through callbacks.
    ///
    /// Returns `Err` only for fatal errors, which are never routed to
    /// `if_error`.
    async fn compose_with_callbacks(
        &self,
        request: CompositionRequest,
        callbacks: &dyn CompositionCallbacks,
    ) -> Result<(), ComposeError>;
}
