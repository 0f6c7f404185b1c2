//! Shared test fixtures.

use std::sync::Arc;

use shared_types::Address;
use unit_composer::adapters::{InMemoryLedger, UnitRecord};
use unit_composer::algorithms::messages;
use unit_composer::{
    ComposerConfig, CompositionRequest, MockSigner, SignerHandle, UnitComposerService,
};

/// Last stable main-chain index of the seeded ledger.
pub const LAST_BALL_MCI: u64 = 10;

/// Round index of the seeded ledger.
pub const ROUND_INDEX: u64 = 3;

/// Address made of one repeated base32 character.
pub fn addr(c: char) -> Address {
    Address::parse(std::iter::repeat(c).take(32).collect::<String>()).expect("valid address")
}

/// Ledger with one stable main-chain unit that is also the only free unit.
pub fn seeded_ledger(pool_size: usize) -> Arc<InMemoryLedger> {
    let ledger = InMemoryLedger::new(pool_size);
    ledger.add_unit(UnitRecord::stable("GENESIS", LAST_BALL_MCI));
    ledger.add_free_unit("GENESIS");
    ledger.set_last_stable_ball("BALL-GENESIS", "GENESIS", LAST_BALL_MCI);
    ledger.set_round_index(ROUND_INDEX);
    Arc::new(ledger)
}

/// Mock signer controlling `addresses`, each with path `"r"`.
pub fn mock_signer(addresses: &[Address]) -> (Arc<MockSigner>, SignerHandle) {
    wrap(
        addresses
            .iter()
            .fold(MockSigner::new(), |s, a| s.with_address(a.clone())),
    )
}

/// Share a configured mock as a delegated signer.
pub fn wrap(mock: MockSigner) -> (Arc<MockSigner>, SignerHandle) {
    let mock = Arc::new(mock);
    (mock.clone(), SignerHandle::Delegated(mock))
}

/// Full-mode service with a 5 s lock timeout.
pub fn service(ledger: Arc<InMemoryLedger>) -> Arc<UnitComposerService<InMemoryLedger>> {
    Arc::new(UnitComposerService::new(ComposerConfig::for_testing(), ledger))
}

/// Request carrying one text message.
pub fn text_request(addresses: Vec<Address>, signer: SignerHandle) -> CompositionRequest {
    CompositionRequest::new(addresses, signer)
        .with_message(messages::text("composed by tests").expect("valid text"))
}
