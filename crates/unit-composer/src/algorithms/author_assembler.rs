//! # Author Assembler
//!
//! Builds one author record per paying address: placeholder authentifiers
//! sized to each signing path, and the definition when the network may not
//! know it yet.
//!
//! ## Disclosure rule
//!
//! | Stable good unit by address | Latest stable definition change | Disclose? |
//! |-----------------------------|---------------------------------|-----------|
//! | none | - | yes (first use) |
//! | yes | none | no |
//! | yes | definition persisted | no |
//! | yes | definition not persisted | yes |

use composer_telemetry::DEFINITIONS_DISCLOSED;
use shared_types::{Address, Author};

use crate::domain::{
    invariant_placeholders_sized, placeholder, AssembledAuthor, ComposeError, DisclosureDecision,
    SignerError,
};
use crate::ports::{LedgerTransaction, SignerHandle};

/// Decide whether `address` must disclose its definition, judged against
/// history at or below `reference_mci`.
pub async fn decide_disclosure(
    tx: &mut dyn LedgerTransaction,
    address: &Address,
    reference_mci: u64,
) -> Result<DisclosureDecision, ComposeError> {
    if !tx.has_stable_good_unit(address, reference_mci).await? {
        return Ok(DisclosureDecision::FirstUse);
    }
    let decision = match tx
        .latest_stable_definition_change(address, reference_mci)
        .await?
    {
        None => DisclosureDecision::AlreadyKnown,
        Some(change) if change.is_persisted() => DisclosureDecision::ChangePersisted,
        Some(_) => DisclosureDecision::ChangeNotPersisted,
    };
    Ok(decision)
}

/// Build the author record for one address.
pub async fn assemble_author(
    tx: &mut dyn LedgerTransaction,
    signer: &SignerHandle,
    address: &Address,
    reference_mci: u64,
) -> Result<AssembledAuthor, ComposeError> {
    let signing_paths = signer.read_signing_paths(address).await?;
    if signing_paths.is_empty() {
        return Err(SignerError::NoSigningPaths(address.clone()).into());
    }
    if let Some((path, _)) = signing_paths.iter().find(|(_, len)| **len == 0) {
        return Err(SignerError::EmptySignaturePath {
            address: address.clone(),
            path: path.clone(),
        }
        .into());
    }

    let mut author = Author::new(address.clone());
    for (path, len) in &signing_paths {
        author.authentifiers.insert(path.clone(), placeholder(*len));
    }
    if !invariant_placeholders_sized(&author, &signing_paths) {
        return Err(ComposeError::Internal(format!(
            "placeholders of {address} do not match its signing paths"
        )));
    }

    let decision = decide_disclosure(tx, address, reference_mci).await?;
    if decision.requires_definition() {
        author.definition = Some(signer.read_definition(address).await?);
        DEFINITIONS_DISCLOSED.inc();
    }
    tracing::debug!(
        address = %address,
        paths = signing_paths.len(),
        decision = ?decision,
        "[composer] Author assembled"
    );

    Ok(AssembledAuthor {
        author,
        signing_paths,
        decision,
    })
}

/// Build author records for every address, one address at a time, in the
/// order given (sorted by the caller).
pub async fn assemble_authors(
    tx: &mut dyn LedgerTransaction,
    signer: &SignerHandle,
    addresses: &[Address],
    reference_mci: u64,
) -> Result<Vec<AssembledAuthor>, ComposeError> {
    let mut authors = Vec::with_capacity(addresses.len());
    for address in addresses {
        authors.push(assemble_author(tx, signer, address, reference_mci).await?);
    }
    Ok(authors)
}
