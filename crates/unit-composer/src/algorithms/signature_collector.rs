//! # Signature Collector
//!
//! Fans out one signing request per (author, path), all concurrently, over
//! the hash to sign. The first refusal or failure aborts the whole
//! collection; authentifiers are written only when every path succeeded,
//! so a partially signed unit never exists.

use composer_telemetry::{SIGNATURES_COLLECTED, SIGNER_REFUSALS};
use futures::future::try_join_all;
use shared_crypto::Hash;
use shared_types::{Address, SigningPath, Unit};

use super::unit_hash::hash_to_sign;
use crate::domain::{invariant_paths_unchanged, ComposeError, SignerError, SigningPlan};
use crate::ports::{SignOutcome, SignerHandle};

async fn sign_path(
    signer: &SignerHandle,
    hash: &Hash,
    address: &Address,
    path: &SigningPath,
    expected_len: usize,
) -> Result<(SigningPath, String), ComposeError> {
    match signer.sign(hash, address, path).await {
        SignOutcome::Signed(signature) => {
            if signature.len() != expected_len {
                return Err(SignerError::SignatureLength {
                    address: address.clone(),
                    path: path.clone(),
                    expected: expected_len,
                    actual: signature.len(),
                }
                .into());
            }
            SIGNATURES_COLLECTED.inc();
            Ok((path.clone(), signature))
        }
        SignOutcome::Refused => {
            SIGNER_REFUSALS.inc();
            tracing::warn!(address = %address, path = %path, "[composer] Cosigner refused");
            Err(ComposeError::SignerRefused {
                address: address.clone(),
                path: path.clone(),
            })
        }
        SignOutcome::Failed(err) => Err(err.into()),
    }
}

/// Sign every path of every author and write the signatures into `unit`.
///
/// Returns the number of signatures written.
pub async fn collect_signatures(
    unit: &mut Unit,
    plan: &SigningPlan,
    signer: &SignerHandle,
) -> Result<usize, ComposeError> {
    invariant_paths_unchanged(unit, plan)?;
    let hash = hash_to_sign(unit)?;

    let per_author = plan.iter().map(|(address, paths)| {
        let hash = &hash;
        async move {
            let signed = try_join_all(
                paths
                    .iter()
                    .map(|(path, len)| sign_path(signer, hash, address, path, *len)),
            )
            .await?;
            Ok::<_, ComposeError>((address, signed))
        }
    });
    let signed = try_join_all(per_author).await?;

    let mut count = 0;
    for (address, signatures) in signed {
        let author = unit
            .author_mut(address)
            .ok_or_else(|| ComposeError::Internal(format!("author {address} vanished")))?;
        for (path, signature) in signatures {
            author.authentifiers.insert(path, signature);
            count += 1;
        }
    }
    Ok(count)
}
