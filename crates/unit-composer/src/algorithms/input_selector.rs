//! # Input Selector
//!
//! Funds payment outputs from stable, unspent outputs of the paying
//! addresses. Largest outputs are spent first; any surplus goes back to
//! the first paying address as change. No fee is added.

use serde_json::json;
use shared_types::{Address, Output};

use super::messages::{apps, inline_message};
use crate::domain::{ComposeError, SpendableOutput};
use crate::ports::LedgerTransaction;

/// Inputs chosen to cover a payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSelection {
    /// Outputs being spent, largest first.
    pub inputs: Vec<SpendableOutput>,
    /// Sum of their amounts.
    pub total: u64,
}

/// Sum of requested amounts, saturating.
pub fn required_amount(outputs: &[Output]) -> u64 {
    outputs
        .iter()
        .fold(0u64, |sum, output| sum.saturating_add(output.amount))
}

/// Pick outputs, largest first, until `required` is covered.
pub fn select_inputs(
    mut candidates: Vec<SpendableOutput>,
    required: u64,
) -> Result<InputSelection, ComposeError> {
    candidates.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.input.cmp(&b.input)));

    let mut inputs = Vec::new();
    let mut total = 0u64;
    for candidate in candidates.iter() {
        if total >= required && !inputs.is_empty() {
            break;
        }
        total = total.saturating_add(candidate.amount);
        inputs.push(candidate.clone());
    }

    if total < required || inputs.is_empty() {
        let available = candidates
            .iter()
            .fold(0u64, |sum, c| sum.saturating_add(c.amount));
        return Err(ComposeError::NotEnoughFunds {
            required,
            available,
        });
    }
    Ok(InputSelection { inputs, total })
}

/// Payment message spending `selection` into `outputs` plus change.
pub fn build_payment(
    selection: &InputSelection,
    outputs: &[Output],
    change_address: &Address,
) -> Result<shared_types::Message, ComposeError> {
    let required = required_amount(outputs);
    let mut all_outputs = outputs.to_vec();
    let change = selection.total - required.min(selection.total);
    if change > 0 {
        all_outputs.push(Output {
            address: change_address.clone(),
            amount: change,
        });
    }
    all_outputs.sort();

    let inputs: Vec<_> = selection.inputs.iter().map(|s| &s.input).collect();
    inline_message(
        apps::PAYMENT,
        json!({ "inputs": inputs, "outputs": all_outputs }),
    )
}

/// Read spendable outputs inside the snapshot and build the payment message.
///
/// Returns `None` when no outputs were requested.
pub async fn compose_payment(
    tx: &mut dyn LedgerTransaction,
    paying_addresses: &[Address],
    outputs: &[Output],
    last_ball_mci: u64,
) -> Result<Option<shared_types::Message>, ComposeError> {
    if outputs.is_empty() {
        return Ok(None);
    }
    let change_address = paying_addresses
        .first()
        .ok_or(ComposeError::NoPayingAddresses)?;

    let candidates = tx
        .read_spendable_outputs(paying_addresses, last_ball_mci)
        .await?;
    let selection = select_inputs(candidates, required_amount(outputs))?;
    tracing::debug!(
        inputs = selection.inputs.len(),
        total = selection.total,
        "[composer] Inputs selected"
    );
    build_payment(&selection, outputs, change_address).map(Some)
}
