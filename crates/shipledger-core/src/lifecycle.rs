//! Validation rules for the two ledger mutations.
//!
//! `create` checks only units and weight; text fields are accepted verbatim.
//! `transfer` checks only that the caller is the current owner: any state is
//! reachable from any state.

use crate::ledger::NewShipment;
use crate::{
    CoreError, NOT_CURRENT_OWNER, UNITS_NOT_POSITIVE, WEIGHT_NOT_FINITE, WEIGHT_NOT_POSITIVE,
};
use shipledger_store::{Identity, Shipment, ShipmentState};

/// Check the numeric fields of a new shipment, returning them in stored form.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn validate_new_shipment(input: &NewShipment) -> Result<(u64, f64), CoreError> {
    let units = match u64::try_from(input.units) {
        Ok(u) if u > 0 => u,
        _ => return Err(CoreError::Validation(UNITS_NOT_POSITIVE.to_owned())),
    };

    // NaN fails this comparison too.
    if !(input.weight > 0.0) {
        return Err(CoreError::Validation(WEIGHT_NOT_POSITIVE.to_owned()));
    }
    if !input.weight.is_finite() {
        return Err(CoreError::Validation(WEIGHT_NOT_FINITE.to_owned()));
    }

    Ok((units, input.weight))
}

pub fn authorize(shipment: &Shipment, caller: &Identity) -> Result<(), CoreError> {
    if shipment.current_owner == *caller {
        Ok(())
    } else {
        Err(CoreError::Authorization(NOT_CURRENT_OWNER.to_owned()))
    }
}

/// Whether `to` sits earlier in the lifecycle than `from`, e.g. `Delivered -> Created`.
///
/// Such moves are accepted; callers only log them.
pub fn is_backward_move(from: ShipmentState, to: ShipmentState) -> bool {
    to < from
}
