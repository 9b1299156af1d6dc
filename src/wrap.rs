//! Transaction classification and success resolution
//!
//! Pairs every extrinsic with the events emitted while applying it and
//! splits the block into the native and EVM universes.

use crate::types::{Block, EventRecord, Extrinsic, MethodId};

/// Which transaction universe an extrinsic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Universe {
    Native,
    Evm,
}

/// An extrinsic together with its events and outcome.
#[derive(Debug, Clone)]
pub struct WrappedTransaction<'a> {
    /// Index of the extrinsic within the block
    pub index: usize,
    pub extrinsic: &'a Extrinsic,
    /// Events whose phase is `ApplyExtrinsic(index)`, in emission order
    pub events: Vec<&'a EventRecord>,
    /// True iff one of `events` is the success marker
    pub success: bool,
}

impl<'a> WrappedTransaction<'a> {
    pub fn method(&self) -> &'a MethodId {
        &self.extrinsic.method
    }
}

/// Pair each extrinsic of `block` with its events and success flag.
pub fn wrap_transactions<'a>(block: &'a Block, success_event: &MethodId) -> Vec<WrappedTransaction<'a>> {
    block
        .extrinsics
        .iter()
        .enumerate()
        .map(|(index, extrinsic)| {
            let events: Vec<&EventRecord> = block
                .events
                .iter()
                .filter(|evt| evt.belongs_to(index))
                .collect();
            let success = events.iter().any(|evt| &evt.event == success_event);
            WrappedTransaction {
                index,
                extrinsic,
                events,
                success,
            }
        })
        .collect()
}

/// Classify an extrinsic by its dispatch path.
pub fn classify(extrinsic: &Extrinsic, evm_dispatch: &MethodId) -> Universe {
    if &extrinsic.method == evm_dispatch {
        Universe::Evm
    } else {
        Universe::Native
    }
}

/// Split wrapped transactions into `(native, evm)`, preserving block order.
pub fn partition<'a>(
    txs: Vec<WrappedTransaction<'a>>,
    evm_dispatch: &MethodId,
) -> (Vec<WrappedTransaction<'a>>, Vec<WrappedTransaction<'a>>) {
    let (evm, native): (Vec<_>, Vec<_>) = txs
        .into_iter()
        .partition(|tx| classify(tx.extrinsic, evm_dispatch) == Universe::Evm);
    // A native transaction never carries the EVM dispatch method.
    debug_assert!(native.iter().all(|tx| tx.method() != evm_dispatch));
    (native, evm)
}
