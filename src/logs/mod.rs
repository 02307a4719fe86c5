//! Program log decoding and the per-date signature → events join.

pub mod anchor;
pub mod idl;

use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::types::{ProgramEvent, TxLogRow};

pub use anchor::AnchorLogDecoder;
pub use idl::Idl;

/// Turns one transaction's raw log lines into decoded program events, in
/// emission order.
pub trait LogDecoder: Send + Sync {
    fn decode(&self, log_messages: &[String]) -> Result<Vec<ProgramEvent>, Error>;
}

/// Decoded events of one date window, keyed by transaction signature.
#[derive(Debug, Default)]
pub struct LogIndex {
    events: HashMap<String, Vec<ProgramEvent>>,
    /// Transactions whose logs failed to decode.
    pub decode_failures: usize,
}

impl LogIndex {
    /// Decodes the logs of the wanted signatures only. A transaction whose
    /// logs fail to decode contributes no events.
    pub fn build(decoder: &dyn LogDecoder, txns: &[TxLogRow], wanted: &HashSet<&str>) -> Self {
        let mut index = Self::default();
        for tx in txns {
            if !wanted.contains(tx.signature.as_str()) {
                continue;
            }
            match decoder.decode(&tx.log_messages) {
                Ok(events) => {
                    index.events.insert(tx.signature.clone(), events);
                }
                Err(e) => {
                    tracing::warn!(signature = %tx.signature, error = %e, "failed to decode logs");
                    index.decode_failures += 1;
                    index.events.insert(tx.signature.clone(), Vec::new());
                }
            }
        }
        index
    }

    /// Events of one transaction; `None` when its logs were never found.
    pub fn events(&self, signature: &str) -> Option<&[ProgramEvent]> {
        self.events.get(signature).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
