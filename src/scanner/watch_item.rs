//! Watch-item model (C8): the two spend/receive conditions the scanner can
//! watch for. `bytes()` is the pattern fed into the BIP158 filter match;
//! `matches` is the authoritative transaction-level check run once a block
//! has been fetched.

use crate::types::{Hash, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchItem {
    /// Watches for a transaction paying to `script`.
    Unspent { script: Vec<u8> },
    /// Watches for a transaction spending `prev_txid:prev_vout`. `bytes()`
    /// returns `prev_script` — the script of the *referenced* output — so
    /// the filter, which indexes spent-output scripts, can match it.
    Spent {
        prev_txid: Hash,
        prev_vout: u32,
        prev_script: Vec<u8>,
    },
}

impl WatchItem {
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            WatchItem::Unspent { script } => script.clone(),
            WatchItem::Spent { prev_script, .. } => prev_script.clone(),
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            WatchItem::Unspent { script } => {
                tx.outputs.iter().any(|o| &o.script_pubkey == script)
            }
            WatchItem::Spent {
                prev_txid,
                prev_vout,
                ..
            } => tx
                .inputs
                .iter()
                .any(|i| i.prev_out.txid == *prev_txid && i.prev_out.vout == *prev_vout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutPoint, TransactionInput, TransactionOutput};

    fn tx(outputs: Vec<TransactionOutput>, inputs: Vec<TransactionInput>) -> Transaction {
        Transaction {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    #[test]
    fn unspent_matches_on_output_script() {
        let item = WatchItem::Unspent {
            script: vec![0x51],
        };
        let matching = tx(
            vec![TransactionOutput {
                script_pubkey: vec![0x51],
                value: vec![],
            }],
            vec![],
        );
        let non_matching = tx(
            vec![TransactionOutput {
                script_pubkey: vec![0x52],
                value: vec![],
            }],
            vec![],
        );
        assert!(item.matches(&matching));
        assert!(!item.matches(&non_matching));
        assert_eq!(item.bytes(), vec![0x51]);
    }

    #[test]
    fn spent_matches_on_input_outpoint_and_reports_prev_script_bytes() {
        let item = WatchItem::Spent {
            prev_txid: [7u8; 32],
            prev_vout: 2,
            prev_script: vec![0x76, 0xa9],
        };
        let matching = tx(
            vec![],
            vec![TransactionInput {
                prev_out: OutPoint {
                    txid: [7u8; 32],
                    vout: 2,
                },
                script_sig: vec![],
                sequence: 0,
            }],
        );
        let non_matching = tx(
            vec![],
            vec![TransactionInput {
                prev_out: OutPoint {
                    txid: [7u8; 32],
                    vout: 3,
                },
                script_sig: vec![],
                sequence: 0,
            }],
        );
        assert!(item.matches(&matching));
        assert!(!item.matches(&non_matching));
        assert_eq!(item.bytes(), vec![0x76, 0xa9]);
    }
}
