pub mod claim;
pub mod output;
pub mod psbt;
pub mod refund;
pub mod sign;
pub mod spend;
mod sweep;

use bitcoin::script::{Script, ScriptBuf};
use bitcoin::{OutPoint, Transaction, Txid};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

pub use claim::{ClaimArgs, claim_transaction};
pub use output::{SwapOutput, swap_output, swap_script_in_transaction};
pub use psbt::refund_psbt;
pub use refund::{RefundArgs, refund_transaction};
pub use spend::{SpendKind, SwapResolution, is_pk_hash_spend, is_swap_spend, swap_resolutions};

/// How a swap output commits to its redeem script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOutputKind {
    P2sh,
    P2shP2wsh,
    P2wsh,
}

impl SwapOutputKind {
    pub fn classify(redeem_script: &Script, output_script: &Script) -> Option<Self> {
        let witness_program = redeem_script.to_p2wsh();
        if output_script == redeem_script.to_p2sh().as_script() {
            Some(SwapOutputKind::P2sh)
        } else if output_script == witness_program.as_script() {
            Some(SwapOutputKind::P2wsh)
        } else if output_script == witness_program.to_p2sh().as_script() {
            Some(SwapOutputKind::P2shP2wsh)
        } else {
            None
        }
    }

    pub fn is_witness(self) -> bool {
        !matches!(self, SwapOutputKind::P2sh)
    }
}

/// A spendable output locked to a swap redeem script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapUtxo {
    pub transaction_id: Txid,
    pub vout: u32,
    pub tokens: u64,
    pub output_script: ScriptBuf,
    pub redeem_script: ScriptBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_transaction: Option<Transaction>,
}

impl SwapUtxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.transaction_id, self.vout)
    }

    pub fn kind(&self) -> Result<SwapOutputKind> {
        SwapOutputKind::classify(&self.redeem_script, &self.output_script)
            .ok_or(SwapError::UnexpectedUtxoOutputScript)
    }
}
