use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("invalid script length: {0} elements")]
    InvalidScriptLength(usize),

    #[error("unexpected script element at position {position}: {code}")]
    UnexpectedScriptElement {
        position: usize,
        code: &'static str,
    },

    #[error("failed to disassemble script: {0}")]
    InvalidScript(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid timelock height: {0}")]
    InvalidTimelock(u32),

    #[error("expected invoice id to be a hex sha256 payment hash, got {0:?}")]
    ExpectedInvoiceId(String),

    #[error("invalid swap element: {0}")]
    InvalidSwapElement(&'static str),

    #[error("expected funding utxos")]
    ExpectedFundingUtxos,

    #[error("utxo output script does not pay to the swap script")]
    UnexpectedUtxoOutputScript,

    #[error("expected utxo in transaction")]
    ExpectedUtxoInTransaction,

    #[error("expected output value")]
    ExpectedOutputValue,

    #[error("claim output too small: fee {fee} exceeds swept value {tokens}")]
    ClaimOutputTooSmall { fee: u64, tokens: u64 },

    #[error("refund output too small: fee {fee} for swept value {tokens}")]
    RefundOutputTooSmall { fee: u64, tokens: u64 },

    #[error("segwit outputs are not available on {0}")]
    SegwitUnavailable(String),

    #[error("failed to sign transaction: {0}")]
    Signing(String),

    #[error("chain request failed: {0}")]
    Chain(String),

    #[error("cache request failed: {0}")]
    Cache(String),
}

impl SwapError {
    pub fn chain(msg: impl Into<String>) -> Self {
        Self::Chain(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            SwapError::InvalidScriptLength(_) => "InvalidScriptLength",
            SwapError::UnexpectedScriptElement { code, .. } => code,
            SwapError::InvalidScript(_) => "ExpectedValidScript",
            SwapError::InvalidAddress(_) => "ExpectedValidAddress",
            SwapError::UnknownNetwork(_) => "ExpectedKnownNetwork",
            SwapError::InvalidTransaction(_) => "ExpectedValidTransaction",
            SwapError::InvalidTimelock(_) => "ExpectedValidTimelockHeight",
            SwapError::ExpectedInvoiceId(_) => "ExpectedInvoiceId",
            SwapError::InvalidSwapElement(code) => code,
            SwapError::ExpectedFundingUtxos => "ExpectedFundingUtxos",
            SwapError::UnexpectedUtxoOutputScript => "UnexpectedUtxoOutputScript",
            SwapError::ExpectedUtxoInTransaction => "ExpectedUtxoInTransaction",
            SwapError::ExpectedOutputValue => "ExpectedOutputValue",
            SwapError::ClaimOutputTooSmall { .. } => "ClaimOutputTooSmall",
            SwapError::RefundOutputTooSmall { .. } => "RefundOutputTooSmall",
            SwapError::SegwitUnavailable(_) => "SegwitUnavailableOnNetwork",
            SwapError::Signing(_) => "FailedToSignTransaction",
            SwapError::Chain(_) => "UnexpectedChainError",
            SwapError::Cache(_) => "UnexpectedCacheError",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            SwapError::ExpectedUtxoInTransaction => 404,
            SwapError::Chain(_) | SwapError::Cache(_) => 503,
            SwapError::Signing(_) => 500,
            _ => 400,
        }
    }

    pub fn is_infrastructure(&self) -> bool {
        self.status() >= 500
    }
}

pub type Result<T> = std::result::Result<T, SwapError>;
