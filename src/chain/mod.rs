pub mod address;
pub mod esplora;
pub mod rpc;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SwapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapNetwork {
    Btc,
    BtcTestnet,
    BtcRegtest,
    Ltc,
    LtcTestnet,
    Bch,
    BchTestnet,
}

// No bech32 HRP means no segwit outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProfile {
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
    pub bech32_hrp: Option<&'static str>,
    pub fork_id: Option<u32>,
}

impl ChainProfile {
    pub fn is_segwit_absent(&self) -> bool {
        self.bech32_hrp.is_none()
    }
}

const BTC: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x00,
    p2sh_prefix: 0x05,
    bech32_hrp: Some("bc"),
    fork_id: None,
};

const BTC_TESTNET: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x6f,
    p2sh_prefix: 0xc4,
    bech32_hrp: Some("tb"),
    fork_id: None,
};

const BTC_REGTEST: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x6f,
    p2sh_prefix: 0xc4,
    bech32_hrp: Some("bcrt"),
    fork_id: None,
};

const LTC: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x30,
    p2sh_prefix: 0x32,
    bech32_hrp: Some("ltc"),
    fork_id: None,
};

const LTC_TESTNET: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x6f,
    p2sh_prefix: 0x3a,
    bech32_hrp: Some("tltc"),
    fork_id: None,
};

const BCH: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x00,
    p2sh_prefix: 0x05,
    bech32_hrp: None,
    fork_id: Some(0),
};

const BCH_TESTNET: ChainProfile = ChainProfile {
    p2pkh_prefix: 0x6f,
    p2sh_prefix: 0xc4,
    bech32_hrp: None,
    fork_id: Some(0),
};

impl SwapNetwork {
    pub const ALL: [SwapNetwork; 7] = [
        SwapNetwork::Btc,
        SwapNetwork::BtcTestnet,
        SwapNetwork::BtcRegtest,
        SwapNetwork::Ltc,
        SwapNetwork::LtcTestnet,
        SwapNetwork::Bch,
        SwapNetwork::BchTestnet,
    ];

    pub fn profile(self) -> &'static ChainProfile {
        match self {
            SwapNetwork::Btc => &BTC,
            SwapNetwork::BtcTestnet => &BTC_TESTNET,
            SwapNetwork::BtcRegtest => &BTC_REGTEST,
            SwapNetwork::Ltc => &LTC,
            SwapNetwork::LtcTestnet => &LTC_TESTNET,
            SwapNetwork::Bch => &BCH,
            SwapNetwork::BchTestnet => &BCH_TESTNET,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwapNetwork::Btc => "btc",
            SwapNetwork::BtcTestnet => "btctestnet",
            SwapNetwork::BtcRegtest => "btcregtest",
            SwapNetwork::Ltc => "ltc",
            SwapNetwork::LtcTestnet => "ltctestnet",
            SwapNetwork::Bch => "bch",
            SwapNetwork::BchTestnet => "bchtestnet",
        }
    }
}

impl fmt::Display for SwapNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapNetwork {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], "");
        SwapNetwork::ALL
            .into_iter()
            .find(|n| n.as_str() == normalized)
            .ok_or_else(|| SwapError::UnknownNetwork(s.to_string()))
    }
}
