use serde::{Deserialize, Serialize};

use crate::events::precision::{AMM_RESERVE_PRECISION, BASE_PRECISION, QUOTE_PRECISION};
use crate::events::{DecodeContext, amount, enum_camel, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct LpFields {
    ts: i64,
    #[serde(default, deserialize_with = "pubkey")]
    user: Option<String>,
    #[serde(default, deserialize_with = "enum_camel")]
    action: String,
    #[serde(default, deserialize_with = "amount")]
    n_shares: f64,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    delta_base_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    delta_quote_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpRecord {
    pub ts: i64,
    pub tx_sig: String,
    pub slot: u64,
    pub user: Option<String>,
    pub action: String,
    pub n_shares: f64,
    pub market_index: u16,
    pub delta_base_asset_amount: f64,
    pub delta_quote_asset_amount: f64,
    pub pnl: f64,
    pub program_id: String,
}

pub(crate) fn decode(f: LpFields, ctx: &DecodeContext<'_>) -> LpRecord {
    LpRecord {
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        user: f.user,
        action: f.action,
        n_shares: f.n_shares / AMM_RESERVE_PRECISION,
        market_index: f.market_index,
        delta_base_asset_amount: f.delta_base_asset_amount / BASE_PRECISION,
        delta_quote_asset_amount: f.delta_quote_asset_amount / QUOTE_PRECISION,
        pnl: f.pnl / QUOTE_PRECISION,
        program_id: ctx.program_id.to_string(),
    }
}

impl LpRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::opt_str(self.user.as_deref()),
            KeyPart::int(self.market_index),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user
            .iter()
            .map(|user| PartitionTarget::new(Scope::User, user))
            .collect()
    }
}
