use serde::{Deserialize, Serialize};

use crate::events::precision::{BASE_PRECISION, PRICE_PRECISION, QUOTE_PRECISION};
use crate::events::{DecodeContext, amount, enum_camel, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct SettlePnlFields {
    ts: i64,
    #[serde(default, deserialize_with = "pubkey")]
    user: Option<String>,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    pnl: f64,
    #[serde(default, deserialize_with = "amount")]
    base_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    quote_asset_amount_after: f64,
    #[serde(default, deserialize_with = "amount")]
    quote_entry_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    settle_price: f64,
    #[serde(default, deserialize_with = "enum_camel")]
    explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlePnlRecord {
    pub pnl: f64,
    pub user: Option<String>,
    pub base_asset_amount: f64,
    pub quote_asset_amount_after: f64,
    pub quote_entry_amount: f64,
    pub settle_price: f64,
    pub tx_sig: String,
    pub slot: u64,
    pub ts: i64,
    pub market_index: u16,
    pub explanation: String,
    pub program_id: String,
}

pub(crate) fn decode(f: SettlePnlFields, ctx: &DecodeContext<'_>) -> SettlePnlRecord {
    SettlePnlRecord {
        pnl: f.pnl / PRICE_PRECISION,
        user: f.user,
        base_asset_amount: f.base_asset_amount / BASE_PRECISION,
        quote_asset_amount_after: f.quote_asset_amount_after / QUOTE_PRECISION,
        quote_entry_amount: f.quote_entry_amount / QUOTE_PRECISION,
        settle_price: f.settle_price / QUOTE_PRECISION,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        ts: f.ts,
        market_index: f.market_index,
        explanation: f.explanation,
        program_id: ctx.program_id.to_string(),
    }
}

impl SettlePnlRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::int(self.market_index),
            KeyPart::opt_str(self.user.as_deref()),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user
            .iter()
            .map(|user| PartitionTarget::new(Scope::User, user))
            .collect()
    }
}
