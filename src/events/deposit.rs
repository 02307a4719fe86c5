use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::events::precision::{
    PRICE_PRECISION, QUOTE_PRECISION, SPOT_BALANCE_PRECISION, SPOT_CUMULATIVE_INTEREST_PRECISION,
};
use crate::events::{DecodeContext, amount, enum_camel, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct DepositFields {
    ts: i64,
    #[serde(default, deserialize_with = "pubkey")]
    user_authority: Option<String>,
    #[serde(default, deserialize_with = "pubkey")]
    user: Option<String>,
    #[serde(default, deserialize_with = "enum_camel")]
    direction: String,
    #[serde(default)]
    deposit_record_id: Option<u64>,
    #[serde(default, deserialize_with = "amount")]
    amount: f64,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    oracle_price: f64,
    #[serde(default, deserialize_with = "amount")]
    market_deposit_balance: f64,
    #[serde(default, deserialize_with = "amount")]
    market_withdraw_balance: f64,
    #[serde(default, deserialize_with = "amount")]
    market_cumulative_deposit_interest: f64,
    #[serde(default, deserialize_with = "amount")]
    market_cumulative_borrow_interest: f64,
    #[serde(default, deserialize_with = "amount")]
    total_deposits_after: f64,
    #[serde(default, deserialize_with = "amount")]
    total_withdraws_after: f64,
    #[serde(default, deserialize_with = "enum_camel")]
    explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub amount: f64,
    pub oracle_price: f64,
    pub market_deposit_balance: f64,
    pub market_withdraw_balance: f64,
    pub market_cumulative_deposit_interest: f64,
    pub market_cumulative_borrow_interest: f64,
    pub total_deposits_after: f64,
    pub total_withdraws_after: f64,
    pub tx_sig: String,
    pub slot: u64,
    pub ts: i64,
    pub deposit_record_id: Option<u64>,
    pub user_authority: Option<String>,
    pub user: Option<String>,
    pub direction: String,
    pub market_index: u16,
    pub explanation: String,
    pub program_id: String,
}

pub(crate) fn decode(f: DepositFields, ctx: &DecodeContext<'_>) -> Result<DepositRecord, Error> {
    let token_precision = ctx.catalog.spot_precision(f.market_index)?;
    Ok(DepositRecord {
        amount: f.amount / token_precision,
        oracle_price: f.oracle_price / PRICE_PRECISION,
        market_deposit_balance: f.market_deposit_balance / SPOT_BALANCE_PRECISION,
        market_withdraw_balance: f.market_withdraw_balance / SPOT_BALANCE_PRECISION,
        market_cumulative_deposit_interest: f.market_cumulative_deposit_interest
            / SPOT_CUMULATIVE_INTEREST_PRECISION,
        market_cumulative_borrow_interest: f.market_cumulative_borrow_interest
            / SPOT_CUMULATIVE_INTEREST_PRECISION,
        total_deposits_after: f.total_deposits_after / QUOTE_PRECISION,
        total_withdraws_after: f.total_withdraws_after / QUOTE_PRECISION,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        ts: f.ts,
        deposit_record_id: f.deposit_record_id,
        user_authority: f.user_authority,
        user: f.user,
        direction: f.direction,
        market_index: f.market_index,
        explanation: f.explanation,
        program_id: ctx.program_id.to_string(),
    })
}

impl DepositRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::int(self.market_index),
            KeyPart::opt_int(self.deposit_record_id),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user
            .iter()
            .map(|user| PartitionTarget::new(Scope::User, user))
            .collect()
    }
}
