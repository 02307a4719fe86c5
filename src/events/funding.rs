use serde::{Deserialize, Serialize};

use crate::catalog::MarketCatalog;
use crate::error::Error;
use crate::events::precision::{
    BASE_PRECISION, FUNDING_RATE_PRECISION, FUNDING_RATE_RECORD_PRECISION, PRICE_PRECISION,
    QUOTE_PRECISION,
};
use crate::events::{DecodeContext, amount, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct FundingRateFields {
    ts: i64,
    #[serde(default)]
    record_id: Option<u64>,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    funding_rate: f64,
    #[serde(default, deserialize_with = "amount")]
    funding_rate_long: f64,
    #[serde(default, deserialize_with = "amount")]
    funding_rate_short: f64,
    #[serde(default, deserialize_with = "amount")]
    cumulative_funding_rate_long: f64,
    #[serde(default, deserialize_with = "amount")]
    cumulative_funding_rate_short: f64,
    #[serde(default, deserialize_with = "amount")]
    oracle_price_twap: f64,
    #[serde(default, deserialize_with = "amount")]
    mark_price_twap: f64,
    #[serde(default, deserialize_with = "amount")]
    period_revenue: f64,
    #[serde(default, deserialize_with = "amount")]
    base_asset_amount_with_amm: f64,
    #[serde(default, deserialize_with = "amount")]
    base_asset_amount_with_unsettled_lp: f64,
}

/// Hourly funding update for one perp market.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRateRecord {
    pub ts: i64,
    pub tx_sig: String,
    pub record_id: Option<u64>,
    pub slot: u64,
    pub market_index: u16,
    pub funding_rate: f64,
    pub funding_rate_long: f64,
    pub funding_rate_short: f64,
    pub cumulative_funding_rate_long: f64,
    pub cumulative_funding_rate_short: f64,
    pub oracle_price_twap: f64,
    pub mark_price_twap: f64,
    pub period_revenue: f64,
    pub base_asset_amount_with_amm: f64,
    pub base_asset_amount_with_unsettled_lp: f64,
    pub program_id: String,
}

pub(crate) fn decode_rate(f: FundingRateFields, ctx: &DecodeContext<'_>) -> FundingRateRecord {
    FundingRateRecord {
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        record_id: f.record_id,
        slot: ctx.meta.slot,
        market_index: f.market_index,
        funding_rate: f.funding_rate / FUNDING_RATE_RECORD_PRECISION,
        funding_rate_long: f.funding_rate_long / FUNDING_RATE_RECORD_PRECISION,
        funding_rate_short: f.funding_rate_short / FUNDING_RATE_RECORD_PRECISION,
        cumulative_funding_rate_long: f.cumulative_funding_rate_long
            / FUNDING_RATE_RECORD_PRECISION,
        cumulative_funding_rate_short: f.cumulative_funding_rate_short
            / FUNDING_RATE_RECORD_PRECISION,
        oracle_price_twap: f.oracle_price_twap / PRICE_PRECISION,
        mark_price_twap: f.mark_price_twap / PRICE_PRECISION,
        period_revenue: f.period_revenue / QUOTE_PRECISION,
        base_asset_amount_with_amm: f.base_asset_amount_with_amm / BASE_PRECISION,
        base_asset_amount_with_unsettled_lp: f.base_asset_amount_with_unsettled_lp
            / BASE_PRECISION,
        program_id: ctx.program_id.to_string(),
    }
}

impl FundingRateRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::int(self.market_index),
            KeyPart::opt_int(self.record_id),
        ])
    }

    pub fn partition_targets(&self, catalog: &MarketCatalog) -> Result<Vec<PartitionTarget>, Error> {
        let market = catalog.perp(self.market_index)?;
        Ok(vec![PartitionTarget::new(Scope::Market, &market.symbol)])
    }
}

#[derive(Deserialize)]
pub(crate) struct FundingPaymentFields {
    ts: i64,
    #[serde(default, deserialize_with = "pubkey")]
    user_authority: Option<String>,
    #[serde(default, deserialize_with = "pubkey")]
    user: Option<String>,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    funding_payment: f64,
    #[serde(default, deserialize_with = "amount")]
    base_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    user_last_cumulative_funding: f64,
    #[serde(default, deserialize_with = "amount")]
    amm_cumulative_funding_long: f64,
    #[serde(default, deserialize_with = "amount")]
    amm_cumulative_funding_short: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingPaymentRecord {
    pub ts: i64,
    pub tx_sig: String,
    pub slot: u64,
    pub user_authority: Option<String>,
    pub user: Option<String>,
    pub market_index: u16,
    pub funding_payment: f64,
    pub base_asset_amount: f64,
    pub user_last_cumulative_funding: f64,
    pub amm_cumulative_funding_long: f64,
    pub amm_cumulative_funding_short: f64,
    pub program_id: String,
}

pub(crate) fn decode_payment(
    f: FundingPaymentFields,
    ctx: &DecodeContext<'_>,
) -> FundingPaymentRecord {
    FundingPaymentRecord {
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        user_authority: f.user_authority,
        user: f.user,
        market_index: f.market_index,
        funding_payment: f.funding_payment / QUOTE_PRECISION,
        base_asset_amount: f.base_asset_amount / BASE_PRECISION,
        user_last_cumulative_funding: f.user_last_cumulative_funding / FUNDING_RATE_PRECISION,
        amm_cumulative_funding_long: f.amm_cumulative_funding_long / FUNDING_RATE_PRECISION,
        amm_cumulative_funding_short: f.amm_cumulative_funding_short / FUNDING_RATE_PRECISION,
        program_id: ctx.program_id.to_string(),
    }
}

impl FundingPaymentRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::opt_str(self.user.as_deref()),
            KeyPart::int(self.market_index),
            KeyPart::float(self.user_last_cumulative_funding),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user
            .iter()
            .map(|user| PartitionTarget::new(Scope::User, user))
            .collect()
    }
}
