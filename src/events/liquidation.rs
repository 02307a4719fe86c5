//! Liquidation records flatten their six nested sub-records into prefixed
//! columns (`liquidatePerp_marketIndex`, `spotBankruptcy_ifPayment`, ...).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::events::precision::{
    AMM_RESERVE_PRECISION, BASE_PRECISION, PRICE_PRECISION, QUOTE_PRECISION,
    SPOT_CUMULATIVE_INTEREST_PRECISION,
};
use crate::events::{DecodeContext, amount, enum_camel, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct LiquidationFields {
    ts: i64,
    #[serde(default, deserialize_with = "enum_camel")]
    liquidation_type: String,
    #[serde(default, deserialize_with = "pubkey")]
    user: Option<String>,
    #[serde(default, deserialize_with = "pubkey")]
    liquidator: Option<String>,
    #[serde(default, deserialize_with = "amount")]
    margin_requirement: f64,
    #[serde(default, deserialize_with = "amount")]
    total_collateral: f64,
    #[serde(default, deserialize_with = "amount")]
    margin_freed: f64,
    #[serde(default)]
    liquidation_id: u16,
    #[serde(default)]
    bankrupt: bool,
    #[serde(default)]
    canceled_order_ids: Vec<u32>,
    #[serde(default)]
    liquidate_perp: LiquidatePerp,
    #[serde(default)]
    liquidate_spot: LiquidateSpot,
    #[serde(default)]
    liquidate_borrow_for_perp_pnl: LiquidateBorrowForPerpPnl,
    #[serde(default)]
    liquidate_perp_pnl_for_deposit: LiquidatePerpPnlForDeposit,
    #[serde(default)]
    perp_bankruptcy: PerpBankruptcy,
    #[serde(default)]
    spot_bankruptcy: SpotBankruptcy,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LiquidatePerp {
    market_index: u16,
    #[serde(deserialize_with = "amount")]
    oracle_price: f64,
    #[serde(deserialize_with = "amount")]
    base_asset_amount: f64,
    #[serde(deserialize_with = "amount")]
    quote_asset_amount: f64,
    #[serde(deserialize_with = "amount")]
    lp_shares: f64,
    fill_record_id: u64,
    user_order_id: u32,
    liquidator_order_id: u32,
    #[serde(deserialize_with = "amount")]
    liquidator_fee: f64,
    #[serde(deserialize_with = "amount")]
    if_fee: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LiquidateSpot {
    asset_market_index: u16,
    #[serde(deserialize_with = "amount")]
    asset_price: f64,
    #[serde(deserialize_with = "amount")]
    asset_transfer: f64,
    liability_market_index: u16,
    #[serde(deserialize_with = "amount")]
    liability_price: f64,
    #[serde(deserialize_with = "amount")]
    liability_transfer: f64,
    #[serde(deserialize_with = "amount")]
    if_fee: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LiquidateBorrowForPerpPnl {
    perp_market_index: u16,
    #[serde(deserialize_with = "amount")]
    market_oracle_price: f64,
    #[serde(deserialize_with = "amount")]
    pnl_transfer: f64,
    liability_market_index: u16,
    #[serde(deserialize_with = "amount")]
    liability_price: f64,
    #[serde(deserialize_with = "amount")]
    liability_transfer: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LiquidatePerpPnlForDeposit {
    perp_market_index: u16,
    #[serde(deserialize_with = "amount")]
    market_oracle_price: f64,
    #[serde(deserialize_with = "amount")]
    pnl_transfer: f64,
    asset_market_index: u16,
    #[serde(deserialize_with = "amount")]
    asset_price: f64,
    #[serde(deserialize_with = "amount")]
    asset_transfer: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PerpBankruptcy {
    market_index: u16,
    #[serde(deserialize_with = "amount")]
    pnl: f64,
    #[serde(deserialize_with = "amount")]
    if_payment: f64,
    #[serde(deserialize_with = "pubkey")]
    clawback_user: Option<String>,
    #[serde(deserialize_with = "amount")]
    clawback_user_payment: f64,
    #[serde(deserialize_with = "amount")]
    cumulative_funding_rate_delta: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SpotBankruptcy {
    market_index: u16,
    #[serde(deserialize_with = "amount")]
    borrow_amount: f64,
    #[serde(deserialize_with = "amount")]
    if_payment: f64,
    #[serde(deserialize_with = "amount")]
    cumulative_deposit_interest_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationRecord {
    pub ts: i64,
    pub tx_sig: String,
    pub slot: u64,
    pub liquidation_type: String,
    pub user: Option<String>,
    pub liquidator: Option<String>,
    pub margin_requirement: f64,
    pub total_collateral: f64,
    pub margin_freed: f64,
    pub liquidation_id: u16,
    pub bankrupt: bool,
    /// Rendered list, e.g. `"[1, 2]"`.
    pub canceled_order_ids: String,

    #[serde(rename = "liquidatePerp_marketIndex")]
    pub liquidate_perp_market_index: u16,
    #[serde(rename = "liquidatePerp_oraclePrice")]
    pub liquidate_perp_oracle_price: f64,
    #[serde(rename = "liquidatePerp_baseAssetAmount")]
    pub liquidate_perp_base_asset_amount: f64,
    #[serde(rename = "liquidatePerp_quoteAssetAmount")]
    pub liquidate_perp_quote_asset_amount: f64,
    #[serde(rename = "liquidatePerp_lpShares")]
    pub liquidate_perp_lp_shares: f64,
    #[serde(rename = "liquidatePerp_fillRecordId")]
    pub liquidate_perp_fill_record_id: u64,
    #[serde(rename = "liquidatePerp_userOrderId")]
    pub liquidate_perp_user_order_id: u32,
    #[serde(rename = "liquidatePerp_liquidatorOrderId")]
    pub liquidate_perp_liquidator_order_id: u32,
    #[serde(rename = "liquidatePerp_liquidatorFee")]
    pub liquidate_perp_liquidator_fee: f64,
    #[serde(rename = "liquidatePerp_ifFee")]
    pub liquidate_perp_if_fee: f64,

    #[serde(rename = "liquidateSpot_assetMarketIndex")]
    pub liquidate_spot_asset_market_index: u16,
    #[serde(rename = "liquidateSpot_assetPrice")]
    pub liquidate_spot_asset_price: f64,
    #[serde(rename = "liquidateSpot_assetTransfer")]
    pub liquidate_spot_asset_transfer: f64,
    #[serde(rename = "liquidateSpot_liabilityMarketIndex")]
    pub liquidate_spot_liability_market_index: u16,
    #[serde(rename = "liquidateSpot_liabilityPrice")]
    pub liquidate_spot_liability_price: f64,
    #[serde(rename = "liquidateSpot_liabilityTransfer")]
    pub liquidate_spot_liability_transfer: f64,
    #[serde(rename = "liquidateSpot_ifFee")]
    pub liquidate_spot_if_fee: f64,

    #[serde(rename = "liquidateBorrowForPerpPnl_perpMarketIndex")]
    pub borrow_for_perp_pnl_perp_market_index: u16,
    #[serde(rename = "liquidateBorrowForPerpPnl_marketOraclePrice")]
    pub borrow_for_perp_pnl_market_oracle_price: f64,
    #[serde(rename = "liquidateBorrowForPerpPnl_pnlTransfer")]
    pub borrow_for_perp_pnl_pnl_transfer: f64,
    #[serde(rename = "liquidateBorrowForPerpPnl_liabilityMarketIndex")]
    pub borrow_for_perp_pnl_liability_market_index: u16,
    #[serde(rename = "liquidateBorrowForPerpPnl_liabilityPrice")]
    pub borrow_for_perp_pnl_liability_price: f64,
    #[serde(rename = "liquidateBorrowForPerpPnl_liabilityTransfer")]
    pub borrow_for_perp_pnl_liability_transfer: f64,

    #[serde(rename = "liquidatePerpPnlForDeposit_perpMarketIndex")]
    pub perp_pnl_for_deposit_perp_market_index: u16,
    #[serde(rename = "liquidatePerpPnlForDeposit_marketOraclePrice")]
    pub perp_pnl_for_deposit_market_oracle_price: f64,
    #[serde(rename = "liquidatePerpPnlForDeposit_pnlTransfer")]
    pub perp_pnl_for_deposit_pnl_transfer: f64,
    #[serde(rename = "liquidatePerpPnlForDeposit_assetMarketIndex")]
    pub perp_pnl_for_deposit_asset_market_index: u16,
    #[serde(rename = "liquidatePerpPnlForDeposit_assetPrice")]
    pub perp_pnl_for_deposit_asset_price: f64,
    #[serde(rename = "liquidatePerpPnlForDeposit_assetTransfer")]
    pub perp_pnl_for_deposit_asset_transfer: f64,

    #[serde(rename = "perpBankruptcy_marketIndex")]
    pub perp_bankruptcy_market_index: u16,
    #[serde(rename = "perpBankruptcy_pnl")]
    pub perp_bankruptcy_pnl: f64,
    #[serde(rename = "perpBankruptcy_ifPayment")]
    pub perp_bankruptcy_if_payment: f64,
    #[serde(rename = "perpBankruptcy_clawbackUser")]
    pub perp_bankruptcy_clawback_user: Option<String>,
    #[serde(rename = "perpBankruptcy_clawbackUserPayment")]
    pub perp_bankruptcy_clawback_user_payment: f64,
    #[serde(rename = "perpBankruptcy_cumulativeFundingRateDelta")]
    pub perp_bankruptcy_cumulative_funding_rate_delta: f64,

    #[serde(rename = "spotBankruptcy_marketIndex")]
    pub spot_bankruptcy_market_index: u16,
    #[serde(rename = "spotBankruptcy_borrowAmount")]
    pub spot_bankruptcy_borrow_amount: f64,
    #[serde(rename = "spotBankruptcy_ifPayment")]
    pub spot_bankruptcy_if_payment: f64,
    #[serde(rename = "spotBankruptcy_cumulativeDepositInterestDelta")]
    pub spot_bankruptcy_cumulative_deposit_interest_delta: f64,

    pub program_id: String,
}

pub(crate) fn decode(
    f: LiquidationFields,
    ctx: &DecodeContext<'_>,
) -> Result<LiquidationRecord, Error> {
    // Sub-records that did not happen are zeroed, so index 0 (the quote
    // market) is looked up for them.
    let token_precision = ctx
        .catalog
        .spot_precision(f.liquidate_spot.liability_market_index)?;
    let asset_precision = ctx
        .catalog
        .spot_precision(f.liquidate_spot.asset_market_index)?;
    let spot_token_precision = ctx
        .catalog
        .spot_precision(f.spot_bankruptcy.market_index)?;

    let perp = f.liquidate_perp;
    let spot = f.liquidate_spot;
    let borrow = f.liquidate_borrow_for_perp_pnl;
    let deposit = f.liquidate_perp_pnl_for_deposit;
    let perp_bankruptcy = f.perp_bankruptcy;
    let spot_bankruptcy = f.spot_bankruptcy;

    Ok(LiquidationRecord {
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        liquidation_type: f.liquidation_type,
        user: f.user,
        liquidator: f.liquidator,
        margin_requirement: f.margin_requirement / QUOTE_PRECISION,
        total_collateral: f.total_collateral / QUOTE_PRECISION,
        margin_freed: f.margin_freed / QUOTE_PRECISION,
        liquidation_id: f.liquidation_id,
        bankrupt: f.bankrupt,
        canceled_order_ids: format!("{:?}", f.canceled_order_ids),

        liquidate_perp_market_index: perp.market_index,
        liquidate_perp_oracle_price: perp.oracle_price / PRICE_PRECISION,
        liquidate_perp_base_asset_amount: perp.base_asset_amount / BASE_PRECISION,
        liquidate_perp_quote_asset_amount: perp.quote_asset_amount / QUOTE_PRECISION,
        liquidate_perp_lp_shares: perp.lp_shares / AMM_RESERVE_PRECISION,
        liquidate_perp_fill_record_id: perp.fill_record_id,
        liquidate_perp_user_order_id: perp.user_order_id,
        liquidate_perp_liquidator_order_id: perp.liquidator_order_id,
        liquidate_perp_liquidator_fee: perp.liquidator_fee / QUOTE_PRECISION,
        liquidate_perp_if_fee: perp.if_fee / QUOTE_PRECISION,

        liquidate_spot_asset_market_index: spot.asset_market_index,
        liquidate_spot_asset_price: spot.asset_price / PRICE_PRECISION,
        liquidate_spot_asset_transfer: spot.asset_transfer / asset_precision,
        liquidate_spot_liability_market_index: spot.liability_market_index,
        liquidate_spot_liability_price: spot.liability_price / PRICE_PRECISION,
        liquidate_spot_liability_transfer: spot.liability_transfer / token_precision,
        liquidate_spot_if_fee: spot.if_fee / token_precision,

        borrow_for_perp_pnl_perp_market_index: borrow.perp_market_index,
        borrow_for_perp_pnl_market_oracle_price: borrow.market_oracle_price / PRICE_PRECISION,
        borrow_for_perp_pnl_pnl_transfer: borrow.pnl_transfer / QUOTE_PRECISION,
        borrow_for_perp_pnl_liability_market_index: borrow.liability_market_index,
        borrow_for_perp_pnl_liability_price: borrow.liability_price / PRICE_PRECISION,
        borrow_for_perp_pnl_liability_transfer: borrow.liability_transfer / QUOTE_PRECISION,

        perp_pnl_for_deposit_perp_market_index: deposit.perp_market_index,
        perp_pnl_for_deposit_market_oracle_price: deposit.market_oracle_price / PRICE_PRECISION,
        perp_pnl_for_deposit_pnl_transfer: deposit.pnl_transfer / QUOTE_PRECISION,
        perp_pnl_for_deposit_asset_market_index: deposit.asset_market_index,
        perp_pnl_for_deposit_asset_price: deposit.asset_price / PRICE_PRECISION,
        perp_pnl_for_deposit_asset_transfer: deposit.asset_transfer / BASE_PRECISION,

        perp_bankruptcy_market_index: perp_bankruptcy.market_index,
        perp_bankruptcy_pnl: perp_bankruptcy.pnl / QUOTE_PRECISION,
        perp_bankruptcy_if_payment: perp_bankruptcy.if_payment / QUOTE_PRECISION,
        perp_bankruptcy_clawback_user: perp_bankruptcy.clawback_user,
        perp_bankruptcy_clawback_user_payment: perp_bankruptcy.clawback_user_payment
            / QUOTE_PRECISION,
        perp_bankruptcy_cumulative_funding_rate_delta: perp_bankruptcy
            .cumulative_funding_rate_delta
            / PRICE_PRECISION,

        spot_bankruptcy_market_index: spot_bankruptcy.market_index,
        spot_bankruptcy_borrow_amount: spot_bankruptcy.borrow_amount / spot_token_precision,
        spot_bankruptcy_if_payment: spot_bankruptcy.if_payment / spot_token_precision,
        spot_bankruptcy_cumulative_deposit_interest_delta: spot_bankruptcy
            .cumulative_deposit_interest_delta
            / SPOT_CUMULATIVE_INTEREST_PRECISION,

        program_id: ctx.program_id.to_string(),
    })
}

impl LiquidationRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::opt_str(self.user.as_deref()),
            KeyPart::int(self.liquidation_id),
            KeyPart::float(self.margin_requirement),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user
            .iter()
            .map(|user| PartitionTarget::new(Scope::User, user))
            .collect()
    }
}
