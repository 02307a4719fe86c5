use serde::{Deserialize, Serialize};

use crate::catalog::MarketCatalog;
use crate::error::Error;
use crate::events::precision::QUOTE_PRECISION;
use crate::events::{DecodeContext, amount, enum_camel, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct InsuranceFundFields {
    ts: i64,
    spot_market_index: u16,
    perp_market_index: u16,
    #[serde(default)]
    user_if_factor: u32,
    #[serde(default)]
    total_if_factor: u32,
    #[serde(default, deserialize_with = "amount")]
    vault_amount_before: f64,
    #[serde(default, deserialize_with = "amount")]
    insurance_vault_amount_before: f64,
    #[serde(default, deserialize_with = "amount")]
    total_if_shares_before: f64,
    #[serde(default, deserialize_with = "amount")]
    total_if_shares_after: f64,
    #[serde(default, deserialize_with = "amount")]
    amount: f64,
}

/// Insurance fund revenue settlement, partitioned by spot market.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceFundRecord {
    pub vault_amount_before: f64,
    pub insurance_vault_amount_before: f64,
    pub total_if_shares_before: f64,
    pub total_if_shares_after: f64,
    pub amount: f64,
    pub ts: i64,
    pub tx_sig: String,
    pub slot: u64,
    pub spot_market_index: u16,
    pub perp_market_index: u16,
    pub user_if_factor: u32,
    pub total_if_factor: u32,
    pub program_id: String,
}

pub(crate) fn decode_fund(
    f: InsuranceFundFields,
    ctx: &DecodeContext<'_>,
) -> Result<InsuranceFundRecord, Error> {
    let token_precision = ctx.catalog.spot_precision(f.spot_market_index)?;
    Ok(InsuranceFundRecord {
        vault_amount_before: f.vault_amount_before / token_precision,
        insurance_vault_amount_before: f.insurance_vault_amount_before / token_precision,
        total_if_shares_before: f.total_if_shares_before / QUOTE_PRECISION,
        total_if_shares_after: f.total_if_shares_after / QUOTE_PRECISION,
        amount: f.amount / token_precision,
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        spot_market_index: f.spot_market_index,
        perp_market_index: f.perp_market_index,
        user_if_factor: f.user_if_factor,
        total_if_factor: f.total_if_factor,
        program_id: ctx.program_id.to_string(),
    })
}

impl InsuranceFundRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::int(self.ts),
            KeyPart::int(self.perp_market_index),
            KeyPart::int(self.spot_market_index),
        ])
    }

    pub fn partition_targets(&self, catalog: &MarketCatalog) -> Result<Vec<PartitionTarget>, Error> {
        let market = catalog.spot(self.spot_market_index)?;
        Ok(vec![PartitionTarget::new(Scope::Market, &market.symbol)])
    }
}

#[derive(Deserialize)]
pub(crate) struct InsuranceFundStakeFields {
    ts: i64,
    #[serde(default, deserialize_with = "pubkey")]
    user_authority: Option<String>,
    #[serde(default, deserialize_with = "enum_camel")]
    action: String,
    #[serde(default, deserialize_with = "amount")]
    amount: f64,
    market_index: u16,
    #[serde(default, deserialize_with = "amount")]
    insurance_vault_amount_before: f64,
    #[serde(default, deserialize_with = "amount")]
    if_shares_before: f64,
    #[serde(default, deserialize_with = "amount")]
    user_if_shares_before: f64,
    #[serde(default, deserialize_with = "amount")]
    total_if_shares_before: f64,
    #[serde(default, deserialize_with = "amount")]
    if_shares_after: f64,
    #[serde(default, deserialize_with = "amount")]
    user_if_shares_after: f64,
    #[serde(default, deserialize_with = "amount")]
    total_if_shares_after: f64,
}

/// Stake, unstake and unstake-request actions, partitioned by authority.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceFundStakeRecord {
    pub amount: f64,
    pub user_authority: Option<String>,
    pub action: String,
    pub ts: i64,
    pub tx_sig: String,
    pub slot: u64,
    pub market_index: u16,
    pub if_shares_before: f64,
    pub user_if_shares_before: f64,
    pub total_if_shares_before: f64,
    pub if_shares_after: f64,
    pub user_if_shares_after: f64,
    pub total_if_shares_after: f64,
    pub insurance_vault_amount_before: f64,
    pub program_id: String,
}

pub(crate) fn decode_stake(
    f: InsuranceFundStakeFields,
    ctx: &DecodeContext<'_>,
) -> Result<InsuranceFundStakeRecord, Error> {
    let token_precision = ctx.catalog.spot_precision(f.market_index)?;
    Ok(InsuranceFundStakeRecord {
        amount: f.amount / token_precision,
        user_authority: f.user_authority,
        action: f.action,
        ts: f.ts,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        market_index: f.market_index,
        if_shares_before: f.if_shares_before / QUOTE_PRECISION,
        user_if_shares_before: f.user_if_shares_before / QUOTE_PRECISION,
        total_if_shares_before: f.total_if_shares_before / QUOTE_PRECISION,
        if_shares_after: f.if_shares_after / QUOTE_PRECISION,
        user_if_shares_after: f.user_if_shares_after / QUOTE_PRECISION,
        total_if_shares_after: f.total_if_shares_after / QUOTE_PRECISION,
        insurance_vault_amount_before: f.insurance_vault_amount_before / token_precision,
        program_id: ctx.program_id.to_string(),
    })
}

impl InsuranceFundStakeRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::int(self.ts),
            KeyPart::int(self.market_index),
            KeyPart::opt_str(self.user_authority.as_deref()),
        ])
    }

    pub fn partition_targets(&self) -> Vec<PartitionTarget> {
        self.user_authority
            .iter()
            .map(|authority| PartitionTarget::new(Scope::Authority, authority))
            .collect()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::catalog::SpotMarket;
    use crate::events::{DRIFT_PROGRAM_ID, EventDecoder, EventKind, EventRecord};
    use crate::types::EventMetadata;

    use super::*;

    fn decoder() -> EventDecoder {
        let catalog = MarketCatalog::new(
            [],
            [SpotMarket {
                symbol: "SOL".into(),
                market_index: 1,
                mint_precision: 9,
            }],
        );
        EventDecoder::new(Arc::new(catalog), DRIFT_PROGRAM_ID)
    }

    fn meta() -> EventMetadata {
        EventMetadata {
            tx_sig: "ifSig".into(),
            slot: 3,
        }
    }

    #[test]
    fn fund_record_partitions_by_spot_symbol() {
        let d = decoder();
        let record = d
            .decode(
                EventKind::InsuranceFundRecord,
                &json!({
                    "ts": 10,
                    "spot_market_index": 1,
                    "perp_market_index": 0,
                    "user_if_factor": 100_000,
                    "total_if_factor": 200_000,
                    "vault_amount_before": 3_000_000_000_u64,
                    "amount": 500_000_000_u64,
                    "total_if_shares_before": 7_000_000_u64
                }),
                &meta(),
            )
            .unwrap();
        let EventRecord::InsuranceFund(r) = &record else {
            unreachable!("decoder returned the wrong record");
        };
        assert!((r.vault_amount_before - 3.0).abs() < 1e-12);
        assert!((r.amount - 0.5).abs() < 1e-12);
        assert!((r.total_if_shares_before - 7.0).abs() < 1e-12);
        assert_eq!(
            record.partition_targets(d.catalog()).unwrap(),
            vec![PartitionTarget::new(Scope::Market, "SOL")]
        );
    }

    #[test]
    fn stake_record_partitions_by_authority() {
        let d = decoder();
        let record = d
            .decode(
                EventKind::InsuranceFundStakeRecord,
                &json!({
                    "ts": 11,
                    "user_authority": "StakerAuthority",
                    "action": {"Stake": {}},
                    "amount": 2_000_000_000_u64,
                    "market_index": 1,
                    "if_shares_after": 1_000_000_u64
                }),
                &meta(),
            )
            .unwrap();
        let EventRecord::InsuranceFundStake(r) = &record else {
            unreachable!("decoder returned the wrong record");
        };
        assert!((r.amount - 2.0).abs() < 1e-12);
        assert!((r.if_shares_after - 1.0).abs() < 1e-12);
        assert_eq!(r.action, "stake");
        assert_eq!(
            record.partition_targets(d.catalog()).unwrap(),
            vec![PartitionTarget::new(Scope::Authority, "StakerAuthority")]
        );
    }
}
