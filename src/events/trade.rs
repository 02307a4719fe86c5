use serde::{Deserialize, Serialize};

use crate::catalog::MarketCatalog;
use crate::error::Error;
use crate::events::precision::{BASE_PRECISION, PRICE_PRECISION, QUOTE_PRECISION};
use crate::events::{DecodeContext, MarketType, amount, enum_camel, market_type, pubkey};
use crate::partition::{KeyPart, NaturalKey, PartitionTarget, Scope};

#[derive(Deserialize)]
pub(crate) struct OrderActionFields {
    ts: i64,
    #[serde(default, deserialize_with = "enum_camel")]
    action: String,
    #[serde(default, deserialize_with = "enum_camel")]
    action_explanation: String,
    market_index: u16,
    #[serde(deserialize_with = "market_type")]
    market_type: MarketType,
    #[serde(default, deserialize_with = "pubkey")]
    filler: Option<String>,
    #[serde(default, deserialize_with = "amount")]
    filler_reward: f64,
    #[serde(default)]
    fill_record_id: Option<u64>,
    #[serde(default, deserialize_with = "amount")]
    base_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "amount")]
    quote_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "amount")]
    taker_fee: f64,
    #[serde(default, deserialize_with = "amount")]
    maker_fee: f64,
    #[serde(default, deserialize_with = "amount")]
    referrer_reward: f64,
    #[serde(default, deserialize_with = "amount")]
    quote_asset_amount_surplus: f64,
    #[serde(default, deserialize_with = "amount")]
    spot_fulfillment_method_fee: f64,
    #[serde(default, deserialize_with = "pubkey")]
    taker: Option<String>,
    #[serde(default)]
    taker_order_id: Option<u32>,
    #[serde(default, deserialize_with = "enum_camel")]
    taker_order_direction: String,
    #[serde(default, deserialize_with = "amount")]
    taker_order_base_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    taker_order_cumulative_base_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "amount")]
    taker_order_cumulative_quote_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "pubkey")]
    maker: Option<String>,
    #[serde(default)]
    maker_order_id: Option<u32>,
    #[serde(default, deserialize_with = "enum_camel")]
    maker_order_direction: String,
    #[serde(default, deserialize_with = "amount")]
    maker_order_base_asset_amount: f64,
    #[serde(default, deserialize_with = "amount")]
    maker_order_cumulative_base_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "amount")]
    maker_order_cumulative_quote_asset_amount_filled: f64,
    #[serde(default, deserialize_with = "amount")]
    oracle_price: f64,
}

/// A fill, archived under `tradeRecords`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub filler_reward: f64,
    pub base_asset_amount_filled: f64,
    pub quote_asset_amount_filled: f64,
    pub taker_fee: f64,
    pub maker_rebate: f64,
    pub referrer_reward: f64,
    pub quote_asset_amount_surplus: f64,
    pub taker_order_base_asset_amount: f64,
    pub taker_order_cumulative_base_asset_amount_filled: f64,
    pub taker_order_cumulative_quote_asset_amount_filled: f64,
    pub maker_order_base_asset_amount: f64,
    pub maker_order_cumulative_base_asset_amount_filled: f64,
    pub maker_order_cumulative_quote_asset_amount_filled: f64,
    pub oracle_price: f64,
    pub maker_fee: f64,
    pub tx_sig: String,
    pub slot: u64,
    pub ts: i64,
    pub action: String,
    pub action_explanation: String,
    pub market_index: u16,
    pub market_type: MarketType,
    pub filler: Option<String>,
    pub fill_record_id: Option<u64>,
    pub taker: Option<String>,
    pub taker_order_id: Option<u32>,
    pub taker_order_direction: String,
    pub maker: Option<String>,
    pub maker_order_id: Option<u32>,
    pub maker_order_direction: String,
    pub spot_fulfillment_method_fee: f64,
    pub program_id: String,
}

pub(crate) fn decode(f: OrderActionFields, ctx: &DecodeContext<'_>) -> Result<TradeRecord, Error> {
    // Spot base amounts are in the market's mint precision, perp in BASE_PRECISION.
    let base_precision = match f.market_type {
        MarketType::Spot => ctx.catalog.spot_precision(f.market_index)?,
        MarketType::Perp => BASE_PRECISION,
    };

    Ok(TradeRecord {
        filler_reward: f.filler_reward / QUOTE_PRECISION,
        base_asset_amount_filled: f.base_asset_amount_filled / base_precision,
        quote_asset_amount_filled: f.quote_asset_amount_filled / QUOTE_PRECISION,
        taker_fee: f.taker_fee / QUOTE_PRECISION,
        maker_rebate: f.maker_fee / QUOTE_PRECISION,
        referrer_reward: f.referrer_reward / QUOTE_PRECISION,
        quote_asset_amount_surplus: f.quote_asset_amount_surplus / QUOTE_PRECISION,
        taker_order_base_asset_amount: f.taker_order_base_asset_amount / base_precision,
        taker_order_cumulative_base_asset_amount_filled: f
            .taker_order_cumulative_base_asset_amount_filled
            / base_precision,
        taker_order_cumulative_quote_asset_amount_filled: f
            .taker_order_cumulative_quote_asset_amount_filled
            / QUOTE_PRECISION,
        maker_order_base_asset_amount: f.maker_order_base_asset_amount / base_precision,
        maker_order_cumulative_base_asset_amount_filled: f
            .maker_order_cumulative_base_asset_amount_filled
            / base_precision,
        maker_order_cumulative_quote_asset_amount_filled: f
            .maker_order_cumulative_quote_asset_amount_filled
            / QUOTE_PRECISION,
        oracle_price: f.oracle_price / PRICE_PRECISION,
        maker_fee: f.maker_fee / QUOTE_PRECISION,
        tx_sig: ctx.meta.tx_sig.clone(),
        slot: ctx.meta.slot,
        ts: f.ts,
        action: f.action,
        action_explanation: f.action_explanation,
        market_index: f.market_index,
        market_type: f.market_type,
        filler: f.filler,
        fill_record_id: f.fill_record_id,
        taker: f.taker,
        taker_order_id: f.taker_order_id,
        taker_order_direction: f.taker_order_direction,
        maker: f.maker,
        maker_order_id: f.maker_order_id,
        maker_order_direction: f.maker_order_direction,
        spot_fulfillment_method_fee: f.spot_fulfillment_method_fee / QUOTE_PRECISION,
        program_id: ctx.program_id.to_string(),
    })
}

impl TradeRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new([
            KeyPart::str(&self.tx_sig),
            KeyPart::opt_str(self.taker.as_deref()),
            KeyPart::opt_str(self.maker.as_deref()),
            KeyPart::opt_int(self.taker_order_id),
            KeyPart::opt_int(self.maker_order_id),
            KeyPart::int(self.market_index),
            KeyPart::str(self.market_type.as_ref()),
            KeyPart::str(&self.action),
            KeyPart::opt_int(self.fill_record_id),
            KeyPart::float(self.base_asset_amount_filled),
        ])
    }

    /// Maker and taker user partitions (when present) plus the market partition.
    pub fn partition_targets(&self, catalog: &MarketCatalog) -> Result<Vec<PartitionTarget>, Error> {
        let symbol = catalog.symbol(self.market_type, self.market_index)?;
        let mut targets = Vec::with_capacity(3);
        if let Some(maker) = &self.maker {
            targets.push(PartitionTarget::new(Scope::User, maker));
        }
        if let Some(taker) = &self.taker {
            targets.push(PartitionTarget::new(Scope::User, taker));
        }
        targets.push(PartitionTarget::new(Scope::Market, symbol));
        Ok(targets)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::catalog::{MarketCatalog, PerpMarket, SpotMarket};
    use crate::events::{DRIFT_PROGRAM_ID, EventDecoder, EventKind, EventRecord};
    use crate::types::EventMetadata;

    use super::*;

    fn decoder() -> EventDecoder {
        let catalog = MarketCatalog::new(
            [PerpMarket {
                symbol: "SOL-PERP".into(),
                market_index: 0,
                base_asset_symbol: "SOL".into(),
            }],
            [
                SpotMarket {
                    symbol: "USDC".into(),
                    market_index: 0,
                    mint_precision: 6,
                },
                SpotMarket {
                    symbol: "wBTC".into(),
                    market_index: 3,
                    mint_precision: 8,
                },
            ],
        );
        EventDecoder::new(Arc::new(catalog), DRIFT_PROGRAM_ID)
    }

    fn meta() -> EventMetadata {
        EventMetadata {
            tx_sig: "5xTx".into(),
            slot: 42,
        }
    }

    fn fill(market_type: &str, market_index: u16) -> serde_json::Value {
        json!({
            "ts": 1_700_000_000_i64,
            "action": "Fill",
            "action_explanation": "OrderFilledWithAMM",
            "market_index": market_index,
            "market_type": market_type,
            "filler": null,
            "filler_reward": null,
            "fill_record_id": 77_u64,
            "base_asset_amount_filled": 2_500_000_000_u64,
            "quote_asset_amount_filled": 250_000_000_u64,
            "taker_fee": 125_000_u64,
            "maker_fee": -25_000_i64,
            "taker": "TakerPubkey",
            "taker_order_id": 9_u32,
            "taker_order_direction": {"Long": {}},
            "maker": null,
            "maker_order_id": null,
            "oracle_price": 100_000_000_i64
        })
    }

    fn trade(record: EventRecord) -> TradeRecord {
        let EventRecord::Trade(t) = record else {
            unreachable!("decoder returned a non-trade record");
        };
        t
    }

    #[test]
    fn perp_fill_uses_base_precision() {
        let t = trade(
            decoder()
                .decode(EventKind::OrderActionRecord, &fill("Perp", 0), &meta())
                .unwrap(),
        );
        assert!((t.base_asset_amount_filled - 2.5).abs() < 1e-12);
        assert!((t.quote_asset_amount_filled - 250.0).abs() < 1e-9);
        assert!((t.maker_rebate + 0.025).abs() < 1e-12);
        assert!((t.oracle_price - 100.0).abs() < 1e-9);
        assert_eq!(t.filler_reward, 0.0);
        assert_eq!(t.action, "fill");
        assert_eq!(t.action_explanation, "orderFilledWithAmm");
        assert_eq!(t.taker_order_direction, "long");
        assert_eq!(t.maker_order_direction, "");
        assert_eq!(t.market_type, MarketType::Perp);
        assert_eq!(t.tx_sig, "5xTx");
        assert_eq!(t.slot, 42);
        assert_eq!(t.program_id, DRIFT_PROGRAM_ID);
    }

    #[test]
    fn spot_fill_uses_mint_precision() {
        let t = trade(
            decoder()
                .decode(EventKind::OrderActionRecord, &fill("Spot", 3), &meta())
                .unwrap(),
        );
        assert!((t.base_asset_amount_filled - 25.0).abs() < 1e-9);
        assert_eq!(t.market_type, MarketType::Spot);
    }

    #[test]
    fn spot_fill_on_unknown_market_is_fatal() {
        let err = decoder()
            .decode(EventKind::OrderActionRecord, &fill("Spot", 99), &meta())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn fan_out_skips_missing_maker() {
        let d = decoder();
        let t = trade(
            d.decode(EventKind::OrderActionRecord, &fill("Perp", 0), &meta())
                .unwrap(),
        );
        let targets = t.partition_targets(d.catalog()).unwrap();
        assert_eq!(
            targets,
            vec![
                PartitionTarget::new(Scope::User, "TakerPubkey"),
                PartitionTarget::new(Scope::Market, "SOL-PERP"),
            ]
        );
    }

    #[test]
    fn malformed_payload_is_a_protocol_error() {
        let mut bad = fill("Perp", 0);
        bad["market_type"] = json!("Option");
        let err = decoder()
            .decode(EventKind::OrderActionRecord, &bad, &meta())
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(!err.is_fatal());
    }
}
