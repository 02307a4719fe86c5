//! Immutable market reference data.
//!
//! Built once before any date is processed and shared read-only (behind an
//! `Arc`) by the decoder and the partitioner.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::events::MarketType;
use crate::store::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerpMarket {
    pub symbol: String,
    pub market_index: u16,
    pub base_asset_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotMarket {
    pub symbol: String,
    pub market_index: u16,
    /// Mint decimals.
    pub mint_precision: u32,
}

impl SpotMarket {
    /// `10^decimals`, the divisor for raw token amounts in this market.
    pub fn market_precision(&self) -> f64 {
        10_f64.powi(self.mint_precision as i32)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    perp: BTreeMap<u16, PerpMarket>,
    spot: BTreeMap<u16, SpotMarket>,
}

impl MarketCatalog {
    pub fn new(
        perp: impl IntoIterator<Item = PerpMarket>,
        spot: impl IntoIterator<Item = SpotMarket>,
    ) -> Self {
        Self {
            perp: perp.into_iter().map(|m| (m.market_index, m)).collect(),
            spot: spot.into_iter().map(|m| (m.market_index, m)).collect(),
        }
    }

    pub fn perp(&self, market_index: u16) -> Result<&PerpMarket, Error> {
        self.perp.get(&market_index).ok_or(Error::UnknownMarket {
            market_type: "perp",
            market_index,
        })
    }

    pub fn spot(&self, market_index: u16) -> Result<&SpotMarket, Error> {
        self.spot.get(&market_index).ok_or(Error::UnknownMarket {
            market_type: "spot",
            market_index,
        })
    }

    pub fn symbol(&self, market_type: MarketType, market_index: u16) -> Result<&str, Error> {
        match market_type {
            MarketType::Perp => self.perp(market_index).map(|m| m.symbol.as_str()),
            MarketType::Spot => self.spot(market_index).map(|m| m.symbol.as_str()),
        }
    }

    /// Divisor for token amounts of a spot market; unknown markets are fatal.
    pub fn spot_precision(&self, market_index: u16) -> Result<f64, Error> {
        self.spot(market_index).map(SpotMarket::market_precision)
    }

    pub fn perp_markets(&self) -> impl Iterator<Item = &PerpMarket> {
        self.perp.values()
    }

    pub fn spot_markets(&self) -> impl Iterator<Item = &SpotMarket> {
        self.spot.values()
    }

    pub fn is_empty(&self) -> bool {
        self.perp.is_empty() && self.spot.is_empty()
    }

    /// Parses a market snapshot document:
    /// `{"perpMarkets": [{marketIndex, name}], "spotMarkets": [{marketIndex, name, decimals}]}`.
    pub fn from_snapshot(json: &[u8]) -> Result<Self, Error> {
        let snapshot: Snapshot = serde_json::from_slice(json).map_err(|e| Error::Catalog {
            reason: format!("invalid market snapshot: {e}"),
        })?;

        let mut perp = Vec::with_capacity(snapshot.perp_markets.len());
        for entry in snapshot.perp_markets {
            let symbol = decode_name(&entry.name)?;
            let base_asset_symbol = symbol
                .split("-PERP")
                .next()
                .unwrap_or(symbol.as_str())
                .to_string();
            perp.push(PerpMarket {
                symbol,
                market_index: entry.market_index,
                base_asset_symbol,
            });
        }

        let mut spot = Vec::with_capacity(snapshot.spot_markets.len());
        for entry in snapshot.spot_markets {
            spot.push(SpotMarket {
                symbol: decode_name(&entry.name)?,
                market_index: entry.market_index,
                mint_precision: entry.decimals,
            });
        }

        let catalog = Self::new(perp, spot);
        if catalog.is_empty() {
            return Err(Error::Catalog {
                reason: "market snapshot lists no markets".into(),
            });
        }
        Ok(catalog)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    #[serde(default)]
    perp_markets: Vec<PerpEntry>,
    #[serde(default)]
    spot_markets: Vec<SpotEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpEntry {
    market_index: u16,
    name: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotEntry {
    market_index: u16,
    name: Value,
    decimals: u32,
}

/// Market names are stored on chain as 32 space-padded bytes; snapshots may
/// carry either that array or an already decoded string.
pub fn decode_name(name: &Value) -> Result<String, Error> {
    let raw = match name {
        Value::String(s) => s.clone(),
        Value::Array(bytes) => {
            let bytes: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().map(|n| n as u8))
                .collect();
            String::from_utf8(bytes).map_err(|e| Error::Catalog {
                reason: format!("market name is not utf-8: {e}"),
            })?
        }
        other => {
            return Err(Error::Catalog {
                reason: format!("unsupported market name encoding: {other}"),
            });
        }
    };
    Ok(raw.trim_end_matches(['\0', ' ']).trim().to_string())
}

/// Where the catalog comes from. Loaded exactly once per process.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<MarketCatalog, Error>;
}

/// Reads a market snapshot from the local filesystem.
pub struct FileCatalogSource {
    pub path: PathBuf,
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn load(&self) -> Result<MarketCatalog, Error> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Catalog {
                reason: format!("reading {}: {e}", self.path.display()),
            })?;
        MarketCatalog::from_snapshot(&bytes)
    }
}

/// Reads a market snapshot from an object store key.
pub struct StoreCatalogSource {
    pub store: Arc<dyn ObjectStore>,
    pub key: String,
}

#[async_trait]
impl CatalogSource for StoreCatalogSource {
    async fn load(&self) -> Result<MarketCatalog, Error> {
        let bytes = self.store.get(&self.key).await.map_err(|e| Error::Catalog {
            reason: e.to_string(),
        })?;
        MarketCatalog::from_snapshot(&bytes)
    }
}

/// Runs the one-time bootstrap and freezes the result.
pub async fn bootstrap(source: &dyn CatalogSource) -> Result<Arc<MarketCatalog>, Error> {
    let catalog = source.load().await?;
    tracing::info!(
        perp_markets = catalog.perp.len(),
        spot_markets = catalog.spot.len(),
        "market catalog loaded"
    );
    Ok(Arc::new(catalog))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use serde_json::json;

    fn padded(name: &str) -> Value {
        let mut bytes = name.as_bytes().to_vec();
        bytes.resize(32, b' ');
        json!(bytes)
    }

    #[test]
    fn snapshot_decodes_padded_names_and_precisions() {
        let doc = json!({
            "perpMarkets": [
                { "marketIndex": 0, "name": padded("SOL-PERP") },
                { "marketIndex": 1, "name": "BTC-PERP" }
            ],
            "spotMarkets": [
                { "marketIndex": 0, "name": padded("USDC"), "decimals": 6 },
                { "marketIndex": 1, "name": "SOL", "decimals": 9 }
            ]
        });
        let catalog = MarketCatalog::from_snapshot(doc.to_string().as_bytes()).unwrap();

        let sol_perp = catalog.perp(0).unwrap();
        assert_eq!(sol_perp.symbol, "SOL-PERP");
        assert_eq!(sol_perp.base_asset_symbol, "SOL");
        assert_eq!(catalog.spot(0).unwrap().symbol, "USDC");
        assert!((catalog.spot_precision(1).unwrap() - 1e9).abs() < f64::EPSILON);
        assert_eq!(catalog.symbol(MarketType::Perp, 1).unwrap(), "BTC-PERP");
    }

    #[test]
    fn unknown_market_is_a_fatal_error() {
        let catalog = MarketCatalog::new(
            [],
            [SpotMarket {
                symbol: "USDC".into(),
                market_index: 0,
                mint_precision: 6,
            }],
        );
        let err = catalog.spot_precision(5).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownMarket {
                market_type: "spot",
                market_index: 5
            }
        ));
        assert!(err.is_fatal());
        assert!(catalog.symbol(MarketType::Perp, 0).is_err());
    }

    #[test]
    fn empty_snapshot_fails_bootstrap() {
        let err = MarketCatalog::from_snapshot(br#"{"perpMarkets": []}"#).unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
    }

    #[tokio::test]
    async fn file_source_bootstraps_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markets.json");
        std::fs::write(
            &path,
            br#"{"spotMarkets":[{"marketIndex":0,"name":"USDC","decimals":6}]}"#,
        )
        .unwrap();
        let catalog = bootstrap(&FileCatalogSource { path }).await.unwrap();
        assert_eq!(catalog.spot_markets().count(), 1);
        assert_eq!(catalog.perp_markets().count(), 0);
    }
}
