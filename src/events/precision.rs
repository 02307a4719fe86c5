//! Fixed-point divisors used by the Drift program.

pub const QUOTE_PRECISION: f64 = 1e6;
pub const PRICE_PRECISION: f64 = 1e6;
pub const BASE_PRECISION: f64 = 1e9;
pub const AMM_RESERVE_PRECISION: f64 = 1e9;
pub const SPOT_BALANCE_PRECISION: f64 = 1e9;
pub const SPOT_CUMULATIVE_INTEREST_PRECISION: f64 = 1e10;
/// `PRICE_PRECISION * FUNDING_RATE_BUFFER` (1e6 * 1e3).
pub const FUNDING_RATE_PRECISION: f64 = 1e9;
/// Funding rate records carry rates with a 1e9 divisor.
pub const FUNDING_RATE_RECORD_PRECISION: f64 = 1e9;
