//! Miscellaneous helper utilities.

use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use ethers::types::U256;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Zero, pow};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Converts a human-readable quantity ("2", "0.25", "1e3") into smallest
/// units. Negative values, digits beyond `decimals` and results that do not
/// fit in 256 bits are rejected.
pub fn parse_units(human: &str, decimals: u8) -> Result<U256> {
    let value = BigDecimal::from_str(human.trim())
        .map_err(|e| AppError::Amount(format!("invalid amount {human:?}: {e}")))?;
    if value < BigDecimal::zero() {
        return Err(AppError::Amount(format!("amount {human:?} is negative")));
    }

    let one_unit = BigDecimal::new(BigInt::from(1u8), -i64::from(decimals));
    let (digits, scale) = (value * one_unit).normalized().as_bigint_and_exponent();
    if scale > 0 {
        return Err(AppError::Amount(format!(
            "amount {human:?} has more than {decimals} decimal places"
        )));
    }
    let shift = usize::try_from(-scale)
        .map_err(|_| AppError::Amount(format!("amount {human:?} is out of range")))?;
    let scaled = digits * pow(BigInt::from(10u8), shift);

    let magnitude = scaled
        .to_biguint()
        .ok_or_else(|| AppError::Amount(format!("amount {human:?} is negative")))?;
    let bytes = magnitude.to_bytes_be();
    if bytes.len() > 32 {
        return Err(AppError::Amount(format!(
            "amount {human:?} overflows 256 bits"
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

/// Renders smallest units as a decimal string without trailing zeros.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let mut buf = [0u8; 32];
    amount.to_big_endian(&mut buf);
    let value = BigUint::from_bytes_be(&buf);
    let base = pow(BigUint::from(10u8), decimals as usize);
    let whole = &value / &base;
    let frac = &value % &base;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Signed difference of two unsigned amounts, for log lines.
pub fn signed_delta(before: U256, after: U256) -> BigInt {
    let to_int = |v: U256| {
        let mut buf = [0u8; 32];
        v.to_big_endian(&mut buf);
        BigInt::from_bytes_be(Sign::Plus, &buf)
    };
    to_int(after) - to_int(before)
}
