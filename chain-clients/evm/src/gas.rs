//! Gas pricing and the underpriced-replacement escalation loop
//!
//! Initial fees are `maxFeePerGas = 2 * baseFee + priority`. When a node rejects
//! a submission because a pending transaction with the same nonce pays more,
//! both fee components are raised by `bump_percent` and the submission is
//! retried after a fixed backoff, up to `max_attempts` submissions in total.

use crate::error::EvmError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const GWEI: u128 = 1_000_000_000;

/// Used when the latest block carries no base fee.
pub const DEFAULT_BASE_FEE_WEI: u128 = 10 * GWEI;

pub const DEFAULT_PRIORITY_FEE_WEI: u128 = 2 * GWEI;

/// Recommended priority fee by native chain id.
///
/// Polygon-class chains reject tips far below 25 gwei.
pub fn recommended_priority_fee(chain_id: u64) -> u128 {
    match chain_id {
        // Flow EVM mainnet / testnet
        747 | 545 => GWEI,
        // Ethereum mainnet / Sepolia
        1 | 11_155_111 => 2 * GWEI,
        // Polygon PoS / Amoy
        137 | 80_002 => 25 * GWEI,
        _ => DEFAULT_PRIORITY_FEE_WEI,
    }
}

/// EIP-1559 fee pair for one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl GasFees {
    pub fn from_base_fee(base_fee: u128, priority_fee: u128) -> Self {
        Self {
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        }
    }

    /// Both components scaled by `percent`, rounded up so the result is never
    /// below the exact product.
    pub fn bumped(&self, percent: u128) -> Self {
        let scale = |v: u128| v.saturating_mul(percent).saturating_add(99) / 100;
        Self {
            max_fee_per_gas: scale(self.max_fee_per_gas),
            max_priority_fee_per_gas: scale(self.max_priority_fee_per_gas),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GasPolicy {
    /// Total submissions, including the first.
    pub max_attempts: u32,
    pub bump_percent: u128,
    pub backoff: Duration,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            bump_percent: 150,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Result of a submission that eventually succeeded.
#[derive(Debug, Clone)]
pub struct Escalated<T> {
    pub value: T,
    /// Fees of the accepted attempt.
    pub fees: GasFees,
    pub attempts: u32,
}

/// Runs `submit` with escalating fees until it succeeds.
///
/// Only [`ErrorClass::Underpriced`](crate::ErrorClass::Underpriced) errors are
/// retried; every other error is returned as-is on the attempt it occurred.
pub async fn submit_with_escalation<T, F, Fut>(
    policy: &GasPolicy,
    initial: GasFees,
    mut submit: F,
) -> Result<Escalated<T>, EvmError>
where
    F: FnMut(GasFees, u32) -> Fut,
    Fut: Future<Output = Result<T, EvmError>>,
{
    let mut fees = initial;
    let mut attempt = 1;
    loop {
        match submit(fees, attempt).await {
            Ok(value) => {
                return Ok(Escalated {
                    value,
                    fees,
                    attempts: attempt,
                })
            }
            Err(e) if e.is_underpriced() => {
                if attempt >= policy.max_attempts {
                    return Err(EvmError::GasEscalationExhausted {
                        attempts: attempt,
                        max_fee_per_gas: fees.max_fee_per_gas,
                        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                    });
                }
                let next = fees.bumped(policy.bump_percent);
                warn!(
                    "Attempt {}/{} underpriced ({}); retrying with maxFeePerGas={} maxPriorityFeePerGas={}",
                    attempt,
                    policy.max_attempts,
                    e,
                    next.max_fee_per_gas,
                    next.max_priority_fee_per_gas
                );
                fees = next;
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
