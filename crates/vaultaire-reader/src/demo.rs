//! Demo Origin
//!
//! A client pointed at the demo origin gets a synthesized sine wave
//! instead of store data: one measurement every five seconds, period
//! three hours, up to twenty thousand points per request. Useful for
//! exercising the full client path against a daemon with an empty vault.
//! Gated behind the `--demo` flag; a production daemon treats the name
//! as an ordinary origin.

use std::f64::consts::PI;
use vaultaire_core::wire::{DataFrame, PayloadKind, SourceTag};

pub const DEMO_ORIGIN: &str = "BENHUR";

const STEP_SECONDS: u64 = 5;
const MAX_POINTS: u64 = 20_000;
const PERIOD_SECONDS: f64 = 10_800.0;

/// Synthesize the demo frames falling inside `[alpha, omega]`.
pub fn demo_frames(alpha: u64, omega: u64) -> Vec<DataFrame> {
    let first_second = alpha.div_ceil(1_000_000_000);
    let mut frames = Vec::new();
    for k in 0..MAX_POINTS {
        let seconds = first_second + STEP_SECONDS * k;
        let Some(timestamp) = seconds.checked_mul(1_000_000_000) else {
            break;
        };
        if timestamp > omega {
            break;
        }
        if timestamp < alpha {
            continue;
        }
        frames.push(DataFrame {
            source: vec![SourceTag {
                field: "wave".to_string(),
                value: "sine".to_string(),
            }],
            timestamp,
            payload: PayloadKind::Real as i32,
            value_measurement: Some((2.0 * PI * seconds as f64 / PERIOD_SECONDS).sin()),
            ..Default::default()
        });
    }
    frames
}
