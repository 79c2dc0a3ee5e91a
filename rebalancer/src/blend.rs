//! Merge primary and secondary strategy weights into one target allocation.
//!
//! Primaries are high-conviction picks capped per symbol; secondaries fill
//! whatever allocation the primaries leave unused.

use serde::Serialize;
use tangent::WeightVector;

/// Per-symbol concentration caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendCaps {
    /// Largest weight any primary symbol may take.
    pub primary_cap: f64,
    /// Largest weight any secondary symbol may take before scaling.
    pub secondary_cap: f64,
}

impl Default for BlendCaps {
    fn default() -> Self {
        Self {
            primary_cap: 1.0 / 12.0,
            secondary_cap: 5.0 / 6.0,
        }
    }
}

/// Intermediate and final weights of a blend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Blend {
    /// Summed, capped primary weights.
    pub primary: WeightVector,
    /// Normalized, capped secondary weights scaled into the unused share.
    pub secondary: WeightVector,
    /// `primary + secondary`.
    pub target: WeightVector,
}

/// Blend strategy outputs.
///
/// 1. Secondaries are summed, renormalized to 1 (when the sum is positive)
///    and clipped at `secondary_cap`.
/// 2. Primaries are summed and clipped at `primary_cap`, then renormalized
///    only if they exceed 1 in total.
/// 3. Secondaries are scaled by `1 − sum(primary)`.
/// 4. The target is the union-sum of both.
///
/// Clipped mass is not redistributed, so the target may sum to less than 1.
pub fn blend(primary: &[WeightVector], secondary: &[WeightVector], caps: BlendCaps) -> Blend {
    let mut sec = WeightVector::sum_all(secondary);
    if sec.sum() > 0.0 {
        sec = sec.normalized();
    }
    let sec = sec.clipped(caps.secondary_cap);

    let mut prim = WeightVector::sum_all(primary).clipped(caps.primary_cap);
    if prim.sum() > 1.0 {
        prim = prim.normalized();
    }

    let sec = sec.scaled(1.0 - prim.sum());
    let target = prim.add(&sec);

    Blend {
        primary: prim,
        secondary: sec,
        target,
    }
}
