//! Per-worker RNG stream construction (spec §3, §5): each photon draws
//! from its own generator, seeded deterministically from a run-wide base
//! seed plus the photon's index, so lanes never share or contend over
//! state.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Builds the photon-local RNG for photon `index` in a run seeded with
/// `base_seed`. `SmallRng::seed_from_u64` runs its input through a
/// SplitMix64-style mixing step internally, which is what keeps
/// sequential photon indices from producing correlated initial states —
/// the same property the original Kokkos `Random_XorShift64_Pool` gets
/// from per-thread pool partitioning.
pub fn photon_rng(base_seed: u64, index: u64) -> SmallRng {
    SmallRng::seed_from_u64(base_seed.wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}
