//! Identifier service: issues unique 64-bit session/handle identifiers.

use rand::Rng;

/// Draws a random, positive 64-bit id that is not already present, retrying
/// until a free one is found. `contains` closures are expected to be cheap
/// (a lock-guarded hash map lookup), since collisions are rare.
pub fn draw_unique_id(contains: impl Fn(u64) -> bool) -> u64 {
    loop {
        let candidate: u64 = rand::thread_rng().gen_range(1..=u64::MAX);

        if !contains(candidate) {
            return candidate;
        }
    }
}
