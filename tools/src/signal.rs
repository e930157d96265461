//! Test signal produced by the generator and the per-sample transform.
//!
//! Both are pure functions of the sample index, so the verifier can recompute every expected value.

use crate::config::Sample;

/// Time between adjacent samples.
pub const TIME_STEP: f64 = 0.01;

#[allow(clippy::approx_constant)]
const COS_AMPLITUDE: f64 = 3.14;
const SIN_AMPLITUDE: f64 = 2.78;

/// Sample number `j` of the generated signal.
pub fn generate(j: u64) -> Sample {
    let t = TIME_STEP * j as f64;
    SIN_AMPLITUDE * t.sin() + COS_AMPLITUDE * (t / 10.0).cos()
}

/// Fills `out` with samples starting from index `start`.
pub fn generate_into(start: u64, out: &mut [Sample]) {
    for (j, x) in (start..).zip(out.iter_mut()) {
        *x = generate(j);
    }
}

/// Transform applied to sample number `j`.
pub fn transform(j: u64, x: Sample) -> Sample {
    0.5 * x + (j % 1000) as f64 * 1e-3
}
