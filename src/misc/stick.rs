use crate::result::{Error, Result};
use rand::Rng;
use rand_distr::Beta;

/// Lazy stick-breaking sequence.
///
/// Each step breaks a `Beta(1, α)` fraction off the mass that is still
/// unallocated and yields it as the next weight, so the weights sum to one in
/// the limit. The sequence owns its random source and is stateful: clone or
/// re-create it rather than sharing it between threads.
#[derive(Clone, Debug)]
pub struct StickSequence<R> {
    concentration: f64,
    breaker: Beta<f64>,
    remaining: f64,
    rng: R,
}

/// Begin a stick-breaking sequence with concentration `α`.
///
/// `rng` may be an owned generator or a `&mut` borrow of one.
///
/// # Example
///
/// ```rust
/// # use conjugate::misc::sample_stick;
/// let mut rng = rand::thread_rng();
/// let weights = sample_stick(1.0, &mut rng).unwrap().truncate(1e-3).unwrap();
///
/// let total: f64 = weights.iter().sum();
/// assert!((total - 1.0).abs() < 1e-12);
/// ```
pub fn sample_stick<R: Rng>(concentration: f64, rng: R) -> Result<StickSequence<R>> {
    if !(concentration.is_finite() && concentration > 0.0) {
        return Err(Error::malformed(
            "stick",
            format!(
                "concentration ({}) must be finite and greater than zero",
                concentration
            ),
        ));
    }
    let breaker = Beta::new(1.0, concentration)
        .map_err(|err| Error::malformed("stick", err.to_string()))?;

    Ok(StickSequence {
        concentration,
        breaker,
        remaining: 1.0,
        rng,
    })
}

impl<R: Rng> StickSequence<R> {
    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    /// Mass not yet handed out as a weight
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Draw weights until no more than `tol` of the mass remains unallocated.
    ///
    /// The weights are returned as drawn, so they sum to `1 - remaining()`.
    pub fn extend_until(&mut self, tol: f64) -> Result<Vec<f64>> {
        if !(tol > 0.0 && tol < 1.0) {
            return Err(Error::InvalidArgument(format!(
                "stick tolerance ({}) must be in (0, 1)",
                tol
            )));
        }
        let mut weights = Vec::new();
        while self.remaining > tol {
            let w = self.next().unwrap_or(0.0);
            weights.push(w);
        }
        Ok(weights)
    }

    /// Truncated stick-breaking draw, renormalized to sum to one.
    pub fn truncate(mut self, tol: f64) -> Result<Vec<f64>> {
        let mut weights = self.extend_until(tol)?;
        let z: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= z);
        Ok(weights)
    }
}

impl<R: Rng> Iterator for StickSequence<R> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let b: f64 = self.rng.sample(&self.breaker);
        let w = self.remaining * b;
        self.remaining -= w;
        Some(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn stick_mass_sums_to_one() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0xDEAD);
        for gamma in [0.1, 1.0, 5.0, 10.0] {
            for _ in 0..5 {
                let mut sticks = sample_stick(gamma, &mut rng).unwrap();
                let betas = sticks.extend_until(1e-9).unwrap();
                let total: f64 = betas.iter().sum();
                assert!((total - 1.0).abs() < 1e-5, "α = {}: {}", gamma, total);
                assert!(betas.iter().all(|&b| (0.0..=1.0).contains(&b)));
            }
        }
    }

    #[test]
    fn truncated_sticks_are_normalized() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        for gamma in [0.1, 1.0, 5.0, 10.0] {
            let betas = sample_stick(gamma, &mut rng).unwrap().truncate(1e-3).unwrap();
            let total: f64 = betas.iter().sum();
            assert::close(total, 1.0, 1e-12);
        }
    }

    #[test]
    fn lazy_sequence_tracks_remaining_mass() {
        let rng = Xoshiro256Plus::seed_from_u64(1);
        let mut sticks = sample_stick(2.0, rng).unwrap();
        let drawn: f64 = sticks.by_ref().take(10).sum();
        assert::close(drawn + sticks.remaining(), 1.0, 1e-12);
    }

    #[test]
    fn larger_concentration_spreads_mass() {
        let mut rng = Xoshiro256Plus::seed_from_u64(99);
        let mean_len = |gamma: f64, rng: &mut Xoshiro256Plus| {
            (0..200)
                .map(|_| {
                    sample_stick(gamma, &mut *rng)
                        .unwrap()
                        .extend_until(1e-3)
                        .unwrap()
                        .len()
                })
                .sum::<usize>() as f64
                / 200.0
        };
        assert!(mean_len(0.5, &mut rng) < mean_len(10.0, &mut rng));
    }

    #[test]
    fn bad_concentration() {
        let rng = Xoshiro256Plus::seed_from_u64(1);
        for gamma in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let res = sample_stick(gamma, rng.clone());
            assert!(matches!(res, Err(Error::MalformedParameters { .. })));
        }
    }

    #[test]
    fn bad_tolerance() {
        let rng = Xoshiro256Plus::seed_from_u64(1);
        let mut sticks = sample_stick(1.0, rng).unwrap();
        assert!(sticks.extend_until(0.0).is_err());
        assert!(sticks.extend_until(1.0).is_err());
    }
}
