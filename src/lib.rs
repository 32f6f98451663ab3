#![cfg_attr(feature = "benchmark", feature(test))]
//! Discrete-emission hidden Markov models in extended-log space.
//!
//! This library answers the three canonical HMM questions for a model with
//! $N$ hidden states and an alphabet of $M$ symbols, given one observation
//! sequence of length $T$:
//!
//! 1. **Evaluation**: [`HMM::evalp`], the probability that the model
//!    produced the sequence.
//! 2. **Decoding**: [`HMM::viterbi`], a likely hidden-state sequence.
//! 3. **Learning**: [`HMM::train`] and friends, one Baum-Welch
//!    re-estimation pass over π, A and B in place.
//!
//! Every probability is handled as an extended log (see [`logp`]), so the
//! recurrences stay finite over arbitrarily long sequences and hard zeros
//! in the model are preserved exactly. The centerpiece is
//! [`BackwardCache`], which streams the backward variables in forward
//! order while holding only O(N·√T) of them, letting training scale to
//! sequences where the full Θ(N·T) backward matrix would not fit.
//!
//! ```
//! use loghmm::HMM;
//! use ndarray::array;
//!
//! let mut hmm = HMM::from_linear(
//!     array![[0.9, 0.1], [0.2, 0.8]],
//!     array![[0.7, 0.3], [0.1, 0.9]],
//!     array![0.6, 0.4],
//! );
//! let ys = array![0, 0, 1, 1, 1, 0];
//!
//! // Problem 1: how likely is the observed sequence under the model?
//! let p = hmm.evalp(&ys);
//! assert!(p > 0.0 && p < 1.0);
//!
//! // Problem 2: the most likely state at each step
//! let path: Vec<usize> = hmm.viterbi(ys.iter().cloned()).collect();
//! assert_eq!(6, path.len());
//!
//! // Problem 3: one Baum-Welch pass re-estimates π, A, B in place
//! hmm.train(&ys);
//! assert!(hmm.evalp(&ys) > 0.0);
//! ```
//!
//! ## Notes
//!
//! The recurrences follow Rabiner's classic tutorial notation; the
//! extended-log arithmetic is the scheme from Mann's *Numerically Stable
//! Hidden Markov Model Implementation*, with log-zero represented by the
//! float type's positive infinity.

#[cfg(feature = "benchmark")]
extern crate test;

use ndarray::prelude::*;
use spectral::prelude::*;

mod backward;
mod cache;
mod eval;
mod forward;
pub mod logp;
mod posterior;
mod sample;
mod train;
mod viterbi;

pub use crate::cache::BackwardCache;
pub use crate::logp::{eexp, eln, elngreater, elnproduct, elnsum, lzero, ElnArray1, LZERO};
pub use crate::sample::{HMMSample, HMMSampleIter, WeightedChoiceFloat};
pub use crate::viterbi::ViterbiIter;

const TOLERANCE: f64 = 1e-5; // for "sums to 1" checks on caller-supplied tables

/// A discrete-emission HMM with every parameter stored as an extended log.
///
/// # Math
///
/// The model explains a sequence of observed symbols
/// $Y = (y_0, \ldots, y_{T-1})$, each $y_t \in [0, M)$, through hidden
/// states $x_t \in [0, N)$ and three parameters:
///
/// * $A$, the $N × N$ state transition matrix: $a_{ij} = P(X_t=j|X_{t-1}=i)$
/// * $B$, the $N × M$ emission matrix: $b_{ik} = P(Y_t=k|X_t=i)$
/// * $π$, the $N$-length initial state distribution: $π_i = P(X_0=i)$
///
/// All three tables hold log-probabilities, with [`LZERO`] standing for
/// probability zero. The `train*` methods rewrite them in the same
/// representation, so re-estimation passes chain directly.
#[derive(Clone, Debug)]
pub struct HMM {
    pub a: Array2<f64>,
    pub b: Array2<f64>,
    pub pi: Array1<f64>,
}

impl HMM {
    /// Create a new HMM from log-space parameters.
    ///
    /// This is the constructor for tables that are already extended logs,
    /// e.g. a previously trained model being reloaded.
    ///
    /// Panics if any of:
    /// - Dimensions are invalid
    /// - A row does not exponentiate to a probability distribution
    pub fn new(a: Array2<f64>, b: Array2<f64>, pi: Array1<f64>) -> Self {
        // Check all dimensions
        {
            asserting("B must have a positive number of rows")
                .that(&b.nrows())
                .is_greater_than(0);
            asserting("B must have a positive number of columns")
                .that(&b.ncols())
                .is_greater_than(0);
            assert_eq!(
                a.nrows(),
                b.nrows(),
                "A and B must have the same number of rows"
            );
            assert_eq!(a.nrows(), a.ncols(), "A must be square");
            assert_eq!(a.nrows(), pi.len(), "π must be of length N");
        }

        // Check that each row carries unit probability mass
        {
            for row in a.rows() {
                asserting("each row of A must sum to 1")
                    .that(&row.iter().copied().map(eexp).sum::<f64>())
                    .is_close_to(1.0, TOLERANCE);
            }
            for row in b.rows() {
                asserting("each row of B must sum to 1")
                    .that(&row.iter().copied().map(eexp).sum::<f64>())
                    .is_close_to(1.0, TOLERANCE);
            }
            asserting("π must sum to 1")
                .that(&pi.iter().copied().map(eexp).sum::<f64>())
                .is_close_to(1.0, TOLERANCE);
        }

        Self { a, b, pi }
    }

    /// Create a new HMM from linear-probability parameters.
    ///
    /// Entries of exactly 0 become [`LZERO`]; everything else is logged.
    ///
    /// Panics if any entry is negative, or under the same conditions as
    /// [`HMM::new`].
    pub fn from_linear(a: Array2<f64>, b: Array2<f64>, pi: Array1<f64>) -> Self {
        for a_ij in &a {
            assert_that(a_ij).is_greater_than_or_equal_to(0.0)
        }
        for b_ik in &b {
            assert_that(b_ik).is_greater_than_or_equal_to(0.0)
        }
        for pi_i in &pi {
            assert_that(pi_i).is_greater_than_or_equal_to(0.0)
        }
        Self::new(a.mapv(eln), b.mapv(eln), pi.mapv(eln))
    }

    /// $N$, the number of states in this HMM
    pub fn n(&self) -> usize {
        self.b.nrows()
    }

    /// $M$, the number of symbols this model can emit
    pub fn k(&self) -> usize {
        self.b.ncols()
    }
}

/// Fixtures and helpers shared by the per-module test suites.
#[cfg(test)]
pub(crate) mod testutil {
    use lazy_static::lazy_static;
    use ndarray::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use crate::logp::LZERO;
    use crate::HMM;

    lazy_static! {
        /// The canonical 2-state / 3-symbol model.
        pub static ref CANON: HMM = HMM::from_linear(
            array![[0.9, 0.1], [0.5, 0.5]],
            array![[0.2, 0.3, 0.5], [0.5, 0.2, 0.3]],
            array![0.5, 0.5],
        );

        /// Its canonical length-30 observation sequence.
        pub static ref CANON_YS: Array1<usize> = "010000000010000100001000000000"
            .bytes()
            .map(|c| (c - b'0') as usize)
            .collect();
    }

    /// A fast RNG with reproducible outputs that isn't necessarily
    /// cryptographically strong.
    pub fn new_rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(1337)
    }

    /// A valid model with dense random distributions.
    pub fn random_hmm<R: Rng>(n: usize, k: usize, rng: &mut R) -> HMM {
        let mut a = Array2::from_shape_fn((n, n), |_| rng.gen::<f64>() + 0.05);
        let mut b = Array2::from_shape_fn((n, k), |_| rng.gen::<f64>() + 0.05);
        let mut pi = Array1::from_shape_fn(n, |_| rng.gen::<f64>() + 0.05);
        for mut row in a.rows_mut() {
            let sum = row.sum();
            row /= sum;
        }
        for mut row in b.rows_mut() {
            let sum = row.sum();
            row /= sum;
        }
        let sum = pi.sum();
        pi /= sum;
        HMM::from_linear(a, b, pi)
    }

    pub fn random_obs<R: Rng>(t: usize, k: usize, rng: &mut R) -> Array1<usize> {
        (0..t).map(|_| rng.gen_range(0..k)).collect()
    }

    /// Relative comparison on extended logs: log-zero only matches log-zero.
    pub fn assert_eln_close(actual: f64, expected: f64, tol: f64) {
        if actual == LZERO && expected == LZERO {
            return;
        }
        assert!(
            actual != LZERO && expected != LZERO,
            "log-zero mismatch: {} vs {}",
            actual,
            expected
        );
        let scale = 1.0_f64.max(actual.abs()).max(expected.abs());
        assert!(
            (actual - expected).abs() <= tol * scale,
            "{} vs {} exceeds tolerance {}",
            actual,
            expected,
            tol
        );
    }
}


#[cfg(feature = "benchmark")]
mod benchmark {
    use crate::*;
    use test::Bencher;

    #[bench]
    fn bench_streamed_train(bench: &mut Bencher) {
        let hmm = HMM::from_linear(
            array![[0.9, 0.1], [0.5, 0.5]],
            array![[0.2, 0.3, 0.5], [0.5, 0.2, 0.3]],
            array![0.5, 0.5],
        );
        let ys: Array1<usize> = [0usize, 1, 0, 2]
            .iter()
            .cycle()
            .take(1001)
            .cloned()
            .collect();
        bench.iter(|| {
            let mut model = hmm.clone();
            model.train(&ys);
        });
    }
}
