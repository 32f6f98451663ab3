//! Extended-log arithmetic.
//!
//! Every probability in this crate is stored as a natural log, extended with
//! a sentinel for $\log 0$ so that impossible events stay representable.
//! The sentinel is the float type's *positive* infinity: log-probabilities
//! of real events are always $\le 0$, so $+\infty$ can never collide with
//! one. [`elnsum`] and [`elnproduct`] are closed over the sentinel, which
//! lets the recurrences run over models containing hard zeros without ever
//! producing a NaN.
//!
//! The sum uses the usual rearrangement $\ln(e^x + e^y) =
//! \max(x,y) + \mathrm{ln1p}(e^{-|x-y|})$, so the exponentiated term never
//! overflows no matter how far apart the operands are.

use ndarray::prelude::*;
use ndarray::Data;
use num_traits::Float;

/// The log-zero sentinel for `f64` tables.
pub const LZERO: f64 = f64::INFINITY;

/// The log-zero sentinel for any float type.
pub fn lzero<F: Float>() -> F {
    F::infinity()
}

/// Log of a sum: `ln(exp(x) + exp(y))`, with log-zero absorbing correctly.
pub fn elnsum<F: Float>(x: F, y: F) -> F {
    let inf = lzero::<F>();
    if x == inf {
        return y; // covers y == LZERO too
    }
    if y == inf {
        return x;
    }
    if x > y {
        x + (y - x).exp().ln_1p()
    } else {
        y + (x - y).exp().ln_1p()
    }
}

/// Log of a product: `x + y`, unless either factor is log-zero.
pub fn elnproduct<F: Float>(x: F, y: F) -> F {
    let inf = lzero::<F>();
    if x == inf || y == inf {
        inf
    } else {
        x + y
    }
}

/// `exp(x) > exp(y)` on extended logs: log-zero is the least element.
///
/// Raw float comparison would rank the $+\infty$ sentinel above every real
/// log-probability, which is exactly backwards for a max-product recurrence.
pub fn elngreater<F: Float>(x: F, y: F) -> bool {
    let inf = lzero::<F>();
    if x == inf {
        false
    } else if y == inf {
        true
    } else {
        x > y
    }
}

/// Linear probability to extended log; 0 maps to the sentinel.
///
/// Panics on negative input.
pub fn eln<F: Float>(x: F) -> F {
    assert!(x >= F::zero(), "eln of a negative number");
    if x == F::zero() {
        lzero()
    } else {
        x.ln()
    }
}

/// Extended log back to linear probability; the sentinel maps to 0.
pub fn eexp<F: Float>(x: F) -> F {
    if x == lzero() {
        F::zero()
    } else {
        x.exp()
    }
}

/// Extended-log reductions over a length-N vector.
pub trait ElnArray1 {
    /// `⊕` over all elements.
    fn elnsum_all(&self) -> f64;

    /// Index and value of the largest element under the extended-log order
    /// ([`elngreater`]). Ties keep the lowest index; `None` when empty.
    fn elnmax(&self) -> Option<(usize, f64)>;

    /// The "expecting" version of `elnmax`.
    fn elnmaxx(&self) -> (usize, f64);
}

impl<S> ElnArray1 for ArrayBase<S, Ix1>
where
    S: Data<Elem = f64>,
{
    fn elnsum_all(&self) -> f64 {
        self.iter().fold(LZERO, |acc, &v| elnsum(acc, v))
    }

    fn elnmax(&self) -> Option<(usize, f64)> {
        self.iter()
            .enumerate()
            .map(|(i, &v)| (i, v))
            .reduce(|best, cand| if elngreater(cand.1, best.1) { cand } else { best })
    }

    fn elnmaxx(&self) -> (usize, f64) {
        self.elnmax()
            .expect("elnmaxx failed because the input had length 0")
    }
}
