//! Sequence likelihood.

use ndarray::prelude::*;

use crate::logp::{eexp, ElnArray1, LZERO};
use crate::HMM;

impl HMM {
    /// The linear probability of the observation sequence under the model:
    /// $P(O) = \exp\big(\bigoplus_i α_{T-1}[i]\big)$.
    ///
    /// An impossible sequence evaluates to exactly 0.0. Fewer than two
    /// observations is degenerate and returns the log-zero sentinel value
    /// itself rather than a probability.
    pub fn evalp(&self, ys: &Array1<usize>) -> f64 {
        let t = ys.len();
        if t < 2 {
            return LZERO;
        }
        let alpha = self.forward_index(ys, t);
        eexp(alpha.elnsum_all())
    }
}
