//! Greedy max-product decoding.
//!
//! The decoder runs the max-product recurrence
//!
//! $$δ_0[i] = π_i ⊗ b_{i,O_0}, \qquad
//!   δ_s[j] = \Big(\max_k δ_{s-1}[k] ⊗ a_{k,j}\Big) ⊗ b_{j,O_s}$$
//!
//! on two rolling buffers and yields the argmax of δ at every step. That is
//! the most likely state at each time given the best path so far, **not**
//! the backtracked globally optimal path: when the locally best state at
//! some step is off the globally best path the two answers differ. Callers
//! wanting the textbook guarantee need a predecessor table and a reverse
//! pass, at Θ(N·T) memory; this decoder runs in O(N).
//!
//! Maxima are taken under the extended-log order, so a log-zero state never
//! beats a reachable one.

use ndarray::prelude::*;
use spectral::prelude::*;

use crate::logp::{elngreater, elnproduct, ElnArray1, LZERO};
use crate::HMM;

impl HMM {
    /// Decode `ys` into one state index per observation, lazily.
    ///
    /// Panics if an observation is out of bounds.
    pub fn viterbi<I>(&self, ys: I) -> ViterbiIter<'_, I::IntoIter>
    where
        I: IntoIterator<Item = usize>,
    {
        ViterbiIter {
            hmm: self,
            observations: ys.into_iter(),
            delta: Array1::zeros(self.n()),
            scratch: Array1::zeros(self.n()),
            started: false,
        }
    }
}

/// This is an iterator returned by [`HMM::viterbi`].
pub struct ViterbiIter<'a, I>
where
    I: Iterator<Item = usize>,
{
    hmm: &'a HMM,
    observations: I,
    delta: Array1<f64>,
    scratch: Array1<f64>,
    started: bool,
}

impl<'a, I> Iterator for ViterbiIter<'a, I>
where
    I: Iterator<Item = usize>,
{
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let y = self.observations.next()?;
        asserting("y is too big").that(&y).is_less_than(&self.hmm.k());

        let n = self.hmm.n();
        if !self.started {
            for i in 0..n {
                self.delta[i] = elnproduct(self.hmm.pi[i], self.hmm.b[[i, y]]);
            }
            self.started = true;
        } else {
            for j in 0..n {
                let mut best = LZERO;
                for k in 0..n {
                    let cand = elnproduct(self.delta[k], self.hmm.a[[k, j]]);
                    if elngreater(cand, best) {
                        best = cand;
                    }
                }
                self.scratch[j] = elnproduct(best, self.hmm.b[[j, y]]);
            }
            std::mem::swap(&mut self.delta, &mut self.scratch);
        }

        let (state, _) = self.delta.elnmaxx();
        Some(state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.observations.size_hint()
    }
}
