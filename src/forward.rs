//! The forward recurrence.
//!
//! $α_s[j]$ is the log-probability of the observation prefix $O_0 … O_s$
//! ending in state $j$:
//!
//! $$α_0[j] = π_j ⊗ b_{j,O_0}, \qquad
//!   α_s[j] = \Big(\bigoplus_k α_{s-1}[k] ⊗ a_{k,j}\Big) ⊗ b_{j,O_s}$$
//!
//! The recurrence comes in three shapes: [`HMM::forward_full`] retains the
//! whole history, [`HMM::forward_index`] reaches a single column with two
//! rolling buffers, and [`HMM::forward_next`] advances a caller-held column
//! by one step. All three agree on the values they produce.
//!
//! `index` arguments are 1-based: `index` means "through observation
//! `index - 1`", matching the number of observations consumed.

use ndarray::prelude::*;

use crate::logp::{elnproduct, elnsum, LZERO};
use crate::HMM;

impl HMM {
    /// All α columns through `index - 1`, as an N×`index` matrix.
    ///
    /// An `index` outside `[1, T]` yields an empty matrix.
    pub fn forward_full(&self, ys: &Array1<usize>, index: usize) -> Array2<f64> {
        let n = self.n();
        if index < 1 || index > ys.len() {
            return Array2::zeros((n, 0));
        }

        let mut alpha = Array2::zeros((n, index));
        for i in 0..n {
            alpha[[i, 0]] = elnproduct(self.pi[i], self.b[[i, ys[0]]]);
        }
        for s in 1..index {
            for j in 0..n {
                let mut acc = LZERO;
                for k in 0..n {
                    acc = elnsum(acc, elnproduct(alpha[[k, s - 1]], self.a[[k, j]]));
                }
                alpha[[j, s]] = elnproduct(acc, self.b[[j, ys[s]]]);
            }
        }
        alpha
    }

    /// The single column $α_{index-1}$, in constant extra memory.
    ///
    /// An `index` outside `[1, T]` yields an untouched (all log-one) vector.
    pub fn forward_index(&self, ys: &Array1<usize>, index: usize) -> Array1<f64> {
        let n = self.n();
        let mut cur = Array1::zeros(n);
        if index < 1 || index > ys.len() {
            return cur;
        }

        for i in 0..n {
            cur[i] = elnproduct(self.pi[i], self.b[[i, ys[0]]]);
        }
        let mut next = Array1::zeros(n);
        for s in 1..index {
            for j in 0..n {
                let mut acc = LZERO;
                for k in 0..n {
                    acc = elnsum(acc, elnproduct(cur[k], self.a[[k, j]]));
                }
                next[j] = elnproduct(acc, self.b[[j, ys[s]]]);
            }
            std::mem::swap(&mut cur, &mut next);
        }
        cur
    }

    /// Advance `alpha` from $α_{index-2}$ to $α_{index-1}$ in place.
    ///
    /// `index = 1` re-initializes from π and B, so a driver loop runs
    /// `index` from 1 through T over one reused buffer. Out-of-range
    /// `index` leaves the buffer untouched.
    pub fn forward_next(&self, ys: &Array1<usize>, index: usize, alpha: &mut Array1<f64>) {
        let n = self.n();
        if index < 1 || index > ys.len() {
            return;
        }
        if index == 1 {
            for i in 0..n {
                alpha[i] = elnproduct(self.pi[i], self.b[[i, ys[0]]]);
            }
            return;
        }

        let prev = alpha.clone();
        for j in 0..n {
            let mut acc = LZERO;
            for k in 0..n {
                acc = elnsum(acc, elnproduct(prev[k], self.a[[k, j]]));
            }
            alpha[j] = elnproduct(acc, self.b[[j, ys[index - 1]]]);
        }
    }
}
