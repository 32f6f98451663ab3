//! The backward recurrence.
//!
//! $β_s[i]$ is the log-probability of the observation suffix
//! $O_{s+1} … O_{T-1}$ given state $i$ at time $s$:
//!
//! $$β_{T-1}[i] = 0, \qquad
//!   β_s[i] = \bigoplus_k a_{i,k} ⊗ b_{k,O_{s+1}} ⊗ β_{s+1}[k]$$
//!
//! The same three shapes as the forward side, mirrored: the full pass fills
//! columns from the end down to `index - 1`, the indexed pass rolls two
//! buffers down to a single column, and [`HMM::backward_next`] steps a
//! caller-held column one time step towards the front.

use ndarray::prelude::*;

use crate::logp::{elnproduct, elnsum, LZERO};
use crate::HMM;

impl HMM {
    /// β columns `index - 1` through `T - 1`, as an N×T matrix.
    ///
    /// Columns before `index - 1` are left at log-one. Fewer than two
    /// observations, or an `index` outside `[1, T]`, yields the matrix
    /// untouched.
    pub fn backward_full(&self, ys: &Array1<usize>, index: usize) -> Array2<f64> {
        let n = self.n();
        let t = ys.len();
        let mut beta = Array2::zeros((n, t));
        if t < 2 || index < 1 || index > t {
            return beta;
        }

        for s in (index..t).rev() {
            for j in 0..n {
                let mut acc = LZERO;
                for k in 0..n {
                    acc = elnsum(
                        acc,
                        elnproduct(self.a[[j, k]], elnproduct(self.b[[k, ys[s]]], beta[[k, s]])),
                    );
                }
                beta[[j, s - 1]] = acc;
            }
        }
        beta
    }

    /// The single column $β_{index-1}$, in constant extra memory.
    pub fn backward_index(&self, ys: &Array1<usize>, index: usize) -> Array1<f64> {
        let n = self.n();
        let t = ys.len();
        let mut cur = Array1::zeros(n);
        if t < 2 || index < 1 || index > t {
            return cur;
        }

        let mut next = Array1::zeros(n);
        for s in (index..t).rev() {
            for j in 0..n {
                let mut acc = LZERO;
                for k in 0..n {
                    acc = elnsum(
                        acc,
                        elnproduct(self.a[[j, k]], elnproduct(self.b[[k, ys[s]]], cur[k])),
                    );
                }
                next[j] = acc;
            }
            std::mem::swap(&mut cur, &mut next);
        }
        cur
    }

    /// Step `beta` from $β_{index}$ to $β_{index-1}$ in place.
    ///
    /// `index = T` zero-initializes to $β_{T-1}$ (log one), so a driver loop
    /// runs `index` from T down to 1 over one reused buffer. Out-of-range
    /// `index`, or fewer than two observations, leaves the buffer untouched.
    pub fn backward_next(&self, ys: &Array1<usize>, index: usize, beta: &mut Array1<f64>) {
        let n = self.n();
        let t = ys.len();
        if t < 2 || index < 1 || index > t {
            return;
        }
        if index == t {
            beta.fill(0.0);
            return;
        }

        let prev = beta.clone();
        for j in 0..n {
            let mut acc = LZERO;
            for k in 0..n {
                acc = elnsum(
                    acc,
                    elnproduct(self.a[[j, k]], elnproduct(self.b[[k, ys[index]]], prev[k])),
                );
            }
            beta[j] = acc;
        }
    }
}
