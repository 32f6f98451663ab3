//! State posteriors γ and pairwise posteriors ξ.
//!
//! $$γ_s[i] = P(q_s = i \mid O), \qquad
//!   ξ_s[i][j] = P(q_s = i, q_{s+1} = j \mid O)$$
//!
//! Both are formed from α and β products and then normalized in log-space,
//! so at every time step the γ entries sum to one in probability and so do
//! the ξ entries. Two full-sequence shapes trade memory against time, and
//! the per-step shapes consume a caller-supplied β (typically streamed from
//! a [`BackwardCache`](crate::BackwardCache)) while driving the α buffer
//! with [`forward_next`](crate::HMM::forward_next).

use ndarray::prelude::*;

use crate::logp::{elnproduct, elnsum, LZERO};
use crate::HMM;

impl HMM {
    /// All γ columns as an N×T matrix, from full α and β matrices.
    ///
    /// Costs O(N·T) memory; the fastest full shape.
    pub fn gamma_m_full(&self, ys: &Array1<usize>) -> Array2<f64> {
        let n = self.n();
        let t = ys.len();
        let mut gam = Array2::zeros((n, t));
        let alpha = self.forward_full(ys, t);
        let beta = self.backward_full(ys, 1);

        for s in 0..t {
            let mut normalizer = LZERO;
            for i in 0..n {
                gam[[i, s]] = elnproduct(alpha[[i, s]], beta[[i, s]]);
                normalizer = elnsum(normalizer, gam[[i, s]]);
            }
            normalize_column(gam.column_mut(s), normalizer);
        }
        gam
    }

    /// All γ columns, recomputing β from scratch at every time step.
    ///
    /// Θ(N²·T²) time but only O(N) scratch; the memory-lean full shape.
    pub fn gamma_t_full(&self, ys: &Array1<usize>) -> Array2<f64> {
        let n = self.n();
        let t = ys.len();
        let mut gam = Array2::zeros((n, t));
        let mut alpha = Array1::zeros(n);

        for s in 0..t {
            self.forward_next(ys, s + 1, &mut alpha);
            let beta = self.backward_index(ys, s + 1);

            let mut normalizer = LZERO;
            for i in 0..n {
                gam[[i, s]] = elnproduct(alpha[i], beta[i]);
                normalizer = elnsum(normalizer, gam[[i, s]]);
            }
            normalize_column(gam.column_mut(s), normalizer);
        }
        gam
    }

    /// One γ column in place: advances `alpha` to time `index - 1` and
    /// combines it with the caller's β for the same time.
    pub fn gamma_step(
        &self,
        ys: &Array1<usize>,
        index: usize,
        beta: &Array1<f64>,
        alpha: &mut Array1<f64>,
        gam: &mut Array1<f64>,
    ) {
        let n = self.n();
        self.forward_next(ys, index, alpha);

        let mut normalizer = LZERO;
        for i in 0..n {
            gam[i] = elnproduct(alpha[i], beta[i]);
            normalizer = elnsum(normalizer, gam[i]);
        }
        normalize_column(gam.view_mut(), normalizer);
    }

    /// All ξ slices as an N×N×T tensor.
    ///
    /// Only slices `0 ..= T-2` are produced; the final time slice has no
    /// successor observation and is left unspecified.
    pub fn xi_full(&self, ys: &Array1<usize>) -> Array3<f64> {
        let n = self.n();
        let t = ys.len();
        let mut probs = Array3::zeros((n, n, t));
        if t < 1 {
            return probs;
        }
        let alpha = self.forward_full(ys, t);
        let beta = self.backward_full(ys, 1);

        for s in 0..t - 1 {
            let mut normalizer = LZERO;
            for i in 0..n {
                for j in 0..n {
                    probs[[i, j, s]] = elnproduct(
                        alpha[[i, s]],
                        elnproduct(
                            self.a[[i, j]],
                            elnproduct(self.b[[j, ys[s + 1]]], beta[[j, s + 1]]),
                        ),
                    );
                    normalizer = elnsum(normalizer, probs[[i, j, s]]);
                }
            }
            if normalizer != LZERO {
                for i in 0..n {
                    for j in 0..n {
                        probs[[i, j, s]] = elnproduct(probs[[i, j, s]], -normalizer);
                    }
                }
            }
        }
        probs
    }

    /// One ξ slice in place: advances `alpha` to time `index - 1` and pairs
    /// it with the caller's β for time `index`, one step ahead.
    pub fn xi_step(
        &self,
        ys: &Array1<usize>,
        index: usize,
        beta: &Array1<f64>,
        alpha: &mut Array1<f64>,
        probs: &mut Array2<f64>,
    ) {
        let n = self.n();
        self.forward_next(ys, index, alpha);

        let mut normalizer = LZERO;
        for i in 0..n {
            for j in 0..n {
                probs[[i, j]] = elnproduct(
                    alpha[i],
                    elnproduct(self.a[[i, j]], elnproduct(self.b[[j, ys[index]]], beta[j])),
                );
                normalizer = elnsum(normalizer, probs[[i, j]]);
            }
        }
        if normalizer != LZERO {
            for i in 0..n {
                for j in 0..n {
                    probs[[i, j]] = elnproduct(probs[[i, j]], -normalizer);
                }
            }
        }
    }
}

// Subtract the log-space row sum so the column exponentiates to a
// distribution. A log-zero normalizer means every entry is already log-zero;
// negating the sentinel is never legal, so leave the column as it stands.
fn normalize_column(mut col: ArrayViewMut1<f64>, normalizer: f64) {
    if normalizer == LZERO {
        return;
    }
    for v in col.iter_mut() {
        *v = elnproduct(*v, -normalizer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BackwardCache;
    use crate::logp::ElnArray1;
    use crate::testutil::*;

    #[test]
    fn gamma_columns_are_distributions() {
        let gam = CANON.gamma_m_full(&CANON_YS);
        for s in 0..CANON_YS.len() {
            assert_eln_close(gam.column(s).elnsum_all(), 0.0, 1e-5);
        }
    }

    #[test]
    fn gamma_shapes_agree() {
        let m_full = CANON.gamma_m_full(&CANON_YS);
        let t_full = CANON.gamma_t_full(&CANON_YS);
        for s in 0..CANON_YS.len() {
            for i in 0..CANON.n() {
                assert_eln_close(m_full[[i, s]], t_full[[i, s]], 1e-5);
            }
        }
    }

    #[test]
    fn xi_slices_are_distributions() {
        let probs = CANON.xi_full(&CANON_YS);
        let n = CANON.n();
        for s in 0..CANON_YS.len() - 1 {
            let mut total = LZERO;
            for i in 0..n {
                for j in 0..n {
                    total = elnsum(total, probs[[i, j, s]]);
                }
            }
            assert_eln_close(total, 0.0, 1e-5);
        }
    }

    /// Marginalizing ξ over the successor state recovers γ.
    #[test]
    fn xi_marginalizes_to_gamma() {
        let mut rng = new_rng();
        for _ in 0..5 {
            let hmm = random_hmm(3, 4, &mut rng);
            let ys = random_obs(25, 4, &mut rng);
            let gam = hmm.gamma_m_full(&ys);
            let probs = hmm.xi_full(&ys);
            for s in 0..ys.len() - 1 {
                for i in 0..hmm.n() {
                    let mut row_sum = LZERO;
                    for j in 0..hmm.n() {
                        row_sum = elnsum(row_sum, probs[[i, j, s]]);
                    }
                    assert_eln_close(row_sum, gam[[i, s]], 1e-5);
                }
            }
        }
    }

    /// The per-step shapes, driven the way the trainer drives them (β
    /// streamed in forward order, ξ's β one step ahead), agree with the
    /// full shapes column for column.
    #[test]
    fn step_shapes_agree_with_full() {
        let t = CANON_YS.len();
        let n = CANON.n();
        let gam_full = CANON.gamma_m_full(&CANON_YS);
        let xi_full = CANON.xi_full(&CANON_YS);

        let mut gamma_stream = BackwardCache::new(&CANON, &CANON_YS);
        let mut xi_stream = BackwardCache::new(&CANON, &CANON_YS);
        xi_stream.next().unwrap(); // ξ pairs α_s with β_{s+1}

        let mut alpha_g = Array1::zeros(n);
        let mut alpha_x = Array1::zeros(n);
        let mut gam = Array1::zeros(n);
        let mut probs = Array2::zeros((n, n));

        for s in 0..t {
            let beta = gamma_stream.next().unwrap();
            CANON.gamma_step(&CANON_YS, s + 1, &beta, &mut alpha_g, &mut gam);
            for i in 0..n {
                assert_eln_close(gam[i], gam_full[[i, s]], 1e-5);
            }

            if s < t - 1 {
                let beta_ahead = xi_stream.next().unwrap();
                CANON.xi_step(&CANON_YS, s + 1, &beta_ahead, &mut alpha_x, &mut probs);
                for i in 0..n {
                    for j in 0..n {
                        assert_eln_close(probs[[i, j]], xi_full[[i, j, s]], 1e-5);
                    }
                }
            }
        }
    }

    #[test]
    fn empty_sequence_yields_empty_posteriors() {
        let ys: Array1<usize> = array![];
        assert_eq!((2, 0), CANON.gamma_m_full(&ys).dim());
        assert_eq!((2, 2, 0), CANON.xi_full(&ys).dim());
    }
}
