//! Baum-Welch re-estimation.
//!
//! One call to any `train*` method performs a single expectation-maximization
//! pass over one observation sequence and rewrites π, A and B in place:
//!
//! $$π_i' = γ_0[i], \qquad
//!   a_{ij}' = \frac{\bigoplus_{s<T-1} ξ_s[i][j]}{\bigoplus_{s<T-1} γ_s[i]},
//!   \qquad
//!   b_{jk}' = \frac{\bigoplus_{s<T-1,\,O_s=k} γ_s[j]}
//!                  {\bigoplus_{s<T-1} γ_s[j]}$$
//!
//! All three parameters are written back in log-space, so iterations chain
//! without any conversion in between. Convergence control across iterations
//! belongs to the caller.
//!
//! The three variants trade memory for sweeps over the observations:
//!
//! * [`HMM::train_full`] materializes the full γ matrix and ξ tensor.
//!   Simplest, and fastest when N, M and T are all small.
//! * [`HMM::train`] streams γ and ξ one time step at a time, pairing a
//!   [`BackwardCache`] with [`forward_next`](HMM::forward_next), and keeps
//!   only N×N and M×N accumulators. The general-purpose choice.
//! * [`HMM::train_mem`] gives up the accumulator matrices too: each target
//!   parameter re-drives the recurrences from its own pair of cache copies,
//!   paying extra sweeps for O(N) working state per parameter.
//!
//! Sequences shorter than two observations leave the model untouched. A
//! backward stream that runs dry mid-pass means the model and sequence
//! disagree about their shapes; the pass aborts immediately.

use ndarray::prelude::*;

use crate::cache::BackwardCache;
use crate::logp::{elnproduct, elnsum, LZERO};
use crate::HMM;

// Log-space numerator/denominator ratio. A state that never carries
// posterior mass has a log-zero denominator (and numerator); its
// re-estimated entries stay log-zero rather than negating the sentinel.
fn reestimate(numerator: f64, denominator: f64) -> f64 {
    if denominator == LZERO {
        LZERO
    } else {
        elnproduct(numerator, -denominator)
    }
}

impl HMM {
    /// One re-estimation pass over full posterior matrices.
    pub fn train_full(&mut self, ys: &Array1<usize>) {
        let t = ys.len();
        if t < 2 {
            return;
        }
        let n = self.n();
        let m = self.k();

        let gam = self.gamma_m_full(ys);
        let probs = self.xi_full(ys);
        let new_pi = gam.column(0).to_owned();

        // the transition and emission updates share one denominator per state
        let mut den = Array1::from_elem(n, LZERO);
        for i in 0..n {
            for s in 0..t - 1 {
                den[i] = elnsum(den[i], gam[[i, s]]);
            }
        }

        for i in 0..n {
            for j in 0..n {
                let mut num = LZERO;
                for s in 0..t - 1 {
                    num = elnsum(num, probs[[i, j, s]]);
                }
                self.a[[i, j]] = reestimate(num, den[i]);
            }
        }
        for j in 0..n {
            for sym in 0..m {
                let mut num = LZERO;
                for s in 0..t - 1 {
                    if ys[s] == sym {
                        num = elnsum(num, gam[[j, s]]);
                    }
                }
                self.b[[j, sym]] = reestimate(num, den[j]);
            }
        }
        self.pi.assign(&new_pi);
    }

    /// One re-estimation pass streaming the posteriors.
    ///
    /// The backward stream is pulled once for the first γ and then advanced
    /// one further at every step so ξ at time s sees $β_{s+1}$ while γ sees
    /// $β_s$. Peak memory is the cache's O(N·√T) plus the fixed
    /// accumulators.
    pub fn train(&mut self, ys: &Array1<usize>) {
        let t = ys.len();
        if t < 2 {
            return;
        }
        let n = self.n();
        let m = self.k();

        let mut gam = Array1::zeros(n);
        let mut alpha_g = Array1::zeros(n);
        let mut alpha_x = Array1::zeros(n);
        let mut probs = Array2::zeros((n, n));
        let mut numer_t = Array2::from_elem((n, n), LZERO);
        let mut numer_e = Array2::from_elem((m, n), LZERO);
        let mut den = Array1::from_elem(n, LZERO);

        let mut cache = BackwardCache::new(self, ys);
        let mut beta = match cache.next() {
            Some(beta) => beta,
            None => return,
        };
        self.gamma_step(ys, 1, &beta, &mut alpha_g, &mut gam);
        beta = match cache.next() {
            Some(beta) => beta,
            None => return,
        };
        self.xi_step(ys, 1, &beta, &mut alpha_x, &mut probs);

        let new_pi = gam.clone();

        let mut s = 0;
        loop {
            let sym = ys[s];
            for j in 0..n {
                numer_e[[sym, j]] = elnsum(numer_e[[sym, j]], gam[j]);
                den[j] = elnsum(den[j], gam[j]);
                for i in 0..n {
                    numer_t[[i, j]] = elnsum(numer_t[[i, j]], probs[[i, j]]);
                }
            }

            s += 1;
            if s == t - 1 {
                break;
            }
            self.gamma_step(ys, s + 1, &beta, &mut alpha_g, &mut gam);
            beta = match cache.next() {
                Some(beta) => beta,
                None => return, // stream ran dry: shape inconsistency, abort
            };
            self.xi_step(ys, s + 1, &beta, &mut alpha_x, &mut probs);
        }
        drop(beta);
        drop(cache);

        self.pi.assign(&new_pi);
        for i in 0..n {
            for j in 0..n {
                self.a[[i, j]] = reestimate(numer_t[[i, j]], den[i]);
            }
        }
        for j in 0..n {
            for sym in 0..m {
                self.b[[j, sym]] = reestimate(numer_e[[sym, j]], den[j]);
            }
        }
    }

    /// One re-estimation pass with minimal working memory.
    ///
    /// Every `(i, j)` target drives the recurrences afresh from its own
    /// cache copies, so only scalar accumulators live across time steps.
    /// The price is one full sweep of the observations per parameter.
    pub fn train_mem(&mut self, ys: &Array1<usize>) {
        let t = ys.len();
        if t < 2 {
            return;
        }
        let n = self.n();
        let m = self.k();

        // re-estimation reads a frozen copy while the live tables are rewritten
        let frozen = self.clone();
        let cache = BackwardCache::new(&frozen, ys);
        let sentinel = n.max(m);

        for i in 0..sentinel {
            for j in 0..n {
                let mut numer_e = LZERO;
                let mut den_e = LZERO;
                let mut numer_t = LZERO;
                let mut den_t = LZERO;
                let mut gcache = cache.clone();
                let mut alpha_g = Array1::zeros(n);
                let mut gam = Array1::zeros(n);

                if i < n {
                    let mut xcache = cache.clone();
                    let mut alpha_x = Array1::zeros(n);
                    let mut probs = Array2::zeros((n, n));
                    if xcache.next().is_none() {
                        return;
                    }
                    for s in 0..t - 1 {
                        let beta_g = match gcache.next() {
                            Some(beta) => beta,
                            None => return,
                        };
                        frozen.gamma_step(ys, s + 1, &beta_g, &mut alpha_g, &mut gam);

                        if i == 0 && j == 0 && s == 0 {
                            self.pi.assign(&gam);
                        }

                        if i < m {
                            if ys[s] == i {
                                numer_e = elnsum(numer_e, gam[j]);
                            }
                            den_e = elnsum(den_e, gam[j]);
                        }

                        let beta_x = match xcache.next() {
                            Some(beta) => beta,
                            None => return,
                        };
                        frozen.xi_step(ys, s + 1, &beta_x, &mut alpha_x, &mut probs);
                        numer_t = elnsum(numer_t, probs[[i, j]]);
                        den_t = elnsum(den_t, gam[i]);
                    }
                    if i < m {
                        self.b[[j, i]] = reestimate(numer_e, den_e);
                    }
                    self.a[[i, j]] = reestimate(numer_t, den_t);
                } else {
                    // symbols beyond the state count: emission only
                    for s in 0..t - 1 {
                        let beta_g = match gcache.next() {
                            Some(beta) => beta,
                            None => return,
                        };
                        frozen.gamma_step(ys, s + 1, &beta_g, &mut alpha_g, &mut gam);
                        if ys[s] == i {
                            numer_e = elnsum(numer_e, gam[j]);
                        }
                        den_e = elnsum(den_e, gam[j]);
                    }
                    self.b[[j, i]] = reestimate(numer_e, den_e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logp::eexp;
    use crate::testutil::*;
    use spectral::prelude::*;

    fn assert_models_close(x: &HMM, y: &HMM, tol: f64) {
        for i in 0..x.n() {
            assert_eln_close(x.pi[i], y.pi[i], tol);
            for j in 0..x.n() {
                assert_eln_close(x.a[[i, j]], y.a[[i, j]], tol);
            }
            for sym in 0..x.k() {
                assert_eln_close(x.b[[i, sym]], y.b[[i, sym]], tol);
            }
        }
    }

    fn assert_stochastic(hmm: &HMM, tol: f64) {
        for i in 0..hmm.n() {
            asserting("A row sums to 1 in probability")
                .that(&hmm.a.row(i).iter().copied().map(eexp).sum::<f64>())
                .is_close_to(1.0, tol);
            asserting("B row sums to 1 in probability")
                .that(&hmm.b.row(i).iter().copied().map(eexp).sum::<f64>())
                .is_close_to(1.0, tol);
        }
        asserting("π sums to 1 in probability")
            .that(&hmm.pi.iter().copied().map(eexp).sum::<f64>())
            .is_close_to(1.0, tol);
    }

    /// All three variants agree after two chained iterations.
    #[test]
    fn variants_agree_over_two_iterations() {
        let mut full = CANON.clone();
        let mut streamed = CANON.clone();
        let mut lean = CANON.clone();
        for _ in 0..2 {
            full.train_full(&CANON_YS);
            streamed.train(&CANON_YS);
            lean.train_mem(&CANON_YS);
        }
        assert_models_close(&full, &streamed, 1e-4);
        assert_models_close(&full, &lean, 1e-4);
    }

    #[test]
    fn variants_agree_on_random_models() {
        let mut rng = new_rng();
        for _ in 0..3 {
            let base = random_hmm(3, 4, &mut rng);
            let ys = random_obs(25, 4, &mut rng);
            let mut full = base.clone();
            let mut streamed = base.clone();
            let mut lean = base;
            full.train_full(&ys);
            streamed.train(&ys);
            lean.train_mem(&ys);
            assert_models_close(&full, &streamed, 1e-4);
            assert_models_close(&full, &lean, 1e-4);
        }
    }

    #[test]
    fn reestimated_rows_are_distributions() {
        let mut hmm = CANON.clone();
        hmm.train_full(&CANON_YS);
        assert_stochastic(&hmm, 1e-4);
        hmm.train(&CANON_YS);
        assert_stochastic(&hmm, 1e-4);
        hmm.train_mem(&CANON_YS);
        assert_stochastic(&hmm, 1e-4);
    }

    #[test]
    fn new_pi_is_the_first_gamma_column() {
        let gam = CANON.gamma_m_full(&CANON_YS);
        let mut hmm = CANON.clone();
        hmm.train_full(&CANON_YS);
        for i in 0..hmm.n() {
            assert_eln_close(hmm.pi[i], gam[[i, 0]], 1e-12);
        }
    }

    /// One EM pass from a badly mismatched start must raise the likelihood.
    /// (The canonical sequence never emits symbol 2, which the starting
    /// model rates at up to 0.5 per step.)
    #[test]
    fn one_pass_improves_a_mismatched_start() {
        let mut hmm = CANON.clone();
        let before = hmm.evalp(&CANON_YS).ln();
        hmm.train(&CANON_YS);
        let after = hmm.evalp(&CANON_YS).ln();
        assert!(after > before);
    }

    #[test]
    fn short_sequences_leave_the_model_untouched() {
        for ys in [array![], array![1]] {
            let mut full = CANON.clone();
            let mut streamed = CANON.clone();
            let mut lean = CANON.clone();
            full.train_full(&ys);
            streamed.train(&ys);
            lean.train_mem(&ys);
            assert_eq!(CANON.a, full.a);
            assert_eq!(CANON.pi, full.pi);
            assert_eq!(CANON.a, streamed.a);
            assert_eq!(CANON.b, streamed.b);
            assert_eq!(CANON.pi, streamed.pi);
            assert_eq!(CANON.b, lean.b);
            assert_eq!(CANON.pi, lean.pi);
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        let mut hmm = CANON.clone();
        hmm.train(&CANON_YS);
        assert_eq!((2, 2), hmm.a.dim());
        assert_eq!((2, 3), hmm.b.dim());
        assert_eq!(2, hmm.pi.len());
    }

    /// Hard zeros in the starting model must re-estimate to clean values,
    /// never NaN.
    #[test]
    fn log_zeros_survive_training() {
        let mut hmm = HMM::from_linear(
            array![[1.0, 0.0], [0.5, 0.5]],
            array![[0.7, 0.3], [0.2, 0.8]],
            array![0.5, 0.5],
        );
        let ys = array![0, 1, 0, 0, 1, 0, 1, 1, 0, 0];
        for _ in 0..2 {
            hmm.train(&ys);
            for v in hmm.a.iter().chain(hmm.b.iter()).chain(hmm.pi.iter()) {
                assert!(!v.is_nan());
            }
        }
        // a transition that starts at zero can never gain mass
        assert_eq!(LZERO, hmm.a[[0, 1]]);
    }

    /// More symbols than states exercises the emission-only arm of the
    /// memory-lean variant.
    #[test]
    fn wide_alphabets_train_consistently() {
        let mut rng = new_rng();
        let base = random_hmm(2, 5, &mut rng);
        let ys = random_obs(20, 5, &mut rng);
        let mut full = base.clone();
        let mut lean = base;
        full.train_full(&ys);
        lean.train_mem(&ys);
        assert_models_close(&full, &lean, 1e-4);
    }
}
