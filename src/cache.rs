//! Bounded-memory replay of the backward pass in forward order.
//!
//! Baum-Welch wants to consume β vectors left to right, paired with a
//! forward pass that steps the α buffer the same way. The backward
//! recurrence can only produce them right to left, so something has to give:
//! memoizing the whole pass costs Θ(N·T) memory, while recomputing from the
//! end at every step costs Θ(T) backward sweeps. [`BackwardCache`] sits at
//! the √T point between the two. One construction-time sweep keeps the
//! earliest stride-sized window of β vectors whole and snapshots one
//! checkpoint per stride beyond it; when the window drains, the next
//! checkpoint replays its own window. Every observation is visited at most
//! twice, and at most O(√T + stride) buffers are live at once.
//!
//! The stride has a floor of 10,000 time steps, which keeps the checkpoint
//! machinery out of the way for short inputs.

use std::collections::VecDeque;

use ndarray::prelude::*;

use crate::HMM;

const STRIDE_FLOOR: usize = 10_000;

/// A β snapshot taken during the construction sweep.
///
/// `beta` is the vector at time `mark`; `count` is the size of the window it
/// replays, the checkpoint itself included.
#[derive(Clone)]
struct Checkpoint {
    beta: Array1<f64>,
    mark: usize,
    count: usize,
}

/// Produces $β_0, β_1, …, β_{T-1}$, in that order, from a single
/// construction-time backward sweep plus stride-bounded replays.
///
/// Each [`next`](Iterator::next) hands the caller ownership of one β
/// buffer. Cloning deep-copies both buffer queues; the clone and the
/// original advance independently.
///
/// A sequence of fewer than two observations yields an empty cache.
#[derive(Clone)]
pub struct BackwardCache<'a> {
    hmm: &'a HMM,
    ys: &'a Array1<usize>,
    active: VecDeque<Array1<f64>>,
    passive: VecDeque<Checkpoint>,
}

impl<'a> BackwardCache<'a> {
    pub fn new(hmm: &'a HMM, ys: &'a Array1<usize>) -> Self {
        let stride = STRIDE_FLOOR.max((ys.len() as f64).sqrt().ceil() as usize);
        Self::with_stride(hmm, ys, stride)
    }

    fn with_stride(hmm: &'a HMM, ys: &'a Array1<usize>, stride: usize) -> Self {
        let mut cache = BackwardCache {
            hmm,
            ys,
            active: VecDeque::new(),
            passive: VecDeque::new(),
        };
        let t = ys.len();
        if t < 2 || stride <= 1 {
            return cache;
        }

        // One full backward traversal. The last stride-sized window is kept
        // whole in `active` (it is consumed first); every stride steps before
        // it, the current vector is snapshotted into `passive`.
        let mut beta = Array1::zeros(hmm.n());
        let mut lastleg = t <= stride;
        if !lastleg {
            cache.passive.push_front(Checkpoint {
                beta: beta.clone(),
                mark: t - 1,
                count: stride - 1,
            });
        }
        let mut j = 1;
        for i in (1..t).rev() {
            if lastleg {
                cache.active.push_front(beta.clone());
            } else if i == stride {
                cache.active.push_front(beta.clone());
                // the most recent checkpoint's window ends where `active` begins
                if let Some(front) = cache.passive.front_mut() {
                    front.count = front.mark - stride;
                }
                lastleg = true;
            } else if j == stride {
                cache.passive.push_front(Checkpoint {
                    beta: beta.clone(),
                    mark: i,
                    count: stride,
                });
                j = 0;
            }
            hmm.backward_next(ys, i, &mut beta);
            j += 1;
        }
        cache.active.push_front(beta);
        cache
    }

    /// β vectors still producible, active window and checkpointed windows
    /// combined. Right after construction this is T.
    pub fn size(&self) -> usize {
        self.active.len() + self.passive.iter().map(|c| c.count).sum::<usize>()
    }

    // Replay the next checkpoint's window into the active queue. A count of
    // zero marks a checkpoint whose window was already covered by the
    // initial active window (stride divides the tail exactly); skip it.
    fn replay(&mut self) {
        while let Some(cp) = self.passive.pop_front() {
            if cp.count == 0 {
                continue;
            }
            let mut beta = cp.beta.clone();
            let mut s = cp.mark;
            self.active.push_front(cp.beta);
            for _ in 1..cp.count {
                self.hmm.backward_next(self.ys, s, &mut beta);
                self.active.push_front(beta.clone());
                s -= 1;
            }
            return;
        }
    }

    #[cfg(test)]
    fn live_buffers(&self) -> usize {
        self.active.len() + self.passive.len()
    }
}

impl<'a> Iterator for BackwardCache<'a> {
    type Item = Array1<f64>;

    fn next(&mut self) -> Option<Array1<f64>> {
        if let Some(beta) = self.active.pop_front() {
            return Some(beta);
        }
        self.replay();
        self.active.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.size();
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for BackwardCache<'a> {}
