//! Drawing synthetic observation streams from a model.

use itertools::Itertools;
use rand::distributions::Distribution;
use rand::Rng;

use crate::logp::eexp;
use crate::HMM;

impl HMM {
    /// An infinite iterator of sampled (state, symbol) pairs.
    pub fn sampler<'a, R: Rng + ?Sized>(&self, rng: &'a mut R) -> HMMSampleIter<'a, R> {
        let a_weighted_choices = self
            .a
            .rows()
            .into_iter()
            .map(|row| WeightedChoiceFloat::from_log_pmf(row.iter().copied()))
            .collect();
        let b_weighted_choices = self
            .b
            .rows()
            .into_iter()
            .map(|row| WeightedChoiceFloat::from_log_pmf(row.iter().copied()))
            .collect();
        let pi_weighted_choice = WeightedChoiceFloat::from_log_pmf(self.pi.iter().copied());
        HMMSampleIter {
            a_weighted_choices,
            b_weighted_choices,
            pi_weighted_choice,
            rng,
            current_state: None,
        }
    }
}

/// The item yielded by `HMMSampleIter`
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HMMSample {
    pub x: usize,
    pub y: usize,
}

/// An iterator that returns random samples from an HMM
pub struct HMMSampleIter<'a, R: Rng + ?Sized> {
    a_weighted_choices: Vec<WeightedChoiceFloat>,
    b_weighted_choices: Vec<WeightedChoiceFloat>,
    pi_weighted_choice: WeightedChoiceFloat,
    rng: &'a mut R,
    current_state: Option<usize>,
}

impl<'a, R: Rng + ?Sized> Iterator for HMMSampleIter<'a, R> {
    type Item = HMMSample;

    fn next(&mut self) -> Option<Self::Item> {
        let state = if let Some(current_state) = self.current_state {
            self.a_weighted_choices[current_state].sample(self.rng)
        } else {
            self.pi_weighted_choice.sample(self.rng)
        };
        self.current_state = Some(state);
        Some(HMMSample {
            x: state,
            y: self.b_weighted_choices[state].sample(self.rng),
        })
    }
}

/// Sample from a [categorical distribution](https://en.wikipedia.org/wiki/Categorical_distribution)
/// whose weights arrive as extended-log probabilities.
pub struct WeightedChoiceFloat {
    cmf: Vec<f64>,
}

impl WeightedChoiceFloat {
    pub fn from_log_pmf<I: IntoIterator<Item = f64>>(log_pmf: I) -> Self {
        let cmf = log_pmf
            .into_iter()
            .map(eexp)
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect_vec();
        Self { cmf }
    }
}

impl Distribution<usize> for WeightedChoiceFloat {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let sampled_uniform = rng.gen::<f64>();
        self.cmf
            .iter()
            .position(|&cum| sampled_uniform < cum)
            // rounding can leave the total mass a hair under the draw
            .unwrap_or(self.cmf.len() - 1)
    }
}
