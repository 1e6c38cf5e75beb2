//! The "wealth dissolution" countdown: 100% down to 0% in steps of 5.

use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::time::Duration;

pub const STEP_PERCENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaporationStep {
    pub percent_remaining: u32,
    pub value: f64,
}

/// Lazy, one-shot countdown. Yields 21 steps then ends for good.
#[derive(Debug, Clone)]
pub struct Evaporation {
    initial: f64,
    next: Option<u32>,
}

impl Evaporation {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            next: Some(100),
        }
    }
}

impl Iterator for Evaporation {
    type Item = EvaporationStep;

    fn next(&mut self) -> Option<Self::Item> {
        let percent = self.next?;
        self.next = percent.checked_sub(STEP_PERCENT);
        Some(EvaporationStep {
            percent_remaining: percent,
            value: self.initial * f64::from(percent) / 100.0,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.next.map(|p| (p / STEP_PERCENT + 1) as usize).unwrap_or(0);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Evaporation {}

/// The same countdown, one step per `delay`. Dropping the stream cancels it.
pub fn paced(initial: f64, delay: Duration) -> impl Stream<Item = EvaporationStep> {
    pace(Evaporation::new(initial), delay)
}

/// Sleep `delay` before each remaining step; ends without sleeping once exhausted.
pub fn pace(steps: Evaporation, delay: Duration) -> impl Stream<Item = EvaporationStep> {
    stream::unfold(steps, move |mut steps| async move {
        let step = steps.next()?;
        tokio::time::sleep(delay).await;
        Some((step, steps))
    })
}
