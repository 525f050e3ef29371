// Speed-agnostic re-decoding of one character attempt
// Mean-shift clustering over a 1 ms histogram of signal durations recovers the dot length

use std::time::Duration;

use tracing::{debug, trace};

use crate::dictionary::Dictionary;
use crate::speed::{Speed, SpeedGroup, FUDGE_FACTOR};
use crate::types::{Signal, Symbol, Token};

const MIN_WINDOW_RADIUS: u32 = 75;
const MAX_ROUNDS: usize = 100;
const HISTOGRAM_HEADROOM: f64 = 1.1;
/// Char and word speeds are only guessed from marks, slightly slower.
const GAP_SPEED_FACTOR: f64 = 1.1;
/// An estimate within this fraction of the assumed speed counts as agreeing.
const AGREEMENT: f64 = 0.25;

/// Alternative decoding of a character attempt and the speeds it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackDecode {
    pub tokens: Vec<Token>,
    pub speeds: SpeedGroup,
}

pub struct ClusterFallbackDecoder<'a> {
    dictionary: &'a Dictionary,
    assumed: Speed,
}

impl<'a> ClusterFallbackDecoder<'a> {
    /// `assumed` is the mark speed the primary decoder used.
    pub fn new(dictionary: &'a Dictionary, assumed: Speed) -> Self {
        Self { dictionary, assumed }
    }

    /// Re-decode `signal` without trusting the assumed speed.
    ///
    /// Returns `None` when there is nothing to add: no marks, no decodable
    /// sub-sequence, or a single token equal to `candidate`.
    pub fn decode(&self, signal: &[Signal], candidate: Option<Token>) -> Option<FallbackDecode> {
        let dot_ms = self.estimate_dot_ms(signal)?;
        let mark = Speed::from_dot_ms(dot_ms);
        let gap = Speed::from_dot_ms((dot_ms as f64 * GAP_SPEED_FACTOR) as u32);
        let speeds = SpeedGroup::new(mark, gap, gap);

        let assumed = self.assumed.dot_ms() as f64;
        let estimate = mark.dot_ms() as f64;
        let agrees = estimate > assumed * (1.0 - AGREEMENT) && estimate < assumed * (1.0 + AGREEMENT);
        let separation_ms = if agrees {
            gap.scaled_dot_ms(1.5)
        } else {
            (gap.dash_ms() as f64 * FUDGE_FACTOR) as u32
        };
        let separation = Duration::from_millis(separation_ms as u64);

        let tokens: Vec<Token> = split_characters(signal, separation)
            .into_iter()
            .filter_map(|part| self.decode_part(part, mark))
            .collect();

        debug!(
            estimated_dot_ms = dot_ms,
            assumed_dot_ms = self.assumed.dot_ms(),
            separation_ms,
            ?tokens,
            "fallback decode"
        );

        if tokens.is_empty() || (tokens.len() == 1 && Some(tokens[0]) == candidate) {
            return None;
        }
        Some(FallbackDecode { tokens, speeds })
    }

    fn decode_part(&self, part: &[Signal], mark: Speed) -> Option<Token> {
        if part.iter().all(|s| !s.on) {
            return Some(Token::Space);
        }
        let code: Vec<Symbol> = part
            .iter()
            .filter(|s| s.on)
            .map(|s| mark.classify(s.duration))
            .collect();
        self.dictionary.lookup(&code)
    }

    /// Mean-shift cluster the durations and read a dot length off the
    /// clusters. `None` if the signal has no marks.
    fn estimate_dot_ms(&self, signal: &[Signal]) -> Option<u32> {
        let longest_mark = signal.iter().filter(|s| s.on).map(|s| millis(s.duration)).max()?;
        let shortest = signal.iter().map(|s| millis(s.duration)).min()?;

        let bound = ((longest_mark as f64 * HISTOGRAM_HEADROOM) as usize).max(longest_mark as usize + 1);
        let mut histogram = vec![0u32; bound];
        for s in signal {
            if let Some(bucket) = histogram.get_mut(millis(s.duration) as usize) {
                *bucket += 1;
            }
        }

        let radius = shortest.max(MIN_WINDOW_RADIUS);
        let mut centers: Vec<u32> = (0..bound as u32)
            .step_by(radius as usize)
            .filter(|&seed| occupied(&histogram, seed, radius).next().is_some())
            .collect();

        let mut rounds = 0;
        loop {
            let mut converged = true;
            for center in centers.iter_mut() {
                let shifted = mean_of_occupied(&histogram, *center, radius).unwrap_or(*center);
                if shifted != *center {
                    converged = false;
                    *center = shifted;
                }
            }
            centers.sort_unstable();
            centers.dedup();

            rounds += 1;
            if converged || rounds >= MAX_ROUNDS {
                break;
            }
        }

        let merged = chain_merge(&centers, radius / 3);
        trace!(histogram_len = bound, radius, rounds, ?centers, ?merged, "mean shift");

        assert!(
            !merged.is_empty(),
            "mean shift left no window for a signal with marks: {signal:?}"
        );
        Some(self.interpret(&merged))
    }

    /// Turn sorted cluster centres into a dot-length estimate.
    fn interpret(&self, merged: &[u32]) -> u32 {
        let dash_scale = self.assumed.dash_ms() as f64 * FUDGE_FACTOR;

        match merged {
            [only] => {
                if *only as f64 > dash_scale {
                    only / 3
                } else {
                    *only
                }
            }
            [small, large] => {
                if *large < 2 * small {
                    *small
                } else {
                    (small + large / 3) / 2
                }
            }
            _ => {
                let median = merged[merged.len() / 2];
                let below: Vec<u32> = merged.iter().copied().filter(|&c| c < median).collect();
                let estimate = below.iter().sum::<u32>() / below.len() as u32;

                if merged[0] as f64 > 0.66 * median as f64 && estimate as f64 > dash_scale {
                    estimate / 3
                } else {
                    estimate
                }
            }
        }
    }
}

fn millis(duration: Duration) -> u32 {
    duration.as_millis().min(u32::MAX as u128) as u32
}

/// Occupied buckets in `[center - radius, center + radius)`.
fn occupied(histogram: &[u32], center: u32, radius: u32) -> impl Iterator<Item = usize> + '_ {
    let start = center.saturating_sub(radius) as usize;
    let end = (center as usize + radius as usize).min(histogram.len());
    (start..end).filter(move |&i| histogram[i] > 0)
}

fn mean_of_occupied(histogram: &[u32], center: u32, radius: u32) -> Option<u32> {
    let (sum, count) = occupied(histogram, center, radius).fold((0u64, 0u64), |(sum, count), i| (sum + i as u64, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as u32)
}

/// Merge runs of sorted centres where each lies within `merge_radius` of
/// its left neighbour into their average.
fn chain_merge(centers: &[u32], merge_radius: u32) -> Vec<u32> {
    let mut merged = Vec::new();
    let mut group: Vec<u32> = Vec::new();

    for &center in centers {
        if let Some(&last) = group.last() {
            if center >= last + merge_radius {
                merged.push(average(&group));
                group.clear();
            }
        }
        group.push(center);
    }
    if !group.is_empty() {
        merged.push(average(&group));
    }
    merged
}

fn average(values: &[u32]) -> u32 {
    (values.iter().map(|&v| v as u64).sum::<u64>() / values.len() as u64) as u32
}

/// Split a character attempt wherever a silence (other than a leading one)
/// exceeds `separation`. The separating silence belongs to neither side.
fn split_characters(signal: &[Signal], separation: Duration) -> Vec<&[Signal]> {
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, s) in signal.iter().enumerate() {
        if i > 0 && !s.on && s.duration > separation {
            if start < i {
                parts.push(&signal[start..i]);
            }
            start = i + 1;
        }
    }
    if start < signal.len() {
        parts.push(&signal[start..]);
    }
    parts
}
