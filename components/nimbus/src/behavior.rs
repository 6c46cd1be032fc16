#![allow(dead_code)]

use crate::error::{BehaviorError, NimbusError, Result};
use chrono::{DateTime, Timelike, Utc};
use std::collections::{HashMap, VecDeque};

#[derive(Clone)]
enum Interval {
    MINUTES,
    HOURS,
    DAYS,
    WEEKS,
    MONTHS,
    YEARS,
}

#[derive(Clone)]
struct IntervalConfig {
    bucket_count: usize,
    interval: Interval,
}

pub struct IntervalData {
    buckets: VecDeque<u64>,
    bucket_count: usize,
    starting_instant: DateTime<Utc>,
}

impl Default for IntervalData {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IntervalData {
    pub fn new(bucket_count: usize) -> IntervalData {
        let mut data = IntervalData {
            buckets: VecDeque::new(),
            bucket_count: bucket_count,
            starting_instant: Utc::now(),
        };
        data.buckets.push_front(0);
        data
    }

    fn increment(&mut self) -> Result<()> {
        match self.buckets.front_mut() {
            Some(x) => *x += 1,
            None => {
                return Err(NimbusError::BehaviorError(BehaviorError::InvalidState(
                    "Interval buckets cannot be empty".to_string(),
                )))
            }
        };
        Ok(())
    }

    fn rotate(&mut self, num_rotations: u64) -> Result<()> {
        for _ in 1..=num_rotations {
            self.buckets.push_front(0)
        }
        if self.buckets.len() > self.bucket_count {
            self.buckets.drain((self.bucket_count - 1)..);
        }
        Ok(())
    }
}

struct SingleIntervalCounter {
    data: IntervalData,
    config: IntervalConfig,
}

fn date_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> u32 {
    (a.date() - b.date()).num_days().try_into().unwrap()
}

impl SingleIntervalCounter {
    fn new(interval_config: IntervalConfig) -> SingleIntervalCounter {
        SingleIntervalCounter {
            data: IntervalData::new(interval_config.bucket_count.clone()),
            config: interval_config.clone(),
        }
    }

    fn increment(&mut self) -> Result<()> {
        self.data.increment()
    }

    fn maybe_advance(&mut self, now: DateTime<Utc>) -> Result<()> {
        let then = self.data.starting_instant;
        let rotations: u32 = match self.config.interval {
            Interval::MINUTES => now.minute() - then.minute(),
            Interval::HOURS => now.hour() - then.hour(),
            Interval::DAYS => date_diff(now, then),
            Interval::WEEKS => date_diff(now, then) / 7,
            Interval::MONTHS => date_diff(now, then) / 28,
            Interval::YEARS => date_diff(now, then) / 365,
        };
        if rotations > 0 {
            return self.data.rotate(rotations.into());
        }
        Ok(())
    }
}

struct MultiIntervalCounter {
    intervals: HashMap<i64, SingleIntervalCounter>,
}

impl MultiIntervalCounter {
    fn increment(&mut self) -> Result<()> {
        self.intervals
            .iter_mut()
            .try_for_each(|(_, v)| v.increment())
    }

    fn maybe_advance(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.intervals
            .iter_mut()
            .try_for_each(|(_, v)| v.maybe_advance(now))
    }
}
