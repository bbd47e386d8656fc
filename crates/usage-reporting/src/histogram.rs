const BUCKET_COUNT: usize = 384;
const EXPONENT_LOG: f64 = 0.095_310_179_804_324_87; // ln(1.1)

/// Latency histogram with logarithmic buckets: bucket `n` covers durations up to `1.1^n`
/// microseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationHistogram {
    buckets: Vec<u64>,
}

impl Default for DurationHistogram {
    fn default() -> Self {
        DurationHistogram {
            buckets: vec![0; BUCKET_COUNT],
        }
    }
}

impl DurationHistogram {
    pub fn bucket(duration_ns: u64) -> usize {
        let log = (duration_ns as f64 / 1000.0).ln() / EXPONENT_LOG;
        let bucket = log.ceil();

        if bucket.is_nan() || bucket <= 0.0 {
            0
        } else if bucket >= BUCKET_COUNT as f64 {
            BUCKET_COUNT - 1
        } else {
            bucket as usize
        }
    }

    pub fn increment_duration(&mut self, duration_ns: u64) {
        self.increment_bucket(Self::bucket(duration_ns), 1);
    }

    fn increment_bucket(&mut self, bucket: usize, value: u64) {
        if let Some(count) = self.buckets.get_mut(bucket) {
            *count += value;
        }
    }

    /// Runs of two or more empty buckets are written as the negated run length, a single empty
    /// bucket stays `0`. Trailing empty buckets are dropped.
    pub fn to_compressed(&self) -> Vec<i64> {
        let mut output = Vec::new();
        let mut zeroes = 0i64;

        for &count in &self.buckets {
            if count == 0 {
                zeroes += 1;
                continue;
            }

            match zeroes {
                0 => (),
                1 => output.push(0),
                n => output.push(-n),
            }
            output.push(i64::try_from(count).unwrap_or(i64::MAX));
            zeroes = 0;
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets() {
        assert_eq!(DurationHistogram::bucket(0), 0);
        assert_eq!(DurationHistogram::bucket(1_000), 0);
        assert_eq!(DurationHistogram::bucket(1_050), 1);
        assert_eq!(DurationHistogram::bucket(1_200), 2);
        assert_eq!(DurationHistogram::bucket(u64::MAX), BUCKET_COUNT - 1);
    }

    #[test]
    fn zero_runs_are_compressed() {
        let mut histogram = DurationHistogram::default();
        histogram.increment_bucket(0, 1);
        histogram.increment_bucket(2, 3);
        histogram.increment_bucket(6, 2);
        histogram.increment_bucket(7, 1);

        assert_eq!(histogram.to_compressed(), [1, 0, 3, -3, 2, 1]);
    }

    #[test]
    fn empty_histogram() {
        let histogram = DurationHistogram::default();
        assert!(histogram.to_compressed().is_empty());
    }
}
