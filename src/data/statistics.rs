use data::Histogram;

/// an immutable snapshot of the measurements live in the window
///
/// equality is equality of the underlying histograms, so two snapshots taken
/// over the same multiset of values compare equal
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    histogram: Histogram,
}

impl Statistics {
    pub fn new(histogram: Histogram) -> Statistics {
        Statistics { histogram: histogram }
    }

    /// the histogram backing this snapshot
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// number of measurements in the snapshot
    pub fn count(&self) -> u64 {
        self.histogram.total()
    }

    /// arithmetic mean, 0.0 when empty
    pub fn mean(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0.0;
        for (value, n) in self.histogram.iter() {
            sum += value as f64 * n as f64;
            count += n as f64;
        }
        if count == 0.0 { 0.0 } else { sum / count }
    }

    /// most frequent value, 0 when empty
    ///
    /// ties go to the value observed first
    pub fn mode(&self) -> i64 {
        let mut mode = 0;
        let mut max = 0;
        for (value, n) in self.histogram.iter() {
            if n > max {
                max = n;
                mode = value;
            }
        }
        mode
    }

    /// percentile over the distinct values, 0.0 when empty
    ///
    /// selects index `ceil(p / 100 * n) - 1` of the ascending distinct values,
    /// clamped to the valid range
    pub fn percentile(&self, percentile: f64) -> f64 {
        let values = self.histogram.sorted_values();
        if values.is_empty() {
            return 0.0;
        }
        let n = values.len();
        let rank = (percentile / 100.0 * n as f64).ceil();
        let index = if rank >= 1.0 {
            (rank as usize - 1).min(n - 1)
        } else {
            0
        };
        values[index] as f64
    }
}
