// `Histogram` maps observed values to their occurrence counts

use fnv::FnvHashMap;

/// value -> count, iterated in the order values were first observed
///
/// two histograms are equal when they hold the same value -> count mapping,
/// regardless of insertion order
#[derive(Clone, Debug, Default)]
pub struct Histogram {
    index: FnvHashMap<i64, usize>,
    entries: Vec<(i64, u64)>,
}

impl Histogram {
    pub fn new() -> Histogram {
        Default::default()
    }

    pub fn increment(&mut self, value: i64) {
        self.increment_by(value, 1);
    }

    pub fn increment_by(&mut self, value: i64, count: u64) {
        if let Some(&i) = self.index.get(&value) {
            self.entries[i].1 += count;
            return;
        }
        self.index.insert(value, self.entries.len());
        self.entries.push((value, count));
    }

    /// the count recorded for `value`
    pub fn count(&self, value: i64) -> u64 {
        match self.index.get(&value) {
            Some(&i) => self.entries[i].1,
            None => 0,
        }
    }

    /// number of distinct values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|&(_, c)| c).sum()
    }

    /// (value, count) pairs in first-observed order
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (i64, u64)> + 'a {
        self.entries.iter().cloned()
    }

    /// distinct values, ascending
    pub fn sorted_values(&self) -> Vec<i64> {
        let mut values: Vec<i64> = self.entries.iter().map(|&(v, _)| v).collect();
        values.sort();
        values
    }
}

impl PartialEq for Histogram {
    fn eq(&self, other: &Histogram) -> bool {
        self.len() == other.len() && self.iter().all(|(v, c)| other.count(v) == c)
    }
}

impl Eq for Histogram {}

#[cfg(test)]
mod tests {
    use super::Histogram;

    #[test]
    fn test_new_0() {
        let h = Histogram::new();
        assert!(h.is_empty());
        assert_eq!(h.count(0), 0);
        assert_eq!(h.total(), 0);
    }

    #[test]
    fn test_increment_0() {
        let mut h = Histogram::new();
        for i in 100..200 {
            h.increment(i);
        }
        h.increment(150);
        h.increment_by(-3, 4);

        assert_eq!(h.len(), 101);
        assert_eq!(h.count(150), 2);
        assert_eq!(h.count(-3), 4);
        assert_eq!(h.count(200), 0);
        assert_eq!(h.total(), 105);
    }

    #[test]
    fn iteration_keeps_first_observed_order() {
        let mut h = Histogram::new();
        for v in &[5, 3, 5, 9, 3, 1] {
            h.increment(*v);
        }
        let order: Vec<i64> = h.iter().map(|(v, _)| v).collect();
        assert_eq!(order, vec![5, 3, 9, 1]);
        assert_eq!(h.sorted_values(), vec![1, 3, 5, 9]);
    }

    #[test]
    fn equality_ignores_order() {
        let mut a = Histogram::new();
        let mut b = Histogram::new();
        for v in &[1, 2, 2, 3] {
            a.increment(*v);
        }
        for v in &[3, 2, 1, 2] {
            b.increment(*v);
        }
        assert_eq!(a, b);

        b.increment(3);
        assert!(a != b);

        let mut c = Histogram::new();
        for v in &[1, 2, 2, 4] {
            c.increment(*v);
        }
        assert!(a != c);
    }
}
