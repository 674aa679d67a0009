//! Named counters for connection traffic

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Counter {
    counters: HashMap<String, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    pub fn increment(&mut self, name: &str, value: usize) {
        match self.counters.get_mut(name) {
            Some(count) => *count += value,
            None => {
                self.counters.insert(name.to_owned(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// Counters sorted by name, for stable log output.
    pub fn sorted(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_accumulate_per_name() {
        let mut counter = Counter::new();
        counter.increment("push", 1);
        counter.increment("push", 2);
        counter.increment("pull", 1);

        assert_eq!(counter.get("push"), 3);
        assert_eq!(counter.get("pull"), 1);
        assert_eq!(counter.get("apply"), 0);
        assert_eq!(counter.sorted(), vec![("pull", 1), ("push", 3)]);

        counter.reset_all();
        assert_eq!(counter.get("push"), 0);
    }
}
