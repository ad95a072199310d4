/// Interleaved weighted round robin over a fixed weight list.
///
/// The cursor starts before the first entry. Each time it wraps to the
/// first entry the current weight drops by the GCD of all weights and is
/// reset to the maximum once it reaches zero; an entry is chosen when its
/// weight is at least the current weight.
#[derive(Debug, Clone)]
pub struct WeightedRoundRobin {
    index: Option<usize>,
    current_weight: i64,
    gcd: i64,
    max: i64,
}

pub fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl WeightedRoundRobin {
    pub fn new(weights: &[u32]) -> WeightedRoundRobin {
        let g = weights.iter().fold(0, |acc, w| gcd(acc, *w));
        WeightedRoundRobin {
            index: None,
            current_weight: 0,
            gcd: if g == 0 { 1 } else { g as i64 },
            max: weights.iter().copied().max().unwrap_or(0) as i64,
        }
    }

    /// Index of the next entry, `None` if no entry has a positive weight.
    pub fn next(&mut self, weights: &[u32]) -> Option<usize> {
        if self.max <= 0 || weights.is_empty() {
            return None;
        }
        loop {
            let index = match self.index {
                Some(i) => (i + 1) % weights.len(),
                None => 0,
            };
            self.index = Some(index);
            if index == 0 {
                self.current_weight -= self.gcd;
                if self.current_weight <= 0 {
                    self.current_weight = self.max;
                }
            }
            if weights[index] as i64 >= self.current_weight {
                return Some(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(weights: &[u32], n: usize) -> Vec<usize> {
        let mut wrr = WeightedRoundRobin::new(weights);
        (0..n).map(|_| wrr.next(weights).unwrap()).collect()
    }

    #[test]
    fn three_two_sequence() {
        assert_eq!(run(&[3, 2], 10), vec![0, 0, 1, 0, 1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn counts_per_window() {
        let weights = [3, 2, 1];
        let picks = run(&weights, 6 * 7);
        for window in picks.chunks(6) {
            for (i, w) in weights.iter().enumerate() {
                assert_eq!(window.iter().filter(|p| **p == i).count(), *w as usize);
            }
        }
    }

    #[test]
    fn non_coprime_weights_use_gcd() {
        // a step of 2 gives a three-pick cycle; a step of 1 would give six
        assert_eq!(run(&[4, 2], 6), vec![0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn empty_pool() {
        let mut wrr = WeightedRoundRobin::new(&[]);
        assert_eq!(wrr.next(&[]), None);
    }
}
