use super::WeightedEntry;

/// Index of the entry with the lowest `active / weight` ratio.
///
/// Zero-weight entries never win. Ties go to the lowest index.
pub fn least_connection<K>(entries: &[WeightedEntry<K>]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, entry) in entries.iter().enumerate() {
        if entry.weight == 0 {
            continue;
        }
        best = match best {
            Some(b) if !lower_ratio(entry, &entries[b]) => Some(b),
            _ => Some(i),
        };
    }
    best
}

// a.active / a.weight < b.active / b.weight, without division
fn lower_ratio<K>(a: &WeightedEntry<K>, b: &WeightedEntry<K>) -> bool {
    (a.active as u128) * (b.weight as u128) < (b.active as u128) * (a.weight as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: char, weight: u32, active: u64) -> WeightedEntry<char> {
        WeightedEntry {
            key,
            weight,
            active,
            stale: false,
        }
    }

    #[test]
    fn lowest_ratio_wins() {
        let entries = vec![entry('A', 3, 0), entry('B', 2, 2)];
        assert_eq!(least_connection(&entries), Some(0));
        let entries = vec![entry('A', 3, 4), entry('B', 2, 2)];
        assert_eq!(least_connection(&entries), Some(1));
    }

    #[test]
    fn tie_goes_to_first() {
        let entries = vec![entry('A', 3, 3), entry('B', 2, 2)];
        assert_eq!(least_connection(&entries), Some(0));
    }

    #[test]
    fn zero_weight_excluded() {
        let entries = vec![entry('A', 0, 0), entry('B', 1, 50)];
        assert_eq!(least_connection(&entries), Some(1));
        let entries = vec![entry('A', 0, 0)];
        assert_eq!(least_connection(&entries), None);
    }
}
