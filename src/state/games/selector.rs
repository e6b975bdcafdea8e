//! Weighted outcome selection shared by the wheel game.

use rand::Rng;

/// One row of a probability table.
#[derive(Debug, Clone, PartialEq)]
pub struct Weighted<T> {
    /// Value returned when this row is drawn.
    pub outcome: T,
    /// Probability mass of this row.
    pub probability: f64,
}

impl<T> Weighted<T> {
    /// Build a table row.
    pub fn new(outcome: T, probability: f64) -> Self {
        Self {
            outcome,
            probability,
        }
    }
}

/// Walk the cumulative probabilities and return the first outcome whose running
/// sum reaches `draw`.
///
/// Falls back to the last row when rounding leaves `draw` above the final sum, so a
/// non-empty table always produces a value. Returns `None` only for an empty table.
pub fn select_with_draw<T>(table: &[Weighted<T>], draw: f64) -> Option<&T> {
    let mut cumulative = 0.0;
    for entry in table {
        cumulative += entry.probability;
        if cumulative >= draw {
            return Some(&entry.outcome);
        }
    }
    table.last().map(|entry| &entry.outcome)
}

/// Draw a single uniform value in `[0, 1)` and select from `table`.
pub fn select<'a, T, R>(table: &'a [Weighted<T>], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let draw: f64 = rng.random();
    select_with_draw(table, draw)
}

/// Select uniformly among `items` by building an equal-probability table.
pub fn select_uniform<'a, T, R>(items: &'a [T], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    if items.is_empty() {
        return None;
    }
    let probability = 1.0 / items.len() as f64;
    let table: Vec<Weighted<&T>> = items
        .iter()
        .map(|item| Weighted::new(item, probability))
        .collect();
    select(&table, rng).copied()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn table() -> Vec<Weighted<char>> {
        vec![
            Weighted::new('A', 0.5),
            Weighted::new('B', 0.3),
            Weighted::new('C', 0.2),
        ]
    }

    #[test]
    fn draw_sequence_walks_cumulative_sums() {
        let table = table();
        let picks: Vec<char> = [0.1, 0.6, 0.95]
            .into_iter()
            .filter_map(|draw| select_with_draw(&table, draw).copied())
            .collect();
        assert_eq!(picks, vec!['A', 'B', 'C']);
    }

    #[test]
    fn boundary_draw_meets_cumulative_sum() {
        let table = table();
        assert_eq!(select_with_draw(&table, 0.5), Some(&'A'));
        assert_eq!(select_with_draw(&table, 0.0), Some(&'A'));
    }

    #[test]
    fn falls_back_to_last_entry_on_rounding_gap() {
        let table = vec![Weighted::new(1, 0.1), Weighted::new(2, 0.2)];
        assert_eq!(select_with_draw(&table, 0.999), Some(&2));
        assert_eq!(select_with_draw::<u8>(&[], 0.5), None);
    }

    #[test]
    fn uniform_selection_reaches_every_item() {
        let mut rng = StdRng::seed_from_u64(7);
        let items = ["truth", "dare", "trivia"];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(*select_uniform(&items, &mut rng).unwrap());
        }
        assert_eq!(seen.len(), items.len());
        assert!(select_uniform::<u8, _>(&[], &mut rng).is_none());
    }
}
