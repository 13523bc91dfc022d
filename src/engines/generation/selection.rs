use crate::config::SelectionMethod;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;

/// Select `n` individuals.
///
/// `fitness[k]` belongs to `individuals[k]`. Requests for more individuals than
/// there are candidates are clamped to the candidate count, except for
/// [`SelectionMethod::All`] which always returns every candidate.
pub fn select<R: Rng + ?Sized>(
    method: SelectionMethod,
    individuals: &[usize],
    fitness: &[f64],
    n: usize,
    rng: &mut R,
) -> Vec<usize> {
    debug_assert_eq!(individuals.len(), fitness.len());

    if method == SelectionMethod::All {
        return individuals.to_vec();
    }

    let n = if n > individuals.len() {
        log::debug!(
            "{:?} selection of {} from {} candidates, selecting all",
            method,
            n,
            individuals.len()
        );
        individuals.len()
    } else {
        n
    };
    if n == 0 {
        return Vec::new();
    }

    match method {
        SelectionMethod::Elitism => elite_selection(individuals, fitness, n),
        SelectionMethod::Tournament => tournament_selection(individuals, fitness, n, rng),
        SelectionMethod::Rank => rank_selection(individuals, fitness, n, rng),
        SelectionMethod::Random => random_selection(individuals, n, rng),
        SelectionMethod::All => individuals.to_vec(),
    }
}

/// Candidates ordered best first; equal fitness puts the larger index first
fn sorted_descending(individuals: &[usize], fitness: &[f64]) -> Vec<(f64, usize)> {
    let mut sorted: Vec<(f64, usize)> = fitness
        .iter()
        .copied()
        .zip(individuals.iter().copied())
        .collect();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)));
    sorted
}

/// Elite selection: the `n` fittest
pub fn elite_selection(individuals: &[usize], fitness: &[f64], n: usize) -> Vec<usize> {
    sorted_descending(individuals, fitness)
        .into_iter()
        .take(n)
        .map(|(_, individual)| individual)
        .collect()
}

/// Single elimination tournament.
///
/// The bracket is padded with byes up to `n * 2^k` entrants so that halving it
/// ends at exactly `n` winners. A bye loses against any real entrant.
pub fn tournament_selection<R: Rng + ?Sized>(
    individuals: &[usize],
    fitness: &[f64],
    n: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut bracket_size = n;
    while bracket_size < individuals.len() {
        bracket_size *= 2;
    }

    let mut bracket: Vec<Option<(f64, usize)>> = fitness
        .iter()
        .copied()
        .zip(individuals.iter().copied())
        .map(Some)
        .collect();
    bracket.shuffle(rng);

    // Byes go to every other slot so two of them never meet
    for i in 0..bracket_size - individuals.len() {
        let position = (i * 2).min(bracket.len());
        bracket.insert(position, None);
    }

    while bracket.len() > n {
        for i in 0..bracket.len() / 2 {
            let first_loses = match (&bracket[i], &bracket[i + 1]) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some((a, _)), Some((b, _))) => a.partial_cmp(b) == Some(Ordering::Less),
            };
            if first_loses {
                bracket.remove(i);
            } else {
                bracket.remove(i + 1);
            }
        }
    }

    bracket
        .into_iter()
        .flatten()
        .map(|(_, individual)| individual)
        .collect()
}

/// Rank proportional selection without replacement.
///
/// Weights decrease linearly with rank from `2/(m+1)` for the best to
/// `2/(m(m+1))` for the worst of `m` candidates, which sums to one.
pub fn rank_selection<R: Rng + ?Sized>(
    individuals: &[usize],
    fitness: &[f64],
    n: usize,
    rng: &mut R,
) -> Vec<usize> {
    let sorted = sorted_descending(individuals, fitness);
    let weights = rank_weights(sorted.len());

    let mut candidates: Vec<(usize, f64)> = sorted
        .into_iter()
        .map(|(_, individual)| individual)
        .zip(weights)
        .collect();

    let mut selected = Vec::with_capacity(n);
    while selected.len() < n && !candidates.is_empty() {
        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        let mut spin = rng.gen::<f64>() * total;

        let mut chosen = candidates.len() - 1;
        for (k, (_, weight)) in candidates.iter().enumerate() {
            spin -= weight;
            if spin < 0.0 {
                chosen = k;
                break;
            }
        }
        selected.push(candidates.remove(chosen).0);
    }
    selected
}

pub fn rank_weights(m: usize) -> Vec<f64> {
    match m {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let m_f = m as f64;
            let first = 2.0 / (m_f + 1.0);
            let last = 2.0 / (m_f * (m_f + 1.0));
            let step = (last - first) / (m_f - 1.0);
            (0..m).map(|i| first + step * i as f64).collect()
        }
    }
}

/// Uniform selection without replacement
pub fn random_selection<R: Rng + ?Sized>(individuals: &[usize], n: usize, rng: &mut R) -> Vec<usize> {
    individuals.choose_multiple(rng, n).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_elitism() {
        let mut rng = Pcg64::seed_from_u64(0);
        let population: Vec<usize> = (0..6).collect();
        let fitness = [0.0, 1.0, 2.0, 1.0, 3.0, 1.0];
        assert_eq!(
            select(SelectionMethod::Elitism, &population, &fitness, 2, &mut rng),
            vec![4, 2]
        );

        let population: Vec<usize> = (0..8).collect();
        let fitness = [0.0, 6.0, 2.0, 8.0, 3.0, 2.0, 1.0, 1.0];
        assert_eq!(
            select(SelectionMethod::Elitism, &population, &fitness, 2, &mut rng),
            vec![3, 1]
        );
    }

    #[test]
    fn test_elitism_ties_prefer_later_index() {
        let fitness = [1.0, 1.0, 1.0];
        assert_eq!(elite_selection(&[0, 1, 2], &fitness, 2), vec![2, 1]);
    }

    #[test]
    fn test_rank_weights_sum_to_one() {
        for m in 1..20 {
            let weights = rank_weights(m);
            assert_eq!(weights.len(), m);
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "m = {}: sum {}", m, sum);
            assert!(weights.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn test_tournament_best_always_wins_one_slot() {
        let population: Vec<usize> = (0..7).collect();
        let fitness = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        for seed in 0..50 {
            let mut rng = Pcg64::seed_from_u64(seed);
            let winners = select(SelectionMethod::Tournament, &population, &fitness, 2, &mut rng);
            assert_eq!(winners.len(), 2);
            assert!(winners.contains(&6));
        }
    }

    #[test]
    fn test_bye_loses_to_worst_fitness() {
        let mut rng = Pcg64::seed_from_u64(1);
        let population = [0, 1, 2];
        let fitness = [f64::NEG_INFINITY; 3];
        let mut winners = tournament_selection(&population, &fitness, 2, &mut rng);
        winners.sort();
        winners.dedup();
        assert_eq!(winners.len(), 2);
    }

    #[test]
    fn test_zero_and_oversized_requests() {
        let mut rng = Pcg64::seed_from_u64(2);
        let population = [3, 4, 5];
        let fitness = [1.0, 2.0, 3.0];
        for method in [
            SelectionMethod::Elitism,
            SelectionMethod::Tournament,
            SelectionMethod::Rank,
            SelectionMethod::Random,
        ] {
            assert!(select(method, &population, &fitness, 0, &mut rng).is_empty());
            let mut all = select(method, &population, &fitness, 10, &mut rng);
            all.sort();
            assert_eq!(all, vec![3, 4, 5]);
        }
        assert_eq!(
            select(SelectionMethod::All, &population, &fitness, 0, &mut rng),
            vec![3, 4, 5]
        );
    }
}
