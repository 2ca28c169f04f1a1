//! Reference selection strategies.
//!
//! Each declares a probability per population member from fitness alone. Lower
//! fitness is better throughout.

use super::traits::{fitnesses, ranking, AncestryStrategy, Strategy};
use crate::error::{ClanTuneError, Result};
use crate::genetics::{Allele, Ancestry, Genome};
use rand::{Rng, RngCore};

/// Runs `rounds` tournaments of `size` uniform draws with replacement. The
/// probability of a member is its share of wins.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    size: usize,
    rounds: usize,
}

impl TournamentSelection {
    pub fn new(size: usize, rounds: usize) -> Result<Self> {
        if size < 2 {
            return Err(ClanTuneError::InvalidParameter(format!(
                "tournament size must be at least 2, got {}",
                size
            )));
        }
        if rounds == 0 {
            return Err(ClanTuneError::InvalidParameter(
                "tournament rounds must be at least 1".to_string(),
            ));
        }
        Ok(Self { size, rounds })
    }
}

impl Strategy for TournamentSelection {
    fn name(&self) -> &'static str {
        "TournamentSelection"
    }
}

impl AncestryStrategy for TournamentSelection {
    fn select_ancestry(
        &self,
        _me: &Genome,
        population: &[Genome],
        rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        let fitness = fitnesses(population)?;
        let mut wins = vec![0usize; population.len()];

        for _ in 0..self.rounds {
            let mut best = rng.gen_range(0..population.len());
            for _ in 1..self.size {
                let challenger = rng.gen_range(0..population.len());
                if fitness[challenger] < fitness[best] {
                    best = challenger;
                }
            }
            wins[best] += 1;
        }

        let probabilities: Vec<f64> = wins
            .iter()
            .map(|&count| count as f64 / self.rounds as f64)
            .collect();
        Ancestry::from_probabilities(&probabilities, population)
    }
}

/// Elitist reproduction: the best `thrive` members and the middle tier breed
/// true, while each of the worst `die` members is replaced by an even mix of the
/// thriving tier.
#[derive(Debug, Clone)]
pub struct EliteBreeds {
    thrive: usize,
    die: usize,
}

impl EliteBreeds {
    pub fn new(thrive: usize, die: usize) -> Result<Self> {
        if thrive == 0 {
            return Err(ClanTuneError::InvalidParameter(
                "thrive count must be at least 1".to_string(),
            ));
        }
        Ok(Self { thrive, die })
    }
}

impl Strategy for EliteBreeds {
    fn name(&self) -> &'static str {
        "EliteBreeds"
    }
}

impl AncestryStrategy for EliteBreeds {
    fn select_ancestry(
        &self,
        me: &Genome,
        population: &[Genome],
        _rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        if self.thrive + self.die >= population.len() {
            return Err(ClanTuneError::Precondition(format!(
                "thrive ({}) + die ({}) must be less than population size ({})",
                self.thrive,
                self.die,
                population.len()
            )));
        }
        let order = ranking(&fitnesses(population)?);
        let my_tier = order
            .iter()
            .position(|&index| population[index].id() == me.id())
            .ok_or_else(|| {
                ClanTuneError::Precondition(format!(
                    "genome {} is not a member of the population",
                    me.id()
                ))
            })?;
        let me_index = order[my_tier];

        let mut probabilities = vec![0.0; population.len()];
        if my_tier >= population.len() - self.die {
            let share = 1.0 / self.thrive as f64;
            for &index in &order[..self.thrive] {
                probabilities[index] = share;
            }
        } else {
            probabilities[me_index] = 1.0;
        }
        Ancestry::from_probabilities(&probabilities, population)
    }
}

/// Rank-weighted selection: the member at rank `r` gets weight `(N - r)^p`.
///
/// With `num_parents` set, only that many of the best-ranked members keep a
/// non-zero weight.
#[derive(Debug, Clone)]
pub struct RankSelection {
    selection_pressure: f64,
    num_parents: Option<usize>,
}

impl RankSelection {
    pub fn new(selection_pressure: f64, num_parents: Option<usize>) -> Result<Self> {
        if !(selection_pressure > 0.0 && selection_pressure.is_finite()) {
            return Err(ClanTuneError::InvalidParameter(format!(
                "selection pressure must be positive, got {}",
                selection_pressure
            )));
        }
        check_num_parents(num_parents)?;
        Ok(Self {
            selection_pressure,
            num_parents,
        })
    }
}

impl Default for RankSelection {
    fn default() -> Self {
        Self {
            selection_pressure: 1.0,
            num_parents: Some(DEFAULT_NUM_PARENTS),
        }
    }
}

impl Strategy for RankSelection {
    fn name(&self) -> &'static str {
        "RankSelection"
    }
}

impl AncestryStrategy for RankSelection {
    fn select_ancestry(
        &self,
        _me: &Genome,
        population: &[Genome],
        _rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        let order = ranking(&fitnesses(population)?);
        let size = population.len() as f64;

        let mut weights = vec![0.0; population.len()];
        for (rank, &index) in order.iter().enumerate() {
            weights[index] = (size - rank as f64).powf(self.selection_pressure);
        }
        let kept = keep_most_probable(weights, self.num_parents);
        Ancestry::from_probabilities(&normalize(kept)?, population)
    }
}

/// Boltzmann selection: weight `exp(-fitness / T)`.
///
/// With `num_parents` set, only that many of the heaviest members keep a
/// non-zero weight.
#[derive(Debug, Clone)]
pub struct BoltzmannSelection {
    temperature: f64,
    num_parents: Option<usize>,
}

impl BoltzmannSelection {
    pub fn new(temperature: f64, num_parents: Option<usize>) -> Result<Self> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(ClanTuneError::InvalidParameter(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }
        check_num_parents(num_parents)?;
        Ok(Self {
            temperature,
            num_parents,
        })
    }
}

impl Default for BoltzmannSelection {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            num_parents: Some(DEFAULT_NUM_PARENTS),
        }
    }
}

impl Strategy for BoltzmannSelection {
    fn name(&self) -> &'static str {
        "BoltzmannSelection"
    }
}

impl AncestryStrategy for BoltzmannSelection {
    fn select_ancestry(
        &self,
        _me: &Genome,
        population: &[Genome],
        _rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        let fitness = fitnesses(population)?;
        // Shifting by the best fitness leaves the normalized weights unchanged
        // and keeps the exponent <= 0.
        let best = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> = fitness
            .iter()
            .map(|&value| (-(value - best) / self.temperature).exp())
            .collect();
        let kept = keep_most_probable(weights, self.num_parents);
        Ancestry::from_probabilities(&normalize(kept)?, population)
    }
}

/// Keeps only the `n` most probable members of a wrapped strategy's
/// distribution and renormalizes them.
pub struct TopN {
    n: usize,
    inner: Box<dyn AncestryStrategy>,
}

impl TopN {
    pub fn new(n: usize, inner: Box<dyn AncestryStrategy>) -> Result<Self> {
        if n == 0 {
            return Err(ClanTuneError::InvalidParameter(
                "TopN requires n >= 1".to_string(),
            ));
        }
        Ok(Self { n, inner })
    }
}

impl Strategy for TopN {
    fn name(&self) -> &'static str {
        "TopN"
    }

    fn on_setup(&self, allele: Allele) -> Result<Allele> {
        self.inner.on_setup(allele)
    }
}

impl AncestryStrategy for TopN {
    fn select_ancestry(
        &self,
        me: &Genome,
        population: &[Genome],
        rng: &mut dyn RngCore,
    ) -> Result<Ancestry> {
        let probabilities = self
            .inner
            .declare_ancestry(me, population, rng)?
            .probabilities();

        let kept = keep_most_probable(probabilities, Some(self.n));
        Ancestry::from_probabilities(&normalize(kept)?, population)
    }
}

/// Parent count of rank and Boltzmann selection when built with defaults.
pub const DEFAULT_NUM_PARENTS: usize = 2;

fn check_num_parents(num_parents: Option<usize>) -> Result<()> {
    if num_parents == Some(0) {
        return Err(ClanTuneError::InvalidParameter(
            "num_parents must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Zeroes every weight outside the `limit` largest. Highest first; the stable
/// sort leaves ties in index order. `None` keeps everything.
fn keep_most_probable(weights: Vec<f64>, limit: Option<usize>) -> Vec<f64> {
    let Some(limit) = limit else {
        return weights;
    };
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

    let mut kept = vec![0.0; weights.len()];
    for &index in order.iter().take(limit) {
        kept[index] = weights[index];
    }
    kept
}

fn normalize(weights: Vec<f64>) -> Result<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(ClanTuneError::Precondition(format!(
            "selection weights sum to {}, cannot normalize",
            total
        )));
    }
    Ok(weights.into_iter().map(|weight| weight / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::{AlleleKind, AlleleParams};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population(fitness: &[f64]) -> Vec<Genome> {
        fitness
            .iter()
            .map(|&value| {
                Genome::new()
                    .add_hyperparameter("x", 1.0, AlleleKind::Float, AlleleParams::new())
                    .unwrap()
                    .set_fitness(value)
            })
            .collect()
    }

    fn declare(strategy: &dyn AncestryStrategy, me: usize, population: &[Genome]) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        strategy
            .declare_ancestry(&population[me], population, &mut rng)
            .unwrap()
            .probabilities()
    }

    #[test]
    fn test_tournament_validates_parameters() {
        assert!(TournamentSelection::new(1, 5).is_err());
        assert!(TournamentSelection::new(2, 0).is_err());
        assert!(TournamentSelection::new(2, 1).is_ok());
    }

    #[test]
    fn test_tournament_probabilities_are_win_shares() {
        let population = population(&[0.1, 0.2, 0.3, 0.4]);
        let strategy = TournamentSelection::new(3, 8).unwrap();
        let probabilities = declare(&strategy, 0, &population);

        assert_eq!(probabilities.len(), 4);
        for probability in &probabilities {
            let wins = probability * 8.0;
            assert!((wins - wins.round()).abs() < 1e-9);
        }
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tournament_worst_member_never_wins() {
        let population = population(&[0.1, 0.2, 0.3, 0.9]);
        let strategy = TournamentSelection::new(2, 50).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            let ancestry = strategy
                .declare_ancestry(&population[0], &population, &mut rng)
                .unwrap();
            // It can only win a tournament where it is drawn twice.
            assert!(ancestry.probability(3) <= ancestry.probability(0) + 0.5);
        }
    }

    #[test]
    fn test_elite_breeds_tiers() {
        let population = population(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        let strategy = EliteBreeds::new(2, 2).unwrap();

        assert_eq!(declare(&strategy, 0, &population), vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(declare(&strategy, 1, &population), vec![0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(declare(&strategy, 2, &population), vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(declare(&strategy, 3, &population), vec![0.5, 0.5, 0.0, 0.0, 0.0]);
        assert_eq!(declare(&strategy, 4, &population), vec![0.5, 0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_elite_breeds_ranks_by_fitness_not_position() {
        let population = population(&[0.5, 0.1, 0.4, 0.2, 0.3]);
        let strategy = EliteBreeds::new(2, 2).unwrap();

        assert_eq!(declare(&strategy, 0, &population), vec![0.0, 0.5, 0.0, 0.5, 0.0]);
        assert_eq!(declare(&strategy, 1, &population), vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_elite_breeds_requires_room() {
        let population = population(&[0.1, 0.2, 0.3, 0.4]);
        let strategy = EliteBreeds::new(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(strategy
            .declare_ancestry(&population[0], &population, &mut rng)
            .is_err());
        assert!(EliteBreeds::new(0, 1).is_err());
    }

    #[test]
    fn test_rank_selection_weights() {
        let population = population(&[0.3, 0.1, 0.2]);
        let strategy = RankSelection::new(1.0, None).unwrap();
        let probabilities = declare(&strategy, 0, &population);

        assert!((probabilities[1] - 3.0 / 6.0).abs() < 1e-12);
        assert!((probabilities[2] - 2.0 / 6.0).abs() < 1e-12);
        assert!((probabilities[0] - 1.0 / 6.0).abs() < 1e-12);
        assert!(probabilities.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_rank_selection_pressure_sharpens() {
        let population = population(&[0.1, 0.2, 0.3]);
        let flat = declare(&RankSelection::new(1.0, None).unwrap(), 0, &population);
        let sharp = declare(&RankSelection::new(3.0, None).unwrap(), 0, &population);
        assert!(sharp[0] > flat[0]);
        assert!(RankSelection::new(0.0, None).is_err());
    }

    #[test]
    fn test_boltzmann_weights() {
        let population = population(&[0.0, 1.0]);
        let strategy = BoltzmannSelection::new(1.0, None).unwrap();
        let probabilities = declare(&strategy, 0, &population);

        let expected = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((probabilities[0] - expected).abs() < 1e-12);
        assert!((probabilities[0] + probabilities[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_boltzmann_survives_large_fitness() {
        let population = population(&[5000.0, 5001.0, 5002.0]);
        let strategy = BoltzmannSelection::new(0.5, None).unwrap();
        let probabilities = declare(&strategy, 0, &population);
        assert!(probabilities[0] > probabilities[1]);
        assert!(probabilities[1] > probabilities[2]);
        assert!(BoltzmannSelection::new(-1.0, None).is_err());
    }

    #[test]
    fn test_top_n_keeps_best_entries() {
        let population = population(&[0.4, 0.1, 0.3, 0.2]);
        let strategy = TopN::new(2, Box::new(RankSelection::new(1.0, None).unwrap())).unwrap();
        let probabilities = declare(&strategy, 0, &population);

        assert_eq!(probabilities.iter().filter(|&&p| p > 0.0).count(), 2);
        assert!(probabilities[1] > 0.0 && probabilities[3] > 0.0);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_top_n_breaks_ties_by_lower_index() {
        let population = population(&[0.1, 0.1, 0.1, 0.1]);
        let strategy = TopN::new(2, Box::new(BoltzmannSelection::new(1.0, None).unwrap())).unwrap();
        assert_eq!(declare(&strategy, 3, &population), vec![0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_top_n_with_fewer_live_members() {
        let population = population(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        let strategy = TopN::new(3, Box::new(EliteBreeds::new(2, 2).unwrap())).unwrap();
        assert_eq!(declare(&strategy, 2, &population), vec![0.0, 0.0, 1.0, 0.0, 0.0]);
        assert!(TopN::new(0, Box::new(RankSelection::new(1.0, None).unwrap())).is_err());
    }

    #[test]
    fn test_rank_selection_num_parents_keeps_the_best() {
        let population = population(&[0.4, 0.1, 0.3, 0.2]);
        let strategy = RankSelection::new(1.0, Some(2)).unwrap();
        let probabilities = declare(&strategy, 0, &population);

        // Ranks 4 and 3 survive and renormalize.
        assert_eq!(probabilities[0], 0.0);
        assert_eq!(probabilities[2], 0.0);
        assert!((probabilities[1] - 4.0 / 7.0).abs() < 1e-12);
        assert!((probabilities[3] - 3.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_boltzmann_single_parent_takes_everything() {
        let population = population(&[0.3, 0.2, 0.1]);
        let strategy = BoltzmannSelection::new(2.0, Some(1)).unwrap();
        assert_eq!(declare(&strategy, 0, &population), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_num_parents_breaks_ties_by_lower_index() {
        let population = population(&[0.1, 0.1, 0.1, 0.1]);
        let boltzmann = BoltzmannSelection::new(1.0, Some(2)).unwrap();
        assert_eq!(declare(&boltzmann, 3, &population), vec![0.5, 0.5, 0.0, 0.0]);

        let rank = RankSelection::new(1.0, Some(3)).unwrap();
        let probabilities = declare(&rank, 3, &population);
        assert!(probabilities[..3].iter().all(|&p| p > 0.0));
        assert_eq!(probabilities[3], 0.0);
    }

    #[test]
    fn test_num_parents_validation_and_defaults() {
        assert!(RankSelection::new(1.0, Some(0)).is_err());
        assert!(BoltzmannSelection::new(1.0, Some(0)).is_err());
        assert!(RankSelection::new(1.0, Some(10)).is_ok());

        let population = population(&[0.5, 0.4, 0.3, 0.2, 0.1]);
        let mut rng = StdRng::seed_from_u64(7);
        let strategies: [Box<dyn AncestryStrategy>; 2] = [
            Box::new(RankSelection::default()),
            Box::new(BoltzmannSelection::default()),
        ];
        for strategy in &strategies {
            let ancestry = strategy
                .declare_ancestry(&population[0], &population, &mut rng)
                .unwrap();
            assert_eq!(ancestry.live_count(), DEFAULT_NUM_PARENTS);
            assert!(ancestry.probability(4) > 0.0 && ancestry.probability(3) > 0.0);
        }
    }

    #[test]
    fn test_elite_breeds_rejects_outsider() {
        let population = population(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        let outsider = Genome::new()
            .add_hyperparameter("x", 1.0, AlleleKind::Float, AlleleParams::new())
            .unwrap()
            .set_fitness(0.05);
        let strategy = EliteBreeds::new(2, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            strategy.select_ancestry(&outsider, &population, &mut rng),
            Err(ClanTuneError::Precondition(_))
        ));
    }
}
