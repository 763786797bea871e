//! Reference generational engine: fixed-topology genomes, elitism and weight mutation.
//!
//! The drivers only depend on [`Policy`](crate::policy::Policy) and the fitness ledger, so this
//! engine can be swapped for a full neuro-evolution implementation.

use ahash::AHashMap;
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::{NeatConfig, SimConfig};
use crate::error::{EvaluationError, PolicyError};
use crate::observe::FEATURES;
use crate::pipes::ObstacleStream;
use crate::policy::{FeedForwardGenome, GenomeId};
use crate::population::{GenomeFitness, Generation};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationSummary {
    pub generation: u32,
    pub best: GenomeId,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub score: u32,
    pub high_score: u32,
}

pub struct Evolution {
    genomes: Vec<(GenomeId, FeedForwardGenome)>,
    ledger: AHashMap<GenomeId, f64>,
    sim: SimConfig,
    neat: NeatConfig,
    seed: u64,
    generation: u32,
    high_score: u32,
    best_fitness: f64,
    champion: Option<FeedForwardGenome>,
    next_id: u64,
}

impl Evolution {
    pub fn new(sim: SimConfig, neat: NeatConfig) -> Self {
        let seed = sim.seed.unwrap_or_else(rand::random);
        let mut rng = SmallRng::seed_from_u64(seed);
        let genomes: Vec<_> = (0..neat.population as u64)
            .map(|i| (GenomeId(i), FeedForwardGenome::random(FEATURES, neat.hidden, &mut rng)))
            .collect();
        Self {
            next_id: genomes.len() as u64,
            genomes,
            ledger: AHashMap::new(),
            sim,
            neat,
            seed,
            generation: 0,
            high_score: 0,
            best_fitness: f64::NEG_INFINITY,
            champion: None,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub fn champion(&self) -> Option<&FeedForwardGenome> {
        self.champion.as_ref()
    }

    pub fn fitness_of(&self, id: GenomeId) -> Option<f64> {
        self.ledger.get(&id).copied()
    }

    pub fn genomes(&self) -> impl Iterator<Item = &(GenomeId, FeedForwardGenome)> {
        self.genomes.iter()
    }

    /// Starts evaluating the current genomes and bumps the generation counter. A malformed genome
    /// is fatal.
    pub fn next_generation(&mut self) -> Result<Generation<FeedForwardGenome>, EvaluationError> {
        for (id, genome) in &self.genomes {
            genome.validate().map_err(|source| EvaluationError::Policy { genome: *id, source })?;
        }
        self.generation += 1;
        self.ledger.clear();
        let course_seed = self.seed.wrapping_add(u64::from(self.generation));
        let stream = ObstacleStream::new(&self.sim, Some(course_seed));
        Generation::new(self.genomes.clone(), &self.sim, &self.neat, stream)
    }

    /// Records the fitness of a finished generation and breeds the next one.
    pub fn conclude(&mut self, results: Vec<GenomeFitness>, score: u32) -> GenerationSummary {
        for result in &results {
            self.ledger.insert(result.id, result.fitness);
        }
        self.high_score = self.high_score.max(score);

        let mut ranked: Vec<(GenomeId, f64)> = self
            .genomes
            .iter()
            .map(|(id, _)| (*id, self.ledger.get(id).copied().unwrap_or(f64::NEG_INFINITY)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best, best_fitness) = ranked.first().copied().unwrap_or((GenomeId(0), 0.0));
        let mean_fitness = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.fitness).sum::<f64>() / results.len() as f64
        };

        let by_id: AHashMap<GenomeId, &FeedForwardGenome> =
            self.genomes.iter().map(|(id, g)| (*id, g)).collect();
        let elites: Vec<FeedForwardGenome> = ranked
            .iter()
            .take(self.neat.elite)
            .filter_map(|(id, _)| by_id.get(id).map(|g| (*g).clone()))
            .collect();

        if best_fitness > self.best_fitness {
            self.best_fitness = best_fitness;
            self.champion = elites.first().cloned();
        }

        let summary = GenerationSummary {
            generation: self.generation,
            best,
            best_fitness,
            mean_fitness,
            score,
            high_score: self.high_score,
        };
        info!(
            "generation {} done: best {} fitness {:.1}, mean {:.1}, score {}, high score {}",
            summary.generation, best, best_fitness, mean_fitness, score, self.high_score
        );

        self.breed(elites);
        summary
    }

    /// Runs `generations` generations headless and returns the last summary.
    pub fn run(&mut self, generations: u32) -> Result<Option<GenerationSummary>, EvaluationError> {
        let mut last = None;
        for _ in 0..generations {
            let mut generation = self.next_generation()?;
            let report = generation.run_to_end()?;
            last = Some(self.conclude(generation.finish(), report.score));
        }
        Ok(last)
    }

    fn breed(&mut self, elites: Vec<FeedForwardGenome>) {
        if elites.is_empty() {
            return;
        }
        let children = self.neat.population.saturating_sub(elites.len());
        let (rate, power) = (self.neat.mutation_rate, self.neat.mutation_power);
        let base = self.seed ^ (u64::from(self.generation) << 32);

        let offspring: Vec<FeedForwardGenome> = (0..children)
            .into_par_iter()
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(base.wrapping_add(i as u64));
                elites[i % elites.len()].mutated(rate, power, &mut rng)
            })
            .collect();
        debug!("bred {} offspring from {} elites", offspring.len(), elites.len());

        let mut next = Vec::with_capacity(self.neat.population);
        for genome in elites.into_iter().chain(offspring) {
            next.push((GenomeId(self.next_id), genome));
            self.next_id += 1;
        }
        self.genomes = next;
    }

    /// Replaces the population. Used when resuming from saved genomes.
    pub fn seed_population(&mut self, genomes: Vec<FeedForwardGenome>) -> Result<(), PolicyError> {
        for genome in &genomes {
            genome.validate()?;
        }
        self.genomes = genomes
            .into_iter()
            .map(|g| {
                let id = GenomeId(self.next_id);
                self.next_id += 1;
                (id, g)
            })
            .collect();
        Ok(())
    }
}
