//! Runs one generation of evolved policies against a shared obstacle course.
//!
//! Every frame the stream advances once. Every alive bird is then rewarded, observed, asked for
//! an action, moved and judged. Eliminated birds are compacted out at the end of the frame, and
//! their final fitness is recorded exactly once.

use ahash::AHashSet;
use log::debug;

use crate::bird::{Bird, Kinematics};
use crate::config::{NeatConfig, SimConfig};
use crate::error::EvaluationError;
use crate::judge::{Termination, Verdict, judge};
use crate::observe::population_features;
use crate::pipes::ObstacleStream;
use crate::policy::{GenomeId, Policy};

/// Final fitness of one genome, reported back to the evolution engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenomeFitness {
    pub id: GenomeId,
    pub fitness: f64,
    pub termination: Option<Termination>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub alive: usize,
    pub eliminated: usize,
    pub score: u32,
}

struct Contestant<P> {
    id: GenomeId,
    policy: P,
    bird: Bird,
    fitness: f64,
    verdict: Verdict,
}

pub struct Generation<P> {
    contestants: Vec<Contestant<P>>,
    finished: Vec<GenomeFitness>,
    stream: ObstacleStream,
    kinematics: Kinematics,
    neat: NeatConfig,
    screen_height: f32,
    frame: u64,
    pending_flap: bool,
}

impl<P: Policy> Generation<P> {
    pub fn new(
        genomes: Vec<(GenomeId, P)>,
        sim: &SimConfig,
        neat: &NeatConfig,
        stream: ObstacleStream,
    ) -> Result<Self, EvaluationError> {
        let mut seen = AHashSet::with_capacity(genomes.len());
        let mut contestants = Vec::with_capacity(genomes.len());
        for (id, policy) in genomes {
            if !seen.insert(id) {
                return Err(EvaluationError::DuplicateGenome(id));
            }
            contestants.push(Contestant {
                id,
                policy,
                bird: Bird::spawn(sim),
                fitness: 0.0,
                verdict: Verdict::Alive,
            });
        }
        Ok(Self {
            finished: Vec::with_capacity(contestants.len()),
            contestants,
            stream,
            kinematics: Kinematics::new(sim),
            neat: neat.clone(),
            screen_height: sim.screen_height as f32,
            frame: 0,
            pending_flap: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.contestants.is_empty()
    }

    pub fn alive(&self) -> usize {
        self.contestants.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn score(&self) -> u32 {
        self.stream.score()
    }

    pub fn stream(&self) -> &ObstacleStream {
        &self.stream
    }

    /// Scripted scenarios place pairs by hand through this.
    pub fn stream_mut(&mut self) -> &mut ObstacleStream {
        &mut self.stream
    }

    pub fn birds(&self) -> impl Iterator<Item = &Bird> {
        self.contestants.iter().map(|c| &c.bird)
    }

    /// Fitness accumulated so far by a genome that is still alive.
    pub fn running_fitness(&self, id: GenomeId) -> Option<f64> {
        self.contestants.iter().find(|c| c.id == id).map(|c| c.fitness)
    }

    /// Flaps the first alive bird on the next frame, on top of its own policy.
    pub fn manual_flap(&mut self) {
        self.pending_flap = true;
    }

    pub fn step(&mut self) -> Result<FrameReport, EvaluationError> {
        if self.is_finished() {
            return Ok(self.report(0));
        }
        self.frame += 1;

        let passed = self.stream.advance();
        let score = self.stream.score();

        for c in self.contestants.iter_mut() {
            c.fitness += self.neat.survival_reward;
            if passed > 0 {
                c.fitness += f64::from(score);
            }
        }

        let manual = std::mem::take(&mut self.pending_flap);
        for (i, c) in self.contestants.iter_mut().enumerate() {
            let observation = population_features(&c.bird, &self.stream);
            let signal = c
                .policy
                .evaluate(&observation)
                .map_err(|source| EvaluationError::Policy { genome: c.id, source })?;
            if signal > self.neat.flap_threshold || (manual && i == 0) {
                self.kinematics.apply_action(&mut c.bird);
            }
        }

        for c in self.contestants.iter_mut() {
            self.kinematics.advance(&mut c.bird);
        }

        let penalty = self.neat.elimination_penalty;
        for c in self.contestants.iter_mut() {
            c.verdict = judge(&c.bird, &self.stream, self.screen_height);
            match c.verdict {
                Verdict::Alive => {}
                Verdict::Terminal(Termination::Boundary) => c.fitness -= penalty,
                Verdict::Terminal(Termination::Collision) => {
                    c.fitness += f64::from(score) - penalty;
                }
            }
        }

        let before = self.contestants.len();
        let finished = &mut self.finished;
        self.contestants.retain_mut(|c| match c.verdict {
            Verdict::Alive => true,
            Verdict::Terminal(termination) => {
                c.bird.alive = false;
                finished.push(GenomeFitness {
                    id: c.id,
                    fitness: c.fitness,
                    termination: Some(termination),
                });
                false
            }
        });
        let mut eliminated = before - self.contestants.len();

        if let Some(limit) = self.neat.max_frames {
            if self.frame >= limit && !self.contestants.is_empty() {
                debug!("frame cap {limit} reached with {} birds alive", self.contestants.len());
                eliminated += self.contestants.len();
                self.finished.extend(self.contestants.drain(..).map(|c| GenomeFitness {
                    id: c.id,
                    fitness: c.fitness,
                    termination: None,
                }));
            }
        }

        Ok(self.report(eliminated))
    }

    pub fn run_to_end(&mut self) -> Result<FrameReport, EvaluationError> {
        let mut report = self.report(0);
        while !self.is_finished() {
            report = self.step()?;
        }
        Ok(report)
    }

    /// Final fitness for every genome, in elimination order. Genomes still alive are finalised
    /// with what they have accumulated.
    pub fn finish(mut self) -> Vec<GenomeFitness> {
        let survivors = self.contestants.drain(..).map(|c| GenomeFitness {
            id: c.id,
            fitness: c.fitness,
            termination: None,
        });
        self.finished.extend(survivors);
        self.finished
    }

    fn report(&self, eliminated: usize) -> FrameReport {
        FrameReport {
            frame: self.frame,
            alive: self.contestants.len(),
            eliminated,
            score: self.stream.score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use crate::pipes::ObstaclePair;
    use crate::policy::FeedForwardGenome;

    /// Constant action signal.
    struct Always(f32);

    impl Policy for Always {
        fn evaluate(&self, _: &[f32]) -> Result<f32, PolicyError> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl Policy for Broken {
        fn evaluate(&self, observation: &[f32]) -> Result<f32, PolicyError> {
            Err(PolicyError::InputWidth { expected: 7, actual: observation.len() })
        }
    }

    fn boxed(policy: impl Policy + 'static) -> Box<dyn Policy> {
        Box::new(policy)
    }

    fn configs() -> (SimConfig, NeatConfig) {
        (SimConfig { seed: Some(5), ..SimConfig::default() }, NeatConfig::default())
    }

    fn generation(policies: Vec<Box<dyn Policy>>) -> Generation<Box<dyn Policy>> {
        let (sim, neat) = configs();
        let genomes = policies
            .into_iter()
            .enumerate()
            .map(|(i, p)| (GenomeId(i as u64), p))
            .collect();
        Generation::new(genomes, &sim, &neat, ObstacleStream::new(&sim, sim.seed)).unwrap()
    }

    #[test]
    fn collision_on_frame_ten_with_score_two() {
        let (sim, _) = configs();
        let mut generation = generation(vec![
            boxed(Always(0.0)),
            boxed(Always(1.0)),
            boxed(Always(0.2)),
        ]);
        // two pairs that leave on frame 1, then one that reaches the bird on frame 10
        generation.stream_mut().push_pair(ObstaclePair::new(-78.0, 200.0, &sim));
        generation.stream_mut().push_pair(ObstaclePair::new(-78.0, 200.0, &sim));
        generation.stream_mut().push_pair(ObstaclePair::new(117.0, 100.0, &sim));

        let mut accumulated = 0.0;
        for frame in 1..=9 {
            let report = generation.step().unwrap();
            assert_eq!(report.eliminated, 0, "frame {frame}");
            accumulated = generation.running_fitness(GenomeId(0)).unwrap();
        }
        assert_eq!(generation.score(), 2);
        let report = generation.step().unwrap();
        assert!(report.eliminated >= 1);
        assert!(generation.running_fitness(GenomeId(0)).is_none());

        generation.run_to_end().unwrap();
        let results = generation.finish();
        assert_eq!(results.len(), 3);
        let falling = results.iter().find(|r| r.id == GenomeId(0)).unwrap();
        assert_eq!(falling.termination, Some(Termination::Collision));
        let survival_this_frame = 0.1;
        let expected = accumulated + survival_this_frame + (2.0 - 5.0);
        assert!((falling.fitness - expected).abs() < 1e-9, "{} vs {expected}", falling.fitness);
        // ten frames of survival plus the score jump to 2 on frame 1
        assert!((accumulated - (9.0 * 0.1 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn boundary_exit_costs_flat_penalty() {
        let mut generation = generation(vec![boxed(Always(1.0))]);
        let report = generation.run_to_end().unwrap();
        let results = generation.finish();

        // flapping every frame rises 6.6 units per frame; the top edge crosses 0 on frame 44
        assert_eq!(report.frame, 44);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].termination, Some(Termination::Boundary));
        assert!((results[0].fitness - (44.0 * 0.1 - 5.0)).abs() < 1e-9);
    }

    #[test]
    fn every_genome_is_reported_once() {
        let mut generation = generation(vec![
            boxed(Always(0.0)),
            boxed(Always(1.0)),
            boxed(Always(0.6)),
            boxed(Always(-3.0)),
        ]);
        let mut alive = generation.alive();
        while !generation.is_finished() {
            let report = generation.step().unwrap();
            // compaction is monotonic
            assert!(report.alive <= alive);
            alive = report.alive;
        }
        let mut ids: Vec<u64> = generation.finish().iter().map(|r| r.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn frame_cap_finalises_survivors_without_penalty() {
        let (sim, mut neat) = configs();
        neat.max_frames = Some(3);
        let genomes: Vec<(GenomeId, Box<dyn Policy>)> = vec![(GenomeId(9), boxed(Always(0.0)))];
        let mut generation =
            Generation::new(genomes, &sim, &neat, ObstacleStream::new(&sim, sim.seed)).unwrap();
        generation.run_to_end().unwrap();
        let results = generation.finish();
        assert_eq!(results[0].termination, None);
        assert!((results[0].fitness - 0.3).abs() < 1e-9);
    }

    #[test]
    fn policy_failure_is_fatal_and_names_the_genome() {
        let mut generation = generation(vec![boxed(Always(0.0)), boxed(Broken)]);
        match generation.step() {
            Err(EvaluationError::Policy { genome, .. }) => assert_eq!(genome, GenomeId(1)),
            other => panic!("expected a policy error, got {other:?}"),
        }
    }

    #[test]
    fn score_jump_rewards_every_alive_bird() {
        let (sim, _) = configs();
        let mut generation = generation(vec![
            boxed(Always(0.0)),
            boxed(Always(1.0)),
            boxed(Always(0.2)),
        ]);
        // leaves the screen on frame 1
        generation.stream_mut().push_pair(ObstaclePair::new(-78.0, 200.0, &sim));

        let report = generation.step().unwrap();
        assert_eq!(report.score, 1);
        assert_eq!(report.alive, 3);
        for id in 0..3 {
            let fitness = generation.running_fitness(GenomeId(id)).unwrap();
            assert!((fitness - (0.1 + 1.0)).abs() < 1e-9, "genome {id}: {fitness}");
        }
    }

    #[test]
    fn malformed_genome_is_an_error_not_a_panic() {
        let (sim, neat) = configs();
        let genome: FeedForwardGenome =
            serde_json::from_str(r#"{"inputs":4,"hidden":1,"weights":[0.0]}"#).unwrap();
        let mut generation = Generation::new(
            vec![(GenomeId(3), genome)],
            &sim,
            &neat,
            ObstacleStream::new(&sim, sim.seed),
        )
        .unwrap();
        assert!(matches!(
            generation.step(),
            Err(EvaluationError::Policy {
                genome: GenomeId(3),
                source: PolicyError::MalformedGenome(_),
            })
        ));
    }

    #[test]
    fn duplicate_genomes_are_rejected() {
        let (sim, neat) = configs();
        let genomes: Vec<(GenomeId, Box<dyn Policy>)> =
            vec![(GenomeId(1), boxed(Always(0.0))), (GenomeId(1), boxed(Always(0.0)))];
        assert!(matches!(
            Generation::new(genomes, &sim, &neat, ObstacleStream::new(&sim, None)),
            Err(EvaluationError::DuplicateGenome(GenomeId(1)))
        ));
    }
}
