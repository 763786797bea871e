use crate::config::SimConfig;
use crate::judge::Rect;

/// A single agent. `x` never changes after spawn.
#[derive(Clone, Debug, PartialEq)]
pub struct Bird {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub flaps: u32,
    pub alive: bool,
    width: f32,
    height: f32,
}

impl Bird {
    /// Spawns at the vertical centre with the flap impulse already applied.
    pub fn spawn(cfg: &SimConfig) -> Self {
        Self::at(cfg, cfg.screen_height as f32 / 2.0, cfg.flap_impulse)
    }

    pub fn at(cfg: &SimConfig, y: f32, velocity: f32) -> Self {
        Self {
            x: cfg.bird_x,
            y,
            velocity,
            flaps: 0,
            alive: true,
            width: cfg.bird_width,
            height: cfg.bird_height,
        }
    }

    /// Bounding box centred on `(x, y)`.
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.x - self.width / 2.0,
            self.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    pub fn is_rising(&self) -> bool {
        self.velocity < 0.0
    }
}

/// Constant-acceleration motion with an impulse control. Bounds are left to the judge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    pub gravity: f32,
    pub flap_impulse: f32,
}

impl Kinematics {
    pub fn new(cfg: &SimConfig) -> Self {
        Self {
            gravity: cfg.gravity,
            flap_impulse: cfg.flap_impulse,
        }
    }

    /// One frame: velocity first, then position.
    pub fn advance(&self, bird: &mut Bird) {
        bird.velocity += self.gravity;
        bird.y += bird.velocity;
    }

    pub fn apply_action(&self, bird: &mut Bird) {
        bird.velocity = self.flap_impulse;
        bird.flaps += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_from_rest_adds_gravity_once() {
        let cfg = SimConfig::default();
        let kin = Kinematics::new(&cfg);
        let centre = cfg.screen_height as f32 / 2.0;
        let mut bird = Bird::at(&cfg, centre, 0.0);

        kin.advance(&mut bird);

        assert_eq!(bird.velocity, cfg.gravity);
        assert_eq!(bird.y, centre + cfg.gravity);
    }

    #[test]
    fn velocity_grows_by_gravity_between_flaps() {
        let cfg = SimConfig::default();
        let kin = Kinematics::new(&cfg);
        let mut bird = Bird::spawn(&cfg);

        for _ in 0..30 {
            let before = bird.velocity;
            kin.advance(&mut bird);
            assert_eq!(bird.velocity, before + cfg.gravity);
        }
    }

    #[test]
    fn flap_resets_velocity_regardless_of_history() {
        let cfg = SimConfig::default();
        let kin = Kinematics::new(&cfg);
        for initial in [-30.0, -7.0, 0.0, 3.3, 42.0] {
            let mut bird = Bird::at(&cfg, 200.0, initial);
            kin.apply_action(&mut bird);
            assert_eq!(bird.velocity, cfg.flap_impulse);
        }
    }

    #[test]
    fn flap_counts_actions() {
        let cfg = SimConfig::default();
        let kin = Kinematics::new(&cfg);
        let mut bird = Bird::spawn(&cfg);
        kin.apply_action(&mut bird);
        kin.advance(&mut bird);
        kin.apply_action(&mut bird);
        assert_eq!(bird.flaps, 2);
    }

    #[test]
    fn bounds_are_centred() {
        let cfg = SimConfig::default();
        let bird = Bird::at(&cfg, 300.0, 0.0);
        let b = bird.bounds();
        assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (30.0, 285.0, 70.0, 315.0));
    }
}
