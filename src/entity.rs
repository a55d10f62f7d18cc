use std::collections::HashMap;

use macroquad::prelude::*;
use macroquad::rand::gen_range;

use crate::animation::Animation;
use crate::config::{PhysicsConfig, PlayerConfig};
use crate::particle::{self, ParticleKind, ParticleSpawn};
use crate::physics::PhysicsBody;
use crate::tilemap::Tilemap;

const DASH_BURST: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Idle,
    Run,
    Jump,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Run => "run",
            Self::Jump => "jump",
        }
    }
}

/// Animation templates per action; an entity clones the template when it
/// switches action.
#[derive(Clone, Debug)]
pub struct AnimationSet {
    templates: HashMap<Action, Animation>,
}

impl AnimationSet {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn with(mut self, action: Action, animation: Animation) -> Self {
        self.templates.insert(action, animation);
        self
    }

    fn instantiate(&self, action: Action) -> Animation {
        self.templates
            .get(&action)
            .cloned()
            .unwrap_or_else(|| Animation::new(1, 1, true))
    }
}

impl Default for AnimationSet {
    fn default() -> Self {
        Self::new()
            .with(Action::Idle, Animation::new(22, 6, true))
            .with(Action::Run, Animation::new(8, 4, true))
            .with(Action::Jump, Animation::new(1, 1, true))
    }
}

#[derive(Clone, Debug)]
pub enum Controller {
    /// Moves only by physics and the movement it is given.
    Passive,
    Player(PlayerController),
}

#[derive(Clone, Debug)]
pub struct PlayerController {
    air_time: u32,
    jumps: u32,
    dashing: i32,
    tuning: PlayerConfig,
}

impl PlayerController {
    pub fn new(tuning: PlayerConfig) -> Self {
        Self {
            air_time: 0,
            jumps: tuning.max_jumps,
            dashing: 0,
            tuning,
        }
    }

    pub fn air_time(&self) -> u32 {
        self.air_time
    }

    pub fn jumps(&self) -> u32 {
        self.jumps
    }

    /// Signed dash countdown, negative when dashing left.
    pub fn dashing(&self) -> i32 {
        self.dashing
    }

    fn after_physics(&mut self, body: &mut PhysicsBody, movement: Vec2) -> (Action, Vec<ParticleSpawn>) {
        self.air_time += 1;
        if body.collisions.down {
            self.air_time = 0;
            self.jumps = self.tuning.max_jumps;
        }

        let action = if self.air_time > self.tuning.air_time_threshold {
            Action::Jump
        } else if movement.x != 0.0 {
            Action::Run
        } else {
            Action::Idle
        };

        let mut spawns = Vec::new();
        let full = self.tuning.dash_duration;
        let fast_until = full - 10;
        let magnitude = self.dashing.abs();
        if magnitude == full || magnitude == fast_until {
            spawns.extend(particle::burst(body.center(), DASH_BURST));
        }

        self.dashing -= self.dashing.signum();

        let magnitude = self.dashing.abs();
        if magnitude > fast_until {
            let direction = self.dashing.signum() as f32;
            body.vel.x = direction * self.tuning.dash_speed;
            if magnitude == fast_until + 1 {
                body.vel.x *= 0.1;
            }
            spawns.push(ParticleSpawn {
                kind: ParticleKind::Spark,
                pos: body.center(),
                vel: vec2(direction * gen_range(0.0, 3.0), 0.0),
                frame: gen_range(0, 7),
            });
        }

        (action, spawns)
    }

    fn jump(&mut self, body: &mut PhysicsBody) -> bool {
        if self.jumps == 0 {
            return false;
        }
        body.vel.y = self.tuning.jump_velocity;
        self.jumps -= 1;
        self.air_time = self.tuning.air_time_threshold + 1;
        true
    }

    fn dash(&mut self, facing_left: bool) -> bool {
        if self.dashing != 0 {
            return false;
        }
        let full = self.tuning.dash_duration;
        self.dashing = if facing_left { -full } else { full };
        true
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub kind: String,
    pub body: PhysicsBody,
    pub flip: bool,
    pub controller: Controller,
    action: Action,
    animation: Animation,
    animations: AnimationSet,
}

impl Entity {
    pub fn new(kind: &str, pos: Vec2, size: Vec2, animations: AnimationSet) -> Self {
        let animation = animations.instantiate(Action::Idle);
        Self {
            kind: kind.to_string(),
            body: PhysicsBody::new(pos, size),
            flip: false,
            controller: Controller::Passive,
            action: Action::Idle,
            animation,
            animations,
        }
    }

    pub fn player(pos: Vec2, tuning: &PlayerConfig, animations: AnimationSet) -> Self {
        let mut entity = Self::new("player", pos, tuning.size(), animations);
        entity.controller = Controller::Player(PlayerController::new(tuning.clone()));
        entity
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    pub fn set_action(&mut self, action: Action) {
        if action != self.action {
            self.action = action;
            self.animation = self.animations.instantiate(action);
        }
    }

    /// Physics, facing, controller logic, then animation. Returns any
    /// particles the entity wants spawned this step.
    pub fn update(&mut self, map: &Tilemap, movement: Vec2, physics: &PhysicsConfig) -> Vec<ParticleSpawn> {
        self.body.step(map, movement, physics);

        if movement.x > 0.0 {
            self.flip = false;
        }
        if movement.x < 0.0 {
            self.flip = true;
        }

        let spawns = match &mut self.controller {
            Controller::Passive => Vec::new(),
            Controller::Player(player) => {
                let (action, spawns) = player.after_physics(&mut self.body, movement);
                self.set_action(action);
                spawns
            }
        };

        self.animation.update();
        spawns
    }

    /// Only players jump.
    pub fn jump(&mut self) -> bool {
        match &mut self.controller {
            Controller::Player(player) => player.jump(&mut self.body),
            Controller::Passive => false,
        }
    }

    /// Starts a dash in the facing direction unless one is running.
    pub fn dash(&mut self) -> bool {
        let facing_left = self.flip;
        match &mut self.controller {
            Controller::Player(player) => player.dash(facing_left),
            Controller::Passive => false,
        }
    }

    pub fn is_dashing(&self) -> bool {
        matches!(&self.controller, Controller::Player(player) if player.dashing != 0)
    }
}
