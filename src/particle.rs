use macroquad::prelude::*;
use macroquad::rand::gen_range;

use crate::animation::Animation;
use crate::tilemap::Tile;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleKind {
    Leaf,
    Spark,
}

impl ParticleKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Spark => "particle",
        }
    }

    fn frame_duration(self) -> usize {
        match self {
            Self::Leaf => 20,
            Self::Spark => 6,
        }
    }
}

/// A request to create a particle, produced by entities and emitters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleSpawn {
    pub kind: ParticleKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub frame: usize,
}

#[derive(Clone, Debug)]
pub struct Particle {
    pub kind: ParticleKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub animation: Animation,
}

impl Particle {
    /// Returns `true` once the animation has finished and the particle
    /// should be dropped.
    pub fn update(&mut self) -> bool {
        let kill = self.animation.is_done();
        self.pos += self.vel;
        self.animation.update();
        kill
    }
}

pub struct ParticleSystem {
    particles: Vec<Particle>,
    leaf_frames: usize,
    spark_frames: usize,
}

impl ParticleSystem {
    pub fn new(leaf_frames: usize, spark_frames: usize) -> Self {
        Self {
            particles: Vec::new(),
            leaf_frames: leaf_frames.max(1),
            spark_frames: spark_frames.max(1),
        }
    }

    pub fn spawn(&mut self, spawn: ParticleSpawn) {
        let frames = match spawn.kind {
            ParticleKind::Leaf => self.leaf_frames,
            ParticleKind::Spark => self.spark_frames,
        };
        let animation = Animation::new(frames, spawn.kind.frame_duration(), false).starting_at(spawn.frame);
        self.particles.push(Particle {
            kind: spawn.kind,
            pos: spawn.pos,
            vel: spawn.vel,
            animation,
        });
    }

    pub fn extend(&mut self, spawns: impl IntoIterator<Item = ParticleSpawn>) {
        for spawn in spawns {
            self.spawn(spawn);
        }
    }

    /// Leaves sway sideways with their animation phase.
    pub fn update(&mut self) {
        self.particles.retain_mut(|particle| {
            let kill = particle.update();
            if particle.kind == ParticleKind::Leaf {
                particle.pos.x += (particle.animation.frame() as f32 * 0.035).sin() * 0.3;
            }
            !kill
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Areas under tree canopies that drop leaves.
pub struct LeafEmitters {
    rects: Vec<Rect>,
}

impl LeafEmitters {
    pub fn from_trees(trees: &[Tile]) -> Self {
        Self {
            rects: trees
                .iter()
                .map(|tree| Rect::new(tree.pos.x + 4.0, tree.pos.y + 4.0, 23.0, 13.0))
                .collect(),
        }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Larger canopies drop leaves more often.
    pub fn emit(&self) -> Vec<ParticleSpawn> {
        let mut spawns = Vec::new();
        for rect in &self.rects {
            if gen_range(0.0, 49999.0) < rect.w * rect.h {
                spawns.push(ParticleSpawn {
                    kind: ParticleKind::Leaf,
                    pos: vec2(
                        rect.x + gen_range(0.0, rect.w),
                        rect.y + gen_range(0.0, rect.h),
                    ),
                    vel: vec2(-0.1, 0.3),
                    frame: gen_range(0, 20),
                });
            }
        }
        spawns
    }
}

/// A ring of sparks flying outward from `pos`.
pub fn burst(pos: Vec2, count: usize) -> Vec<ParticleSpawn> {
    (0..count)
        .map(|_| {
            let angle = gen_range(0.0, std::f32::consts::TAU);
            let speed = gen_range(0.5, 1.0);
            ParticleSpawn {
                kind: ParticleKind::Spark,
                pos,
                vel: vec2(angle.cos(), angle.sin()) * speed,
                frame: gen_range(0, 7),
            }
        })
        .collect()
}
