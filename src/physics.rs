use macroquad::prelude::*;

use crate::config::PhysicsConfig;
use crate::tilemap::Tilemap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Sides that touched solid geometry during the most recent step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Collisions {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Collisions {
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// Strict AABB overlap; rects that only share an edge do not overlap.
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}

/// Pushes `rect` out of every obstacle it overlaps along one axis, in
/// obstacle order. The last overlap resolved decides the final edge.
/// Returns the resolved rect and the sides that were hit.
pub fn resolve_axis(mut rect: Rect, delta: f32, obstacles: &[Rect], axis: Axis) -> (Rect, Collisions) {
    let mut hits = Collisions::default();
    for obstacle in obstacles {
        if !rects_overlap(&rect, obstacle) {
            continue;
        }
        match axis {
            Axis::X => {
                if delta > 0.0 {
                    rect.x = obstacle.x - rect.w;
                    hits.right = true;
                }
                if delta < 0.0 {
                    rect.x = obstacle.x + obstacle.w;
                    hits.left = true;
                }
            }
            Axis::Y => {
                if delta > 0.0 {
                    rect.y = obstacle.y - rect.h;
                    hits.down = true;
                }
                if delta < 0.0 {
                    rect.y = obstacle.y + obstacle.h;
                    hits.up = true;
                }
            }
        }
    }
    (rect, hits)
}

/// Top-left anchored box moved against the tile grid one step at a time.
#[derive(Clone, Debug)]
pub struct PhysicsBody {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub collisions: Collisions,
    collision_scratch: Vec<Rect>,
}

impl PhysicsBody {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            size,
            collisions: Collisions::default(),
            collision_scratch: Vec::with_capacity(9),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.x, self.pos.y, self.size.x, self.size.y)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    /// One simulation step: X then Y against the grid, then gravity and
    /// horizontal decay. Flags only describe this step.
    pub fn step(&mut self, map: &Tilemap, movement: Vec2, config: &PhysicsConfig) {
        self.collisions = Collisions::default();
        let delta = movement + self.vel;

        self.pos.x += delta.x;
        self.move_axis(map, delta.x, Axis::X);

        self.pos.y += delta.y;
        self.move_axis(map, delta.y, Axis::Y);

        self.vel.y = (self.vel.y + config.gravity).min(config.terminal_velocity);
        if self.collisions.down || self.collisions.up {
            self.vel.y = 0.0;
        }

        let friction = config.horizontal_friction;
        if self.vel.x > 0.0 {
            self.vel.x = (self.vel.x - friction).max(0.0);
        } else {
            self.vel.x = (self.vel.x + friction).min(0.0);
        }
    }

    fn move_axis(&mut self, map: &Tilemap, delta: f32, axis: Axis) {
        map.fill_solid_rects(self.pos, &mut self.collision_scratch);
        let (resolved, hits) = resolve_axis(self.rect(), delta, &self.collision_scratch, axis);
        match axis {
            Axis::X => {
                self.pos.x = resolved.x;
                self.collisions.left |= hits.left;
                self.collisions.right |= hits.right;
            }
            Axis::Y => {
                self.pos.y = resolved.y;
                self.collisions.up |= hits.up;
                self.collisions.down |= hits.down;
            }
        }
    }
}
