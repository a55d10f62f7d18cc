use macroquad::prelude::*;
use macroquad::rand::gen_range;

use crate::config::CloudConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct Cloud {
    pub pos: Vec2,
    pub sprite: usize,
    pub speed: f32,
    pub depth: f32,
}

impl Cloud {
    pub fn update(&mut self) {
        self.pos.x += self.speed;
    }

    /// Screen-space position for a camera at `offset`. Deeper clouds follow
    /// the camera less; positions wrap so a cloud leaving one side of the
    /// view re-enters from the other without popping.
    pub fn render_position(&self, offset: Vec2, view: Vec2, sprite_size: Vec2) -> Vec2 {
        let parallax = self.pos - offset * self.depth;
        vec2(
            parallax.x.rem_euclid(view.x + sprite_size.x) - sprite_size.x,
            parallax.y.rem_euclid(view.y + sprite_size.y) - sprite_size.y,
        )
    }
}

pub struct Clouds {
    clouds: Vec<Cloud>,
}

impl Clouds {
    /// Random clouds drawn back to front.
    pub fn new(config: &CloudConfig, sprite_count: usize) -> Self {
        let sprite_count = sprite_count.max(1);
        let clouds = (0..config.count)
            .map(|_| Cloud {
                pos: vec2(gen_range(0.0, 99999.0), gen_range(0.0, 99999.0)),
                sprite: gen_range(0, sprite_count),
                speed: gen_range(config.min_speed, config.max_speed),
                depth: gen_range(config.min_depth, config.max_depth),
            })
            .collect();
        Self::from_clouds(clouds)
    }

    pub fn from_clouds(mut clouds: Vec<Cloud>) -> Self {
        clouds.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        Self { clouds }
    }

    pub fn update(&mut self) {
        for cloud in &mut self.clouds {
            cloud.update();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cloud> {
        self.clouds.iter()
    }
}
