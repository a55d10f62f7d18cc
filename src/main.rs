use std::collections::HashMap;
use std::path::Path;

use macroquad::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tilefall::animation::Animation;
use tilefall::assets::{TextureLibrary, load_texture_dir};
use tilefall::clouds::Clouds;
use tilefall::entity::{Action, AnimationSet, Entity};
use tilefall::particle::{LeafEmitters, ParticleKind, ParticleSystem};
use tilefall::{GameConfig, LevelError, TileRules, Tilemap};

const CAMERA_DRAG: f32 = 5.0;
const VIEW_HEIGHT: f32 = 240.0;
const CONFIG_PATH: &str = "src/config/game.yaml";
const ASSET_ROOT: &str = "src/assets";
const TILE_KINDS: [&str; 5] = ["decor", "grass", "large_decor", "stone", "spawners"];
const PLAYER_SPAWNER: (&str, usize) = ("spawners", 0);
const TREE: (&str, usize) = ("large_decor", 2);
const PLAYER_SPRITE_OFFSET: Vec2 = Vec2::new(-3.0, -3.0);
const SKY: Color = Color::new(0.55, 0.72, 0.86, 1.0);

fn window_conf() -> Conf {
    Conf {
        window_title: "tilefall".to_owned(),
        window_width: 640,
        window_height: 480,
        sample_count: 1,
        ..Default::default()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Frames for everything that is not a tile.
struct Sprites {
    player: HashMap<Action, Vec<Texture2D>>,
    particles: HashMap<ParticleKind, Vec<Texture2D>>,
    clouds: Vec<Texture2D>,
}

impl Sprites {
    async fn load(root: &Path) -> Self {
        let mut player = HashMap::new();
        for action in [Action::Idle, Action::Run, Action::Jump] {
            let frames = load_texture_dir(&root.join("entities/player").join(action.name())).await;
            player.insert(action, frames);
        }
        let mut particles = HashMap::new();
        for kind in [ParticleKind::Leaf, ParticleKind::Spark] {
            let frames = load_texture_dir(&root.join("particles").join(kind.name())).await;
            particles.insert(kind, frames);
        }
        let clouds = load_texture_dir(&root.join("clouds")).await;
        Self {
            player,
            particles,
            clouds,
        }
    }

    fn frame_count(&self, action: Action) -> usize {
        self.player.get(&action).map_or(0, Vec::len)
    }

    fn player_animations(&self) -> AnimationSet {
        let defaults = AnimationSet::default();
        if [Action::Idle, Action::Run, Action::Jump]
            .iter()
            .any(|&action| self.frame_count(action) == 0)
        {
            return defaults;
        }
        AnimationSet::new()
            .with(Action::Idle, Animation::new(self.frame_count(Action::Idle), 6, true))
            .with(Action::Run, Animation::new(self.frame_count(Action::Run), 4, true))
            .with(Action::Jump, Animation::new(self.frame_count(Action::Jump), 5, true))
    }

    fn particle_frames(&self, kind: ParticleKind, fallback: usize) -> usize {
        match self.particles.get(&kind).map_or(0, Vec::len) {
            0 => fallback,
            n => n,
        }
    }
}

/// Level state that is rebuilt whenever a level is (re)loaded.
struct Level {
    player: Entity,
    leaves: LeafEmitters,
}

impl Level {
    fn spawn(map: &mut Tilemap, config: &GameConfig, animations: AnimationSet) -> Self {
        let spawn = map
            .extract(&[PLAYER_SPAWNER], true)
            .first()
            .map_or_else(|| config.player.spawn(), |tile| tile.pos);
        let trees = map.extract(&[TREE], true);
        info!(x = spawn.x, y = spawn.y, trees = trees.len(), "level spawned");
        Self {
            player: Entity::player(spawn, &config.player, animations),
            leaves: LeafEmitters::from_trees(&trees),
        }
    }
}

/// The starting map and whether saving to `level_path` is allowed. A level
/// file that exists but fails to load must not be overwritten by the demo.
fn load_level(config: &GameConfig) -> (Tilemap, bool) {
    let mut map = Tilemap::from_config(&config.tiles);
    let rules = TileRules::new(&config.tiles.solid, &config.tiles.autotile);
    match map.load_from(&config.level_path) {
        Ok(()) => (map, true),
        Err(LevelError::FileAbsent(path)) => {
            info!(path = %path.display(), "no level file, starting from the demo layout");
            (Tilemap::demo(config.tiles.tile_size, rules), true)
        }
        Err(err) => {
            error!(path = %config.level_path, "level load failed, saving disabled until a level loads: {err}");
            (Tilemap::demo(config.tiles.tile_size, rules), false)
        }
    }
}

fn tile_color(kind: &str) -> Color {
    match kind {
        "grass" => Color::from_hex(0x4c9a2a),
        "stone" => Color::from_hex(0x7a7a84),
        "large_decor" => Color::from_hex(0x2f5d2a),
        _ => Color::from_hex(0xb58f5a),
    }
}

fn draw_tile(textures: &TextureLibrary, kind: &str, variant: usize, pos: Vec2, tile_size: f32) {
    match textures.get(kind, variant) {
        Some(texture) => draw_texture(texture, pos.x, pos.y, WHITE),
        None => draw_rectangle(pos.x, pos.y, tile_size, tile_size, tile_color(kind)),
    }
}

fn draw_map(map: &Tilemap, textures: &TextureLibrary, view: Rect) {
    let tile_size = map.tile_size() as f32;
    for tile in map.offgrid_tiles() {
        if tile.kind != PLAYER_SPAWNER.0 {
            draw_tile(textures, &tile.kind, tile.variant, tile.pos, tile_size);
        }
    }
    for tile in map.grid_tiles() {
        let pos = tile.pos.to_world(tile_size);
        if tile.kind == PLAYER_SPAWNER.0 || !view.overlaps(&Rect::new(pos.x, pos.y, tile_size, tile_size)) {
            continue;
        }
        draw_tile(textures, &tile.kind, tile.variant, pos, tile_size);
    }
}

fn draw_player(player: &Entity, sprites: &Sprites) {
    let frame = sprites
        .player
        .get(&player.action())
        .and_then(|frames| frames.get(player.animation().image_index()));
    match frame {
        Some(texture) => {
            let pos = player.body.pos + PLAYER_SPRITE_OFFSET;
            draw_texture_ex(
                texture,
                pos.x,
                pos.y,
                WHITE,
                DrawTextureParams {
                    flip_x: player.flip,
                    ..Default::default()
                },
            );
        }
        None => {
            let rect = player.body.rect();
            draw_rectangle(rect.x, rect.y, rect.w, rect.h, Color::from_hex(0xe0e0ff));
        }
    }
}

fn draw_particles(particles: &ParticleSystem, sprites: &Sprites) {
    for particle in particles.iter() {
        let frame = sprites
            .particles
            .get(&particle.kind)
            .and_then(|frames| frames.get(particle.animation.image_index()));
        match frame {
            Some(texture) => {
                let size = texture.size();
                draw_texture(texture, particle.pos.x - size.x * 0.5, particle.pos.y - size.y * 0.5, WHITE);
            }
            None => {
                let color = match particle.kind {
                    ParticleKind::Leaf => Color::from_hex(0x6fbf3a),
                    ParticleKind::Spark => WHITE,
                };
                draw_rectangle(particle.pos.x - 1.0, particle.pos.y - 1.0, 2.0, 2.0, color);
            }
        }
    }
}

fn draw_clouds(clouds: &Clouds, sprites: &Sprites, view: Rect) {
    let origin = vec2(view.x, view.y);
    let view_size = vec2(view.w, view.h);
    for cloud in clouds.iter() {
        let texture = sprites.clouds.get(cloud.sprite);
        let size = texture.map_or(vec2(32.0, 14.0), Texture2D::size);
        let pos = origin + cloud.render_position(origin, view_size, size);
        match texture {
            Some(texture) => draw_texture(texture, pos.x, pos.y, WHITE),
            None => draw_rectangle(pos.x, pos.y, size.x, size.y, Color::new(1.0, 1.0, 1.0, 0.6)),
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    init_tracing();

    let config = GameConfig::load_from(CONFIG_PATH).unwrap_or_else(|err| {
        warn!("config load failed, using defaults: {err}");
        GameConfig::with_defaults()
    });

    let root = Path::new(ASSET_ROOT);
    let textures = TextureLibrary::load_from(root.join("tiles"), &TILE_KINDS).await;
    let sprites = Sprites::load(root).await;

    let (mut map, mut save_allowed) = load_level(&config);
    let mut level = Level::spawn(&mut map, &config, sprites.player_animations());
    let mut particles = ParticleSystem::new(
        sprites.particle_frames(ParticleKind::Leaf, 18),
        sprites.particle_frames(ParticleKind::Spark, 4),
    );
    let mut clouds = Clouds::new(&config.clouds, sprites.clouds.len());

    let mut camera = Camera2D {
        target: level.player.body.center(),
        zoom: camera_zoom_for_fov(VIEW_HEIGHT),
        ..Default::default()
    };

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if is_key_pressed(KeyCode::F5) {
            if save_allowed {
                match map.save_to(&config.level_path) {
                    Ok(()) => info!(path = %config.level_path, "level saved"),
                    Err(err) => error!("save failed: {err}"),
                }
            } else {
                warn!(path = %config.level_path, "refusing to overwrite a level that failed to load");
            }
        }
        if is_key_pressed(KeyCode::F9) {
            match map.load_from(&config.level_path) {
                Ok(()) => {
                    save_allowed = true;
                    level = Level::spawn(&mut map, &config, sprites.player_animations());
                    camera.target = level.player.body.center();
                }
                Err(err) => error!("load failed: {err}"),
            }
        }
        if is_key_pressed(KeyCode::T) {
            let changed = map.autotile();
            info!(changed, "autotiled");
        }

        let mut direction = 0.0;
        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            direction -= 1.0;
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            direction += 1.0;
        }
        if is_key_pressed(KeyCode::Space) || is_key_pressed(KeyCode::W) || is_key_pressed(KeyCode::Up) {
            level.player.jump();
        }
        if is_key_pressed(KeyCode::X) {
            level.player.dash();
        }

        let movement = vec2(direction * config.player.speed, 0.0);
        let spawns = level.player.update(&map, movement, &config.physics);
        particles.extend(spawns);
        particles.extend(level.leaves.emit());
        particles.update();
        clouds.update();

        camera.zoom = camera_zoom_for_fov(VIEW_HEIGHT);
        let follow = 1.0 - (-CAMERA_DRAG * get_frame_time()).exp();
        camera.target += (level.player.body.center() - camera.target) * follow;
        let view = camera_view_rect(camera.target, VIEW_HEIGHT);

        set_camera(&camera);
        clear_background(SKY);
        draw_clouds(&clouds, &sprites, view);
        draw_map(&map, &textures, view);
        draw_player(&level.player, &sprites);
        draw_particles(&particles, &sprites);

        set_default_camera();
        draw_text("F5 save  F9 load  T autotile", 10.0, 20.0, 20.0, WHITE);

        next_frame().await;
    }
}

fn camera_zoom_for_fov(view_height: f32) -> Vec2 {
    let view_h = view_height.max(1.0);
    let aspect = screen_width().max(1.0) / screen_height().max(1.0);
    let view_w = view_h * aspect;
    vec2(2.0 / view_w, 2.0 / view_h)
}

fn camera_view_rect(target: Vec2, view_height: f32) -> Rect {
    let view_h = view_height.max(1.0);
    let view_w = view_h * screen_width().max(1.0) / screen_height().max(1.0);
    Rect::new(target.x - view_w * 0.5, target.y - view_h * 0.5, view_w, view_h)
}
