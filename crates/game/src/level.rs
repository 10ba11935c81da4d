//! Level construction and management.
//!
//! Levels are authored in world units (cm, Z up). The floor top sits at
//! `z = 0` in the built-in arenas.

use bhop_physics::collision::SurfaceMaterial;
use bhop_physics::{CollisionWorld, ContentFlags};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A game level containing collision geometry and spawn points.
#[derive(Debug)]
pub struct Level {
    /// Level identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Collision world for physics.
    pub collision: CollisionWorld,

    /// Player spawn points.
    pub spawn_points: Vec<SpawnPoint>,

    /// Trigger volumes.
    pub triggers: Vec<TriggerVolume>,
}

/// A spawn point for players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Capsule centre in world space.
    pub position: Vec3,

    /// Initial facing direction (yaw in radians).
    pub facing: f32,
}

/// A trigger volume that fires events when entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerVolume {
    /// Center position.
    pub position: Vec3,

    /// Half-extents of the trigger box.
    pub half_extents: Vec3,

    /// Trigger identifier for events.
    pub trigger_id: String,

    /// Whether this trigger can fire multiple times.
    pub repeatable: bool,

    /// Whether this trigger has been activated.
    pub activated: bool,
}

impl TriggerVolume {
    fn contains(&self, position: Vec3) -> bool {
        let offset = (position - self.position).abs();
        offset.cmple(self.half_extents).all()
    }
}

const ARENA_HALF_SIZE: f32 = 2000.0;
const WALL_HEIGHT: f32 = 400.0;
const WALL_THICKNESS: f32 = 16.0;
const FLOOR_THICKNESS: f32 = 32.0;
const STAIR_RISE: f32 = 16.0;
const STAIR_RUN: f32 = 32.0;

impl Level {
    /// Create an empty level.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            collision: CollisionWorld::new(),
            spawn_points: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Flat walled arena with a ramp, a staircase, a slick patch and a pool.
    pub fn test_arena() -> Self {
        let mut level = Self::new("test_arena", "Test Arena");
        level.add_floor(ARENA_HALF_SIZE);
        level.add_walls(ARENA_HALF_SIZE);

        // 25° ramp rising along +X
        let ramp_angle = 25.0_f32.to_radians();
        let ramp_half = Vec3::new(300.0, 200.0, 10.0);
        let ramp_top = 2.0 * ramp_half.x * ramp_angle.sin();
        level.collision.add_oriented_box(
            Vec3::new(600.0, 800.0, ramp_top / 2.0 - ramp_half.z),
            ramp_half,
            Quat::from_rotation_y(-ramp_angle),
            ContentFlags::SOLID,
            None,
        );

        // Staircase
        for step in 0..6 {
            let top = STAIR_RISE * (step + 1) as f32;
            level.collision.add_box(
                Vec3::new(800.0 + STAIR_RUN * step as f32, -800.0, top / 2.0),
                Vec3::new(STAIR_RUN / 2.0, 150.0, top / 2.0),
                ContentFlags::SOLID,
            );
        }

        // Slick patch, a thin plate over the floor
        level.collision.add_box_with_material(
            Vec3::new(0.0, 1200.0, 1.0),
            Vec3::new(300.0, 300.0, 1.0),
            ContentFlags::SOLID,
            SurfaceMaterial { friction: 0.2 },
        );

        // Pool of water sitting on the floor
        level.collision.add_box(
            Vec3::new(-1000.0, -1000.0, 150.0),
            Vec3::new(250.0, 250.0, 150.0),
            ContentFlags::WATER,
        );

        level.spawn_points.push(SpawnPoint {
            position: Vec3::new(-1500.0, 0.0, 100.0),
            facing: 0.0,
        });
        level.spawn_points.push(SpawnPoint {
            position: Vec3::new(1500.0, 0.0, 100.0),
            facing: std::f32::consts::PI,
        });

        level
    }

    /// Long straight runway for bunny-hop runs, with a finish zone.
    pub fn bhop_course() -> Self {
        let mut level = Self::new("bhop_course", "Bhop Course");
        let length = 8000.0;

        level.collision.add_box(
            Vec3::new(length / 2.0, 0.0, -FLOOR_THICKNESS / 2.0),
            Vec3::new(length / 2.0 + 500.0, 800.0, FLOOR_THICKNESS / 2.0),
            ContentFlags::SOLID,
        );

        level.spawn_points.push(SpawnPoint {
            position: Vec3::new(0.0, 0.0, 100.0),
            facing: 0.0,
        });

        level.triggers.push(TriggerVolume {
            position: Vec3::new(length, 0.0, 200.0),
            half_extents: Vec3::new(100.0, 800.0, 200.0),
            trigger_id: "finish".to_string(),
            repeatable: false,
            activated: false,
        });

        level
    }

    fn add_floor(&mut self, half_size: f32) {
        self.collision.add_box(
            Vec3::new(0.0, 0.0, -FLOOR_THICKNESS / 2.0),
            Vec3::new(half_size, half_size, FLOOR_THICKNESS / 2.0),
            ContentFlags::SOLID,
        );
    }

    fn add_walls(&mut self, half_size: f32) {
        let z = WALL_HEIGHT / 2.0;
        let long = Vec3::new(half_size, WALL_THICKNESS, z);
        let wide = Vec3::new(WALL_THICKNESS, half_size, z);

        self.collision.add_box(Vec3::new(0.0, half_size, z), long, ContentFlags::SOLID);
        self.collision.add_box(Vec3::new(0.0, -half_size, z), long, ContentFlags::SOLID);
        self.collision.add_box(Vec3::new(half_size, 0.0, z), wide, ContentFlags::SOLID);
        self.collision.add_box(Vec3::new(-half_size, 0.0, z), wide, ContentFlags::SOLID);
    }

    /// Get a player spawn point.
    pub fn get_player_spawn(&self, index: usize) -> Option<&SpawnPoint> {
        self.spawn_points.get(index)
    }

    /// Get the number of player spawn points.
    pub fn player_spawn_count(&self) -> usize {
        self.spawn_points.len()
    }

    /// Check if a point is inside any trigger volume.
    pub fn check_triggers(&mut self, position: Vec3) -> Vec<String> {
        let mut triggered = Vec::new();

        for trigger in &mut self.triggers {
            if trigger.activated && !trigger.repeatable {
                continue;
            }

            if trigger.contains(position) {
                trigger.activated = true;
                triggered.push(trigger.trigger_id.clone());
            }
        }

        triggered
    }
}
