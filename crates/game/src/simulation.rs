//! Game simulation - the main game loop.
//!
//! This module contains the deterministic fixed-tick simulation. Hosts feed
//! it wall-clock time through [`Simulation::update`], which runs as many
//! whole ticks as have accumulated, or step it directly with
//! [`Simulation::tick`].

use bhop_physics::{MovementEvent, MovementSimulator, TuningParameters};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::input::PlayerInput;
use crate::level::Level;
use crate::player::{EntityId, Player};

/// Game simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulation tick rate (ticks per second).
    pub tick_rate: u32,

    /// Movement tuning shared by every player.
    pub tuning: TuningParameters,

    /// Mouse sensitivity.
    pub mouse_sensitivity: f32,

    /// Most ticks one `update` call may run before dropping time.
    pub max_ticks_per_update: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 64,
            tuning: TuningParameters::default(),
            mouse_sensitivity: 2.0,
            max_ticks_per_update: 8,
        }
    }
}

impl SimulationConfig {
    /// Get the time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

/// Something that happened to a player during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Movement { player: EntityId, event: MovementEvent },
    Trigger { player: EntityId, trigger_id: String },
}

/// The main game simulation.
///
/// This contains all game state and advances it deterministically based on
/// player inputs.
#[derive(Debug)]
pub struct Simulation {
    /// Current frame/tick number.
    pub frame: u64,

    /// Simulation configuration.
    pub config: SimulationConfig,

    /// Current level.
    pub level: Level,

    /// All players in the game.
    pub players: Vec<Player>,

    /// Movement physics.
    simulator: MovementSimulator,

    /// Unsimulated wall-clock time (s).
    accumulator: f32,

    /// Next entity ID to assign.
    next_entity_id: EntityId,
}

impl Simulation {
    /// Create a new simulation with the given configuration and level.
    pub fn new(config: SimulationConfig, level: Level) -> Self {
        let simulator = MovementSimulator::new(config.tuning.clone());

        Self {
            frame: 0,
            config,
            level,
            players: Vec::new(),
            simulator,
            accumulator: 0.0,
            next_entity_id: 1,
        }
    }

    /// Create a simulation with default configuration and test arena.
    pub fn test() -> Self {
        Self::new(SimulationConfig::default(), Level::test_arena())
    }

    pub fn simulator(&self) -> &MovementSimulator {
        &self.simulator
    }

    /// Add a player to the simulation, settled onto the floor at a spawn point.
    ///
    /// Returns the player's ID.
    pub fn add_player(&mut self, name: &str) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;

        // Find a spawn point
        let spawn_index = self.players.len() % self.level.player_spawn_count().max(1);
        let spawn = self.level.get_player_spawn(spawn_index);

        let position = spawn.map(|s| s.position).unwrap_or(Vec3::ZERO);
        let facing = spawn.map(|s| s.facing).unwrap_or(0.0);

        let mut player = Player::new(id, name.to_string(), position, self.simulator.tuning());
        player.movement.view_angles.y = facing;
        self.simulator.spawn_at(&mut player.movement, position, &self.level.collision);

        log::info!("player {} '{}' joined at {:?}", id, name, player.position());
        self.players.push(player);
        id
    }

    /// Remove a player from the simulation.
    pub fn remove_player(&mut self, player_id: EntityId) {
        self.players.retain(|p| p.id != player_id);
    }

    /// Get a player by ID.
    pub fn get_player(&self, player_id: EntityId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Get a mutable reference to a player by ID.
    pub fn get_player_mut(&mut self, player_id: EntityId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Put a player back at their spawn point.
    pub fn respawn_player(&mut self, player_id: EntityId) -> bool {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return false;
        };
        let spawn_index = index % self.level.player_spawn_count().max(1);
        let position = self
            .level
            .get_player_spawn(spawn_index)
            .map(|s| s.position)
            .unwrap_or(Vec3::ZERO);

        let player = &mut self.players[index];
        player.respawn(position, self.simulator.tuning());
        self.simulator.spawn_at(&mut player.movement, position, &self.level.collision);
        true
    }

    /// Advance the simulation by one tick.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Player inputs indexed by player position in the `players` array
    pub fn tick(&mut self, inputs: &[PlayerInput]) -> Vec<GameEvent> {
        let delta_time = self.config.delta_time();
        let mut game_events = Vec::new();

        for (i, player) in self.players.iter_mut().enumerate() {
            // Get input for this player (default if not provided)
            let input = inputs.get(i).cloned().unwrap_or_default();
            let command = input.to_command(self.config.mouse_sensitivity);

            let previous_position = player.position();
            let events = self
                .simulator
                .advance_tick(&mut player.movement, &command, &self.level.collision, delta_time);
            player.record_tick(previous_position, &events);

            game_events.extend(events.into_iter().map(|event| GameEvent::Movement {
                player: player.id,
                event,
            }));

            for trigger_id in self.level.check_triggers(player.position()) {
                log::debug!("Player {} triggered: {}", player.id, trigger_id);
                player.stats.triggers.push(trigger_id.clone());
                game_events.push(GameEvent::Trigger {
                    player: player.id,
                    trigger_id,
                });
            }
        }

        self.frame += 1;
        game_events
    }

    /// Run every whole tick contained in `elapsed` plus leftover time.
    ///
    /// Time beyond `max_ticks_per_update` ticks is dropped. Returns the
    /// number of ticks run and their events.
    pub fn update(&mut self, elapsed: f32, inputs: &[PlayerInput]) -> (u32, Vec<GameEvent>) {
        let delta_time = self.config.delta_time();
        self.accumulator += elapsed.max(0.0);

        let mut ticks = 0;
        let mut events = Vec::new();
        while self.accumulator >= delta_time && ticks < self.config.max_ticks_per_update {
            events.extend(self.tick(inputs));
            self.accumulator -= delta_time;
            ticks += 1;
        }

        if self.accumulator >= delta_time {
            log::warn!(
                "simulation fell behind, dropping {:.3}s",
                self.accumulator - self.accumulator % delta_time
            );
            self.accumulator %= delta_time;
        }

        (ticks, events)
    }

    /// Fraction of a tick waiting in the accumulator, for render interpolation.
    pub fn interpolation_alpha(&self) -> f32 {
        self.accumulator / self.config.delta_time()
    }

    /// Get the delta time for this simulation.
    pub fn delta_time(&self) -> f32 {
        self.config.delta_time()
    }
}

// ============================================================================
// Tests
// ============================================================================
