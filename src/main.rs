//! Bunny-hop simulator - headless runner
//!
//! Runs a scripted strafe-jump along the bhop course and logs speed as it
//! builds up.
//!
//! ```text
//! bhop-sim [TUNING.json] [--ticks N] [--competitive]
//! ```

use anyhow::{bail, Context, Result};
use bhop_game::input::{ActionInput, MovementInput};
use bhop_game::{GameEvent, Level, PlayerInput, Simulation, SimulationConfig};
use bhop_physics::{MovementEvent, TuningParameters};

/// Ticks spent strafing one way before switching.
const STRAFE_PHASE_TICKS: u32 = 32;

/// Mouse pixels per tick while strafing.
const STRAFE_TURN_PIXELS: f32 = 20.0;

/// Ticks of plain forward running before the strafing starts.
const RUN_UP_TICKS: u32 = 32;

struct Options {
    tuning_path: Option<String>,
    ticks: u32,
    competitive: bool,
}

fn parse_args() -> Result<Options> {
    let mut options = Options {
        tuning_path: None,
        ticks: 640,
        competitive: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ticks" => {
                let value = args.next().context("--ticks needs a value")?;
                options.ticks = value.parse().with_context(|| format!("invalid tick count `{}`", value))?;
            }
            "--competitive" => options.competitive = true,
            flag if flag.starts_with("--") => bail!("unknown option `{}`", flag),
            path => options.tuning_path = Some(path.to_string()),
        }
    }
    Ok(options)
}

/// Scripted input: run up, then alternate strafes while turning into them, holding jump.
fn scripted_input(tick: u32) -> PlayerInput {
    let mut input = PlayerInput {
        frame: tick,
        actions: ActionInput {
            jump: tick >= RUN_UP_TICKS,
            ..Default::default()
        },
        ..Default::default()
    };

    if tick < RUN_UP_TICKS {
        input.movement.forward = true;
        return input;
    }

    let strafe_right = ((tick - RUN_UP_TICKS) / STRAFE_PHASE_TICKS) % 2 == 0;
    input.movement = MovementInput {
        right: strafe_right,
        left: !strafe_right,
        ..Default::default()
    };
    let turn = if strafe_right { STRAFE_TURN_PIXELS } else { -STRAFE_TURN_PIXELS };
    input.mouse_delta = (turn, 0.0);
    input
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;

    let tuning = match &options.tuning_path {
        Some(path) => {
            TuningParameters::load(path).with_context(|| format!("loading tuning from {}", path))?
        }
        None if options.competitive => TuningParameters::competitive(),
        None => TuningParameters::source(),
    };

    let config = SimulationConfig {
        tuning,
        ..Default::default()
    };
    let tick_rate = config.tick_rate;
    let mut simulation = Simulation::new(config, Level::bhop_course());
    let player_id = simulation.add_player("Runner");

    log::info!("running {} ticks at {} Hz", options.ticks, tick_rate);

    for tick in 0..options.ticks {
        let events = simulation.tick(&[scripted_input(tick)]);

        for event in &events {
            match event {
                GameEvent::Movement {
                    event: MovementEvent::Landed { impact_velocity },
                    ..
                } => log::debug!("tick {} landed at {:.1} cm/s down", tick, -impact_velocity.z),
                GameEvent::Trigger { trigger_id, .. } => log::info!("tick {} reached {}", tick, trigger_id),
                _ => {}
            }
        }

        if tick % tick_rate == 0 {
            if let Some(player) = simulation.get_player(player_id) {
                log::info!(
                    "t={:>5.2}s speed {:>7.1} cm/s  {:<8} pos {:.0?}",
                    tick as f32 / tick_rate as f32,
                    player.horizontal_speed(),
                    player.movement.contact().name(),
                    player.position()
                );
            }
        }
    }

    let player = simulation
        .get_player(player_id)
        .context("runner left the simulation")?;
    log::info!(
        "done: {} jumps, top speed {:.1} cm/s, distance {:.0} cm",
        player.stats.jumps,
        player.stats.top_speed,
        player.stats.distance
    );

    Ok(())
}
