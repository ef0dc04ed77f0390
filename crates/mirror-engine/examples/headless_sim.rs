//! Headless simulation demo -- balls bounce inside a box and score points
//! every time they hit a wall.
//!
//! Run with:
//!   cargo run --example headless_sim -p mirror-engine [-- path/to/engine.json]
//!
//! Set `RUST_LOG=debug` (or `trace`) to see per-tick and per-system logs.

use anyhow::Context;
use mirror_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ARENA: f64 = 100.0;
const BALLS: usize = 500;
const TICKS: u64 = 600;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    dx: f64,
    dy: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bounces(u32);

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Integrates velocity into position.
fn movement(registry: &mut Registry, dt: f64) -> Result<(), SystemError> {
    registry.with_store_pair::<Position, Velocity, _>(|positions, velocities| {
        for (entity, pos) in positions.iter_mut() {
            if let Ok(vel) = velocities.get(entity) {
                pos.x += vel.dx * dt;
                pos.y += vel.dy * dt;
            }
        }
    });
    Ok(())
}

/// Reflects balls off the arena walls and counts the hits.
struct WallBounce {
    total: u64,
}

impl System for WallBounce {
    fn name(&self) -> &str {
        "wall_bounce"
    }

    fn update(&mut self, registry: &mut Registry, _dt: f64) -> Result<(), SystemError> {
        let mut hits = Vec::new();
        registry.with_store_pair::<Velocity, Position, _>(|velocities, positions| {
            for (entity, vel) in velocities.iter_mut() {
                let Ok(pos) = positions.get_mut(entity) else {
                    continue;
                };
                let mut hit = false;
                if pos.x < 0.0 || pos.x > ARENA {
                    vel.dx = -vel.dx;
                    pos.x = pos.x.clamp(0.0, ARENA);
                    hit = true;
                }
                if pos.y < 0.0 || pos.y > ARENA {
                    vel.dy = -vel.dy;
                    pos.y = pos.y.clamp(0.0, ARENA);
                    hit = true;
                }
                if hit {
                    hits.push(entity);
                }
            }
        });

        for entity in hits {
            registry.get_component_mut::<Bounces>(entity)?.0 += 1;
            self.total += 1;
        }
        Ok(())
    }

    fn shutdown(&mut self, _registry: &mut Registry) {
        info!(total = self.total, "wall_bounce finished");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(&path)
            .with_context(|| format!("loading engine config from {path}"))?,
        None => EngineConfig::default(),
    };

    let mut scheduler = Scheduler::from_config(config)?;
    let mut rng = Pcg64::seed_from_u64(0xB0B0);

    let registry = scheduler.registry_mut();
    for _ in 0..BALLS {
        let ball = registry.create_entity()?;
        registry.add_component(
            ball,
            Position {
                x: rng.gen_range(0.0..ARENA),
                y: rng.gen_range(0.0..ARENA),
            },
        )?;
        registry.add_component(
            ball,
            Velocity {
                dx: rng.gen_range(-40.0..40.0),
                dy: rng.gen_range(-40.0..40.0),
            },
        )?;
        registry.add_component(ball, Bounces::default())?;
    }

    scheduler.add_fn_system("movement", movement)?;
    scheduler.add_system(Box::new(WallBounce { total: 0 }))?;

    scheduler.start()?;
    scheduler.run_ticks(TICKS)?;

    let diag = scheduler.last_diagnostics();
    for (name, time) in &diag.system_times {
        info!(system = %name, ?time, "last tick timing");
    }

    let best = scheduler
        .registry()
        .try_store::<Bounces>()
        .and_then(|store| store.iter().max_by_key(|(_, b)| b.0))
        .map(|(entity, b)| (entity, b.0));
    if let Some((entity, bounces)) = best {
        info!(%entity, bounces, "most bounces");
    }

    info!(
        ticks = scheduler.tick_count(),
        sim_time = scheduler.sim_time(),
        entities = scheduler.registry().entity_count(),
        "simulation complete"
    );
    scheduler.shutdown();
    Ok(())
}
