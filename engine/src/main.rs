//! Hazard Engine demo host
//!
//! Plays the host server: loads a config, scatters creatures and players
//! around the configured sources, then runs the tick clock for a while.
//!
//! Usage: hazard-engine [config.json] [seconds]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use engine::{DamageSource, EngineConfig, HecsWorld, Location, TickDriver, TickReport};
use engine::clock::ClockRunner;
use rand::Rng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) => EngineConfig::load_from_file(Path::new(&path))?,
        None => EngineConfig::default(),
    };
    let seconds: u64 = match args.next() {
        Some(s) => s.parse()?,
        None => 5,
    };

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Hazard engine starting ({:?} mode)...", config.execution_mode);

    if config.sources.is_empty() {
        config.sources = demo_sources();
    }

    let world = Arc::new(HecsWorld::new(config.region_size));
    populate(&world, &config.sources, config.damage_radius);
    info!("World populated. Entity count: {}", world.entity_count());

    let driver = Arc::new(TickDriver::from_config(&config, world.clone())?);
    let report = driver.registry().register_all(config.sources.clone());
    info!(
        "Registered {} damage sources ({} rejected)",
        report.registered,
        report.failed.len()
    );

    let totals = Arc::new(Mutex::new(TickReport::default()));
    let totals_for_callback = Arc::clone(&totals);

    let mut runner = ClockRunner::new();
    runner.start(Arc::clone(&driver), config.tick_interval_ms, move |report| {
        let mut t = totals_for_callback.lock().unwrap_or_else(|e| e.into_inner());
        t.accumulate(&report);
    });

    thread::sleep(Duration::from_secs(seconds));
    runner.stop();

    let t = *totals.lock().unwrap_or_else(|e| e.into_inner());
    info!(
        "Run complete: {} ticks, {} countdown steps, {} damage passes, {} applications dispatched, {} dropped, {} failed",
        t.tick, t.advanced, t.due, t.dispatched, t.dropped, t.failed
    );

    Ok(())
}

fn demo_sources() -> Vec<DamageSource> {
    vec![
        DamageSource::new("cactus-farm", Location::new("overworld", 0.0, 64.0, 0.0), 1.0, 10),
        DamageSource::new("magma-pit", Location::new("overworld", 300.0, 12.0, -40.0), 4.0, 20),
        DamageSource::new("soul-fire", Location::new("nether", -20.0, 70.0, 5.0), 2.0, 40),
    ]
}

/// A few creatures on top of each source and a player standing nearby
fn populate(world: &HecsWorld, sources: &[DamageSource], radius: f64) {
    let mut rng = rand::thread_rng();
    for source in sources {
        let at = &source.location;
        for _ in 0..rng.gen_range(2..6) {
            let offset = rng.gen_range(-radius..=radius) * 0.5;
            world.spawn_creature(
                Location::new(at.world.clone(), at.x + offset, at.y, at.z - offset),
                20.0,
            );
        }
        world.spawn_actor(
            format!("player-{}", source.identifier),
            Location::new(at.world.clone(), at.x + 4.0, at.y, at.z),
            20.0,
        );
    }
}
