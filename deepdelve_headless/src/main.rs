// Headless runner for the Deepdelve simulation.
//
// Loads a map snapshot (or builds the 5x5 demo cell: one claimed tile, one
// imp, walls all around), optionally marks walls for the player faction,
// steps the sim a fixed number of ticks at a fixed delta, and writes the
// resulting snapshot. Every event is logged at debug level through an
// observer on the sim's event bus; a per-kind tally is logged at the end.
//
// Usage:
//   deepdelve-headless [OPTIONS]
//     --map <PATH>       Snapshot JSON to load (default: demo cell)
//     --config <PATH>    GameConfig JSON (default: $DEEPDELVE_CONFIG_PATH or built-ins)
//     --ticks <N>        Steps to run (default: 600)
//     --delta <SECS>     Seconds per step (default: 0.1)
//     --seed <N>         PRNG seed (default: 1)
//     --mark <X,Y>       Mark a wall for the player faction (repeatable)
//     --out <PATH>       Write the final snapshot here
//
// Log verbosity comes from `RUST_LOG`, e.g.
// `RUST_LOG=deepdelve=debug deepdelve-headless --mark 2,1`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use deepdelve_sim::command::{SimAction, SimCommand};
use deepdelve_sim::config::GameConfig;
use deepdelve_sim::event::{SimEvent, SimObserver};
use deepdelve_sim::snapshot::{
    CreatureRecord, FactionRecord, MapSnapshot, NO_FACTION, NO_HEALTH, TileRecord,
};
use deepdelve_sim::types::{DEFAULT_WALL_HEALTH, Species, TilePos, TileType};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the Deepdelve simulation without a renderer", long_about = None)]
struct Args {
    /// Snapshot JSON to load instead of the demo cell
    #[arg(long)]
    map: Option<PathBuf>,

    /// GameConfig JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of steps to run
    #[arg(long, default_value_t = 600)]
    ticks: u32,

    /// Seconds of simulated time per step
    #[arg(long, default_value_t = 0.1)]
    delta: f32,

    /// PRNG seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Wall to mark for digging, as `x,y`
    #[arg(long = "mark", value_parser = parse_pos)]
    marks: Vec<TilePos>,

    /// Where to write the final snapshot
    #[arg(long)]
    out: Option<PathBuf>,
}

fn parse_pos(raw: &str) -> Result<TilePos, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{raw}'"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x in '{raw}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y in '{raw}': {e}"))?;
    Ok(TilePos::new(x, y))
}

/// 5x5 walls around one claimed tile with an imp on it.
fn demo_snapshot() -> MapSnapshot {
    let (width, height) = (5u32, 5u32);
    let center = TilePos::new(2, 2);
    let mut tiles = Vec::with_capacity((width * height) as usize);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let record = if TilePos::new(x, y) == center {
                TileRecord {
                    x,
                    y,
                    kind: TileType::Claimed,
                    faction: 0,
                    health: NO_HEALTH,
                    variation: 0,
                }
            } else {
                TileRecord {
                    x,
                    y,
                    kind: TileType::Wall,
                    faction: NO_FACTION,
                    health: DEFAULT_WALL_HEALTH,
                    variation: ((x * 7 + y * 3) % 4) as u8,
                }
            };
            tiles.push(record);
        }
    }
    MapSnapshot {
        width,
        height,
        tiles,
        factions: vec![FactionRecord {
            id: 0,
            name: "Keeper".into(),
            color: [0.75, 0.2, 0.2, 1.0],
            is_player: true,
            gold: 0,
        }],
        creatures: vec![CreatureRecord {
            species: Species::Imp,
            faction: 0,
            x: center.x,
            y: center.y,
            level: 1,
            xp: 0,
            health: 75.0,
            happiness: 100.0,
        }],
        claim_progress: Vec::new(),
        dig_markings: Vec::new(),
        portals: Vec::new(),
    }
}

/// Logs every event and counts them by kind.
struct EventLog {
    tally: Rc<RefCell<BTreeMap<&'static str, u64>>>,
}

impl SimObserver for EventLog {
    fn on_event(&mut self, event: &SimEvent) {
        let name = event.kind.name();
        tracing::debug!(target: "deepdelve::headless", tick = event.tick, event = name, kind = ?event.kind);
        *self.tally.borrow_mut().entry(name).or_default() += 1;
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !(args.delta > 0.0) {
        bail!("--delta must be positive, got {}", args.delta);
    }

    let config = match &args.config {
        Some(path) => GameConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GameConfig::load_from_env(),
    };

    let snapshot = match &args.map {
        Some(path) => MapSnapshot::from_file(path)
            .with_context(|| format!("Failed to read map {}", path.display()))?,
        None => demo_snapshot(),
    };
    let mut sim = snapshot
        .into_sim(config, args.seed)
        .context("Map snapshot is not loadable")?;

    let tally = Rc::new(RefCell::new(BTreeMap::new()));
    sim.subscribe(Box::new(EventLog {
        tally: Rc::clone(&tally),
    }));

    let player = sim
        .world
        .territory()
        .factions
        .player()
        .map(|f| f.id)
        .context("Map has no player faction")?;
    let mut commands: Vec<SimCommand> = args
        .marks
        .iter()
        .map(|&pos| SimCommand::new(player, SimAction::MarkDig { pos }))
        .collect();

    for _ in 0..args.ticks {
        sim.step(&commands, args.delta);
        commands.clear();
    }

    for (name, count) in tally.borrow().iter() {
        tracing::info!(target: "deepdelve::headless", event = *name, count = *count, "headless.tally");
    }
    tracing::info!(
        target: "deepdelve::headless",
        ticks = sim.tick,
        elapsed = sim.elapsed,
        creatures = sim.creatures.len(),
        "headless.finished"
    );

    if let Some(out) = &args.out {
        MapSnapshot::capture(&sim)
            .write_file(out)
            .with_context(|| format!("Failed to write snapshot to {}", out.display()))?;
        println!("Wrote {}", out.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepdelve_sim::types::FactionId;

    #[test]
    fn parses_positions() {
        assert_eq!(parse_pos("2,1"), Ok(TilePos::new(2, 1)));
        assert_eq!(parse_pos(" -3 , 4"), Ok(TilePos::new(-3, 4)));
        assert!(parse_pos("2").is_err());
        assert!(parse_pos("a,1").is_err());
    }

    #[test]
    fn demo_map_digs_out() {
        let mut sim = demo_snapshot().into_sim(GameConfig::default(), 1).unwrap();
        let wall = TilePos::new(2, 1);
        let mark = SimCommand::new(FactionId(0), SimAction::MarkDig { pos: wall });
        sim.step(&[mark], 0.1);
        for _ in 0..100 {
            sim.step(&[], 0.1);
        }
        assert!(sim.world.grid().is_walkable(wall));
    }
}
