// Simulation events: the core's outbound notification stream.
//
// Every observable state change (tile type/owner, creature lifecycle and
// movement, task lifecycle, dig and claim progress) is reported as a
// `SimEvent`. Producers deep in the sim push `SimEventKind`s into an
// `EventSink`, which stamps them with the current tick. `SimState::step()`
// returns the collected events in its `StepResult` and also publishes them
// to any `SimObserver`s registered on the `EventBus`, so renderers, audio,
// and UI can subscribe without the producers knowing who listens.
//
// See also: `sim.rs` for the tick loop that drains the sink, `world.rs` and
// `handlers/` for the main producers.
//
// **Critical constraint: determinism.** Events are appended in the order
// the sim performs the underlying mutations, and observers run in
// registration order.

use crate::task::TaskKind;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An event emitted by the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

/// Everything the core reports to collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    TileTypeChanged {
        pos: TilePos,
        old: TileType,
        new: TileType,
    },
    TileOwnerChanged {
        pos: TilePos,
        old: Option<FactionId>,
        new: Option<FactionId>,
    },
    CreatureSpawned {
        creature_id: CreatureId,
        species: Species,
        faction: FactionId,
        pos: TilePos,
    },
    CreatureDespawned {
        creature_id: CreatureId,
    },
    /// The creature's discrete grid cell changed.
    CreatureMoved {
        creature_id: CreatureId,
        from: TilePos,
        to: TilePos,
    },
    CreatureStateChanged {
        creature_id: CreatureId,
        old: CreatureState,
        new: CreatureState,
    },
    CreatureLeveledUp {
        creature_id: CreatureId,
        level: u32,
    },
    /// Happiness crossed a 5% bucket boundary.
    CreatureHappinessChanged {
        creature_id: CreatureId,
        happiness: f32,
    },
    TaskStarted {
        task_id: TaskId,
        creature_id: CreatureId,
        kind: TaskKind,
        target: TilePos,
    },
    TaskCompleted {
        task_id: TaskId,
        creature_id: CreatureId,
        kind: TaskKind,
        target: TilePos,
    },
    /// A task was dropped before completion: explicit cancel, failure, or
    /// purge from a pending queue (no creature).
    TaskCancelled {
        task_id: TaskId,
        creature_id: Option<CreatureId>,
        kind: TaskKind,
        target: TilePos,
    },
    DigMarked {
        pos: TilePos,
        faction: FactionId,
    },
    DigUnmarked {
        pos: TilePos,
        faction: FactionId,
    },
    /// Displayed wall health changed.
    DigProgress {
        pos: TilePos,
        health: i32,
    },
    DigCompleted {
        pos: TilePos,
        faction: Option<FactionId>,
    },
    ClaimStarted {
        pos: TilePos,
        faction: FactionId,
    },
    /// `faction` is whoever leads the contest after the update.
    ClaimProgress {
        pos: TilePos,
        faction: FactionId,
        progress: f32,
    },
    ClaimCompleted {
        pos: TilePos,
        faction: FactionId,
    },
    SpeedChanged {
        speed: SimSpeed,
    },
}

impl SimEventKind {
    /// Stable dotted name, for logs and tallies.
    pub fn name(&self) -> &'static str {
        match self {
            SimEventKind::TileTypeChanged { .. } => "tile.type_changed",
            SimEventKind::TileOwnerChanged { .. } => "tile.owner_changed",
            SimEventKind::CreatureSpawned { .. } => "creature.spawned",
            SimEventKind::CreatureDespawned { .. } => "creature.despawned",
            SimEventKind::CreatureMoved { .. } => "creature.moved",
            SimEventKind::CreatureStateChanged { .. } => "creature.state_changed",
            SimEventKind::CreatureLeveledUp { .. } => "creature.leveled_up",
            SimEventKind::CreatureHappinessChanged { .. } => "creature.happiness_changed",
            SimEventKind::TaskStarted { .. } => "task.started",
            SimEventKind::TaskCompleted { .. } => "task.completed",
            SimEventKind::TaskCancelled { .. } => "task.cancelled",
            SimEventKind::DigMarked { .. } => "dig.marked",
            SimEventKind::DigUnmarked { .. } => "dig.unmarked",
            SimEventKind::DigProgress { .. } => "dig.progress",
            SimEventKind::DigCompleted { .. } => "dig.completed",
            SimEventKind::ClaimStarted { .. } => "claim.started",
            SimEventKind::ClaimProgress { .. } => "claim.progress",
            SimEventKind::ClaimCompleted { .. } => "claim.completed",
            SimEventKind::SpeedChanged { .. } => "sim.speed_changed",
        }
    }
}

/// Collects events during one step, stamping each with the current tick.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tick: u64,
    events: Vec<SimEvent>,
}

impl EventSink {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            events: Vec::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn emit(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            tick: self.tick,
            kind,
        });
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<SimEvent> {
        self.events
    }
}

/// A consumer of simulation events (renderer, audio, UI, log).
pub trait SimObserver {
    fn on_event(&mut self, event: &SimEvent);
}

/// Fan-out of events to registered observers.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn SimObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn publish(&mut self, events: &[SimEvent]) {
        for event in events {
            for observer in &mut self.observers {
                observer.on_event(event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<(usize, u64)>>>, usize);

    impl SimObserver for Recorder {
        fn on_event(&mut self, event: &SimEvent) {
            self.0.borrow_mut().push((self.1, event.tick));
        }
    }

    #[test]
    fn sink_stamps_current_tick() {
        let mut sink = EventSink::new(42);
        sink.emit(SimEventKind::SpeedChanged {
            speed: SimSpeed::Fast,
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].tick, 42);
        assert_eq!(sink.events()[0].kind.name(), "sim.speed_changed");
    }

    #[test]
    fn bus_fans_out_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Recorder(log.clone(), 0)));
        bus.subscribe(Box::new(Recorder(log.clone(), 1)));

        let events = vec![
            SimEvent {
                tick: 1,
                kind: SimEventKind::CreatureDespawned {
                    creature_id: CreatureId(3),
                },
            },
            SimEvent {
                tick: 2,
                kind: SimEventKind::DigMarked {
                    pos: TilePos::new(1, 1),
                    faction: FactionId(0),
                },
            },
        ];
        bus.publish(&events);
        assert_eq!(*log.borrow(), vec![(0, 1), (1, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = SimEvent {
            tick: 9,
            kind: SimEventKind::TileOwnerChanged {
                pos: TilePos::new(2, 3),
                old: None,
                new: Some(FactionId(1)),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let restored: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }
}
