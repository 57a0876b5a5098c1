// Faction registry.
//
// Factions are created when a map is loaded (see `snapshot.rs`) and the set
// is fixed for the rest of the session. Gold balances are the only mutable
// part; the sim itself never spends gold, but collaborators (UI, economy
// scripts) read and adjust it through `FactionTable::adjust_gold`.
//
// Storage is a `BTreeMap` keyed by `FactionId` so iteration (e.g. when the
// scheduler purges every faction's pending queue) is deterministic.

use crate::types::FactionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A contesting party: a player or an AI keeper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    /// RGBA, each channel in [0, 1].
    pub color: [f32; 4],
    pub is_player: bool,
    pub gold: i64,
}

#[derive(Clone, Debug, Default)]
pub struct FactionTable {
    factions: BTreeMap<FactionId, Faction>,
}

impl FactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a faction. Returns `false` (and keeps the existing entry) if
    /// the id is already taken.
    pub fn insert(&mut self, faction: Faction) -> bool {
        if self.factions.contains_key(&faction.id) {
            return false;
        }
        self.factions.insert(faction.id, faction);
        true
    }

    pub fn get(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn contains(&self, id: FactionId) -> bool {
        self.factions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.factions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.factions.keys().copied()
    }

    /// The first player-controlled faction, if any.
    pub fn player(&self) -> Option<&Faction> {
        self.factions.values().find(|f| f.is_player)
    }

    /// Add `amount` (may be negative) to a faction's gold. Returns the new
    /// balance, or `None` for an unknown faction.
    pub fn adjust_gold(&mut self, id: FactionId, amount: i64) -> Option<i64> {
        let faction = self.factions.get_mut(&id)?;
        faction.gold = faction.gold.saturating_add(amount);
        Some(faction.gold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keeper(id: u32, is_player: bool) -> Faction {
        Faction {
            id: FactionId(id),
            name: format!("Keeper {id}"),
            color: [1.0, 0.0, 0.0, 1.0],
            is_player,
            gold: 100,
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut table = FactionTable::new();
        assert!(table.insert(keeper(0, true)));
        let mut dup = keeper(0, false);
        dup.name = "Impostor".into();
        assert!(!table.insert(dup));
        assert_eq!(table.get(FactionId(0)).unwrap().name, "Keeper 0");
    }

    #[test]
    fn player_lookup_finds_player_faction() {
        let mut table = FactionTable::new();
        table.insert(keeper(3, false));
        table.insert(keeper(1, true));
        assert_eq!(table.player().map(|f| f.id), Some(FactionId(1)));
    }

    #[test]
    fn adjust_gold_unknown_faction_is_none() {
        let mut table = FactionTable::new();
        table.insert(keeper(0, true));
        assert_eq!(table.adjust_gold(FactionId(0), -30), Some(70));
        assert_eq!(table.adjust_gold(FactionId(9), 10), None);
    }
}
