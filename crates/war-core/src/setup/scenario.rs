//! Demo Scenario
//!
//! A small frontier map: the player's colony in the middle, outlander towns
//! to the north and south, a savage tribe in the west and a pirate camp in
//! the east, each within raiding distance of a neighbor.

use war_events::FactionId;

use super::grid::GridWorld;
use crate::host::CaravanId;

pub const PLAYER: FactionId = FactionId(0);
pub const TRIBE: FactionId = FactionId(1);
pub const CIVIL_OUTLANDERS: FactionId = FactionId(2);
pub const ROUGH_OUTLANDERS: FactionId = FactionId(3);
pub const PIRATES: FactionId = FactionId(4);

/// Builds the demo world. Faction definition names match the behavior table
/// shipped in the default configuration file.
pub fn demo_world() -> GridWorld {
    let mut world = GridWorld::new(64, 40);

    world.add_faction(PLAYER, "colony", true);
    world.add_faction(TRIBE, "tribe_savage", false);
    world.add_faction(CIVIL_OUTLANDERS, "outlander_civil", false);
    world.add_faction(ROUGH_OUTLANDERS, "outlander_rough", false);
    world.add_faction(PIRATES, "pirate", false);
    for enemy in [TRIBE, PIRATES] {
        if let Some(info) = world.faction_mut(enemy) {
            info.permanent_enemy = true;
        }
    }

    // === RELATIONS ===
    for enemy in [TRIBE, PIRATES] {
        world.set_hostile(enemy, PLAYER);
        world.set_hostile(enemy, CIVIL_OUTLANDERS);
        world.set_hostile(enemy, ROUGH_OUTLANDERS);
    }
    world.set_hostile(TRIBE, PIRATES);
    world.set_goodwill(CIVIL_OUTLANDERS, ROUGH_OUTLANDERS, 30);
    world.set_goodwill(CIVIL_OUTLANDERS, PLAYER, 20);
    world.set_goodwill(ROUGH_OUTLANDERS, PLAYER, 5);

    // === SETTLEMENTS ===
    let sites = [
        (32, 20, PLAYER),
        (38, 24, PLAYER),
        (24, 22, TRIBE),
        (14, 30, TRIBE),
        (40, 14, CIVIL_OUTLANDERS),
        (30, 8, CIVIL_OUTLANDERS),
        (26, 30, ROUGH_OUTLANDERS),
        (46, 28, PIRATES),
    ];
    for (x, y, faction) in sites {
        let tile = world.tile(x, y);
        world.add_settlement(tile, faction);
    }

    // Fertile river valley through the middle of the map
    for x in 16..48 {
        let tile = world.tile(x, 18);
        world.set_biome(tile, 0.5);
    }

    // Colony caravans on the road between its two settlements
    let roads = [(CaravanId(1), 33, 21, 800), (CaravanId(2), 36, 23, 1_500)];
    for (id, x, y, wealth) in roads {
        let tile = world.tile(x, y);
        world.add_caravan(id, tile, PLAYER, wealth);
    }

    world
}
