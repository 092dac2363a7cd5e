//! Path following.
//!
//! An agent walks one graph step at a time. Each step costs
//! `ceil(ticks_per_move * difficulty)` ticks of travel; cost is only consumed
//! on ticks the agent is not resting.

use serde::{Deserialize, Serialize};
use war_events::TileId;

use crate::host::TileGraph;

/// Result of advancing a path by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// No active path
    Idle,
    Resting,
    Moving,
    /// The agent entered a new tile on the way
    Stepped(TileId),
    Arrived(TileId),
}

/// Movement state carried by every agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathState {
    pub destination: Option<TileId>,
    pub next_tile: Option<TileId>,
    /// Ticks of travel left before entering `next_tile`
    pub cost_left: u32,
    pub moving: bool,
}

impl PathState {
    /// Starts a path from `position`. Returns false if the destination cannot
    /// be reached, in which case the agent stops in place.
    pub fn start<G: TileGraph + ?Sized>(
        &mut self,
        graph: &G,
        position: TileId,
        destination: TileId,
        ticks_per_move: u32,
    ) -> bool {
        self.destination = Some(destination);
        self.moving = true;
        if position == destination {
            self.next_tile = None;
            self.cost_left = 0;
            return true;
        }
        match graph.next_step(position, destination) {
            Some(next) => {
                self.next_tile = Some(next);
                self.cost_left = step_cost(graph, position, next, ticks_per_move);
                true
            }
            None => {
                self.stop_dead();
                false
            }
        }
    }

    /// Halts in place and forgets the path.
    pub fn stop_dead(&mut self) {
        self.destination = None;
        self.next_tile = None;
        self.cost_left = 0;
        self.moving = false;
    }

    /// True while the last step into the destination is underway.
    pub fn on_final_step(&self) -> bool {
        self.moving && self.next_tile.is_some() && self.next_tile == self.destination
    }

    /// Consumes one tick of travel.
    pub fn advance<G: TileGraph + ?Sized>(
        &mut self,
        graph: &G,
        position: &mut TileId,
        ticks_per_move: u32,
        resting: bool,
    ) -> StepResult {
        if !self.moving {
            return StepResult::Idle;
        }
        let Some(destination) = self.destination else {
            self.stop_dead();
            return StepResult::Idle;
        };
        if *position == destination {
            self.stop_dead();
            return StepResult::Arrived(destination);
        }
        if resting {
            return StepResult::Resting;
        }

        let Some(next) = self.next_tile else {
            // Lost the planned step, replan from here
            if !self.start(graph, *position, destination, ticks_per_move) {
                return StepResult::Idle;
            }
            return StepResult::Moving;
        };

        self.cost_left = self.cost_left.saturating_sub(1);
        if self.cost_left > 0 {
            return StepResult::Moving;
        }

        *position = next;
        if next == destination {
            self.stop_dead();
            return StepResult::Arrived(destination);
        }
        match graph.next_step(next, destination) {
            Some(following) => {
                self.next_tile = Some(following);
                self.cost_left = step_cost(graph, next, following, ticks_per_move);
                StepResult::Stepped(next)
            }
            None => {
                self.stop_dead();
                StepResult::Idle
            }
        }
    }
}

fn step_cost<G: TileGraph + ?Sized>(graph: &G, from: TileId, to: TileId, ticks_per_move: u32) -> u32 {
    let cost = (ticks_per_move as f32 * graph.step_difficulty(from, to)).ceil() as u32;
    cost.max(1)
}
