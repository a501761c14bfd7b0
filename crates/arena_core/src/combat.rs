//! Combat state machine and damage rules.
//!
//! Every combatant carries a [`CombatStateMachine`]. Waiting is never a
//! suspended task: a state records when it was entered and
//! [`CombatStateMachine::advance`] re-checks elapsed time every tick.
//!
//! The wind-up to strike edge is not timed here. The battle schedules an
//! attack-resolution event at the wind-up boundary, and that event calls
//! [`CombatStateMachine::strike`] or [`CombatStateMachine::fizzle`].

use serde::{Deserialize, Serialize};

use crate::combatant::EntityId;
use crate::math::{from_micros, milli, to_micros, Fixed, HALF};
use crate::scheduler::EventHandle;

/// How long `Staggered` lasts.
pub const STAGGER_DURATION_MS: i32 = 500;
/// How long `KnockedBack` lasts.
pub const KNOCKBACK_DURATION_MS: i32 = 500;
/// How long `Stunned` lasts.
pub const STUN_DURATION_MS: i32 = 2000;
/// How long `Dodging` and `Parrying` last.
pub const EVADE_DURATION_MS: i32 = 300;

/// The action a combatant is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CombatState {
    /// Ready for orders.
    #[default]
    Idle,
    /// Preparing a weapon attack.
    WindUp,
    /// Strike in progress.
    Attack,
    /// Recovering after a strike.
    Recovery,
    /// Interrupted by a heavy hit.
    Staggered,
    /// Evading an incoming hit.
    Dodging,
    /// Deflecting an incoming hit.
    Parrying,
    /// Preparing a spell. Interruptible like `WindUp`.
    Casting,
    /// Walking to an ordered position.
    Moving,
    /// Thrown back by a blow.
    KnockedBack,
    /// Unable to act.
    Stunned,
    /// Closing distance on a target.
    Charging,
    /// Repositioning next to cover.
    TakingCover,
    /// Repositioning onto a target's flank.
    Flanking,
}

impl CombatState {
    /// States that a heavy hit can interrupt.
    #[must_use]
    pub const fn is_interruptible(self) -> bool {
        matches!(self, Self::WindUp | Self::Casting)
    }

    /// States driven by the movement controller; all end on arrival.
    #[must_use]
    pub const fn is_locomotion(self) -> bool {
        matches!(
            self,
            Self::Moving | Self::Charging | Self::TakingCover | Self::Flanking
        )
    }

    /// States from which a new attack or order may start.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Idle) || self.is_locomotion()
    }

    /// Fixed-length states and their duration in milliseconds.
    #[must_use]
    pub const fn fixed_duration_ms(self) -> Option<i32> {
        match self {
            Self::Staggered => Some(STAGGER_DURATION_MS),
            Self::KnockedBack => Some(KNOCKBACK_DURATION_MS),
            Self::Stunned => Some(STUN_DURATION_MS),
            Self::Dodging | Self::Parrying => Some(EVADE_DURATION_MS),
            _ => None,
        }
    }
}

/// Durations of the three sub-phases of one attack, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPhase {
    /// Time from starting the attack to the damage roll.
    #[serde(with = "crate::math::fixed_serde")]
    pub wind_up: Fixed,
    /// Length of the strike itself.
    #[serde(with = "crate::math::fixed_serde")]
    pub strike: Fixed,
    /// Time after the strike before the combatant is free again.
    #[serde(with = "crate::math::fixed_serde")]
    pub recovery: Fixed,
}

impl AttackPhase {
    /// Phase timings for a speed stat. Faster combatants have shorter
    /// phases, each with a floor.
    #[must_use]
    pub fn from_speed(speed: i32) -> Self {
        let factor = Fixed::from_num(speed) / Fixed::from_num(10);
        Self {
            wind_up: (milli(500) - milli(30) * factor).max(milli(200)),
            strike: (milli(200) - milli(10) * factor).max(milli(100)),
            recovery: (milli(700) - milli(40) * factor).max(milli(300)),
        }
    }

    /// Wind-up plus strike plus recovery.
    #[must_use]
    pub fn total(&self) -> Fixed {
        self.wind_up + self.strike + self.recovery
    }
}

/// Attack cooldown for a speed stat: `max(0.2, base · (1 − speed/100))`.
#[must_use]
pub fn attack_cooldown(base: Fixed, speed: i32) -> Fixed {
    let reduction = Fixed::ONE - Fixed::from_num(speed) / Fixed::from_num(100);
    (base * reduction).max(milli(200))
}

/// Probability that `raw_damage` interrupts a wind-up or cast.
///
/// `min(0.8, damage / (max_hp · 0.5)) − resistance / 100`, floored at 0.
#[must_use]
pub fn interrupt_chance(raw_damage: i32, max_hp: i32, resistance: Fixed) -> Fixed {
    if max_hp <= 0 {
        return Fixed::ZERO;
    }
    let half_hp = Fixed::from_num(max_hp) * HALF;
    let base = (Fixed::from_num(raw_damage) / half_hp).min(milli(800));
    (base - resistance / Fixed::from_num(100)).max(Fixed::ZERO)
}

/// Damage after defense, never below 1.
#[must_use]
pub fn mitigate(raw_damage: i32, defense: i32) -> i32 {
    raw_damage.saturating_sub(defense).max(1)
}

/// One state change, with the simulation time it took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    /// State left.
    pub from: CombatState,
    /// State entered.
    pub to: CombatState,
    /// Entry time of `to`.
    pub at: Fixed,
}

/// Per-combatant action lifecycle plus attack cooldown.
///
/// Cooldown gates starting an attack; the state governs the action in
/// progress. The two are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatStateMachine {
    state: CombatState,
    entered_at: Fixed,
    target: Option<EntityId>,
    pending_attack: Option<EventHandle>,
    cooldown: Fixed,
}

impl Default for CombatStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatStateMachine {
    /// Idle, no target, no cooldown.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: CombatState::Idle,
            entered_at: Fixed::ZERO,
            target: None,
            pending_attack: None,
            cooldown: Fixed::ZERO,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CombatState {
        self.state
    }

    /// When the current state was entered.
    #[must_use]
    pub const fn entered_at(&self) -> Fixed {
        self.entered_at
    }

    /// Target of the attack in progress, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Handle of the queued attack resolution, if any.
    #[must_use]
    pub const fn pending_attack(&self) -> Option<EventHandle> {
        self.pending_attack
    }

    /// Remaining cooldown in seconds.
    #[must_use]
    pub const fn cooldown(&self) -> Fixed {
        self.cooldown
    }

    /// True when a new attack may start now.
    #[must_use]
    pub fn can_attack(&self) -> bool {
        self.state.is_free() && self.cooldown <= Fixed::ZERO
    }

    /// Enter `WindUp` (or `Casting`) against `target`.
    ///
    /// Returns `false` without changing anything if the combatant is busy
    /// or on cooldown.
    pub fn begin_attack(&mut self, target: EntityId, now: Fixed, casting: bool) -> bool {
        if !self.can_attack() {
            return false;
        }
        let state = if casting {
            CombatState::Casting
        } else {
            CombatState::WindUp
        };
        self.enter(state, now);
        self.target = Some(target);
        true
    }

    /// Record the scheduled resolution of the current attack.
    pub fn set_pending_attack(&mut self, handle: EventHandle) {
        self.pending_attack = Some(handle);
    }

    /// Wind-up finished with a live target: enter `Attack` at `at` and
    /// start the cooldown.
    pub fn strike(&mut self, at: Fixed, cooldown: Fixed) -> Option<StateTransition> {
        if !self.state.is_interruptible() {
            return None;
        }
        self.pending_attack = None;
        self.cooldown = cooldown;
        Some(self.enter(CombatState::Attack, at))
    }

    /// Wind-up finished but the target is gone: straight to `Recovery`.
    pub fn fizzle(&mut self, at: Fixed) -> Option<StateTransition> {
        if !self.state.is_interruptible() {
            return None;
        }
        self.pending_attack = None;
        Some(self.enter(CombatState::Recovery, at))
    }

    /// Forced interruption by a heavy hit.
    ///
    /// Enters `Staggered`, drops the target and leaves half of a full
    /// cooldown. Returns the attack event that must be cancelled.
    pub fn stagger(&mut self, now: Fixed, full_cooldown: Fixed) -> Option<EventHandle> {
        self.enter(CombatState::Staggered, now);
        self.target = None;
        self.cooldown = full_cooldown * HALF;
        self.pending_attack.take()
    }

    /// Put the combatant in `state` regardless of what it was doing.
    ///
    /// Used for crowd control, evasion and movement orders. Any attack in
    /// progress is abandoned; its event handle is returned for
    /// cancellation.
    pub fn force(&mut self, state: CombatState, now: Fixed) -> Option<EventHandle> {
        if !state.is_locomotion() || !self.state.is_free() {
            self.target = None;
        }
        self.enter(state, now);
        self.pending_attack.take()
    }

    /// Enter a movement state from a free state. Returns `false` if busy.
    pub fn start_moving(&mut self, state: CombatState, now: Fixed) -> bool {
        if !state.is_locomotion() || !self.state.is_free() {
            return false;
        }
        if self.state != state {
            self.enter(state, now);
        }
        true
    }

    /// Movement finished or was stopped.
    pub fn stop_moving(&mut self, now: Fixed) -> Option<StateTransition> {
        if self.state.is_locomotion() {
            return Some(self.enter(CombatState::Idle, now));
        }
        None
    }

    /// Add to the remaining cooldown.
    pub fn add_cooldown(&mut self, extra: Fixed) {
        self.cooldown += extra.max(Fixed::ZERO);
    }

    /// Count the cooldown down by `dt`.
    pub fn tick_cooldown(&mut self, dt: Fixed) {
        let left = to_micros(self.cooldown) - to_micros(dt);
        self.cooldown = from_micros(left.max(0));
    }

    /// Reset to an inert `Idle` (death).
    pub fn reset(&mut self, now: Fixed) -> Option<EventHandle> {
        self.enter(CombatState::Idle, now);
        self.target = None;
        self.pending_attack.take()
    }

    /// Apply every time-driven transition due at `now`.
    ///
    /// Each new state is entered at the exact moment the previous one
    /// ran out, not at `now`, so one long tick chains several states
    /// without drift. Deadlines are compared on the microsecond clock.
    pub fn advance(&mut self, now: Fixed, phase: &AttackPhase) -> Vec<StateTransition> {
        let mut transitions = Vec::new();
        loop {
            let (duration, next) = match self.state {
                CombatState::Attack => (phase.strike, CombatState::Recovery),
                CombatState::Recovery => (phase.recovery, CombatState::Idle),
                state => match state.fixed_duration_ms() {
                    Some(ms) => (milli(ms), CombatState::Idle),
                    None => break,
                },
            };
            let ends_us = to_micros(self.entered_at) + to_micros(duration);
            if to_micros(now) < ends_us {
                break;
            }
            if next == CombatState::Idle {
                self.target = None;
            }
            transitions.push(self.enter(next, from_micros(ends_us)));
        }
        transitions
    }

    fn enter(&mut self, state: CombatState, at: Fixed) -> StateTransition {
        let transition = StateTransition {
            from: self.state,
            to: state,
            at,
        };
        self.state = state;
        self.entered_at = at;
        transition
    }
}
