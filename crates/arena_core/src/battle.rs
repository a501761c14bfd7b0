//! Battle manager: owns every subsystem and drives one tick at a time.
//!
//! # Tick order
//!
//! 1. Fire due scheduler events (attack resolutions, pursuit checks)
//! 2. Cooldowns, passives and time-driven state transitions
//! 3. Movement and arrivals
//! 4. AI pass, at its own cadence
//! 5. Prune the dead from grid, movement and scheduler
//! 6. Victory/defeat check
//!
//! Every loop over combatants walks ids in ascending order, so a battle
//! replays identically from the same config, roster, seed and tick
//! deltas.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::area::AreaEffect;
use crate::combat::{interrupt_chance, mitigate, CombatState, StateTransition};
use crate::combatant::{Combatant, EntityId, Faction};
use crate::config::BattleConfig;
use crate::error::{ArenaError, Result};
use crate::events::{BattleEvent, Control, EventBus, EventRecord, SubscriberId, Topic};
use crate::grid::{ring_cells, CellType, CombatGrid, GridCoord};
use crate::math::{percent, to_micros, Fixed, Vec2Fixed, HALF};
use crate::modifiers::{cover_against, CoverLevel, StrikeModifiers};
use crate::movement::MovementController;
use crate::rng::BattleRng;
use crate::roster::Roster;
use crate::scheduler::{priority, DueEvent, EventHandle, EventScheduler, EventSubject};
use crate::snapshot::{MemberSnapshot, PartySnapshot};
use crate::tactics::{AiContext, Intent, TacticalAi};

/// How far, in cells, [`Battle::command_take_cover`] looks for shelter.
pub const COVER_SEARCH_RADIUS: i32 = 5;

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Every enemy is down.
    Victory,
    /// Every party member is down.
    Defeat,
}

/// Deferred work queued on the battle scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleAction {
    /// Resolve the strike at the end of a wind-up.
    ResolveAttack {
        /// Striker.
        attacker: EntityId,
        /// Intended victim.
        target: EntityId,
    },
    /// Re-check a player-ordered pursuit.
    RangeCheck {
        /// Pursuer.
        attacker: EntityId,
        /// Pursued.
        target: EntityId,
    },
}

impl EventSubject for BattleAction {
    fn subject(&self) -> Option<EntityId> {
        match *self {
            Self::ResolveAttack { attacker, .. } | Self::RangeCheck { attacker, .. } => {
                Some(attacker)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pursuit {
    target: EntityId,
    check: EventHandle,
}

/// One battle session.
#[derive(Debug)]
pub struct Battle {
    config: BattleConfig,
    grid: CombatGrid,
    roster: Roster,
    scheduler: EventScheduler<BattleAction>,
    movement: MovementController,
    ai: TacticalAi,
    bus: EventBus,
    rng: BattleRng,
    tick: u64,
    ai_timer_us: i64,
    ai_targets: HashMap<EntityId, EntityId>,
    pursuits: HashMap<EntityId, Pursuit>,
    paused: bool,
    outcome: Option<Outcome>,
}

impl Battle {
    /// Empty battle on an empty arena.
    ///
    /// Arena dimensions out of range are clamped; use [`Self::try_new`]
    /// to reject them instead.
    #[must_use]
    pub fn new(config: BattleConfig) -> Self {
        Self {
            grid: CombatGrid::from_config(&config.arena),
            roster: Roster::new(),
            scheduler: EventScheduler::new(),
            movement: MovementController::new(config.path_tolerance()),
            ai: TacticalAi::new(config.ai),
            bus: EventBus::new(),
            rng: BattleRng::new(config.seed),
            tick: 0,
            ai_timer_us: 0,
            ai_targets: HashMap::new(),
            pursuits: HashMap::new(),
            paused: false,
            outcome: None,
            config,
        }
    }

    /// Empty battle, refusing a configuration that does not validate.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] from [`BattleConfig::validate`].
    pub fn try_new(config: BattleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// The arena grid.
    #[must_use]
    pub const fn grid(&self) -> &CombatGrid {
        &self.grid
    }

    /// Set static terrain on a cell. Fails on occupied or invalid cells.
    pub fn set_terrain(&mut self, coord: GridCoord, cell_type: CellType) -> bool {
        self.grid.set_cell_type(coord, cell_type)
    }

    /// Place a combatant on the field.
    ///
    /// Its position is snapped to the centre of the cell it lands in.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::InvalidState`] if the id is already taken.
    /// - [`ArenaError::CellOccupied`] if the cell is not free.
    pub fn add_combatant(&mut self, mut combatant: Combatant) -> Result<EntityId> {
        let id = combatant.id;
        if self.roster.contains(id) {
            return Err(ArenaError::InvalidState(format!("duplicate entity id {id}")));
        }
        if !self.grid.register_entity(id, &mut combatant.position) {
            return Err(ArenaError::CellOccupied(
                self.grid.cell_coords(combatant.position),
            ));
        }
        tracing::debug!(
            entity = id,
            archetype = ?combatant.archetype,
            level = combatant.level,
            "combatant added"
        );
        self.roster.insert(combatant);
        Ok(id)
    }

    /// Advance the battle by `dt` seconds.
    ///
    /// Drains and returns the combat log: everything published during
    /// this tick plus anything commands published since the last drain.
    /// A paused or finished battle does nothing.
    pub fn tick(&mut self, dt: Fixed) -> Vec<EventRecord> {
        if self.paused || self.outcome.is_some() {
            return Vec::new();
        }
        let dt = dt.max(Fixed::ZERO);
        self.tick += 1;

        let until = self.scheduler.now() + dt;
        while let Some(due) = self.scheduler.pop_due(until) {
            self.dispatch(due);
        }
        self.scheduler.advance_to(until);

        self.update_states(dt);
        self.update_movement(dt);

        self.ai_timer_us = self.ai_timer_us.saturating_add(to_micros(dt));
        let interval_us = to_micros(self.config.ai.decision_interval());
        if self.ai_timer_us >= interval_us {
            self.ai_timer_us = if interval_us > 0 {
                self.ai_timer_us % interval_us
            } else {
                0
            };
            self.run_ai();
        }

        self.prune_dead();
        self.check_outcome();

        #[cfg(feature = "debug-validation")]
        {
            debug_assert!(self.grid.is_consistent(), "grid occupancy diverged");
            debug_assert!(self.scheduler.is_consistent(), "scheduler bookkeeping diverged");
        }

        self.bus.drain_log()
    }

    fn dispatch(&mut self, due: DueEvent<BattleAction>) {
        match due.action {
            BattleAction::ResolveAttack { attacker, target } => {
                self.resolve_attack(attacker, target, due.handle);
            }
            BattleAction::RangeCheck { attacker, target } => {
                self.check_pursuit(attacker, target, due.handle);
            }
        }
    }

    /// End of a wind-up. Anything stale aborts silently.
    fn resolve_attack(&mut self, attacker: EntityId, target: EntityId, handle: EventHandle) {
        let now = self.scheduler.now();
        let full_cooldown = {
            let Some(a) = self.roster.get(attacker) else {
                return;
            };
            let machine = &a.combat;
            if !a.is_alive()
                || !machine.state().is_interruptible()
                || machine.target() != Some(target)
                || machine.pending_attack() != Some(handle)
            {
                return;
            }
            a.full_cooldown(&self.config.stat_curve)
        };

        if !self.is_selectable(target) {
            let transition = self
                .roster
                .get_mut(attacker)
                .and_then(|a| a.combat.fizzle(now));
            self.emit_transition(attacker, transition);
            self.emit(BattleEvent::AttackFizzled { attacker });
            tracing::trace!(attacker, target, "attack fizzled");
            return;
        }

        let transition = self
            .roster
            .get_mut(attacker)
            .and_then(|a| a.combat.strike(now, full_cooldown));
        self.emit_transition(attacker, transition);
        self.apply_strike(attacker, target);
    }

    fn apply_strike(&mut self, attacker: EntityId, target: EntityId) {
        let now = self.scheduler.now();
        let strike = match self.roster.get_mut(attacker) {
            Some(a) => a.roll_strike(&mut self.rng),
            None => return,
        };
        let curve = self.config.stat_curve;
        let modifiers = match (self.roster.get(attacker), self.roster.get(target)) {
            (Some(a), Some(t)) => StrikeModifiers::evaluate(&self.grid, &self.roster, a, t),
            _ => return,
        };

        for hit in &strike.hits {
            let Some(t) = self.roster.get_mut(target) else {
                return;
            };
            if !t.is_alive() {
                break;
            }

            if self.rng.chance(modifiers.dodge_chance(t.dodge_chance())) {
                let from = t.combat.state();
                if from.is_free() {
                    t.combat.force(CombatState::Dodging, now);
                    self.movement.stop_movement(target);
                    self.emit(BattleEvent::StateChanged {
                        entity: target,
                        from,
                        to: CombatState::Dodging,
                    });
                }
                self.emit(BattleEvent::AttackDodged { attacker, target });
                continue;
            }

            let raw = t.adjusted_raw(hit);
            let mut interrupted = false;
            if t.can_be_interrupted && t.combat.state().is_interruptible() {
                let chance = interrupt_chance(raw, t.stats.max_hp, t.interrupt_resistance);
                if self.rng.chance(chance) {
                    let from = t.combat.state();
                    let full_cooldown = t.full_cooldown(&curve);
                    if let Some(handle) = t.combat.stagger(now, full_cooldown) {
                        self.scheduler.cancel(handle);
                    }
                    interrupted = true;
                    self.emit(BattleEvent::StateChanged {
                        entity: target,
                        from,
                        to: CombatState::Staggered,
                    });
                }
            }
            if interrupted {
                self.scheduler.cancel_all_for(target);
                self.pursuits.remove(&target);
                tracing::debug!(entity = target, by = attacker, "interrupted");
                self.emit(BattleEvent::Interrupted {
                    entity: target,
                    by: attacker,
                });
            }

            let Some(t) = self.roster.get_mut(target) else {
                return;
            };
            let damage = t.apply_damage(modifiers.adjust_damage(mitigate(raw, t.stats.defense)));
            let remaining_hp = t.hp;
            let alive = t.is_alive();
            tracing::debug!(
                tick = self.tick,
                attacker,
                target,
                damage,
                hit = ?hit.kind,
                remaining_hp,
                flanking = modifiers.flanking,
                cover = ?modifiers.cover,
                "attack resolved"
            );
            self.emit(BattleEvent::AttackResolved {
                attacker,
                target,
                damage,
                hit: hit.kind,
                remaining_hp,
                flanking: modifiers.flanking,
                cover: modifiers.cover,
            });
            if !alive {
                self.handle_defeat(target, Some(attacker));
                return;
            }
        }

        if strike.dazes {
            if let Some(t) = self.roster.get_mut(target) {
                if t.is_alive() {
                    let extra = t.full_cooldown(&curve) * HALF;
                    t.combat.add_cooldown(extra);
                    self.emit(BattleEvent::Dazed {
                        entity: target,
                        by: attacker,
                    });
                }
            }
        }
    }

    fn handle_defeat(&mut self, entity: EntityId, killer: Option<EntityId>) {
        let now = self.scheduler.now();
        let Some(dead) = self.roster.get_mut(entity) else {
            return;
        };
        let from = dead.combat.state();
        dead.combat.reset(now);
        let faction = dead.faction;
        let xp = dead.xp_value();
        if from != CombatState::Idle {
            self.emit(BattleEvent::StateChanged {
                entity,
                from,
                to: CombatState::Idle,
            });
        }

        self.remove_from_field(entity);
        tracing::debug!(entity, ?killer, "defeated");
        self.emit(BattleEvent::Defeated { entity, killer });

        if faction == Faction::Enemies {
            self.distribute_xp(xp, killer);
        }
    }

    /// Split experience from a defeated enemy.
    ///
    /// The shared part is divided evenly among living party members; the
    /// killer's bonus is added on top of its share.
    fn distribute_xp(&mut self, xp: u32, killer: Option<EntityId>) {
        let curve = self.config.stat_curve;
        let members: Vec<EntityId> = self
            .roster
            .living(Faction::Party)
            .into_iter()
            .map(|c| c.id)
            .collect();
        if members.is_empty() {
            return;
        }
        let count = u64::try_from(members.len()).unwrap_or(u64::MAX);
        let shared = u64::from(xp) * u64::from(curve.shared_xp_pct) / (100 * count);
        let bonus = u64::from(xp) * u64::from(curve.killer_bonus_pct) / 100;
        let shared = u32::try_from(shared).unwrap_or(u32::MAX);
        let bonus = u32::try_from(bonus).unwrap_or(u32::MAX);

        for id in members {
            let amount = if Some(id) == killer {
                shared.saturating_add(bonus)
            } else {
                shared
            };
            if amount == 0 {
                continue;
            }
            let Some(member) = self.roster.get_mut(id) else {
                continue;
            };
            let levels = member.gain_xp(amount, &curve);
            self.emit(BattleEvent::ExperienceGained { entity: id, amount });
            for level in levels {
                tracing::debug!(entity = id, level, "level up");
                self.emit(BattleEvent::LevelUp { entity: id, level });
            }
        }
    }

    fn check_pursuit(&mut self, attacker: EntityId, target: EntityId, handle: EventHandle) {
        match self.pursuits.get(&attacker) {
            Some(p) if p.target == target && p.check == handle => {}
            _ => return,
        }
        if !self.roster.is_alive(attacker) || !self.is_selectable(target) {
            self.pursuits.remove(&attacker);
            return;
        }

        let (in_range, can_attack, free) = match (self.roster.get(attacker), self.roster.get(target)) {
            (Some(a), Some(t)) => (
                a.position.distance(t.position) <= a.attack_range(),
                a.combat.can_attack(),
                a.combat.state().is_free(),
            ),
            _ => return,
        };

        if in_range && can_attack {
            self.pursuits.remove(&attacker);
            if let Err(err) = self.start_attack(attacker, target) {
                tracing::debug!(attacker, target, %err, "pursuit attack rejected");
            }
            return;
        }
        if !in_range && free && !self.movement.is_moving(attacker) {
            self.approach(attacker, target);
        }
        self.schedule_pursuit(attacker, target);
    }

    fn schedule_pursuit(&mut self, attacker: EntityId, target: EntityId) {
        let check = self.scheduler.schedule(
            self.config.range_check_interval(),
            priority::RANGE_CHECK,
            BattleAction::RangeCheck { attacker, target },
        );
        self.pursuits.insert(attacker, Pursuit { target, check });
    }

    fn update_states(&mut self, dt: Fixed) {
        let now = self.scheduler.now();
        for id in self.roster.sorted_ids() {
            let Some(c) = self.roster.get_mut(id) else {
                continue;
            };
            if !c.is_alive() {
                continue;
            }
            c.combat.tick_cooldown(dt);
            c.tick_passives(dt);
            let phase = c.phase;
            let transitions = c.combat.advance(now, &phase);
            for transition in transitions {
                self.emit_transition(id, Some(transition));
            }
        }
    }

    fn update_movement(&mut self, dt: Fixed) {
        let now = self.scheduler.now();
        let arrivals = self.movement.update(dt, &mut self.grid, &mut self.roster);
        for id in arrivals {
            let transition = self
                .roster
                .get_mut(id)
                .and_then(|c| c.combat.stop_moving(now));
            self.emit_transition(id, transition);
            if let Some(at) = self.grid.cell_of(id) {
                self.emit(BattleEvent::MovementCompleted { entity: id, at });
            }
        }
    }

    fn run_ai(&mut self) {
        let now = self.scheduler.now();
        let reassess = self.config.ai.reassess_interval();
        for id in self.roster.sorted_ids() {
            let Some(entity) = self.roster.get(id) else {
                continue;
            };
            let ai_driven = entity.faction == Faction::Enemies || self.config.party_autopilot;
            if !entity.is_alive() || !ai_driven || self.pursuits.contains_key(&id) {
                continue;
            }

            let ctx = AiContext {
                grid: &self.grid,
                roster: &self.roster,
                now,
                autopilot: entity.faction == Faction::Party,
            };
            let decision = self.ai.decide(
                &ctx,
                entity,
                self.ai_targets.get(&id).copied(),
                self.movement.is_moving(id),
                &mut self.rng,
            );

            if decision.reassessed {
                if let Some(c) = self.roster.get_mut(id) {
                    c.next_reassess_at = now + reassess;
                }
            }
            match decision.target {
                Some(target) => self.ai_targets.insert(id, target),
                None => self.ai_targets.remove(&id),
            };

            match decision.intent {
                Intent::Attack(target) => {
                    if let Err(err) = self.start_attack(id, target) {
                        tracing::trace!(entity = id, target, %err, "AI attack rejected");
                    }
                }
                Intent::MoveTo { position, stance } => {
                    self.order_move(id, position, stance);
                }
                Intent::Approach(target) => {
                    self.approach(id, target);
                }
                Intent::Hold => {}
            }
        }
    }

    fn prune_dead(&mut self) {
        for id in self.roster.sorted_ids() {
            if self.roster.is_alive(id) {
                continue;
            }
            if self.grid.cell_of(id).is_some()
                || self.movement.is_moving(id)
                || self.scheduler.live_events_for(id) > 0
            {
                self.remove_from_field(id);
            }
        }
    }

    fn remove_from_field(&mut self, id: EntityId) {
        self.grid.remove_entity(id);
        self.movement.stop_movement(id);
        self.scheduler.cancel_all_for(id);
        self.pursuits.remove(&id);
        self.ai_targets.remove(&id);
    }

    fn check_outcome(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let outcome = if self.roster.living_count(Faction::Party) == 0 {
            Outcome::Defeat
        } else if self.roster.living_count(Faction::Enemies) == 0 {
            Outcome::Victory
        } else {
            return;
        };
        self.outcome = Some(outcome);
        self.scheduler.clear();
        self.movement.clear();
        self.pursuits.clear();
        tracing::debug!(tick = self.tick, ?outcome, "battle ended");
        self.emit(BattleEvent::BattleEnded { outcome });
    }

    /// Start an attack right now. The caller has checked range.
    fn start_attack(&mut self, attacker: EntityId, target: EntityId) -> Result<()> {
        self.validate_actor(attacker)?;
        if !self.can_target(attacker, target) {
            return Err(ArenaError::NotSelectable { attacker, target });
        }
        let now = self.scheduler.now();
        let Some(a) = self.roster.get_mut(attacker) else {
            return Err(ArenaError::EntityNotFound(attacker));
        };
        let from = a.combat.state();
        if !from.is_free() {
            return Err(ArenaError::Busy {
                entity: attacker,
                state: from,
            });
        }
        if !a.combat.can_attack() {
            return Err(ArenaError::OnCooldown(attacker));
        }

        let casting = a.archetype.is_caster();
        let wind_up = a.phase.wind_up;
        a.combat.begin_attack(target, now, casting);
        let to = a.combat.state();
        self.movement.stop_movement(attacker);

        let handle = self.scheduler.schedule(
            wind_up,
            priority::ATTACK,
            BattleAction::ResolveAttack { attacker, target },
        );
        if let Some(a) = self.roster.get_mut(attacker) {
            a.combat.set_pending_attack(handle);
        }
        tracing::trace!(attacker, target, "attack started");
        self.emit(BattleEvent::StateChanged {
            entity: attacker,
            from,
            to,
        });
        Ok(())
    }

    fn order_move(&mut self, id: EntityId, position: Vec2Fixed, stance: CombatState) -> bool {
        let (from, speed) = match self.roster.get(id) {
            Some(c) => (c.position, c.movement_speed()),
            None => return false,
        };
        if !self.movement.start_movement(&self.grid, id, from, position, speed) {
            return false;
        }
        self.begin_locomotion(id, stance);
        true
    }

    fn approach(&mut self, id: EntityId, target: EntityId) -> bool {
        let (from, speed, stop_at) = match self.roster.get(id) {
            Some(c) => (c.position, c.movement_speed(), TacticalAi::approach_distance(c)),
            None => return false,
        };
        let Some(target_position) = self.roster.get(target).map(|t| t.position) else {
            return false;
        };
        if !self
            .movement
            .move_towards_entity(&self.grid, id, from, target_position, stop_at, speed)
        {
            return false;
        }
        self.begin_locomotion(id, CombatState::Charging);
        true
    }

    fn begin_locomotion(&mut self, id: EntityId, stance: CombatState) {
        let now = self.scheduler.now();
        let Some(c) = self.roster.get_mut(id) else {
            return;
        };
        let from = c.combat.state();
        if !c.combat.start_moving(stance, now) {
            self.movement.stop_movement(id);
            return;
        }
        if from != stance {
            self.emit(BattleEvent::StateChanged {
                entity: id,
                from,
                to: stance,
            });
        }
        let destination = self
            .movement
            .order(id)
            .and_then(|order| order.destination())
            .map(|d| self.grid.cell_coords(d));
        if let Some(to) = destination {
            self.emit(BattleEvent::MovementStarted { entity: id, to });
        }
    }

    fn validate_actor(&self, id: EntityId) -> Result<&Combatant> {
        if self.outcome.is_some() {
            return Err(ArenaError::BattleOver);
        }
        let combatant = self.roster.get(id).ok_or(ArenaError::EntityNotFound(id))?;
        if !combatant.is_alive() {
            return Err(ArenaError::EntityDead(id));
        }
        Ok(combatant)
    }

    fn can_target(&self, attacker: EntityId, target: EntityId) -> bool {
        match (self.roster.get(attacker), self.roster.get(target)) {
            (Some(a), Some(t)) => a.faction != t.faction && self.is_selectable(target),
            _ => false,
        }
    }

    // ---- player commands ----

    /// Order `attacker` to attack `target`.
    ///
    /// In range and ready: the attack starts now. Otherwise the attacker
    /// pursues, re-checking every range-check interval, and attacks once
    /// in range with its cooldown elapsed.
    ///
    /// # Errors
    ///
    /// Missing, dead or busy attacker, an unselectable target, a finished
    /// battle, or no path towards the target.
    pub fn command_attack(&mut self, attacker: EntityId, target: EntityId) -> Result<()> {
        let a = self.validate_actor(attacker)?;
        if !self.can_target(attacker, target) {
            return Err(ArenaError::NotSelectable { attacker, target });
        }
        let state = a.combat.state();
        if !state.is_free() {
            return Err(ArenaError::Busy {
                entity: attacker,
                state,
            });
        }
        let in_range = self
            .roster
            .get(target)
            .is_some_and(|t| a.position.distance(t.position) <= a.attack_range());
        let ready = a.combat.can_attack();

        self.cancel_pursuit(attacker);
        self.ai_targets.insert(attacker, target);
        if in_range && ready {
            return self.start_attack(attacker, target);
        }
        if !in_range && !self.approach(attacker, target) {
            let from = self.cell_of_combatant(attacker);
            let to = self.cell_of_combatant(target);
            return Err(ArenaError::NoPath { from, to });
        }
        self.schedule_pursuit(attacker, target);
        Ok(())
    }

    /// Order a combatant to walk to a pixel position.
    ///
    /// # Errors
    ///
    /// Missing, dead or busy combatant, a finished battle, or no path.
    pub fn command_move(&mut self, entity: EntityId, position: Vec2Fixed) -> Result<()> {
        let c = self.validate_actor(entity)?;
        let state = c.combat.state();
        if !state.is_free() {
            return Err(ArenaError::Busy { entity, state });
        }
        self.cancel_pursuit(entity);
        if self.order_move(entity, position, CombatState::Moving) {
            Ok(())
        } else {
            Err(ArenaError::NoPath {
                from: self.cell_of_combatant(entity),
                to: self.grid.cell_coords(position),
            })
        }
    }

    /// Cancel movement and pursuit in place.
    ///
    /// # Errors
    ///
    /// [`ArenaError::EntityNotFound`] for an unknown id.
    pub fn command_stop(&mut self, entity: EntityId) -> Result<()> {
        if !self.roster.contains(entity) {
            return Err(ArenaError::EntityNotFound(entity));
        }
        self.cancel_pursuit(entity);
        self.movement.stop_movement(entity);
        let now = self.scheduler.now();
        let transition = self
            .roster
            .get_mut(entity)
            .and_then(|c| c.combat.stop_moving(now));
        self.emit_transition(entity, transition);
        Ok(())
    }

    /// Stun or knock back a combatant.
    ///
    /// Any attack in progress is abandoned and all of its pending events
    /// are cancelled.
    ///
    /// # Errors
    ///
    /// Missing or dead combatant, or a finished battle.
    pub fn apply_control(&mut self, entity: EntityId, control: Control) -> Result<()> {
        self.validate_actor(entity)?;
        self.force_control(entity, control);
        Ok(())
    }

    fn force_control(&mut self, entity: EntityId, control: Control) {
        let now = self.scheduler.now();
        let state = match control {
            Control::Stun => CombatState::Stunned,
            Control::KnockBack => CombatState::KnockedBack,
        };
        let Some(c) = self.roster.get_mut(entity) else {
            return;
        };
        let from = c.combat.state();
        c.combat.force(state, now);
        self.movement.stop_movement(entity);
        self.scheduler.cancel_all_for(entity);
        self.pursuits.remove(&entity);

        self.emit(BattleEvent::StateChanged {
            entity,
            from,
            to: state,
        });
        self.emit(BattleEvent::Controlled { entity, control });
    }

    /// Send a combatant to the nearest free cell beside cover, searching
    /// outwards up to [`COVER_SEARCH_RADIUS`] cells. A combatant already
    /// beside cover stays put.
    ///
    /// # Errors
    ///
    /// Missing, dead or busy combatant, a finished battle, no sheltered
    /// cell in reach, or no path to it.
    pub fn command_take_cover(&mut self, entity: EntityId) -> Result<()> {
        let c = self.validate_actor(entity)?;
        let state = c.combat.state();
        if !state.is_free() {
            return Err(ArenaError::Busy { entity, state });
        }
        let origin = self.cell_of_combatant(entity);
        if self.grid.cover_around(origin).0 > 0 {
            return Ok(());
        }
        let shelter = (1..=COVER_SEARCH_RADIUS)
            .flat_map(|radius| ring_cells(origin, radius))
            .find(|&cell| {
                self.grid.cell_type(cell) == CellType::Empty && self.grid.cover_around(cell).0 > 0
            })
            .ok_or(ArenaError::NoCover(entity))?;

        self.cancel_pursuit(entity);
        let destination = self.grid.pixel_center(shelter);
        if self.order_move(entity, destination, CombatState::TakingCover) {
            tracing::debug!(entity, %shelter, "taking cover");
            Ok(())
        } else {
            Err(ArenaError::NoPath {
                from: origin,
                to: shelter,
            })
        }
    }

    /// Set off an area effect at `origin`, facing `direction`.
    ///
    /// Victims are taken in id order. Damage ignores dodge and cover but
    /// not defense, and a victim brought to zero is defeated with the
    /// source credited. Returns the combatants affected.
    ///
    /// # Errors
    ///
    /// A finished battle, or a missing or dead source.
    pub fn apply_area_effect(
        &mut self,
        source: Option<EntityId>,
        effect: &AreaEffect,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
    ) -> Result<Vec<EntityId>> {
        if self.outcome.is_some() {
            return Err(ArenaError::BattleOver);
        }
        let source_faction = match source {
            Some(id) => Some(self.validate_actor(id)?.faction),
            None => None,
        };

        let mut harmed = Vec::new();
        let mut healed = Vec::new();
        for id in self.roster.sorted_ids() {
            if !self.is_selectable(id) {
                continue;
            }
            let Some(c) = self.roster.get(id) else {
                continue;
            };
            if !effect.shape.contains(origin, direction, c.position) {
                continue;
            }
            if effect.is_harmful() && Some(id) != source {
                harmed.push(id);
            }
            if effect.heal > 0 && source_faction.map_or(true, |f| f == c.faction) {
                healed.push(id);
            }
        }
        let mut affected: Vec<EntityId> = harmed.iter().chain(&healed).copied().collect();
        affected.sort_unstable();
        affected.dedup();

        tracing::debug!(
            tick = self.tick,
            ?source,
            effect = %effect.name,
            affected = affected.len(),
            "area effect"
        );
        self.emit(BattleEvent::AreaEffectApplied {
            source,
            name: effect.name.clone(),
            affected: u32::try_from(affected.len()).unwrap_or(u32::MAX),
        });

        for id in harmed {
            self.area_harm(source, effect, id);
        }
        for id in healed {
            let amount = self
                .roster
                .get_mut(id)
                .map_or(0, |c| c.heal(effect.heal));
            if amount > 0 {
                self.emit(BattleEvent::Healed { entity: id, amount });
            }
        }
        Ok(affected)
    }

    fn area_harm(&mut self, source: Option<EntityId>, effect: &AreaEffect, target: EntityId) {
        if effect.damage > 0 {
            let Some(t) = self.roster.get_mut(target) else {
                return;
            };
            let raw = effect.damage * t.archetype.vulnerability_pct(effect.damage_kind) / 100;
            let damage = t.apply_damage(mitigate(raw, t.stats.defense));
            let remaining_hp = t.hp;
            let alive = t.is_alive();
            self.emit(BattleEvent::AreaDamage {
                source,
                target,
                damage,
                remaining_hp,
            });
            if !alive {
                self.handle_defeat(target, source);
                return;
            }
        }
        if let Some(area_control) = effect.control {
            let chance = percent(i32::try_from(area_control.chance_pct).unwrap_or(100));
            if self.rng.chance(chance) {
                self.force_control(target, area_control.control);
            }
        }
    }

    fn cancel_pursuit(&mut self, entity: EntityId) {
        if let Some(pursuit) = self.pursuits.remove(&entity) {
            self.scheduler.cancel(pursuit.check);
        }
    }

    fn cell_of_combatant(&self, id: EntityId) -> GridCoord {
        self.grid.cell_of(id).unwrap_or_else(|| {
            self.roster
                .get(id)
                .map(|c| self.grid.cell_coords(c.position))
                .unwrap_or_default()
        })
    }

    // ---- queries ----

    /// True if `entity` is alive and on the field.
    #[must_use]
    pub fn is_selectable(&self, entity: EntityId) -> bool {
        self.roster.is_alive(entity) && self.grid.cell_of(entity).is_some()
    }

    /// Selectable members of a faction, in id order.
    #[must_use]
    pub fn selectable_targets(&self, faction: Faction) -> Vec<EntityId> {
        self.roster
            .living(faction)
            .into_iter()
            .map(|c| c.id)
            .filter(|&id| self.is_selectable(id))
            .collect()
    }

    /// Look up a combatant.
    #[must_use]
    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.roster.get(id)
    }

    /// Every combatant, dead included, in id order.
    #[must_use]
    pub fn combatants(&self) -> Vec<&Combatant> {
        self.roster.sorted()
    }

    /// Result, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Simulation time in seconds.
    #[must_use]
    pub fn elapsed(&self) -> Fixed {
        self.scheduler.now()
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Cover `defender` has against `attacker` where both stand now.
    #[must_use]
    pub fn cover_against(&self, defender: EntityId, attacker: EntityId) -> Option<CoverLevel> {
        let d = self.roster.get(defender)?;
        let a = self.roster.get(attacker)?;
        Some(cover_against(&self.grid, d.position, a.position))
    }

    /// Live scheduled events belonging to `entity`.
    #[must_use]
    pub fn pending_events_for(&self, entity: EntityId) -> usize {
        self.scheduler.live_events_for(entity)
    }

    /// True while `entity` follows a path.
    #[must_use]
    pub fn is_moving(&self, entity: EntityId) -> bool {
        self.movement.is_moving(entity)
    }

    /// Flip the pause flag. Returns the new value.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// True while paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Subscribe to battle events.
    pub fn subscribe(&mut self, topics: &[Topic]) -> SubscriberId {
        self.bus.subscribe(topics)
    }

    /// Take the events delivered to a subscriber.
    pub fn drain_events(&mut self, subscriber: SubscriberId) -> Vec<EventRecord> {
        self.bus.drain(subscriber)
    }

    /// Take the combat log accumulated since the last tick or drain.
    pub fn drain_log(&mut self) -> Vec<EventRecord> {
        self.bus.drain_log()
    }

    /// Plain-data copy of every party member.
    #[must_use]
    pub fn snapshot_party(&self) -> PartySnapshot {
        PartySnapshot {
            members: self
                .roster
                .sorted()
                .into_iter()
                .filter(|c| c.faction == Faction::Party)
                .map(MemberSnapshot::of)
                .collect(),
        }
    }

    /// Hash of the simulation state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.scheduler.now().to_bits().hash(&mut hasher);
        self.rng.hash(&mut hasher);
        self.outcome.hash(&mut hasher);

        let ids = self.roster.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(c) = self.roster.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            c.hp.hash(&mut hasher);
            c.level.hash(&mut hasher);
            c.xp.hash(&mut hasher);
            c.position.x.to_bits().hash(&mut hasher);
            c.position.y.to_bits().hash(&mut hasher);
            c.combat.state().hash(&mut hasher);
            c.combat.entered_at().to_bits().hash(&mut hasher);
            c.combat.cooldown().to_bits().hash(&mut hasher);
            self.grid.cell_of(id).hash(&mut hasher);
        }
        hasher.finish()
    }

    // ---- event helpers ----

    fn emit(&mut self, event: BattleEvent) {
        let time_ms = self.scheduler.now_micros() / 1000;
        self.bus.publish(EventRecord {
            tick: self.tick,
            time_ms,
            event,
        });
    }

    fn emit_transition(&mut self, entity: EntityId, transition: Option<StateTransition>) {
        if let Some(t) = transition {
            if t.from != t.to {
                self.emit(BattleEvent::StateChanged {
                    entity,
                    from: t.from,
                    to: t.to,
                });
            }
        }
    }
}
