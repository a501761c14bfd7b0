//! Battle event bus and combat log records.
//!
//! The bus belongs to one battle. Subscribers register for topics and
//! receive copies of matching records in their own inbox; the battle
//! also keeps a log that presentation drains once per frame.

use serde::{Deserialize, Serialize};

use crate::battle::Outcome;
use crate::combat::CombatState;
use crate::combatant::{EntityId, HitKind};
use crate::grid::GridCoord;
use crate::modifiers::CoverLevel;

/// Coarse category used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Attacks, interrupts, deaths, state changes.
    Combat,
    /// Movement orders and arrivals.
    Movement,
    /// Experience and levels.
    Progression,
    /// Battle start/end.
    Battle,
}

/// Crowd-control effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Cannot act for a while.
    Stun,
    /// Thrown off balance, movement stopped.
    KnockBack,
}

/// Something that happened in the battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// A hit landed.
    AttackResolved {
        /// Striker.
        attacker: EntityId,
        /// Victim.
        target: EntityId,
        /// Health removed.
        damage: i32,
        /// Flavour of the hit.
        hit: HitKind,
        /// Victim's health afterwards.
        remaining_hp: i32,
        /// Struck from a flank.
        #[serde(default)]
        flanking: bool,
        /// Victim's cover against the striker.
        #[serde(default)]
        cover: CoverLevel,
    },
    /// The target evaded a hit.
    AttackDodged {
        /// Striker.
        attacker: EntityId,
        /// Evader.
        target: EntityId,
    },
    /// The target was gone when the wind-up ended.
    AttackFizzled {
        /// Striker.
        attacker: EntityId,
    },
    /// A wind-up or cast was broken by a heavy hit.
    Interrupted {
        /// Interrupted combatant.
        entity: EntityId,
        /// Whose hit did it.
        by: EntityId,
    },
    /// Extra cooldown inflicted by an orc.
    Dazed {
        /// Dazed combatant.
        entity: EntityId,
        /// The orc.
        by: EntityId,
    },
    /// Crowd control applied.
    Controlled {
        /// Affected combatant.
        entity: EntityId,
        /// Effect.
        control: Control,
    },
    /// An area effect went off.
    AreaEffectApplied {
        /// Caster, if any.
        source: Option<EntityId>,
        /// Effect name.
        name: String,
        /// Combatants caught in it.
        affected: u32,
    },
    /// Damage from an area effect.
    AreaDamage {
        /// Caster, if any.
        source: Option<EntityId>,
        /// Victim.
        target: EntityId,
        /// Health removed.
        damage: i32,
        /// Victim's health afterwards.
        remaining_hp: i32,
    },
    /// Health restored.
    Healed {
        /// Recipient.
        entity: EntityId,
        /// Health restored.
        amount: i32,
    },
    /// Health reached zero.
    Defeated {
        /// Fallen combatant.
        entity: EntityId,
        /// Who landed the final hit.
        killer: Option<EntityId>,
    },
    /// Experience awarded.
    ExperienceGained {
        /// Recipient.
        entity: EntityId,
        /// Amount.
        amount: u32,
    },
    /// A level was reached.
    LevelUp {
        /// Combatant.
        entity: EntityId,
        /// New level.
        level: u32,
    },
    /// A movement order was accepted.
    MovementStarted {
        /// Mover.
        entity: EntityId,
        /// Cell of the final waypoint.
        to: GridCoord,
    },
    /// A mover arrived.
    MovementCompleted {
        /// Mover.
        entity: EntityId,
        /// Cell it settled in.
        at: GridCoord,
    },
    /// Combat state changed.
    StateChanged {
        /// Combatant.
        entity: EntityId,
        /// Previous state.
        from: CombatState,
        /// New state.
        to: CombatState,
    },
    /// Victory or defeat.
    BattleEnded {
        /// Result.
        outcome: Outcome,
    },
}

impl BattleEvent {
    /// Subscription topic of this event.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::AttackResolved { .. }
            | Self::AttackDodged { .. }
            | Self::AttackFizzled { .. }
            | Self::Interrupted { .. }
            | Self::Dazed { .. }
            | Self::Controlled { .. }
            | Self::AreaEffectApplied { .. }
            | Self::AreaDamage { .. }
            | Self::Healed { .. }
            | Self::Defeated { .. }
            | Self::StateChanged { .. } => Topic::Combat,
            Self::ExperienceGained { .. } | Self::LevelUp { .. } => Topic::Progression,
            Self::MovementStarted { .. } | Self::MovementCompleted { .. } => Topic::Movement,
            Self::BattleEnded { .. } => Topic::Battle,
        }
    }
}

/// An event stamped with when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Tick number.
    pub tick: u64,
    /// Simulation time in milliseconds.
    pub time_ms: i64,
    /// What happened.
    pub event: BattleEvent,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u32);

#[derive(Debug, Clone)]
struct Subscription {
    id: SubscriberId,
    topics: Vec<Topic>,
    inbox: Vec<EventRecord>,
}

/// Publish/subscribe hub owned by a battle.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    log: Vec<EventRecord>,
    next_id: u32,
}

impl EventBus {
    /// Bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for a set of topics. An empty slice means every topic.
    pub fn subscribe(&mut self, topics: &[Topic]) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            topics: topics.to_vec(),
            inbox: Vec::new(),
        });
        id
    }

    /// Remove a subscriber and its undelivered records.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.id != id);
        self.subscriptions.len() != before
    }

    /// Append to the log and to every matching inbox.
    pub fn publish(&mut self, record: EventRecord) {
        let topic = record.event.topic();
        for sub in &mut self.subscriptions {
            if sub.topics.is_empty() || sub.topics.contains(&topic) {
                sub.inbox.push(record.clone());
            }
        }
        self.log.push(record);
    }

    /// Take everything delivered to one subscriber.
    pub fn drain(&mut self, id: SubscriberId) -> Vec<EventRecord> {
        self.subscriptions
            .iter_mut()
            .find(|sub| sub.id == id)
            .map(|sub| std::mem::take(&mut sub.inbox))
            .unwrap_or_default()
    }

    /// Take the battle log accumulated since the last drain.
    pub fn drain_log(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.log)
    }

    /// Log records not yet drained.
    #[must_use]
    pub fn log(&self) -> &[EventRecord] {
        &self.log
    }
}
