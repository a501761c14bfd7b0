//! Combatants: stat blocks, archetypes, levelling and attack specials.

use serde::{Deserialize, Serialize};

use crate::combat::{attack_cooldown, AttackPhase, CombatStateMachine};
use crate::config::StatCurve;
use crate::math::{milli, percent, Fixed, Vec2Fixed};
use crate::rng::BattleRng;
use crate::tactics::TacticalProfile;

/// Unique identifier of a combatant within a battle.
pub type EntityId = u64;

/// Attack reach of melee archetypes. Covers a diagonal neighbour on a
/// 40 px grid.
pub const MELEE_RANGE_PX: i32 = 60;
/// Attack reach of ranged and spell-casting archetypes.
pub const RANGED_RANGE_PX: i32 = 160;

/// Time between dragon breath attacks.
const BREATH_COOLDOWN_MS: i32 = 3000;

/// Which side a combatant fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// The player's party.
    Party,
    /// The opposing force.
    Enemies,
}

impl Faction {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Party => Self::Enemies,
            Self::Enemies => Self::Party,
        }
    }
}

/// Physical hits are reduced by armour; magical hits are spells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// Weapon damage.
    Physical,
    /// Spell damage.
    Magical,
}

/// How an archetype picks its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPreference {
    /// Lowest current/max health ratio.
    Weakest,
    /// Highest attack.
    Strongest,
    /// Highest magic.
    Magical,
    /// Uniformly random.
    Random,
    /// Closest by pixel distance.
    Nearest,
}

/// Per-archetype stat multipliers, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatModifiers {
    /// Health multiplier.
    pub hp_pct: i32,
    /// Attack multiplier.
    pub attack_pct: i32,
    /// Defense multiplier.
    pub defense_pct: i32,
    /// Magic multiplier.
    pub magic_pct: i32,
    /// Speed multiplier.
    pub speed_pct: i32,
    /// Experience value multiplier (enemies only).
    pub xp_pct: i32,
}

const fn mods(hp: i32, attack: i32, defense: i32, magic: i32, speed: i32, xp: i32) -> StatModifiers {
    StatModifiers {
        hp_pct: hp,
        attack_pct: attack,
        defense_pct: defense,
        magic_pct: magic,
        speed_pct: speed,
        xp_pct: xp,
    }
}

/// Behaviour tag of a combatant.
///
/// Everything that varies by kind of combatant (stats, targeting, AI
/// profile, specials) is looked up from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Sturdy melee fighter with critical hits.
    Warrior,
    /// Fast ranged attacker that dodges.
    Archer,
    /// Spell caster.
    Mage,
    /// Quick and weak, strikes twice.
    Goblin,
    /// Heavy hitter that dazes.
    Orc,
    /// Regenerates.
    Troll,
    /// Resists weapons, weak to magic.
    Skeleton,
    /// Slow and durable.
    Zombie,
    /// Boss with a breath attack.
    Dragon,
}

impl Archetype {
    /// All archetypes.
    pub const ALL: [Self; 9] = [
        Self::Warrior,
        Self::Archer,
        Self::Mage,
        Self::Goblin,
        Self::Orc,
        Self::Troll,
        Self::Skeleton,
        Self::Zombie,
        Self::Dragon,
    ];

    /// Side this archetype belongs to.
    #[must_use]
    pub const fn faction(self) -> Faction {
        match self {
            Self::Warrior | Self::Archer | Self::Mage => Faction::Party,
            _ => Faction::Enemies,
        }
    }

    /// Stat multipliers.
    #[must_use]
    pub const fn modifiers(self) -> StatModifiers {
        match self {
            Self::Warrior => mods(150, 120, 130, 80, 90, 100),
            Self::Archer => mods(90, 140, 80, 90, 150, 100),
            Self::Mage => mods(80, 70, 70, 180, 110, 100),
            Self::Goblin => mods(70, 80, 60, 50, 150, 100),
            Self::Orc => mods(120, 130, 100, 40, 80, 150),
            Self::Troll => mods(180, 150, 130, 30, 60, 200),
            Self::Skeleton => mods(80, 100, 100, 90, 120, 120),
            Self::Zombie => mods(110, 90, 70, 50, 70, 130),
            Self::Dragon => mods(250, 200, 180, 200, 100, 500),
        }
    }

    /// Target selection rule.
    #[must_use]
    pub const fn targeting(self) -> TargetPreference {
        match self {
            Self::Goblin | Self::Zombie => TargetPreference::Weakest,
            Self::Orc => TargetPreference::Strongest,
            Self::Troll => TargetPreference::Random,
            Self::Skeleton | Self::Dragon => TargetPreference::Magical,
            Self::Warrior | Self::Archer | Self::Mage => TargetPreference::Nearest,
        }
    }

    /// Tactical positioning profile.
    #[must_use]
    pub const fn profile(self) -> TacticalProfile {
        match self {
            Self::Goblin => TacticalProfile::Mobile,
            Self::Orc | Self::Dragon | Self::Warrior => TacticalProfile::Aggressive,
            Self::Troll => TacticalProfile::Defensive,
            Self::Archer | Self::Mage => TacticalProfile::Ranged,
            Self::Skeleton | Self::Zombie => TacticalProfile::Cautious,
        }
    }

    /// Attacks from a distance.
    #[must_use]
    pub const fn is_ranged(self) -> bool {
        matches!(self, Self::Archer | Self::Mage)
    }

    /// Attacks by casting (`Casting` instead of `WindUp`).
    #[must_use]
    pub const fn is_caster(self) -> bool {
        matches!(self, Self::Mage)
    }

    /// Kind of damage the basic attack deals.
    #[must_use]
    pub const fn damage_kind(self) -> DamageKind {
        if self.is_caster() {
            DamageKind::Magical
        } else {
            DamageKind::Physical
        }
    }

    /// Multiplier on incoming raw damage, in percent.
    #[must_use]
    pub const fn vulnerability_pct(self, kind: DamageKind) -> i32 {
        match (self, kind) {
            (Self::Skeleton, DamageKind::Physical) => 70,
            (Self::Skeleton, DamageKind::Magical) => 150,
            _ => 100,
        }
    }
}

/// Derived combat stats at the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatBlock {
    /// Maximum health.
    pub max_hp: i32,
    /// Physical attack.
    pub attack: i32,
    /// Damage reduction.
    pub defense: i32,
    /// Spell power.
    pub magic: i32,
    /// Speed; drives phase timing, cooldown and movement.
    pub speed: i32,
}

impl StatBlock {
    /// Stats of an archetype at a level.
    ///
    /// The archetype multiplier is applied to the base first (truncated),
    /// then linear growth per level above 1 (truncated again).
    #[must_use]
    pub fn at_level(archetype: Archetype, level: u32, curve: &StatCurve) -> Self {
        let m = archetype.modifiers();
        let steps = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
        let grow = |base: i32, pct: i32, growth: i32| {
            let scaled = base * pct / 100;
            let factor = 100_i64 + i64::from(growth) * i64::from(steps);
            i32::try_from(i64::from(scaled) * factor / 100).unwrap_or(i32::MAX)
        };
        Self {
            max_hp: grow(curve.base_hp, m.hp_pct, curve.growth_pct),
            attack: grow(curve.base_attack, m.attack_pct, curve.growth_pct),
            defense: grow(curve.base_defense, m.defense_pct, curve.growth_pct),
            magic: grow(curve.base_magic, m.magic_pct, curve.growth_pct),
            speed: grow(curve.base_speed, m.speed_pct, curve.speed_growth_pct),
        }
    }
}

/// Experience needed to go from `level` to `level + 1`:
/// `floor(c · (level + 1)^1.5)`.
#[must_use]
pub fn xp_to_next(level: u32, curve: &StatCurve) -> u32 {
    let next = u64::from(level) + 1;
    let c = u64::from(curve.xp_curve_base);
    let value = isqrt(c.saturating_mul(c).saturating_mul(next * next * next));
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Flavour of one hit of a strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitKind {
    /// Ordinary hit.
    Normal,
    /// Warrior critical.
    Critical,
    /// Goblin second stab.
    FollowUp,
    /// Archer extra arrow.
    Volley,
    /// Dragon breath.
    Breath,
}

/// One damage instance before the defender's modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Raw damage.
    pub raw: i32,
    /// Physical or magical.
    pub damage_kind: DamageKind,
    /// Flavour.
    pub kind: HitKind,
}

impl Hit {
    const fn new(raw: i32, damage_kind: DamageKind, kind: HitKind) -> Self {
        Self {
            raw,
            damage_kind,
            kind,
        }
    }
}

/// Everything one strike does to its target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Strike {
    /// Hits in the order they land.
    pub hits: Vec<Hit>,
    /// Orc daze: add half a cooldown to the target if it survives.
    pub dazes: bool,
}

/// A fighter on the battlefield.
#[derive(Debug, Clone)]
pub struct Combatant {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Behaviour tag.
    pub archetype: Archetype,
    /// Side.
    pub faction: Faction,
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience towards the next level.
    pub xp: u32,
    /// Current stats.
    pub stats: StatBlock,
    /// Current health; 0 means defeated.
    pub hp: i32,
    /// Pixel position.
    pub position: Vec2Fixed,
    /// Attack phase timings derived from speed.
    pub phase: AttackPhase,
    /// Lowers the chance of being interrupted.
    pub interrupt_resistance: Fixed,
    /// Whether heavy hits can interrupt this combatant at all.
    pub can_be_interrupted: bool,
    /// Action lifecycle.
    pub combat: CombatStateMachine,
    /// Next time the AI may reconsider this combatant's position.
    pub next_reassess_at: Fixed,
    regen_carry: Fixed,
    breath_timer: Fixed,
}

impl Combatant {
    /// Build a full-health combatant of an archetype at a level.
    #[must_use]
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        archetype: Archetype,
        level: u32,
        curve: &StatCurve,
    ) -> Self {
        let level = level.max(1);
        let stats = StatBlock::at_level(archetype, level, curve);
        Self {
            id,
            name: name.into(),
            archetype,
            faction: archetype.faction(),
            level,
            xp: 0,
            stats,
            hp: stats.max_hp,
            position: Vec2Fixed::ZERO,
            phase: AttackPhase::from_speed(stats.speed),
            interrupt_resistance: resistance_for(stats.defense),
            can_be_interrupted: true,
            combat: CombatStateMachine::new(),
            next_reassess_at: Fixed::ZERO,
            regen_carry: Fixed::ZERO,
            breath_timer: Fixed::ZERO,
        }
    }

    /// Place the combatant at a pixel position.
    #[must_use]
    pub fn at(mut self, position: Vec2Fixed) -> Self {
        self.position = position;
        self
    }

    /// True while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Attack reach in pixels.
    #[must_use]
    pub fn attack_range(&self) -> Fixed {
        if self.archetype.is_ranged() {
            Fixed::from_num(RANGED_RANGE_PX)
        } else {
            Fixed::from_num(MELEE_RANGE_PX)
        }
    }

    /// Movement speed in pixels per second.
    #[must_use]
    pub fn movement_speed(&self) -> Fixed {
        Fixed::from_num(60 + 5 * self.stats.speed)
    }

    /// Full attack cooldown at the current speed.
    #[must_use]
    pub fn full_cooldown(&self, curve: &StatCurve) -> Fixed {
        attack_cooldown(curve.cooldown_base(), self.stats.speed)
    }

    /// Chance to dodge an incoming hit.
    #[must_use]
    pub fn dodge_chance(&self) -> Fixed {
        match self.archetype {
            Archetype::Archer => milli(50) + milli(5) * Fixed::from_num(self.stats.speed),
            _ => Fixed::ZERO,
        }
    }

    /// Experience awarded for defeating this combatant.
    #[must_use]
    pub fn xp_value(&self) -> u32 {
        let pct = u64::try_from(self.archetype.modifiers().xp_pct).unwrap_or(0);
        let value = 20 * u64::from(self.level) * pct / 100;
        u32::try_from(value).unwrap_or(u32::MAX)
    }

    /// True if `self` is less healthy than `other` by current/max ratio.
    #[must_use]
    pub fn weaker_than(&self, other: &Self) -> bool {
        i64::from(self.hp) * i64::from(other.stats.max_hp)
            < i64::from(other.hp) * i64::from(self.stats.max_hp)
    }

    /// Roll the hits of one strike.
    ///
    /// Consumes the dragon's breath timer when breath is used.
    pub fn roll_strike(&mut self, rng: &mut BattleRng) -> Strike {
        let attack = self.stats.attack;
        let physical = |raw, kind| Hit::new(raw, DamageKind::Physical, kind);
        let mut strike = Strike::default();
        match self.archetype {
            Archetype::Warrior => {
                if rng.chance(milli(150)) {
                    strike.hits.push(physical(attack * 2, HitKind::Critical));
                } else {
                    strike.hits.push(physical(attack, HitKind::Normal));
                }
            }
            Archetype::Archer => {
                strike.hits.push(physical(attack * 8 / 10, HitKind::Normal));
                if rng.chance(milli(300)) {
                    for _ in 0..rng.range_inclusive(1, 2) {
                        strike.hits.push(physical(attack / 2, HitKind::Volley));
                    }
                }
            }
            Archetype::Mage => {
                strike
                    .hits
                    .push(Hit::new(self.stats.magic, DamageKind::Magical, HitKind::Normal));
            }
            Archetype::Goblin => {
                strike.hits.push(physical(attack, HitKind::Normal));
                if rng.chance(milli(200)) {
                    strike.hits.push(physical(attack / 2, HitKind::FollowUp));
                }
            }
            Archetype::Orc => {
                strike.hits.push(physical(attack, HitKind::Normal));
                strike.dazes = rng.chance(milli(150));
            }
            Archetype::Dragon => {
                if self.breath_timer <= Fixed::ZERO && rng.chance(milli(300)) {
                    self.breath_timer = milli(BREATH_COOLDOWN_MS);
                    strike.hits.push(Hit::new(
                        self.stats.magic * 2,
                        DamageKind::Magical,
                        HitKind::Breath,
                    ));
                } else {
                    strike.hits.push(physical(attack, HitKind::Normal));
                }
            }
            Archetype::Troll | Archetype::Skeleton | Archetype::Zombie => {
                strike.hits.push(physical(attack, HitKind::Normal));
            }
        }
        strike
    }

    /// Raw damage after this combatant's vulnerability to its kind.
    #[must_use]
    pub fn adjusted_raw(&self, hit: &Hit) -> i32 {
        hit.raw * self.archetype.vulnerability_pct(hit.damage_kind) / 100
    }

    /// Remove health. Returns the amount actually removed.
    pub fn apply_damage(&mut self, amount: i32) -> i32 {
        let dealt = amount.clamp(0, self.hp.max(0));
        self.hp -= dealt;
        dealt
    }

    /// Restore health up to the maximum. Returns the amount restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if !self.is_alive() {
            return 0;
        }
        let healed = amount.clamp(0, self.stats.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    /// Per-tick passive effects: troll regeneration and the breath timer.
    ///
    /// Returns health regenerated this tick.
    pub fn tick_passives(&mut self, dt: Fixed) -> i32 {
        self.breath_timer = (self.breath_timer - dt).max(Fixed::ZERO);
        if self.archetype != Archetype::Troll || !self.is_alive() {
            return 0;
        }
        self.regen_carry += Fixed::from_num(self.stats.max_hp) * percent(2) * dt;
        let whole = self.regen_carry.int();
        self.regen_carry -= whole;
        self.heal(whole.to_num::<i32>())
    }

    /// Add experience, levelling up as many times as it covers.
    ///
    /// Returns the levels reached, in order.
    pub fn gain_xp(&mut self, amount: u32, curve: &StatCurve) -> Vec<u32> {
        self.xp = self.xp.saturating_add(amount);
        let mut reached = Vec::new();
        loop {
            let needed = xp_to_next(self.level, curve);
            if needed == 0 || self.xp < needed {
                break;
            }
            self.xp -= needed;
            self.level_up(curve);
            reached.push(self.level);
        }
        reached
    }

    fn level_up(&mut self, curve: &StatCurve) {
        let old_max = self.stats.max_hp;
        self.level += 1;
        self.stats = StatBlock::at_level(self.archetype, self.level, curve);
        self.phase = AttackPhase::from_speed(self.stats.speed);
        self.interrupt_resistance = resistance_for(self.stats.defense);
        if self.is_alive() {
            self.hp = (self.hp + self.stats.max_hp - old_max).min(self.stats.max_hp);
        }
    }
}

fn resistance_for(defense: i32) -> Fixed {
    Fixed::from_num(defense) / Fixed::from_num(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> StatCurve {
        StatCurve::default()
    }

    #[test]
    fn test_level_one_stats() {
        let warrior = Combatant::new(1, "Brom", Archetype::Warrior, 1, &curve());
        assert_eq!(
            warrior.stats,
            StatBlock {
                max_hp: 150,
                attack: 12,
                defense: 6,
                magic: 8,
                speed: 4,
            }
        );
        assert_eq!(warrior.hp, 150);
        assert_eq!(warrior.faction, Faction::Party);
    }

    #[test]
    fn test_linear_growth() {
        let troll = StatBlock::at_level(Archetype::Troll, 3, &curve());
        // floor(180 * 1.2), floor(15 * 1.2), floor(6 * 1.1)
        assert_eq!(troll.max_hp, 216);
        assert_eq!(troll.attack, 18);
        assert_eq!(troll.speed, 3);
    }

    #[test]
    fn test_xp_curve() {
        assert_eq!(xp_to_next(1, &curve()), 282);
        assert_eq!(xp_to_next(2, &curve()), 519);
        assert_eq!(xp_to_next(3, &curve()), 800);
    }

    #[test]
    fn test_xp_value() {
        let dragon = Combatant::new(1, "Vyr", Archetype::Dragon, 2, &curve());
        assert_eq!(dragon.xp_value(), 200);
        let goblin = Combatant::new(2, "Snik", Archetype::Goblin, 1, &curve());
        assert_eq!(goblin.xp_value(), 20);
    }

    #[test]
    fn test_gain_xp_multiple_levels() {
        let mut mage = Combatant::new(1, "Ilsa", Archetype::Mage, 1, &curve());
        mage.hp -= 10;
        let old_max = mage.stats.max_hp;
        let reached = mage.gain_xp(282 + 519 + 5, &curve());
        assert_eq!(reached, vec![2, 3]);
        assert_eq!(mage.level, 3);
        assert_eq!(mage.xp, 5);
        assert_eq!(mage.hp, mage.stats.max_hp - 10);
        assert!(mage.stats.max_hp > old_max);
    }

    #[test]
    fn test_damage_and_heal_clamp() {
        let mut zombie = Combatant::new(1, "Z", Archetype::Zombie, 1, &curve());
        assert_eq!(zombie.apply_damage(1000), 110);
        assert!(!zombie.is_alive());
        assert_eq!(zombie.heal(50), 0);
    }

    #[test]
    fn test_skeleton_vulnerability() {
        let skeleton = Combatant::new(1, "S", Archetype::Skeleton, 1, &curve());
        let blade = Hit::new(20, DamageKind::Physical, HitKind::Normal);
        let spell = Hit::new(20, DamageKind::Magical, HitKind::Normal);
        assert_eq!(skeleton.adjusted_raw(&blade), 14);
        assert_eq!(skeleton.adjusted_raw(&spell), 30);
    }

    #[test]
    fn test_troll_regen_accumulates() {
        let mut troll = Combatant::new(1, "T", Archetype::Troll, 1, &curve());
        troll.hp = 100;
        // 2% of 180 = 3.6 hp/s; 10 ticks of 0.1 s.
        let healed: i32 = (0..10).map(|_| troll.tick_passives(milli(100))).sum();
        assert_eq!(healed, 3);
        assert_eq!(troll.hp, 103);
    }

    #[test]
    fn test_weaker_than_uses_ratio() {
        let mut a = Combatant::new(1, "A", Archetype::Warrior, 1, &curve());
        let mut b = Combatant::new(2, "B", Archetype::Mage, 1, &curve());
        a.hp = 75; // 0.5
        b.hp = 60; // 0.75
        assert!(a.weaker_than(&b));
        assert!(!b.weaker_than(&a));
    }

    #[test]
    fn test_roll_strike_shapes() {
        let mut rng = BattleRng::new(5);
        let mut mage = Combatant::new(1, "M", Archetype::Mage, 1, &curve());
        let strike = mage.roll_strike(&mut rng);
        assert_eq!(strike.hits.len(), 1);
        assert_eq!(strike.hits[0].damage_kind, DamageKind::Magical);
        assert_eq!(strike.hits[0].raw, 18);

        let mut archer = Combatant::new(2, "A", Archetype::Archer, 1, &curve());
        for _ in 0..50 {
            let strike = archer.roll_strike(&mut rng);
            assert!((1..=3).contains(&strike.hits.len()));
            assert_eq!(strike.hits[0].raw, 14 * 8 / 10);
        }
    }

    #[test]
    fn test_dragon_breath_timer() {
        let mut rng = BattleRng::new(11);
        let mut dragon = Combatant::new(1, "D", Archetype::Dragon, 1, &curve());
        let breaths = (0..40)
            .filter(|_| {
                dragon
                    .roll_strike(&mut rng)
                    .hits
                    .iter()
                    .any(|hit| hit.kind == HitKind::Breath)
            })
            .count();
        // Timer never ticks, so at most one breath.
        assert!(breaths <= 1);
    }

    #[test]
    fn test_attack_range_and_speed() {
        let archer = Combatant::new(1, "A", Archetype::Archer, 1, &curve());
        assert_eq!(archer.attack_range(), Fixed::from_num(160));
        assert_eq!(archer.movement_speed(), Fixed::from_num(60 + 5 * 7));
        assert!(archer.dodge_chance() > Fixed::ZERO);
        let orc = Combatant::new(2, "O", Archetype::Orc, 1, &curve());
        assert_eq!(orc.attack_range(), Fixed::from_num(60));
        assert_eq!(orc.dodge_chance(), Fixed::ZERO);
    }
}
