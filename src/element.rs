// ⚡ Element Types - Ordered type rules, display metadata and attacks

use crate::rules::Category;
use crate::stats::{CategoryCounts, StatVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Share of records a category needs (strictly more than) for a specialist type
pub const SPECIALIST_SHARE: f64 = 0.4;

/// Force (atk) level above which a force-dominant member without the
/// specialist share becomes fire
pub const FIRE_FORCE_THRESHOLD: u8 = 70;

// ============================================================================
// ELEMENT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Fighting,
    Electric,
    Fire,
    Psychic,
    Flying,
    Normal,
}

impl ElementType {
    pub const ALL: [ElementType; 6] = [
        ElementType::Fighting,
        ElementType::Electric,
        ElementType::Fire,
        ElementType::Psychic,
        ElementType::Flying,
        ElementType::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Fighting => "fighting",
            ElementType::Electric => "electric",
            ElementType::Fire => "fire",
            ElementType::Psychic => "psychic",
            ElementType::Flying => "flying",
            ElementType::Normal => "normal",
        }
    }

    pub fn display(&self) -> TypeDisplay {
        match self {
            ElementType::Fighting => TypeDisplay {
                name: "Combat",
                icon: "🥊",
                color: "#C03028",
                description: "Spécialiste en force et musculation",
            },
            ElementType::Flying => TypeDisplay {
                name: "Vol",
                icon: "🦅",
                color: "#A890F0",
                description: "Expert en endurance et cardio",
            },
            ElementType::Electric => TypeDisplay {
                name: "Électrik",
                icon: "⚡",
                color: "#F8D030",
                description: "Maître de la vitesse et explosivité",
            },
            ElementType::Fire => TypeDisplay {
                name: "Feu",
                icon: "🔥",
                color: "#F08030",
                description: "Champion de puissance et ballistic",
            },
            ElementType::Psychic => TypeDisplay {
                name: "Psy",
                icon: "🧠",
                color: "#F85888",
                description: "Technicien et tacticien",
            },
            ElementType::Normal => TypeDisplay {
                name: "Normal",
                icon: "⭐",
                color: "#A8A878",
                description: "Athlète équilibré et polyvalent",
            },
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown element type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeDisplay {
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

// ============================================================================
// TYPE RULES
// ============================================================================

/// What a type rule looks at
#[derive(Debug, Clone, Copy, PartialEq)]
enum Condition {
    /// Category is the max stat and holds > SPECIALIST_SHARE of records
    DominantWithShare(Category),
    /// Category is the max stat and above a value
    DominantAbove(Category, u8),
    /// Category is the max stat
    Dominant(Category),
}

/// Evaluated top to bottom, first hit wins. Normal is the fallthrough.
/// Fighting and fire both key on force, the atk stat of the legacy view.
const TYPE_RULES: [(ElementType, Condition); 5] = [
    (ElementType::Fighting, Condition::DominantWithShare(Category::Force)),
    (ElementType::Electric, Condition::DominantWithShare(Category::Cardio)),
    (ElementType::Fire, Condition::DominantAbove(Category::Force, FIRE_FORCE_THRESHOLD)),
    (ElementType::Psychic, Condition::DominantWithShare(Category::Gym)),
    (ElementType::Flying, Condition::Dominant(Category::Cardio)),
];

impl Condition {
    fn holds(&self, stats: &StatVector, counts: &CategoryCounts) -> bool {
        match *self {
            Condition::DominantWithShare(c) => stats.is_max(c) && counts.share(c) > SPECIALIST_SHARE,
            Condition::DominantAbove(c, min) => stats.is_max(c) && stats.get(c) > min,
            Condition::Dominant(c) => stats.is_max(c),
        }
    }
}

pub fn classify_type(stats: &StatVector, counts: &CategoryCounts) -> ElementType {
    if counts.total() == 0 {
        return ElementType::Normal;
    }

    TYPE_RULES
        .iter()
        .find(|(_, cond)| cond.holds(stats, counts))
        .map(|(t, _)| *t)
        .unwrap_or(ElementType::Normal)
}

// ============================================================================
// ATTACKS
// ============================================================================

pub const SECOND_ATTACK_LEVEL: u8 = 30;
pub const ULTIMATE_ATTACK_LEVEL: u8 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub damage: u32,
}

fn attack_templates(element: ElementType) -> [(&'static str, f64); 3] {
    match element {
        ElementType::Fighting => [("Poing Boost", 40.0), ("Casse-Brique", 60.0), ("Close Combat", 80.0)],
        ElementType::Electric => [("Éclair", 40.0), ("Tonnerre", 60.0), ("Fatal-Foudre", 80.0)],
        ElementType::Psychic => [("Choc Mental", 40.0), ("Psyko", 60.0), ("Prescience", 80.0)],
        ElementType::Fire => [("Flammèche", 40.0), ("Lance-Flammes", 60.0), ("Déflagration", 80.0)],
        ElementType::Flying => [("Cru-Ailes", 40.0), ("Aéropiqué", 60.0), ("Rapace", 80.0)],
        ElementType::Normal => [("Charge", 40.0), ("Plaquage", 60.0), ("Ultralaser", 80.0)],
    }
}

/// Basic attack always, second from level 30, ultimate from level 60
pub fn attacks_for(element: ElementType, level: u8) -> Vec<Attack> {
    let unlocked = if level >= ULTIMATE_ATTACK_LEVEL {
        3
    } else if level >= SECOND_ATTACK_LEVEL {
        2
    } else {
        1
    };

    let scale = 1.0 + level as f64 / 100.0;

    attack_templates(element)
        .iter()
        .take(unlocked)
        .map(|(name, base)| Attack {
            name: name.to_string(),
            damage: (base * scale).round() as u32,
        })
        .collect()
}
