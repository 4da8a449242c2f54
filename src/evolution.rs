// 🥚 Evolution Tiers & Identity Assignment
//
// Tier is a pure function of level. Identities (name + sprite id) come from
// per-(type, tier) pools; one UsedIdentitySet is threaded through a whole
// generation pass so that sprites are not handed out twice while stock lasts.

use crate::element::ElementType;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_SPRITE_BASE: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork";

// ============================================================================
// TIERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Rookie,
    Intermediate,
    Advanced,
    Elite,
    Master,
}

impl Tier {
    /// Lowest to highest
    pub const ORDER: [Tier; 5] = [Tier::Rookie, Tier::Intermediate, Tier::Advanced, Tier::Elite, Tier::Master];

    /// Levels outside 1..=100 are clamped first
    pub fn from_level(level: u8) -> Tier {
        match level.clamp(1, 100) {
            1..=20 => Tier::Rookie,
            21..=40 => Tier::Intermediate,
            41..=60 => Tier::Advanced,
            61..=80 => Tier::Elite,
            _ => Tier::Master,
        }
    }

    pub fn level_range(&self) -> (u8, u8) {
        match self {
            Tier::Rookie => (1, 20),
            Tier::Intermediate => (21, 40),
            Tier::Advanced => (41, 60),
            Tier::Elite => (61, 80),
            Tier::Master => (81, 100),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Rookie => "rookie",
            Tier::Intermediate => "intermediate",
            Tier::Advanced => "advanced",
            Tier::Elite => "elite",
            Tier::Master => "master",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Rookie => "Débutant",
            Tier::Intermediate => "Intermédiaire",
            Tier::Advanced => "Avancé",
            Tier::Elite => "Élite",
            Tier::Master => "Maître",
        }
    }

    pub fn rarity(&self) -> Rarity {
        match self {
            Tier::Rookie => Rarity::Common,
            Tier::Intermediate => Rarity::Uncommon,
            Tier::Advanced => Rarity::Rare,
            Tier::Elite => Rarity::Epic,
            Tier::Master => Rarity::Legendary,
        }
    }

    /// Own tier first, then every lower tier down to rookie
    pub fn downward(self) -> impl Iterator<Item = Tier> {
        Tier::ORDER.into_iter().rev().filter(move |t| *t <= self)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Tier::ORDER
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown tier: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn label(&self) -> &'static str {
        match self {
            Rarity::Common => "Commun",
            Rarity::Uncommon => "Peu Commun",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Épique",
            Rarity::Legendary => "Légendaire",
        }
    }
}

// ============================================================================
// BADGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub min_level: u8,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

pub const BADGES: [Badge; 6] = [
    Badge { min_level: 1, name: "Rookie", icon: "🌱", color: "#10b981" },
    Badge { min_level: 10, name: "Apprentice", icon: "🔰", color: "#3b82f6" },
    Badge { min_level: 25, name: "Athlete", icon: "💪", color: "#8b5cf6" },
    Badge { min_level: 50, name: "Champion", icon: "🏆", color: "#f59e0b" },
    Badge { min_level: 75, name: "Master", icon: "👑", color: "#ef4444" },
    Badge { min_level: 100, name: "Legend", icon: "⭐", color: "#fbbf24" },
];

/// Highest badge whose threshold the level reaches
pub fn badge_for(level: u8) -> Badge {
    BADGES
        .iter()
        .rev()
        .find(|b| level >= b.min_level)
        .copied()
        .unwrap_or(BADGES[0])
}

// ============================================================================
// IDENTITIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(alias = "id")]
    pub sprite_id: u32,
}

impl Identity {
    pub fn new(name: &str, sprite_id: u32) -> Self {
        Identity {
            name: name.to_string(),
            sprite_id,
        }
    }

    /// Fallback when no pool can serve a member
    pub fn placeholder() -> Self {
        Identity::new("Évoli", 133)
    }

    pub fn sprite_url(&self, base: &str) -> String {
        format!("{}/{}.png", base.trim_end_matches('/'), self.sprite_id)
    }
}

/// Sprite ids already handed out in the current pass
#[derive(Debug, Default, Clone)]
pub struct UsedIdentitySet {
    sprites: HashSet<u32>,
}

impl UsedIdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, sprite_id: u32) -> bool {
        self.sprites.contains(&sprite_id)
    }

    pub fn mark(&mut self, sprite_id: u32) {
        self.sprites.insert(sprite_id);
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

/// Stable non-negative hash of a member id
pub fn member_hash(member_id: &str) -> u64 {
    let digest = Sha256::digest(member_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn pick_index(member_id: &str, len: usize) -> usize {
    (member_hash(member_id) % len as u64) as usize
}

/// How an identity was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Unused identity from the member's own tier
    OwnTier,
    /// Own tier exhausted; first unused identity of a lower tier
    LowerTier,
    /// Everything exhausted; duplicate from the member's own tier
    Duplicate,
    /// No pool at all
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedIdentity {
    pub identity: Identity,
    /// Tier of the pool the identity came from (never above the member's)
    pub tier: Tier,
    pub source: AssignmentSource,
}

// ============================================================================
// POOLS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityPools {
    pools: HashMap<ElementType, BTreeMap<Tier, Vec<Identity>>>,
}

impl IdentityPools {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load pools from a JSON object `{type: {tier: [{name, id}]}}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read identity pools: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse identity pools JSON")
    }

    pub fn insert(&mut self, element: ElementType, tier: Tier, identities: Vec<Identity>) {
        self.pools.entry(element).or_default().insert(tier, identities);
    }

    pub fn pool(&self, element: ElementType, tier: Tier) -> &[Identity] {
        self.pools
            .get(&element)
            .and_then(|tiers| tiers.get(&tier))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_type(&self, element: ElementType) -> bool {
        self.pools.contains_key(&element)
    }

    pub fn identity_count(&self) -> usize {
        self.pools.values().flat_map(|t| t.values()).map(|v| v.len()).sum()
    }

    /// Types without any pool borrow the normal pools
    fn resolve(&self, element: ElementType) -> ElementType {
        if self.has_type(element) {
            element
        } else {
            ElementType::Normal
        }
    }

    /// Pick an identity for a member. Never fails: falls back to lower tiers,
    /// then to duplicates inside the own tier, then to the placeholder.
    pub fn assign(
        &self,
        element: ElementType,
        tier: Tier,
        member_id: &str,
        used: &mut UsedIdentitySet,
    ) -> AssignedIdentity {
        let element = self.resolve(element);

        let available: Vec<&Identity> = self
            .pool(element, tier)
            .iter()
            .filter(|i| !used.contains(i.sprite_id))
            .collect();

        if !available.is_empty() {
            let identity = available[pick_index(member_id, available.len())].clone();
            used.mark(identity.sprite_id);
            return AssignedIdentity {
                identity,
                tier,
                source: AssignmentSource::OwnTier,
            };
        }

        for lower in tier.downward().skip(1) {
            if let Some(identity) = self.pool(element, lower).iter().find(|i| !used.contains(i.sprite_id)) {
                used.mark(identity.sprite_id);
                return AssignedIdentity {
                    identity: identity.clone(),
                    tier: lower,
                    source: AssignmentSource::LowerTier,
                };
            }
        }

        let own = self.pool(element, tier);
        if !own.is_empty() {
            let identity = own[pick_index(member_id, own.len())].clone();
            used.mark(identity.sprite_id);
            return AssignedIdentity {
                identity,
                tier,
                source: AssignmentSource::Duplicate,
            };
        }

        tracing::warn!(element = %element, tier = %tier, member_id, "No identity pool, using placeholder");
        AssignedIdentity {
            identity: Identity::placeholder(),
            tier: Tier::Rookie,
            source: AssignmentSource::Placeholder,
        }
    }

    /// Gym roster shipped with the app
    pub fn standard() -> Self {
        let mut pools = IdentityPools::empty();
        for (element, tiers) in STANDARD_POOLS {
            for (tier, entries) in tiers.iter() {
                let identities = entries.iter().map(|(name, id)| Identity::new(name, *id)).collect();
                pools.insert(*element, *tier, identities);
            }
        }
        pools
    }
}

type PoolTable = [(Tier, &'static [(&'static str, u32)]); 5];

const STANDARD_POOLS: &[(ElementType, PoolTable)] = &[
    (
        ElementType::Fighting,
        [
            (
                Tier::Rookie,
                &[
                    ("Machoc", 66),
                    ("Férosinge", 56),
                    ("Sabelette", 27),
                    ("Taupiqueur", 50),
                    ("Racaillou", 74),
                    ("Ptitard", 60),
                    ("Kokiyas", 90),
                    ("Krabby", 98),
                    ("Osselait", 104),
                ],
            ),
            (
                Tier::Intermediate,
                &[
                    ("Machopeur", 67),
                    ("Colossinge", 57),
                    ("Sablaireau", 28),
                    ("Triopikeur", 51),
                    ("Gravalanch", 75),
                    ("Têtarte", 61),
                    ("Crustabri", 91),
                    ("Krabboss", 99),
                    ("Ossatueur", 105),
                ],
            ),
            (
                Tier::Advanced,
                &[
                    ("Mackogneur", 68),
                    ("Kicklee", 106),
                    ("Tygnon", 107),
                    ("Grolem", 76),
                    ("Onix", 95),
                    ("Tartard", 62),
                ],
            ),
            (Tier::Elite, &[("Rhinoféros", 112), ("Ectoplasma", 94), ("Lokhlass", 131), ("Ronflex", 143)]),
            (Tier::Master, &[("Mewtwo", 150), ("Mew", 151)]),
        ],
    ),
    (
        ElementType::Flying,
        [
            (
                Tier::Rookie,
                &[
                    ("Roucool", 16),
                    ("Piafabec", 21),
                    ("Nosferapti", 41),
                    ("Chenipan", 10),
                    ("Aspicot", 13),
                    ("Doduo", 84),
                ],
            ),
            (
                Tier::Intermediate,
                &[
                    ("Roucoups", 17),
                    ("Rapasdepic", 22),
                    ("Nosferalto", 42),
                    ("Chrysacier", 11),
                    ("Coconfort", 14),
                    ("Dodrio", 85),
                ],
            ),
            (
                Tier::Advanced,
                &[
                    ("Roucarnage", 18),
                    ("Papilusion", 12),
                    ("Dardargnan", 15),
                    ("Insécateur", 123),
                    ("Minidraco", 147),
                ],
            ),
            (Tier::Elite, &[("Ptéra", 142), ("Dracolosse", 149), ("Draco", 148)]),
            (Tier::Master, &[("Artikodin", 144), ("Électhor", 145), ("Sulfura", 146)]),
        ],
    ),
    (
        ElementType::Electric,
        [
            (Tier::Rookie, &[("Magnéti", 81), ("Voltorbe", 100), ("Pikachu", 25)]),
            (
                Tier::Intermediate,
                &[("Magnéton", 82), ("Électrode", 101), ("Raichu", 26), ("Élektek", 125)],
            ),
            (Tier::Advanced, &[("Voltali", 135)]),
            (Tier::Elite, &[("Électhor", 145)]),
            (Tier::Master, &[("Électhor", 145)]),
        ],
    ),
    (
        ElementType::Fire,
        [
            (Tier::Rookie, &[("Salamèche", 4), ("Goupix", 37), ("Caninos", 58), ("Ponyta", 77)]),
            (Tier::Intermediate, &[("Reptincel", 5), ("Galopa", 78), ("Feunard", 38)]),
            (
                Tier::Advanced,
                &[("Dracaufeu", 6), ("Arcanin", 59), ("Pyroli", 136), ("Magmar", 126)],
            ),
            (Tier::Elite, &[("Sulfura", 146)]),
            (Tier::Master, &[("Sulfura", 146)]),
        ],
    ),
    (
        ElementType::Psychic,
        [
            (
                Tier::Rookie,
                &[
                    ("Abra", 63),
                    ("Soporifik", 96),
                    ("Ramoloss", 79),
                    ("Mystherbe", 43),
                    ("Chetiflor", 69),
                    ("Fantominus", 92),
                ],
            ),
            (
                Tier::Intermediate,
                &[
                    ("Kadabra", 64),
                    ("Hypnomade", 97),
                    ("Flagadoss", 80),
                    ("Ortide", 44),
                    ("Boustiflor", 70),
                    ("Spectrum", 93),
                ],
            ),
            (
                Tier::Advanced,
                &[
                    ("Alakazam", 65),
                    ("Noadkoko", 103),
                    ("Rafflesia", 45),
                    ("Empiflor", 71),
                    ("Ectoplasma", 94),
                ],
            ),
            (Tier::Elite, &[("Staross", 121), ("Lippoutou", 124), ("Noadkoko", 103), ("Leveinard", 113)]),
            (Tier::Master, &[("Mewtwo", 150), ("Mew", 151)]),
        ],
    ),
    (
        ElementType::Normal,
        [
            (
                Tier::Rookie,
                &[
                    ("Rattata", 19),
                    ("Roucool", 16),
                    ("Nidoran♀", 29),
                    ("Nidoran♂", 32),
                    ("Mélofée", 35),
                    ("Évoli", 133),
                    ("Miaouss", 52),
                    ("Psykokwak", 54),
                    ("Otaria", 86),
                ],
            ),
            (
                Tier::Intermediate,
                &[
                    ("Rattatac", 20),
                    ("Nidorina", 30),
                    ("Nidorino", 33),
                    ("Mélodelfe", 36),
                    ("Persian", 53),
                    ("Akwakwak", 55),
                    ("Lamantine", 87),
                    ("Excelangue", 108),
                ],
            ),
            (
                Tier::Advanced,
                &[
                    ("Nidoqueen", 31),
                    ("Nidoking", 34),
                    ("Kangourex", 115),
                    ("Porygon", 137),
                    ("Lokhlass", 131),
                    ("Léviator", 130),
                ],
            ),
            (Tier::Elite, &[("Tauros", 128), ("Ronflex", 143), ("Leveinard", 113), ("Staross", 121)]),
            (Tier::Master, &[("Mewtwo", 150), ("Mew", 151), ("Dracolosse", 149)]),
        ],
    ),
];
