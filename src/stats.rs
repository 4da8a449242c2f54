// Stat aggregation and level derivation
//
// Stats are integers in [5,100]. 5 is the floor and means "no data", not
// "no ability". Level (== HP) is the rounded mean of the four stats.

use crate::db::{Member, PerformanceRecord};
use crate::normalizer::Normalizer;
use crate::rules::{Category, ExerciseClassifier};
use serde::{Deserialize, Serialize};

pub const STAT_FLOOR: u8 = 5;
pub const STAT_CEIL: u8 = 100;
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatVector {
    pub cardio: u8,
    pub force: u8,
    pub gym: u8,
    pub power: u8,
}

impl StatVector {
    pub fn floor() -> Self {
        StatVector {
            cardio: STAT_FLOOR,
            force: STAT_FLOOR,
            gym: STAT_FLOOR,
            power: STAT_FLOOR,
        }
    }

    /// Build from raw scores, clamping each into [5,100]
    pub fn clamped(cardio: f64, force: f64, gym: f64, power: f64) -> Self {
        StatVector {
            cardio: clamp_stat(cardio),
            force: clamp_stat(force),
            gym: clamp_stat(gym),
            power: clamp_stat(power),
        }
    }

    pub fn get(&self, category: Category) -> u8 {
        match category {
            Category::Cardio => self.cardio,
            Category::Force => self.force,
            Category::Gym => self.gym,
            Category::Power => self.power,
        }
    }

    pub fn max(&self) -> u8 {
        self.cardio.max(self.force).max(self.gym).max(self.power)
    }

    pub fn is_max(&self, category: Category) -> bool {
        self.get(category) == self.max()
    }

    pub fn mean(&self) -> f64 {
        (self.cardio as f64 + self.force as f64 + self.gym as f64 + self.power as f64) / 4.0
    }

    pub fn legacy(&self) -> LegacyStats {
        LegacyStats {
            atk: self.force,
            def: self.gym,
            spd: self.cardio,
        }
    }
}

/// Three-stat view kept for older card layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStats {
    pub atk: u8,
    pub def: u8,
    pub spd: u8,
}

fn clamp_stat(score: f64) -> u8 {
    if score.is_nan() {
        return STAT_FLOOR;
    }
    score.clamp(STAT_FLOOR as f64, STAT_CEIL as f64) as u8
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Mean of peer-normalized scores per category
    PeerRelative,
    /// Share of the member's records falling in each category
    RecordShare,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::PeerRelative => "peer_relative",
            ScoringMode::RecordShare => "record_share",
        }
    }
}

/// Record counts per category for one member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub cardio: usize,
    pub force: usize,
    pub gym: usize,
    pub power: usize,
}

impl CategoryCounts {
    pub fn tally(records: &[PerformanceRecord], classifier: &ExerciseClassifier) -> Self {
        let mut counts = CategoryCounts::default();
        for rec in records {
            *counts.get_mut(classifier.classify(&rec.exercise)) += 1;
        }
        counts
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Cardio => self.cardio,
            Category::Force => self.force,
            Category::Gym => self.gym,
            Category::Power => self.power,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Cardio => &mut self.cardio,
            Category::Force => &mut self.force,
            Category::Gym => &mut self.gym,
            Category::Power => &mut self.power,
        }
    }

    pub fn total(&self) -> usize {
        self.cardio + self.force + self.gym + self.power
    }

    /// Fraction of all records in `category`, 0.0 when there are none
    pub fn share(&self, category: Category) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(category) as f64 / total as f64
    }
}

/// Stat vector for one member. Peer mode is used when a loaded normalizer is
/// supplied, otherwise record-share mode.
pub fn aggregate(
    member: &Member,
    records: &[PerformanceRecord],
    classifier: &ExerciseClassifier,
    normalizer: Option<&dyn Normalizer>,
) -> (StatVector, ScoringMode) {
    match normalizer.filter(|n| n.is_loaded()) {
        Some(n) => (aggregate_relative(member, records, classifier, n), ScoringMode::PeerRelative),
        None => (aggregate_by_share(records, classifier), ScoringMode::RecordShare),
    }
}

pub fn aggregate_relative(
    member: &Member,
    records: &[PerformanceRecord],
    classifier: &ExerciseClassifier,
    normalizer: &dyn Normalizer,
) -> StatVector {
    let mut sums = [0.0f64; 4];
    let mut counts = [0usize; 4];

    for rec in records {
        let idx = category_index(classifier.classify(&rec.exercise));
        sums[idx] += normalizer.normalize(rec, member);
        counts[idx] += 1;
    }

    let score = |idx: usize| {
        if counts[idx] == 0 {
            STAT_FLOOR as f64
        } else {
            (sums[idx] / counts[idx] as f64).round()
        }
    };

    StatVector::clamped(score(0), score(1), score(2), score(3))
}

pub fn aggregate_by_share(records: &[PerformanceRecord], classifier: &ExerciseClassifier) -> StatVector {
    let counts = CategoryCounts::tally(records, classifier);
    let total = counts.total();
    if total == 0 {
        return StatVector::floor();
    }

    let share = |c: Category| (100.0 * counts.get(c) as f64 / total as f64).floor();

    StatVector::clamped(
        share(Category::Cardio),
        share(Category::Force),
        share(Category::Gym),
        share(Category::Power),
    )
}

fn category_index(category: Category) -> usize {
    match category {
        Category::Cardio => 0,
        Category::Force => 1,
        Category::Gym => 2,
        Category::Power => 3,
    }
}

// ============================================================================
// LEVEL / HP
// ============================================================================

/// Single source for both level and HP. Members with no records sit at level 1.
pub fn derive_level(stats: &StatVector, record_count: usize) -> u8 {
    if record_count == 0 {
        return MIN_LEVEL;
    }
    stats.mean().round().clamp(MIN_LEVEL as f64, MAX_LEVEL as f64) as u8
}
