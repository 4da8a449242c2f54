// Score normalization: raw performance value -> 0-100
//
// Two implementations:
// - PeerReference: relative to the best value logged by same-gender members
// - StandardsNormalizer: absolute, against fixed athletic standards

use crate::db::{Gender, Member, PerformanceRecord, Unit};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Score given when there is nothing to compare against
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Converts one performance of one member into a 0-100 score.
pub trait Normalizer {
    fn normalize(&self, record: &PerformanceRecord, member: &Member) -> f64;

    /// False when the reference data could not be loaded. The aggregator then
    /// falls back to record-share scoring.
    fn is_loaded(&self) -> bool {
        true
    }
}

// ============================================================================
// PEER REFERENCE
// ============================================================================

#[derive(Debug, Clone)]
pub struct PeerBest {
    pub value: f64,
    pub member_id: String,
    pub unit: Unit,
}

/// Best known value per (gender group, exercise, unit).
#[derive(Debug, Clone)]
pub struct PeerReference {
    bests: HashMap<(Gender, String), PeerBest>,
    built_at: DateTime<Utc>,
}

impl PeerReference {
    pub fn empty() -> Self {
        PeerReference {
            bests: HashMap::new(),
            built_at: Utc::now(),
        }
    }

    pub fn build(members: &[Member], records: &[PerformanceRecord]) -> Self {
        let genders: HashMap<&str, Gender> = members
            .iter()
            .map(|m| (m.id.as_str(), m.gender.peer_group()))
            .collect();

        let mut bests: HashMap<(Gender, String), PeerBest> = HashMap::new();

        for rec in records {
            if rec.value <= 0.0 || rec.exercise.trim().is_empty() {
                continue;
            }
            let group = genders
                .get(rec.member_id.as_str())
                .copied()
                .unwrap_or(Gender::Male);
            let key = (group, rec.exercise_key());

            let replace = match bests.get(&key) {
                None => true,
                Some(current) if rec.unit.lower_is_better() => rec.value < current.value,
                Some(current) => rec.value > current.value,
            };

            if replace {
                bests.insert(
                    key,
                    PeerBest {
                        value: rec.value,
                        member_id: rec.member_id.clone(),
                        unit: rec.unit,
                    },
                );
            }
        }

        debug!(entries = bests.len(), "peer reference built");

        PeerReference {
            bests,
            built_at: Utc::now(),
        }
    }

    pub fn best_for(&self, gender: Gender, record: &PerformanceRecord) -> Option<&PeerBest> {
        self.bests.get(&(gender.peer_group(), record.exercise_key()))
    }

    pub fn len(&self) -> usize {
        self.bests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bests.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.built_at >= ttl
    }
}

impl Normalizer for PeerReference {
    fn normalize(&self, record: &PerformanceRecord, member: &Member) -> f64 {
        if record.value <= 0.0 {
            return 0.0;
        }

        let Some(best) = self.best_for(member.gender, record) else {
            warn!(exercise = %record.exercise, gender = ?member.gender.peer_group(), "no peer reference");
            return NEUTRAL_SCORE;
        };

        let score = if record.unit.lower_is_better() {
            best.value / record.value * 100.0
        } else {
            record.value / best.value * 100.0
        };

        score.clamp(0.0, 100.0)
    }

    fn is_loaded(&self) -> bool {
        !self.bests.is_empty()
    }
}

// ============================================================================
// STANDARDS NORMALIZER
// ============================================================================

/// Elite / good / average marks. For times lower is better, for reps higher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standard {
    pub elite: f64,
    pub good: f64,
    pub average: f64,
}

const fn std3(elite: f64, good: f64, average: f64) -> Standard {
    Standard { elite, good, average }
}

struct WilksCoefficients {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

const WILKS_MALE: WilksCoefficients = WilksCoefficients {
    a: -216.0475144,
    b: 16.2606339,
    c: -0.002388645,
    d: -0.00113732,
    e: 7.01863e-6,
    f: -1.291e-8,
};

const WILKS_FEMALE: WilksCoefficients = WilksCoefficients {
    a: 594.31747775582,
    b: -27.23842536447,
    c: 0.82112226871,
    d: -0.00930733913,
    e: 0.00004731582,
    f: -0.00000009054,
};

// (name prefix, male, female), times in seconds
const CARDIO_STANDARDS: &[(&str, Standard, Standard)] = &[
    ("600m", std3(95.0, 125.0, 160.0), std3(115.0, 145.0, 185.0)),
    ("800m", std3(130.0, 170.0, 220.0), std3(155.0, 200.0, 255.0)),
    ("1200m", std3(225.0, 290.0, 360.0), std3(270.0, 340.0, 420.0)),
    ("2000m", std3(420.0, 540.0, 690.0), std3(510.0, 650.0, 820.0)),
    ("5km", std3(1050.0, 1350.0, 1680.0), std3(1260.0, 1600.0, 2000.0)),
    ("1km skierg", std3(180.0, 235.0, 295.0), std3(220.0, 280.0, 350.0)),
    ("1km rameur", std3(180.0, 225.0, 280.0), std3(215.0, 270.0, 335.0)),
    ("2km bikerg", std3(270.0, 340.0, 420.0), std3(325.0, 410.0, 510.0)),
];

// (name keyword, male, female)
const REP_STANDARDS: &[(&str, Standard, Standard)] = &[
    ("pull", std3(30.0, 20.0, 10.0), std3(20.0, 12.0, 5.0)),
    ("toes", std3(30.0, 20.0, 10.0), std3(20.0, 12.0, 5.0)),
    ("dips", std3(40.0, 25.0, 12.0), std3(25.0, 15.0, 7.0)),
    ("push", std3(70.0, 50.0, 30.0), std3(50.0, 35.0, 20.0)),
    ("burpees", std3(50.0, 40.0, 25.0), std3(40.0, 30.0, 20.0)),
    ("handstand", std3(120.0, 60.0, 30.0), std3(90.0, 45.0, 20.0)),
];

/// Absolute scoring against fixed standards, adjusted for body weight and
/// height. Needs no peer data, so it is always loaded.
#[derive(Debug, Clone, Default)]
pub struct StandardsNormalizer;

impl StandardsNormalizer {
    pub fn wilks_coefficient(body_weight: f64, gender: Gender) -> f64 {
        let k = match gender {
            Gender::Female => &WILKS_FEMALE,
            _ => &WILKS_MALE,
        };
        let bw = body_weight;
        let denominator = k.a
            + k.b * bw
            + k.c * bw.powi(2)
            + k.d * bw.powi(3)
            + k.e * bw.powi(4)
            + k.f * bw.powi(5);

        500.0 / denominator
    }

    pub fn strength(weight: f64, body_weight: f64, gender: Gender, height: Option<f64>) -> f64 {
        if weight <= 0.0 || body_weight <= 0.0 {
            return 0.0;
        }

        let wilks = weight * Self::wilks_coefficient(body_weight, gender);
        let max_wilks = if gender == Gender::Female { 400.0 } else { 450.0 };
        let mut score = wilks / max_wilks * 100.0;

        // Taller lifters move the bar further: +-10% per 100cm around 170cm
        if let Some(h) = height.filter(|h| *h > 0.0) {
            score /= 1.0 + (h - 170.0) / 100.0 * 0.1;
        }

        score.clamp(0.0, 100.0)
    }

    pub fn cardio(seconds: f64, exercise: &str, body_weight: f64, gender: Gender) -> f64 {
        if seconds <= 0.0 || body_weight <= 0.0 {
            return 0.0;
        }

        let name = exercise.to_lowercase();
        let Some(&(_, male, female)) = CARDIO_STANDARDS.iter().find(|(k, _, _)| name.contains(k)) else {
            return NEUTRAL_SCORE;
        };
        let s = if gender == Gender::Female { female } else { male };

        let reference_weight = if gender == Gender::Female { 60.0 } else { 75.0 };
        let adjusted = seconds * (reference_weight / body_weight).powf(0.33);

        let score = if adjusted <= s.elite {
            100.0
        } else if adjusted <= s.good {
            80.0 + (s.good - adjusted) / (s.good - s.elite) * 20.0
        } else if adjusted <= s.average {
            50.0 + (s.average - adjusted) / (s.average - s.good) * 30.0
        } else {
            (50.0 - (adjusted - s.average) / s.average * 50.0).max(0.0)
        };

        score.clamp(0.0, 100.0)
    }

    pub fn reps(reps: f64, exercise: &str, gender: Gender) -> f64 {
        if reps <= 0.0 {
            return 0.0;
        }

        let name = exercise.to_lowercase();
        let Some(&(_, male, female)) = REP_STANDARDS.iter().find(|(k, _, _)| name.contains(k)) else {
            return NEUTRAL_SCORE;
        };
        let s = if gender == Gender::Female { female } else { male };

        let score = if reps >= s.elite {
            100.0
        } else if reps >= s.good {
            80.0 + (reps - s.good) / (s.elite - s.good) * 20.0
        } else if reps >= s.average {
            50.0 + (reps - s.average) / (s.good - s.average) * 30.0
        } else {
            reps / s.average * 50.0
        };

        score.clamp(0.0, 100.0)
    }
}

impl Normalizer for StandardsNormalizer {
    fn normalize(&self, record: &PerformanceRecord, member: &Member) -> f64 {
        let gender = member.gender.peer_group();
        let weight = member.weight.unwrap_or(0.0);

        match record.unit {
            Unit::Kg => Self::strength(record.value, weight, gender, member.height),
            Unit::Sec => Self::cardio(record.value, &record.exercise, weight, gender),
            Unit::Reps => Self::reps(record.value, &record.exercise, gender),
            Unit::Watts => {
                if weight <= 0.0 {
                    return NEUTRAL_SCORE;
                }
                let elite = if gender == Gender::Female { 8.0 } else { 10.0 };
                (record.value / weight / elite * 100.0).clamp(0.0, 100.0)
            }
            Unit::Cm => match member.height.filter(|h| *h > 0.0) {
                // 40% of body height counts as elite
                Some(h) => (record.value / h * 100.0 / 40.0 * 100.0).clamp(0.0, 100.0),
                None => NEUTRAL_SCORE,
            },
            Unit::Other => NEUTRAL_SCORE,
        }
    }
}
