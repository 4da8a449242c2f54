// 🏷️ Exercise Classification Rules - Rules as Data
// Ordered substring rules mapping a free-text exercise name to a stat category

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cardio,
    Force,
    Gym,
    #[serde(alias = "puissance")]
    Power,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Cardio, Category::Force, Category::Gym, Category::Power];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cardio => "cardio",
            Category::Force => "force",
            Category::Gym => "gym",
            Category::Power => "power",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseRule {
    /// Rule ID for tracking
    pub id: String,

    /// Category assigned when the rule matches
    pub category: Category,

    /// Matches when the name contains any of these
    #[serde(default)]
    pub any_of: Vec<String>,

    /// Matches when the name contains all of these
    #[serde(default)]
    pub all_of: Vec<String>,

    /// Priority (higher = applied first)
    #[serde(default)]
    pub priority: i32,
}

impl ExerciseRule {
    pub fn any(id: &str, category: Category, priority: i32, patterns: &[&str]) -> Self {
        ExerciseRule {
            id: id.to_string(),
            category,
            any_of: patterns.iter().map(|p| p.to_string()).collect(),
            all_of: Vec::new(),
            priority,
        }
    }

    pub fn all(id: &str, category: Category, priority: i32, patterns: &[&str]) -> Self {
        ExerciseRule {
            id: id.to_string(),
            category,
            any_of: Vec::new(),
            all_of: patterns.iter().map(|p| p.to_string()).collect(),
            priority,
        }
    }

    /// Case-insensitive substring match
    pub fn matches(&self, exercise: &str) -> bool {
        let name = exercise.to_lowercase();

        let any_hit = self
            .any_of
            .iter()
            .any(|p| name.contains(&p.to_lowercase()));

        let all_hit = !self.all_of.is_empty()
            && self.all_of.iter().all(|p| name.contains(&p.to_lowercase()));

        any_hit || all_hit
    }
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// None when the default category was used
    pub rule_id: Option<String>,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct ExerciseClassifier {
    rules: Vec<ExerciseRule>,
    fallback: Category,
}

impl ExerciseClassifier {
    /// Empty classifier: everything lands in the fallback category
    pub fn new(fallback: Category) -> Self {
        ExerciseClassifier {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P, fallback: Category) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<ExerciseRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(ExerciseClassifier::from_rules(rules, fallback))
    }

    /// Create classifier from a list of rules. Equal priorities keep their order.
    pub fn from_rules(mut rules: Vec<ExerciseRule>, fallback: Category) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        ExerciseClassifier { rules, fallback }
    }

    /// Standard gym table. Power is checked first so that "Skierg (Pic watts)"
    /// is not taken by the cardio "skierg" pattern.
    pub fn standard() -> Self {
        let rules = vec![
            ExerciseRule::any("power", Category::Power, 40, &["pic watts", "watts", "jump", "saut"]),
            ExerciseRule::any(
                "cardio",
                Category::Cardio,
                30,
                &["run", "rameur", "row", "skierg", "ski erg", "bikerg", "burpees"],
            ),
            ExerciseRule::any(
                "force",
                Category::Force,
                20,
                &["squat", "deadlift", "bench", "strict press", "snatch"],
            ),
            ExerciseRule::all("force-clean-jerk", Category::Force, 20, &["clean", "jerk"]),
            ExerciseRule::any(
                "gym",
                Category::Gym,
                10,
                &[
                    "pullups",
                    "pull ups",
                    "pull-ups",
                    "dips",
                    "pushups",
                    "push ups",
                    "push-ups",
                    "toes to bar",
                    "handstand",
                ],
            ),
        ];

        ExerciseClassifier::from_rules(rules, Category::Gym)
    }

    pub fn add_rule(&mut self, rule: ExerciseRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn classify_detailed(&self, exercise: &str) -> Classification {
        for rule in &self.rules {
            if rule.matches(exercise) {
                return Classification {
                    category: rule.category,
                    rule_id: Some(rule.id.clone()),
                };
            }
        }

        Classification {
            category: self.fallback,
            rule_id: None,
        }
    }

    pub fn classify(&self, exercise: &str) -> Category {
        self.classify_detailed(exercise).category
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for ExerciseClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================
