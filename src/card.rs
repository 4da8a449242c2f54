// 🎴 Card Engine - One pass from members + performances to a gallery of cards

use crate::db::{Gender, Member, PerformanceRecord};
use crate::element::{attacks_for, classify_type, Attack, ElementType};
use crate::evolution::{
    badge_for, AssignmentSource, Badge, Identity, IdentityPools, Rarity, Tier, UsedIdentitySet, DEFAULT_SPRITE_BASE,
};
use crate::gallery::Gallery;
use crate::normalizer::Normalizer;
use crate::rules::ExerciseClassifier;
use crate::stats::{aggregate, derive_level, CategoryCounts, LegacyStats, ScoringMode, StatVector};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,

    pub level: u8,
    /// Always equal to `level`
    pub hp: u8,
    pub stats: StatVector,
    pub legacy: LegacyStats,
    pub category_counts: CategoryCounts,
    pub scoring_mode: ScoringMode,

    pub element: ElementType,
    pub tier: Tier,
    pub rarity: Rarity,
    pub badge: Badge,
    pub attacks: Vec<Attack>,

    pub identity: Identity,
    /// Tier of the pool the identity was drawn from
    pub identity_tier: Tier,
    pub identity_source: AssignmentSource,
    pub sprite_url: String,

    pub performance_count: usize,
    pub pr_count: usize,
    pub last_performance: Option<NaiveDate>,
    pub generated_at: DateTime<Utc>,
}

impl Card {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

pub struct CardEngine {
    classifier: ExerciseClassifier,
    pools: IdentityPools,
    sprite_base: String,
}

impl Default for CardEngine {
    fn default() -> Self {
        CardEngine::new(ExerciseClassifier::standard(), IdentityPools::standard())
    }
}

impl CardEngine {
    pub fn new(classifier: ExerciseClassifier, pools: IdentityPools) -> Self {
        CardEngine {
            classifier,
            pools,
            sprite_base: DEFAULT_SPRITE_BASE.to_string(),
        }
    }

    pub fn with_sprite_base(mut self, base: &str) -> Self {
        self.sprite_base = base.to_string();
        self
    }

    pub fn classifier(&self) -> &ExerciseClassifier {
        &self.classifier
    }

    /// Build one card. `records` must belong to `member`.
    pub fn generate_card(
        &self,
        member: &Member,
        records: &[PerformanceRecord],
        normalizer: Option<&dyn Normalizer>,
        used: &mut UsedIdentitySet,
    ) -> Card {
        let (stats, scoring_mode) = aggregate(member, records, &self.classifier, normalizer);
        let counts = CategoryCounts::tally(records, &self.classifier);
        let level = derive_level(&stats, records.len());

        let element = classify_type(&stats, &counts);
        let tier = Tier::from_level(level);
        let assigned = self.pools.assign(element, tier, &member.id, used);

        debug!(
            member_id = %member.id,
            level,
            element = %element,
            tier = %tier,
            identity = %assigned.identity.name,
            "Card generated"
        );

        Card {
            member_id: member.id.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            gender: member.gender,
            level,
            hp: level,
            stats,
            legacy: stats.legacy(),
            category_counts: counts,
            scoring_mode,
            element,
            tier,
            rarity: tier.rarity(),
            badge: badge_for(level),
            attacks: attacks_for(element, level),
            sprite_url: assigned.identity.sprite_url(&self.sprite_base),
            identity: assigned.identity,
            identity_tier: assigned.tier,
            identity_source: assigned.source,
            performance_count: records.len(),
            pr_count: records.iter().filter(|r| r.is_pr).count(),
            last_performance: records.iter().filter_map(|r| r.date_parsed()).max(),
            generated_at: Utc::now(),
        }
    }

    /// Regenerate every card with a fresh used-identity set. Members are
    /// processed in the given order, so identities depend on that order.
    pub fn regenerate_gallery(
        &self,
        members: &[Member],
        records: &[PerformanceRecord],
        normalizer: Option<&dyn Normalizer>,
    ) -> Gallery {
        let mut by_member: HashMap<&str, Vec<PerformanceRecord>> = HashMap::new();
        for rec in records {
            by_member.entry(rec.member_id.as_str()).or_default().push(rec.clone());
        }

        let mut used = UsedIdentitySet::new();
        let cards: Vec<Card> = members
            .iter()
            .map(|m| {
                let own = by_member.get(m.id.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
                self.generate_card(m, own, normalizer, &mut used)
            })
            .collect();

        info!(
            cards = cards.len(),
            records = records.len(),
            identities_used = used.len(),
            "Gallery regenerated"
        );

        Gallery::new(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Unit;
    use crate::normalizer::PeerReference;

    struct Fixed(f64);

    impl Normalizer for Fixed {
        fn normalize(&self, _record: &PerformanceRecord, _member: &Member) -> f64 {
            self.0
        }
    }

    fn squats(member_id: &str, n: usize) -> Vec<PerformanceRecord> {
        (0..n)
            .map(|i| {
                PerformanceRecord::new(member_id, "Back Squat", 100.0 + i as f64, Unit::Kg, &format!("2024-03-{:02}", i + 1))
            })
            .collect()
    }

    #[test]
    fn test_empty_member_card() {
        let engine = CardEngine::default();
        let member = Member::new("m0", "Paul", "Durand", Gender::Male);
        let card = engine.generate_card(&member, &[], None, &mut UsedIdentitySet::new());

        assert_eq!(card.level, 1);
        assert_eq!(card.hp, 1);
        assert_eq!(card.stats, StatVector::floor());
        assert_eq!(card.element, ElementType::Normal);
        assert_eq!(card.tier, Tier::Rookie);
        assert_eq!(card.identity_tier, Tier::Rookie);
        assert_eq!(card.attacks.len(), 1);
        assert_eq!(card.last_performance, None);
    }

    #[test]
    fn test_squat_specialist_card() {
        let engine = CardEngine::default();
        let member = Member::new("m1", "Lea", "Martin", Gender::Female);
        let records = squats("m1", 10);
        let card = engine.generate_card(&member, &records, Some(&Fixed(90.0)), &mut UsedIdentitySet::new());

        assert_eq!(card.stats.force, 90);
        assert_eq!(card.level, 26);
        assert_eq!(card.hp, card.level);
        assert_eq!(card.tier, Tier::Intermediate);
        assert_eq!(card.element, ElementType::Fighting);
        assert_eq!(card.scoring_mode, ScoringMode::PeerRelative);
        assert_eq!(card.badge.name, "Athlete");
        assert_eq!(card.last_performance, NaiveDate::from_ymd_opt(2024, 3, 10));
        assert!(card.sprite_url.ends_with(&format!("/{}.png", card.identity.sprite_id)));
    }

    #[test]
    fn test_gallery_keeps_member_order_and_avoids_duplicates() {
        let engine = CardEngine::default();
        let members: Vec<Member> = (0..5)
            .map(|i| Member::new(&format!("m{}", i), "A", &format!("N{}", i), Gender::Male))
            .collect();
        let records: Vec<PerformanceRecord> = members.iter().flat_map(|m| squats(&m.id, 2)).collect();

        let reference = PeerReference::build(&members, &records);
        let gallery = engine.regenerate_gallery(&members, &records, Some(&reference));

        let ids: Vec<&str> = gallery.cards().iter().map(|c| c.member_id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);

        let mut sprites: Vec<u32> = gallery.cards().iter().map(|c| c.identity.sprite_id).collect();
        sprites.sort();
        sprites.dedup();
        assert_eq!(sprites.len(), 5);
    }

    #[test]
    fn test_two_passes_are_identical() {
        let engine = CardEngine::default();
        let members = vec![
            Member::new("a", "A", "A", Gender::Female),
            Member::new("b", "B", "B", Gender::Male),
        ];
        let mut records = squats("a", 3);
        records.extend(squats("b", 4));

        let first = engine.regenerate_gallery(&members, &records, None);
        let second = engine.regenerate_gallery(&members, &records, None);

        for (x, y) in first.cards().iter().zip(second.cards()) {
            assert_eq!(x.level, y.level);
            assert_eq!(x.element, y.element);
            assert_eq!(x.tier, y.tier);
            assert_eq!(x.identity, y.identity);
        }
    }
}
