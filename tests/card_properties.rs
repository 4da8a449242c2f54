// Property and scenario tests for card generation

use proptest::prelude::*;
use skali_cards::stats::STAT_FLOOR;
use skali_cards::{
    parse_lenient, AssignmentSource, Card, CardEngine, Category, ElementType, ExerciseClassifier, Gender, Identity,
    IdentityPools, Member, Normalizer, PeerReference, PerformanceRecord, Tier, Unit, UsedIdentitySet,
};

const EXERCISES: [&str; 10] = [
    "Back Squat",
    "Deadlift",
    "Bench Press",
    "1200m Run",
    "Rameur 2000m",
    "Pull-ups",
    "Muscle-ups",
    "Snatch",
    "Clean & Jerk",
    "Skierg (Pic watts)",
];

const POWER_KEYWORDS: &[&str] = &["watts", "jump", "saut"];
const CARDIO_KEYWORDS: &[&str] = &["run", "rameur", "row", "skierg", "ski erg", "bikerg", "burpees"];

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

struct Fixed(f64);

impl Normalizer for Fixed {
    fn normalize(&self, _record: &PerformanceRecord, _member: &Member) -> f64 {
        self.0
    }
}

fn record_strategy(member_id: &'static str) -> impl Strategy<Value = PerformanceRecord> {
    (0..EXERCISES.len(), 1.0f64..400.0, 1u32..28).prop_map(move |(ex, value, day)| {
        PerformanceRecord::new(member_id, EXERCISES[ex], value, Unit::Kg, &format!("2024-04-{:02}", day))
    })
}

fn members(n: usize) -> Vec<Member> {
    (0..n)
        .map(|i| {
            let gender = if i % 2 == 0 { Gender::Female } else { Gender::Male };
            Member::new(&format!("m{}", i), "Prénom", &format!("Nom{}", i), gender)
        })
        .collect()
}

fn assert_card_invariants(card: &Card) {
    assert_eq!(card.hp, card.level);
    assert!((1..=100).contains(&card.level));
    for value in [card.stats.cardio, card.stats.force, card.stats.gym, card.stats.power] {
        assert!((STAT_FLOOR..=100).contains(&value), "stat {} out of range", value);
    }
    assert_eq!(card.tier, Tier::from_level(card.level));
    assert!(card.identity_tier <= card.tier);
}

#[test]
fn tiers_partition_levels() {
    for level in 1..=100u8 {
        let tier = Tier::from_level(level);
        let (low, high) = tier.level_range();
        assert!(low <= level && level <= high, "level {} not in {:?}", level, tier);

        let owners = Tier::ORDER
            .iter()
            .filter(|t| {
                let (l, h) = t.level_range();
                l <= level && level <= h
            })
            .count();
        assert_eq!(owners, 1);
    }
}

proptest! {
    #[test]
    fn card_invariants_hold(records in prop::collection::vec(record_strategy("m0"), 0..40), score in -50.0f64..250.0) {
        let engine = CardEngine::default();
        let member = Member::new("m0", "Jade", "Roux", Gender::Female);

        let card = engine.generate_card(&member, &records, Some(&Fixed(score)), &mut UsedIdentitySet::new());
        assert_card_invariants(&card);
        prop_assert_eq!(card.performance_count, records.len());

        let card = engine.generate_card(&member, &records, None, &mut UsedIdentitySet::new());
        assert_card_invariants(&card);
    }

    #[test]
    fn untouched_category_sits_at_floor(n in 1usize..20, value in 20.0f64..300.0) {
        let engine = CardEngine::default();
        let member = Member::new("m0", "Hugo", "Blanc", Gender::Male);
        let records: Vec<PerformanceRecord> = (0..n)
            .map(|_| PerformanceRecord::new("m0", "Back Squat", value, Unit::Kg, "2024-01-10"))
            .collect();

        let reference = PeerReference::build(&[member.clone()], &records);
        let card = engine.generate_card(&member, &records, Some(&reference), &mut UsedIdentitySet::new());
        prop_assert_eq!(card.stats.cardio, STAT_FLOOR);
        prop_assert_eq!(card.stats.gym, STAT_FLOOR);
        prop_assert_eq!(card.stats.power, STAT_FLOOR);
    }

    #[test]
    fn gallery_is_deterministic(records in prop::collection::vec(
        (0usize..6, 0..EXERCISES.len(), 5.0f64..300.0), 0..60)
    ) {
        let members = members(6);
        let records: Vec<PerformanceRecord> = records
            .into_iter()
            .map(|(m, ex, v)| PerformanceRecord::new(&format!("m{}", m), EXERCISES[ex], v, Unit::Kg, "2024-02-02"))
            .collect();

        let engine = CardEngine::default();
        let reference = PeerReference::build(&members, &records);
        let first = engine.regenerate_gallery(&members, &records, Some(&reference));
        let second = engine.regenerate_gallery(&members, &records, Some(&reference));

        prop_assert_eq!(first.len(), members.len());
        for (a, b) in first.cards().iter().zip(second.cards()) {
            assert_card_invariants(a);
            prop_assert_eq!(&a.member_id, &b.member_id);
            prop_assert_eq!(a.stats, b.stats);
            prop_assert_eq!(a.element, b.element);
            prop_assert_eq!(&a.identity, &b.identity);
        }
    }

    #[test]
    fn classifier_is_total(name in ".{0,40}") {
        let classifier = ExerciseClassifier::standard();
        let first = classifier.classify(&name);
        prop_assert_eq!(first, classifier.classify(&name));
    }

    #[test]
    fn power_keyword_always_wins(prefix in ".{0,20}", suffix in ".{0,20}", keyword in prop::sample::select(vec!["watts", "Pic Watts", "JUMP"])) {
        let classifier = ExerciseClassifier::standard();
        let name = format!("{}{}{}", prefix, keyword, suffix);
        prop_assert_eq!(classifier.classify(&name), Category::Power);

        // cardio machines carrying a power keyword stay power
        let machine = format!("Skierg {} {}", keyword, suffix);
        prop_assert_eq!(classifier.classify(&machine), Category::Power);
    }

    #[test]
    fn cardio_ranks_above_force(prefix in "[a-zA-Z ]{0,12}", suffix in "[a-zA-Z ]{0,12}") {
        let name = format!("{} Rameur squat {}", prefix, suffix);
        prop_assume!(!contains_any(&name, POWER_KEYWORDS));

        let classifier = ExerciseClassifier::standard();
        prop_assert_eq!(classifier.classify(&name), Category::Cardio);
    }

    #[test]
    fn force_ranks_above_gym(prefix in "[a-zA-Z ]{0,12}", suffix in "[a-zA-Z ]{0,12}") {
        let name = format!("{} Deadlift pull-ups {}", prefix, suffix);
        prop_assume!(!contains_any(&name, POWER_KEYWORDS));
        prop_assume!(!contains_any(&name, CARDIO_KEYWORDS));

        let classifier = ExerciseClassifier::standard();
        prop_assert_eq!(classifier.classify(&name), Category::Force);
    }
}

#[test]
fn power_keyword_beats_cardio_machine() {
    let classifier = ExerciseClassifier::standard();
    assert_eq!(classifier.classify("Skierg (Pic watts)"), Category::Power);
}

#[test]
fn member_without_records() {
    let engine = CardEngine::default();
    let gallery = engine.regenerate_gallery(&members(1), &[], None);
    let card = &gallery.cards()[0];

    assert_eq!(card.level, 1);
    assert_eq!(card.element, ElementType::Normal);
    assert_eq!(card.tier, Tier::Rookie);
    assert_eq!(card.performance_count, 0);
}

#[test]
fn back_squat_specialist() {
    let engine = CardEngine::default();
    let member = Member::new("m1", "Lina", "Faure", Gender::Female);
    let records: Vec<PerformanceRecord> = (0..10)
        .map(|i| PerformanceRecord::new("m1", "Back Squat", 80.0 + i as f64, Unit::Kg, "2024-06-01"))
        .collect();

    let card = engine.generate_card(&member, &records, Some(&Fixed(90.0)), &mut UsedIdentitySet::new());
    assert_eq!(card.stats.force, 90);
    assert_eq!(card.level, 26);
    assert_eq!(card.element, ElementType::Fighting);
}

#[test]
fn exactly_forty_percent_is_not_a_specialist() {
    let engine = CardEngine::default();
    let member = Member::new("m2", "Noé", "Garnier", Gender::Male);
    let mut records = Vec::new();
    for _ in 0..4 {
        records.push(PerformanceRecord::new("m2", "Back Squat", 100.0, Unit::Kg, "2024-06-01"));
    }
    for _ in 0..3 {
        records.push(PerformanceRecord::new("m2", "1200m Run", 300.0, Unit::Sec, "2024-06-01"));
        records.push(PerformanceRecord::new("m2", "Pull-ups", 12.0, Unit::Reps, "2024-06-01"));
    }

    let card = engine.generate_card(&member, &records, None, &mut UsedIdentitySet::new());
    assert_eq!(card.category_counts.force, 4);
    assert!(card.stats.is_max(Category::Force));
    assert_ne!(card.element, ElementType::Fighting);
}

#[test]
fn fenced_json_with_trailing_comma() {
    let parsed = parse_lenient("```json\n{\"morphotype\": \"mésomorphe\", \"strengths\": [\"force\",],}\n```");
    let value = parsed.value().expect("repaired json");
    assert_eq!(value["morphotype"], "mésomorphe");
    assert_eq!(value["strengths"][0], "force");
}

#[test]
fn crowded_tier_never_fails() {
    let engine = CardEngine::default();
    let members = members(30);
    let records: Vec<PerformanceRecord> = members
        .iter()
        .flat_map(|m| {
            (0..5).map(move |_| PerformanceRecord::new(&m.id, "Back Squat", 120.0, Unit::Kg, "2024-05-05"))
        })
        .collect();

    let gallery = engine.regenerate_gallery(&members, &records, Some(&Fixed(60.0)));
    assert_eq!(gallery.len(), 30);
    for card in gallery.cards() {
        assert_card_invariants(card);
        assert_eq!(card.element, ElementType::Fighting);
    }
}

#[test]
fn colliding_members_get_different_sprites() {
    let mut pools = IdentityPools::empty();
    pools.insert(
        ElementType::Fighting,
        Tier::Rookie,
        vec![Identity::new("Machoc", 66), Identity::new("Tygnon", 107)],
    );

    let mut used = UsedIdentitySet::new();
    let first = pools.assign(ElementType::Fighting, Tier::Rookie, "alpha", &mut used);
    let second = pools.assign(ElementType::Fighting, Tier::Rookie, "beta", &mut used);
    assert_ne!(first.identity.sprite_id, second.identity.sprite_id);
    assert_eq!(second.source, AssignmentSource::OwnTier);

    let third = pools.assign(ElementType::Fighting, Tier::Rookie, "gamma", &mut used);
    assert_eq!(third.source, AssignmentSource::Duplicate);
}
