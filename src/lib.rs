// Skali Cards - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod rules;        // Exercise classification table
pub mod normalizer;   // Peer-relative and standards-based scores
pub mod stats;        // Stat aggregation + level/HP
pub mod element;      // Type rules, display, attacks
pub mod evolution;    // Tiers, badges, identity pools
pub mod card;         // Card engine
pub mod gallery;      // Filters, sorts, summary stats
pub mod render;       // HTML + terminal presentation
pub mod lenient_json;
pub mod goals;
pub mod ai;
pub mod remote;
pub mod supabase;
pub mod discord;
pub mod config;

// Re-export commonly used types
pub use db::{
    DataSource, Event, Gender, ImportSummary, Member, PerformanceRecord, Unit,
    count_members, count_performances, flag_personal_records, get_all_members,
    get_all_performances, get_events_for_entity, get_member, get_performances_for_member,
    insert_event, insert_performances, is_personal_record, load_members_csv,
    load_performances_csv, record_gallery_generated, setup_database, upsert_members,
};
pub use rules::{Category, Classification, ExerciseClassifier, ExerciseRule};
pub use normalizer::{Normalizer, PeerReference, StandardsNormalizer};
pub use stats::{aggregate, derive_level, CategoryCounts, LegacyStats, ScoringMode, StatVector};
pub use element::{attacks_for, classify_type, Attack, ElementType};
pub use evolution::{
    badge_for, AssignedIdentity, AssignmentSource, Badge, Identity, IdentityPools, Rarity, Tier,
    UsedIdentitySet,
};
pub use card::{Card, CardEngine};
pub use gallery::{Gallery, GalleryFilter, GalleryStats, SortOrder};
pub use lenient_json::{parse_lenient, LenientJson};
pub use goals::{body_progress, deadline_progress, DeadlineProgress, DeadlineStatus, DurationType, GoalData};
pub use ai::{AiError, AiProvider, AnalysisOutcome, HttpTextGenerator, MorphoAnalysis, TextGenerator};
pub use remote::RemoteError;
pub use supabase::SupabaseClient;
pub use discord::{DiscordClient, DiscordSettings, LinkOutcome};
pub use config::{AppConfig, ConfigError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Card engine configured from `config`: custom rule table and identity
/// pools when paths are given, built-in ones otherwise.
pub fn engine_from_config(config: &AppConfig) -> anyhow::Result<CardEngine> {
    let classifier = match &config.cards.rules_path {
        Some(path) => ExerciseClassifier::from_file(path, Category::Gym)?,
        None => ExerciseClassifier::standard(),
    };
    let pools = match &config.cards.pools_path {
        Some(path) => IdentityPools::from_file(path)?,
        None => IdentityPools::standard(),
    };
    Ok(CardEngine::new(classifier, pools).with_sprite_base(&config.cards.sprite_base_url))
}
