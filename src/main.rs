// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use skali_cards::ai::{analyze_member, GoalTarget, HttpTextGenerator};
use skali_cards::render::card_text;
use skali_cards::{
    count_members, count_performances, engine_from_config, flag_personal_records, get_all_members,
    get_all_performances, get_member, insert_performances, load_members_csv, load_performances_csv,
    record_gallery_generated, setup_database, upsert_members, AnalysisOutcome, AppConfig, DataSource, ElementType,
    Gallery, GalleryFilter, GoalData, Normalizer, PeerReference, SortOrder, StandardsNormalizer, SupabaseClient,
    Tier,
};

#[derive(Parser, Debug)]
#[command(name = "skali-cards")]
#[command(about = "Gym member trading cards: import, score and browse", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: $SKALI_CONFIG or ./skali.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import members and performances from CSV files
    Import { members: PathBuf, performances: PathBuf },

    /// Pull members and performances from Supabase into the local store
    Sync,

    /// Generate every card
    Generate {
        /// Print cards as JSON
        #[arg(long)]
        json: bool,

        #[arg(long, value_enum, default_value = "peer")]
        scoring: Scoring,

        /// Only this type (fighting, electric, fire, psychic, flying, normal)
        #[arg(long = "type")]
        element: Option<ElementType>,

        /// Only this tier (rookie ... master)
        #[arg(long)]
        tier: Option<Tier>,

        #[arg(long, value_enum, default_value = "name")]
        sort: Sort,
    },

    /// Show one member's card
    Show {
        member_id: String,

        #[arg(long, value_enum, default_value = "peer")]
        scoring: Scoring,
    },

    /// Morphological analysis through the configured AI provider
    Analyze {
        member_id: String,

        /// Goal text, repeatable
        #[arg(long = "goal")]
        goals: Vec<String>,
    },

    /// Browse the gallery in the terminal (default)
    Ui,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scoring {
    /// Relative to the best same-gender member
    Peer,
    /// Absolute standards (Wilks, time and rep tables)
    Standards,
    /// Share of records per category
    Share,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Sort {
    Name,
    Level,
    Recent,
}

impl From<Sort> for SortOrder {
    fn from(s: Sort) -> Self {
        match s {
            Sort::Name => SortOrder::Name,
            Sort::Level => SortOrder::Level,
            Sort::Recent => SortOrder::Recent,
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Ui) {
        Command::Import { members, performances } => run_import(&config, &members, &performances),
        Command::Sync => run_sync(&config),
        Command::Generate {
            json,
            scoring,
            element,
            tier,
            sort,
        } => run_generate(&config, json, scoring, element, tier, sort.into()),
        Command::Show { member_id, scoring } => run_show(&config, &member_id, scoring),
        Command::Analyze { member_id, goals } => run_analyze(&config, &member_id, goals),
        Command::Ui => run_ui_mode(&config),
    }
}

fn open_store(config: &AppConfig) -> Result<Connection> {
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn run_import(config: &AppConfig, members_csv: &Path, performances_csv: &Path) -> Result<()> {
    println!("🗄️  Import: CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading CSV files...");
    let members = load_members_csv(members_csv)?;
    let records = load_performances_csv(performances_csv)?;
    println!("✓ {} members, {} performances", members.len(), records.len());

    println!("\n🔧 Opening {}...", config.database_path);
    let conn = open_store(config)?;

    println!("\n💾 Writing...");
    upsert_members(&conn, &members)?;
    let summary = insert_performances(&conn, &records)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Members in store: {}", count_members(&conn)?);
    println!("✓ Performances inserted: {}", summary.inserted);
    println!("✓ Duplicates skipped: {}", summary.duplicates);
    println!("✓ Performances in store: {}", count_performances(&conn)?);

    Ok(())
}

fn run_sync(config: &AppConfig) -> Result<()> {
    println!("☁️  Sync: Supabase → SQLite");

    let client = SupabaseClient::new(&config.supabase.url, &config.supabase.api_key, config.supabase_timeout())?;
    let members = client.members()?;
    let mut records = client.performances()?;
    flag_personal_records(&mut records);
    println!("✓ Fetched {} members, {} performances", members.len(), records.len());

    let conn = open_store(config)?;
    upsert_members(&conn, &members)?;
    let summary = insert_performances(&conn, &records)?;
    println!("✓ {} new performances, {} already present", summary.inserted, summary.duplicates);

    Ok(())
}

/// Regenerate the whole gallery from the store
fn build_gallery(config: &AppConfig, conn: &Connection, scoring: Scoring) -> Result<Gallery> {
    let engine = engine_from_config(config)?;
    let members = get_all_members(conn)?;
    let records = get_all_performances(conn)?;

    let peer;
    let standards = StandardsNormalizer;
    let normalizer: Option<&dyn Normalizer> = match scoring {
        Scoring::Peer => {
            peer = PeerReference::build(&members, &records);
            Some(&peer)
        }
        Scoring::Standards => Some(&standards),
        Scoring::Share => None,
    };

    let gallery = engine.regenerate_gallery(&members, &records, normalizer);
    let mode = gallery.cards().first().map(|c| c.scoring_mode.as_str()).unwrap_or("none");
    record_gallery_generated(conn, gallery.len(), mode)?;

    Ok(gallery)
}

fn run_generate(
    config: &AppConfig,
    json: bool,
    scoring: Scoring,
    element: Option<ElementType>,
    tier: Option<Tier>,
    sort: SortOrder,
) -> Result<()> {
    let conn = open_store(config)?;
    let gallery = build_gallery(config, &conn, scoring)?;

    let filter = GalleryFilter {
        element,
        tier,
        ..Default::default()
    };
    let cards = gallery.query(&filter, sort);

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }

    println!("🎴 {} cards", cards.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for card in &cards {
        let display = card.element.display();
        println!(
            "{:<28} Niv.{:>3}  {} {:<9} {:<14} {}",
            card.full_name(),
            card.level,
            display.icon,
            display.name,
            card.tier.label(),
            card.identity.name
        );
    }

    let stats = gallery.stats();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Niveau moyen {:.1} · Puissance moyenne {:.1}",
        stats.average_level, stats.average_power
    );
    for (element, count) in &stats.by_type {
        println!("  {} {:<9} {}", element.display().icon, element.display().name, count);
    }

    Ok(())
}

fn run_show(config: &AppConfig, member_id: &str, scoring: Scoring) -> Result<()> {
    let conn = open_store(config)?;
    let gallery = build_gallery(config, &conn, scoring)?;

    match gallery.find(member_id) {
        Some(card) => {
            println!("{}", card_text(card));
            Ok(())
        }
        None => bail!("No member with id {}", member_id),
    }
}

fn run_analyze(config: &AppConfig, member_id: &str, goals: Vec<String>) -> Result<()> {
    let conn = open_store(config)?;
    let member = get_member(&conn, member_id)?.with_context(|| format!("No member with id {}", member_id))?;
    let gallery = build_gallery(config, &conn, Scoring::Peer)?;

    let generator = HttpTextGenerator::new(config.ai_settings())?;
    let goals: Vec<GoalTarget> = goals.into_iter().map(|value| GoalData::Simple { value }.into()).collect();

    println!("🤖 Analyse de {} via {}...", member.full_name(), generator.provider());
    let outcome = analyze_member(
        &generator,
        &member,
        gallery.find(member_id),
        &goals,
        Utc::now().date_naive(),
    )?;

    match outcome {
        AnalysisOutcome::Structured(a) => {
            println!("\nMorphotype: {}", a.morphotype);
            println!("{}", a.summary);
            for (title, items) in [
                ("Points forts", &a.strengths),
                ("Points faibles", &a.weaknesses),
                ("Recommandations", &a.recommendations),
                ("Exercices prioritaires", &a.priority_exercises),
            ] {
                if !items.is_empty() {
                    println!("\n{}:", title);
                    for item in items {
                        println!("  • {}", item);
                    }
                }
            }
        }
        AnalysisOutcome::Raw { text, .. } => {
            println!("\n⚠️  Réponse non structurée:\n{}", text);
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Skali Cards UI...\n");

    if !Path::new(&config.database_path).exists() {
        eprintln!("❌ Database not found: {}", config.database_path);
        eprintln!("   Run: skali-cards import <members.csv> <performances.csv>");
        std::process::exit(1);
    }

    let conn = open_store(config)?;
    let gallery = build_gallery(config, &conn, Scoring::Peer)?;
    println!("✓ Generated {} cards", gallery.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(gallery.into_cards());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use web UI: cargo run --bin skali-server --features server");
    std::process::exit(1);
}
