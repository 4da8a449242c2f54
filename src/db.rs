use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// GENDER & UNIT
// ============================================================================

/// Member gender as recorded by the front desk. Free text upstream, so parsing
/// is lenient and anything unrecognised is `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unset,
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        let g = raw.trim().to_lowercase();
        if g.is_empty() {
            return Gender::Unset;
        }
        // before the 'm' prefix check
        let honorific = g.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
        if matches!(honorific, "mme" | "madame" | "mrs" | "ms" | "miss" | "mlle" | "mademoiselle") {
            return Gender::Female;
        }
        if g.starts_with('f') || g.contains("female") || g.contains("femme") || g.contains("woman") {
            return Gender::Female;
        }
        if g.starts_with('m') || g.starts_with('h') || g.contains("homme") || g == "man" {
            return Gender::Male;
        }
        Gender::Unset
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unset => "",
        }
    }

    /// Comparison group used for peer references. Unset members are ranked
    /// with the male group.
    pub fn peer_group(&self) -> Gender {
        match self {
            Gender::Female => Gender::Female,
            _ => Gender::Male,
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Gender::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg")]
    Kg,
    #[serde(rename = "sec", alias = "s")]
    Sec,
    #[serde(rename = "reps")]
    Reps,
    #[serde(rename = "W", alias = "w", alias = "watts")]
    Watts,
    #[serde(rename = "cm")]
    Cm,
    #[default]
    #[serde(other, rename = "other")]
    Other,
}

impl Unit {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "kg" => Unit::Kg,
            "sec" | "s" => Unit::Sec,
            "reps" => Unit::Reps,
            "W" | "w" | "watts" => Unit::Watts,
            "cm" => Unit::Cm,
            _ => Unit::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Sec => "sec",
            Unit::Reps => "reps",
            Unit::Watts => "W",
            Unit::Cm => "cm",
            Unit::Other => "other",
        }
    }

    /// Times are the only unit where a smaller value is the better one.
    pub fn lower_is_better(&self) -> bool {
        matches!(self, Unit::Sec)
    }
}

// ============================================================================
// MEMBER
// ============================================================================

/// Gym member as exposed by the member source. Read-only to the card engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: String,

    #[serde(rename = "firstName", alias = "first_name", default)]
    pub first_name: String,

    #[serde(rename = "lastName", alias = "last_name", default)]
    pub last_name: String,

    #[serde(default)]
    pub gender: Gender,

    #[serde(default)]
    pub birthdate: Option<NaiveDate>,

    /// Body weight in kg
    #[serde(default)]
    pub weight: Option<f64>,

    /// Height in cm
    #[serde(default)]
    pub height: Option<f64>,

    #[serde(default)]
    pub discord_id: Option<String>,
}

impl Member {
    pub fn new(id: &str, first_name: &str, last_name: &str, gender: Gender) -> Self {
        Member {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            gender,
            birthdate: None,
            weight: None,
            height: None,
            discord_id: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Age in whole years at `today`
    pub fn age_at(&self, today: NaiveDate) -> Option<u32> {
        self.birthdate.and_then(|b| today.years_since(b))
    }
}

// ============================================================================
// PERFORMANCE RECORD
// ============================================================================

/// One logged performance. The engine classifies and scores records but never
/// mutates them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    #[serde(default = "default_uuid")]
    pub id: String,

    pub member_id: String,

    /// Exercise name, free text ("Back Squat", "Skierg (Pic watts)")
    #[serde(rename = "exercise_type", alias = "exercise")]
    pub exercise: String,

    /// Category as typed by the coach. Loose, not used for classification.
    #[serde(default)]
    pub category: String,

    pub value: f64,

    #[serde(default)]
    pub unit: Unit,

    /// ISO date (a trailing time part is tolerated)
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub is_pr: bool,

    #[serde(default)]
    pub notes: Option<String>,
}

fn default_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl PerformanceRecord {
    pub fn new(member_id: &str, exercise: &str, value: f64, unit: Unit, date: &str) -> Self {
        PerformanceRecord {
            id: default_uuid(),
            member_id: member_id.to_string(),
            exercise: exercise.to_string(),
            category: String::new(),
            value,
            unit,
            date: date.to_string(),
            is_pr: false,
            notes: None,
        }
    }

    /// Hash for duplicate detection on import. Identity stays `id`.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.member_id,
            self.exercise.trim().to_lowercase(),
            self.value,
            self.unit.as_str(),
            self.date
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn date_parsed(&self) -> Option<NaiveDate> {
        let day = self.date.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    /// Key grouping records of the same exercise in the same unit
    pub fn exercise_key(&self) -> String {
        format!("{}_{}", self.exercise.trim().to_lowercase(), self.unit.as_str())
    }

    /// True when this value is strictly better than `other`'s.
    pub fn beats(&self, other: &PerformanceRecord) -> bool {
        if self.unit.lower_is_better() {
            self.value < other.value
        } else {
            self.value > other.value
        }
    }
}

/// A record is a personal record when it beats every earlier record of the same
/// member, exercise and unit.
pub fn is_personal_record(history: &[PerformanceRecord], candidate: &PerformanceRecord) -> bool {
    if candidate.value <= 0.0 {
        return false;
    }
    history
        .iter()
        .filter(|r| {
            r.id != candidate.id
                && r.member_id == candidate.member_id
                && r.exercise_key() == candidate.exercise_key()
                && r.date <= candidate.date
        })
        .all(|r| candidate.beats(r))
}

/// Fill `is_pr` for imported rows in chronological order. Flags already set
/// upstream are kept.
pub fn flag_personal_records(records: &mut [PerformanceRecord]) {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[a].date.cmp(&records[b].date));

    let mut best: HashMap<(String, String), f64> = HashMap::new();
    for idx in order {
        let rec = &mut records[idx];
        if rec.value <= 0.0 {
            continue;
        }
        let key = (rec.member_id.clone(), rec.exercise_key());
        let improved = match best.get(&key) {
            None => true,
            Some(&prev) if rec.unit.lower_is_better() => rec.value < prev,
            Some(&prev) => rec.value > prev,
        };
        if improved {
            best.insert(key, rec.value);
            rec.is_pr = true;
        }
    }
}

// ============================================================================
// DATA SOURCE
// ============================================================================

/// Anything that can hand out the full member and performance tables.
pub trait DataSource {
    fn members(&self) -> Result<Vec<Member>>;
    fn performances(&self) -> Result<Vec<PerformanceRecord>>;
}

impl DataSource for Connection {
    fn members(&self) -> Result<Vec<Member>> {
        get_all_members(self)
    }

    fn performances(&self) -> Result<Vec<PerformanceRecord>> {
        get_all_performances(self)
    }
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            gender TEXT,
            birthdate TEXT,
            weight REAL,
            height REAL,
            discord_id TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS performances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            record_uuid TEXT UNIQUE NOT NULL,
            member_id TEXT NOT NULL,
            exercise TEXT NOT NULL,
            category TEXT,
            value REAL NOT NULL,
            unit TEXT NOT NULL,
            date TEXT NOT NULL,
            is_pr INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_perf_member ON performances(member_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_perf_date ON performances(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

pub fn load_members_csv(csv_path: &Path) -> Result<Vec<Member>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open members CSV: {:?}", csv_path))?;

    let mut members = Vec::new();
    for result in rdr.deserialize() {
        let member: Member = result.context("Failed to deserialize member")?;
        members.push(member);
    }

    debug!(count = members.len(), "members loaded from CSV");
    Ok(members)
}

pub fn load_performances_csv(csv_path: &Path) -> Result<Vec<PerformanceRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open performances CSV: {:?}", csv_path))?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: PerformanceRecord = result.context("Failed to deserialize performance")?;
        records.push(record);
    }

    flag_personal_records(&mut records);

    debug!(count = records.len(), "performances loaded from CSV");
    Ok(records)
}

// ============================================================================
// WRITES
// ============================================================================

pub fn upsert_members(conn: &Connection, members: &[Member]) -> Result<usize> {
    let mut written = 0;

    for m in members {
        conn.execute(
            "INSERT INTO members (id, first_name, last_name, gender, birthdate, weight, height, discord_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                gender = excluded.gender,
                birthdate = excluded.birthdate,
                weight = excluded.weight,
                height = excluded.height,
                discord_id = excluded.discord_id,
                updated_at = CURRENT_TIMESTAMP",
            params![
                m.id,
                m.first_name,
                m.last_name,
                m.gender.as_str(),
                m.birthdate.map(|d| d.format("%Y-%m-%d").to_string()),
                m.weight,
                m.height,
                m.discord_id,
            ],
        )?;
        written += 1;
    }

    let event = Event::new(
        "members_imported",
        "member",
        "*",
        serde_json::json!({ "count": written }),
        "importer",
    );
    insert_event(conn, &event)?;

    info!(written, "members upserted");
    Ok(written)
}

/// Outcome of a performance import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

pub fn insert_performances(conn: &Connection, records: &[PerformanceRecord]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for rec in records {
        let hash = rec.compute_idempotency_hash();

        let result = conn.execute(
            "INSERT INTO performances (
                idempotency_hash, record_uuid, member_id, exercise, category,
                value, unit, date, is_pr, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                hash,
                rec.id,
                rec.member_id,
                rec.exercise,
                rec.category,
                rec.value,
                rec.unit.as_str(),
                rec.date,
                rec.is_pr,
                rec.notes,
            ],
        );

        match result {
            Ok(_) => summary.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let event = Event::new(
        "performances_imported",
        "performance",
        "*",
        serde_json::json!({
            "inserted": summary.inserted,
            "duplicates": summary.duplicates,
        }),
        "importer",
    );
    insert_event(conn, &event)?;

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "performances imported"
    );
    Ok(summary)
}

/// Attach a Discord account to a member. Returns false for an unknown member
/// or one already linked to a different account; an existing link is never
/// overwritten.
pub fn link_discord_id(conn: &Connection, member_id: &str, discord_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE members SET discord_id = ?1, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?2 AND (discord_id IS NULL OR discord_id = '' OR discord_id = ?1)",
        params![discord_id, member_id],
    )?;

    if changed == 0 {
        return Ok(false);
    }

    let event = Event::new(
        "discord_linked",
        "member",
        member_id,
        serde_json::json!({ "discord_id": discord_id }),
        "discord",
    );
    insert_event(conn, &event)?;

    info!(member_id, "discord account linked");
    Ok(true)
}

pub fn record_gallery_generated(conn: &Connection, cards: usize, scoring: &str) -> Result<()> {
    let event = Event::new(
        "gallery_generated",
        "gallery",
        "*",
        serde_json::json!({ "cards": cards, "scoring": scoring }),
        "engine",
    );
    insert_event(conn, &event)
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// READS
// ============================================================================

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn member_from_row(row: &rusqlite::Row) -> rusqlite::Result<Member> {
    let gender: Option<String> = row.get(3)?;
    let birthdate: Option<String> = row.get(4)?;

    Ok(Member {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        gender: gender.as_deref().map(Gender::parse).unwrap_or_default(),
        birthdate: birthdate.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        weight: row.get(5)?,
        height: row.get(6)?,
        discord_id: row.get(7)?,
    })
}

fn performance_from_row(row: &rusqlite::Row) -> rusqlite::Result<PerformanceRecord> {
    let unit: String = row.get(5)?;

    Ok(PerformanceRecord {
        id: row.get(0)?,
        member_id: row.get(1)?,
        exercise: row.get(2)?,
        category: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        value: row.get(4)?,
        unit: Unit::parse(&unit),
        date: row.get(6)?,
        is_pr: row.get(7)?,
        notes: row.get(8)?,
    })
}

const MEMBER_COLUMNS: &str =
    "id, first_name, last_name, gender, birthdate, weight, height, discord_id";

const PERFORMANCE_COLUMNS: &str =
    "record_uuid, member_id, exercise, category, value, unit, date, is_pr, notes";

pub fn get_all_members(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM members ORDER BY last_name, first_name, id",
        MEMBER_COLUMNS
    ))?;

    let members = stmt
        .query_map([], member_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(members)
}

pub fn get_member(conn: &Connection, member_id: &str) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS),
            [member_id],
            member_from_row,
        )
        .optional()?;

    Ok(member)
}

pub fn get_member_by_discord_id(conn: &Connection, discord_id: &str) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE discord_id = ?1", MEMBER_COLUMNS),
            [discord_id],
            member_from_row,
        )
        .optional()?;

    Ok(member)
}

pub fn get_all_performances(conn: &Connection) -> Result<Vec<PerformanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM performances ORDER BY date DESC, id",
        PERFORMANCE_COLUMNS
    ))?;

    let records = stmt
        .query_map([], performance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn get_performances_for_member(conn: &Connection, member_id: &str) -> Result<Vec<PerformanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM performances WHERE member_id = ?1 ORDER BY date DESC, id",
        PERFORMANCE_COLUMNS
    ))?;

    let records = stmt
        .query_map([member_id], performance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn count_members(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_performances(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM performances", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_member(id: &str, first: &str, gender: Gender) -> Member {
        let mut m = Member::new(id, first, "Test", gender);
        m.weight = Some(80.0);
        m.height = Some(180.0);
        m
    }

    fn test_record(member_id: &str, exercise: &str, value: f64, unit: Unit, date: &str) -> PerformanceRecord {
        PerformanceRecord::new(member_id, exercise, value, unit, date)
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("female"), Gender::Female);
        assert_eq!(Gender::parse("Femme"), Gender::Female);
        assert_eq!(Gender::parse("F"), Gender::Female);
        assert_eq!(Gender::parse("male"), Gender::Male);
        assert_eq!(Gender::parse("Homme"), Gender::Male);
        assert_eq!(Gender::parse(""), Gender::Unset);
        assert_eq!(Gender::parse("?"), Gender::Unset);
        assert_eq!(Gender::Unset.peer_group(), Gender::Male);

        assert_eq!(Gender::parse("Mme"), Gender::Female);
        assert_eq!(Gender::parse("Madame"), Gender::Female);
        assert_eq!(Gender::parse("Mme."), Gender::Female);
        assert_eq!(Gender::parse("Mlle"), Gender::Female);
        assert_eq!(Gender::parse("M."), Gender::Male);
        assert_eq!(Gender::parse("Monsieur"), Gender::Male);
    }

    #[test]
    fn test_record_json_row_shape() {
        let row = r#"{
            "id": "p1", "member_id": "m1", "exercise": "Back Squat",
            "category": "Force", "value": 120, "unit": "kg",
            "date": "2024-03-01T10:00:00", "is_pr": true, "notes": null
        }"#;
        let rec: PerformanceRecord = serde_json::from_str(row).unwrap();

        assert_eq!(rec.exercise, "Back Squat");
        assert_eq!(rec.unit, Unit::Kg);
        assert!(rec.is_pr);
        assert_eq!(rec.date_parsed(), NaiveDate::from_ymd_opt(2024, 3, 1));

        let odd: PerformanceRecord = serde_json::from_str(
            r#"{"member_id": "m1", "exercise_type": "Plank", "value": 60, "unit": "min"}"#,
        )
        .unwrap();
        assert_eq!(odd.unit, Unit::Other);
        assert!(!odd.id.is_empty());
    }

    #[test]
    fn test_member_json_row_shape() {
        let row = r#"{"id": "m1", "firstName": "Lea", "lastName": "Martin",
                      "gender": "femme", "birthdate": "1990-05-02", "weight": 61.5,
                      "height": null, "discord_id": "123"}"#;
        let m: Member = serde_json::from_str(row).unwrap();

        assert_eq!(m.full_name(), "Lea Martin");
        assert_eq!(m.gender, Gender::Female);
        assert_eq!(m.height, None);
        assert_eq!(m.age_at(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()), Some(33));
    }

    #[test]
    fn test_beats_respects_time_units() {
        let slow = test_record("m1", "1200m Run", 300.0, Unit::Sec, "2024-01-01");
        let fast = test_record("m1", "1200m Run", 280.0, Unit::Sec, "2024-02-01");
        assert!(fast.beats(&slow));
        assert!(!slow.beats(&fast));

        let light = test_record("m1", "Deadlift", 120.0, Unit::Kg, "2024-01-01");
        let heavy = test_record("m1", "Deadlift", 140.0, Unit::Kg, "2024-02-01");
        assert!(heavy.beats(&light));
    }

    #[test]
    fn test_flag_personal_records() {
        let mut records = vec![
            test_record("m1", "Deadlift", 140.0, Unit::Kg, "2024-03-01"),
            test_record("m1", "Deadlift", 120.0, Unit::Kg, "2024-01-01"),
            test_record("m1", "Deadlift", 130.0, Unit::Kg, "2024-04-01"),
            test_record("m1", "1200m Run", 300.0, Unit::Sec, "2024-01-01"),
            test_record("m1", "1200m Run", 290.0, Unit::Sec, "2024-02-01"),
        ];

        flag_personal_records(&mut records);

        let flags: Vec<bool> = records.iter().map(|r| r.is_pr).collect();
        assert_eq!(flags, vec![true, true, false, true, true]);
        assert!(is_personal_record(&records, &records[0]));
        assert!(!is_personal_record(&records, &records[2]));
    }

    #[test]
    fn test_performance_import_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let records = vec![
            test_record("m1", "Back Squat", 100.0, Unit::Kg, "2024-01-01"),
            test_record("m1", "Back Squat", 110.0, Unit::Kg, "2024-02-01"),
            test_record("m2", "1200m Run", 290.0, Unit::Sec, "2024-02-01"),
        ];

        let first = insert_performances(&conn, &records).unwrap();
        // Fresh UUIDs, same content: still duplicates
        let again: Vec<PerformanceRecord> = records
            .iter()
            .map(|r| test_record(&r.member_id, &r.exercise, r.value, r.unit, &r.date))
            .collect();
        let second = insert_performances(&conn, &again).unwrap();

        assert_eq!(first, ImportSummary { inserted: 3, duplicates: 0 });
        assert_eq!(second, ImportSummary { inserted: 0, duplicates: 3 });
        assert_eq!(count_performances(&conn).unwrap(), 3);
    }

    #[test]
    fn test_member_roundtrip_through_store() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut lea = test_member("m1", "Lea", Gender::Female);
        lea.birthdate = NaiveDate::from_ymd_opt(1990, 5, 2);
        upsert_members(&conn, &[lea.clone(), test_member("m2", "Marc", Gender::Male)]).unwrap();

        // Upsert replaces in place
        lea.weight = Some(62.0);
        upsert_members(&conn, &[lea.clone()]).unwrap();

        assert_eq!(count_members(&conn).unwrap(), 2);
        assert_eq!(get_member(&conn, "m1").unwrap(), Some(lea));
        assert_eq!(get_member(&conn, "nope").unwrap(), None);

        let events = get_events_for_entity(&conn, "member", "*").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "members_imported");
    }

    #[test]
    fn test_discord_linking() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_members(&conn, &[test_member("m1", "Lea", Gender::Female)]).unwrap();

        assert!(link_discord_id(&conn, "m1", "4242").unwrap());
        assert!(!link_discord_id(&conn, "ghost", "4242").unwrap());
        assert!(!link_discord_id(&conn, "m1", "9999").unwrap());
        assert!(link_discord_id(&conn, "m1", "4242").unwrap());

        let found = get_member_by_discord_id(&conn, "4242").unwrap().unwrap();
        assert_eq!(found.id, "m1");
        assert_eq!(get_member_by_discord_id(&conn, "0").unwrap(), None);
        assert_eq!(get_member_by_discord_id(&conn, "9999").unwrap(), None);

        let events = get_events_for_entity(&conn, "member", "m1").unwrap();
        assert_eq!(events[0].event_type, "discord_linked");

        record_gallery_generated(&conn, 1, "record_share").unwrap();
        assert_eq!(get_events_for_entity(&conn, "gallery", "*").unwrap().len(), 1);
    }

    #[test]
    fn test_data_source_for_connection() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        upsert_members(&conn, &[test_member("m1", "Lea", Gender::Female)]).unwrap();
        insert_performances(
            &conn,
            &[test_record("m1", "Max Pullups", 12.0, Unit::Reps, "2024-01-01")],
        )
        .unwrap();

        let source: &dyn DataSource = &conn;
        assert_eq!(source.members().unwrap().len(), 1);

        let perfs = source.performances().unwrap();
        assert_eq!(perfs.len(), 1);
        assert_eq!(perfs[0].unit, Unit::Reps);
        assert_eq!(get_performances_for_member(&conn, "m1").unwrap().len(), 1);
    }

    #[test]
    fn test_load_csv_files() {
        let mut members_csv = tempfile::NamedTempFile::new().unwrap();
        writeln!(members_csv, "id,firstName,lastName,gender,birthdate,weight,height,discord_id").unwrap();
        writeln!(members_csv, "m1,Lea,Martin,female,1990-05-02,61.5,168,").unwrap();
        writeln!(members_csv, "m2,Marc,Durand,,,,,42").unwrap();

        let mut perf_csv = tempfile::NamedTempFile::new().unwrap();
        writeln!(perf_csv, "id,member_id,exercise_type,category,value,unit,date,is_pr,notes").unwrap();
        writeln!(perf_csv, "p1,m1,Back Squat,Force,80,kg,2024-01-01,false,").unwrap();
        writeln!(perf_csv, "p2,m1,Back Squat,Force,85,kg,2024-02-01,false,easy").unwrap();

        let members = load_members_csv(members_csv.path()).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].gender, Gender::Female);
        assert_eq!(members[1].gender, Gender::Unset);
        assert_eq!(members[1].discord_id.as_deref(), Some("42"));

        let perfs = load_performances_csv(perf_csv.path()).unwrap();
        assert_eq!(perfs.len(), 2);
        assert!(perfs.iter().all(|p| p.is_pr));
        assert_eq!(perfs[1].notes.as_deref(), Some("easy"));
    }
}
