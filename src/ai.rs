// 🤖 AI text generation - morphological analysis prompts and lenient parsing
//
// The endpoints are opaque collaborators: prompt in, free text out. No retry
// here; callers decide what to do with an error.

use crate::card::Card;
use crate::db::Member;
use crate::goals::{body_progress, GoalData};
use crate::lenient_json::{parse_lenient, LenientJson};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const CLAUDE_URL: &str = "https://api.anthropic.com/v1/messages";
pub const CLAUDE_VERSION: &str = "2023-06-01";
pub const DEEPSEEK_URL: &str = "https://api.deepseek.com/v1/chat/completions";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API key configured for {0}")]
    MissingApiKey(AiProvider),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: AiProvider,
        status: u16,
        body: String,
    },

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Claude,
    DeepSeek,
}

impl AiProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Claude => "claude-3-5-sonnet-20241022",
            AiProvider::DeepSeek => "deepseek-chat",
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AiProvider::Claude => "claude",
            AiProvider::DeepSeek => "deepseek",
        })
    }
}

/// Prompt in, text out
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

// ============================================================================
// HTTP GENERATOR
// ============================================================================

pub struct HttpTextGenerator {
    settings: AiSettings,
    client: reqwest::blocking::Client,
}

impl HttpTextGenerator {
    pub fn new(settings: AiSettings) -> Result<Self, AiError> {
        if settings.api_key.trim().is_empty() {
            return Err(AiError::MissingApiKey(settings.provider));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(HttpTextGenerator { settings, client })
    }

    pub fn provider(&self) -> AiProvider {
        self.settings.provider
    }
}

impl TextGenerator for HttpTextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let s = &self.settings;
        debug!(provider = %s.provider, model = %s.model, chars = prompt.len(), "Calling text generation");

        let request = match s.provider {
            AiProvider::Claude => self
                .client
                .post(CLAUDE_URL)
                .header("x-api-key", &s.api_key)
                .header("anthropic-version", CLAUDE_VERSION)
                .json(&claude_request(&s.model, s.max_tokens, prompt)),
            AiProvider::DeepSeek => self
                .client
                .post(DEEPSEEK_URL)
                .bearer_auth(&s.api_key)
                .json(&deepseek_request(&s.model, s.max_tokens, prompt)),
        };

        let resp = request.send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AiError::Status {
                provider: s.provider,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json()?;
        match s.provider {
            AiProvider::Claude => claude_text(&body),
            AiProvider::DeepSeek => deepseek_text(&body),
        }
    }
}

pub fn claude_request(model: &str, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{"role": "user", "content": prompt}],
    })
}

pub fn deepseek_request(model: &str, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{"role": "user", "content": prompt}],
    })
}

/// `content[0].text` of a messages response
pub fn claude_text(body: &Value) -> Result<String, AiError> {
    body.pointer("/content/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AiError::UnexpectedResponse("missing content[0].text".to_string()))
}

/// `choices[0].message.content` of a chat completions response
pub fn deepseek_text(body: &Value) -> Result<String, AiError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AiError::UnexpectedResponse("missing choices[0].message.content".to_string()))
}

// ============================================================================
// MORPHOLOGICAL ANALYSIS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphoAnalysis {
    pub morphotype: String,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub priority_exercises: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Structured(MorphoAnalysis),
    /// Text kept as-is when it could not be read as an analysis
    Raw { text: String, error: String },
}

/// Optional numeric target attached to a goal, for body progress lines
#[derive(Debug, Clone, PartialEq)]
pub struct GoalTarget {
    pub goal: GoalData,
    pub target: Option<f64>,
    pub achieved: Option<f64>,
    pub is_time: bool,
}

impl From<GoalData> for GoalTarget {
    fn from(goal: GoalData) -> Self {
        GoalTarget {
            goal,
            target: None,
            achieved: None,
            is_time: false,
        }
    }
}

pub fn build_morpho_prompt(member: &Member, card: Option<&Card>, goals: &[GoalTarget], today: NaiveDate) -> String {
    let mut p = String::new();

    let _ = writeln!(
        p,
        "Tu es coach CrossFit et spécialiste de la morphologie. Analyse le profil de l'athlète {}.",
        member.full_name()
    );
    let _ = writeln!(p);
    let _ = writeln!(p, "PROFIL");
    if let Some(age) = member.age_at(today) {
        let _ = writeln!(p, "- Âge: {} ans", age);
    }
    if !member.gender.as_str().is_empty() {
        let _ = writeln!(p, "- Sexe: {}", member.gender.as_str());
    }
    if let Some(w) = member.weight {
        let _ = writeln!(p, "- Poids: {:.1} kg", w);
    }
    if let Some(h) = member.height {
        let _ = writeln!(p, "- Taille: {:.0} cm", h);
    }

    if let Some(card) = card {
        let _ = writeln!(p);
        let _ = writeln!(p, "STATISTIQUES (0-100)");
        let _ = writeln!(
            p,
            "- Cardio {} · Force {} · Gym {} · Puissance {}",
            card.stats.cardio, card.stats.force, card.stats.gym, card.stats.power
        );
        let _ = writeln!(p, "- Niveau {} ({}), profil {}", card.level, card.tier.label(), card.element.display().name);
        let _ = writeln!(p, "- {} performances enregistrées, {} records", card.performance_count, card.pr_count);
    }

    if !goals.is_empty() {
        let _ = writeln!(p);
        let _ = writeln!(p, "OBJECTIFS");
        for g in goals {
            let mut line = format!("- {}", g.goal.value());
            if let (Some(target), Some(achieved)) = (g.target, g.achieved) {
                let _ = write!(line, " · progression {:.0}%", body_progress(target, achieved, g.is_time));
            }
            if let Some(d) = g.goal.deadline(today) {
                let _ = write!(
                    line,
                    " · échéance {} ({} j restants, {:.0}% du temps écoulé, {})",
                    d.end_date, d.days_remaining, d.percent, d.status
                );
            }
            let _ = writeln!(p, "{}", line);
        }
    }

    let _ = writeln!(p);
    let _ = writeln!(
        p,
        "Réponds uniquement en JSON avec les clés: morphotype, summary, strengths, weaknesses, recommendations, priority_exercises."
    );
    p
}

pub fn parse_analysis(text: &str) -> AnalysisOutcome {
    match parse_lenient(text) {
        LenientJson::Parsed(value) => match serde_json::from_value::<MorphoAnalysis>(value) {
            Ok(analysis) => AnalysisOutcome::Structured(analysis),
            Err(e) => AnalysisOutcome::Raw {
                text: text.to_string(),
                error: e.to_string(),
            },
        },
        LenientJson::Raw { text, error } => {
            warn!("Analysis response kept raw");
            AnalysisOutcome::Raw { text, error }
        }
    }
}

/// Network failure is an error; unreadable output is a Raw outcome
pub fn analyze_member(
    generator: &dyn TextGenerator,
    member: &Member,
    card: Option<&Card>,
    goals: &[GoalTarget],
    today: NaiveDate,
) -> Result<AnalysisOutcome, AiError> {
    let prompt = build_morpho_prompt(member, card, goals, today);
    let text = generator.generate(&prompt)?;
    Ok(parse_analysis(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Gender;
    use crate::goals::DurationType;
    use std::cell::RefCell;

    struct Canned {
        reply: Result<String, String>,
        seen: RefCell<Vec<String>>,
    }

    impl TextGenerator for Canned {
        fn generate(&self, prompt: &str) -> Result<String, AiError> {
            self.seen.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(AiError::UnexpectedResponse)
        }
    }

    fn canned(reply: Result<&str, &str>) -> Canned {
        Canned {
            reply: reply.map(str::to_string).map_err(str::to_string),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn member() -> Member {
        let mut m = Member::new("m1", "Nora", "Petit", Gender::Female);
        m.weight = Some(62.0);
        m.height = Some(168.0);
        m.birthdate = NaiveDate::from_ymd_opt(1994, 5, 2);
        m
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_prompt_contains_profile_and_goals() {
        let goals = vec![
            GoalTarget {
                goal: GoalData::Simple { value: "Squat 100 kg".to_string() },
                target: Some(100.0),
                achieved: Some(80.0),
                is_time: false,
            },
            GoalData::Timed {
                value: "Premier muscle-up".to_string(),
                duration_value: 2,
                duration_type: DurationType::Months,
                start_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            }
            .into(),
        ];
        let prompt = build_morpho_prompt(&member(), None, &goals, today());

        assert!(prompt.contains("Nora Petit"));
        assert!(prompt.contains("Âge: 29 ans"));
        assert!(prompt.contains("Poids: 62.0 kg"));
        assert!(prompt.contains("Squat 100 kg · progression 80%"));
        assert!(prompt.contains("échéance 2024-06-01"));
        assert!(prompt.contains("31 j restants"));
        assert!(prompt.contains("on_track"));
        assert!(!prompt.contains("STATISTIQUES"));
    }

    #[test]
    fn test_analyze_structured_and_raw() {
        let gen = canned(Ok("```json\n{\"morphotype\": \"mésomorphe\", \"strengths\": [\"jambes\"],}\n```"));
        let out = analyze_member(&gen, &member(), None, &[], today()).unwrap();
        match out {
            AnalysisOutcome::Structured(a) => {
                assert_eq!(a.morphotype, "mésomorphe");
                assert_eq!(a.strengths, vec!["jambes"]);
                assert!(a.recommendations.is_empty());
            }
            other => panic!("expected structured, got {:?}", other),
        }
        assert_eq!(gen.seen.borrow().len(), 1);

        let gen = canned(Ok("Désolé, pas d'analyse possible."));
        let out = analyze_member(&gen, &member(), None, &[], today()).unwrap();
        assert!(matches!(out, AnalysisOutcome::Raw { .. }));
    }

    #[test]
    fn test_generator_error_propagates() {
        let gen = canned(Err("boom"));
        let err = analyze_member(&gen, &member(), None, &[], today()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_response_extraction() {
        let claude = json!({"content": [{"type": "text", "text": "salut"}]});
        assert_eq!(claude_text(&claude).unwrap(), "salut");

        let deepseek = json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]});
        assert_eq!(deepseek_text(&deepseek).unwrap(), "hello");

        assert!(matches!(claude_text(&json!({})), Err(AiError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let settings = AiSettings {
            provider: AiProvider::DeepSeek,
            model: AiProvider::DeepSeek.default_model().to_string(),
            api_key: "  ".to_string(),
            timeout: Duration::from_secs(5),
            max_tokens: 100,
        };
        assert!(matches!(HttpTextGenerator::new(settings), Err(AiError::MissingApiKey(AiProvider::DeepSeek))));
    }

    #[test]
    fn test_request_bodies() {
        let body = claude_request("m", 10, "hi");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(deepseek_request("d", 5, "yo")["model"], "d");
    }
}
