// Lenient JSON extraction for model output.
//
// Order of attempts: as-is, fences stripped, outermost braces, then a repair
// pass (trailing commas, raw control characters inside strings). When all of
// them fail the text is handed back untouched.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum LenientJson {
    Parsed(Value),
    Raw { text: String, error: String },
}

impl LenientJson {
    pub fn is_parsed(&self) -> bool {
        matches!(self, LenientJson::Parsed(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            LenientJson::Parsed(v) => Some(v),
            LenientJson::Raw { .. } => None,
        }
    }
}

pub fn parse_lenient(text: &str) -> LenientJson {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return LenientJson::Parsed(v);
    }

    let unfenced = strip_fences(trimmed);
    let candidate = outer_object(&unfenced).unwrap_or(unfenced.as_str());

    let first_error = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => return LenientJson::Parsed(v),
        Err(e) => e.to_string(),
    };

    match serde_json::from_str::<Value>(&repair(candidate)) {
        Ok(v) => LenientJson::Parsed(v),
        Err(_) => {
            tracing::warn!(error = %first_error, "Could not recover JSON from text");
            LenientJson::Raw {
                text: text.to_string(),
                error: first_error,
            }
        }
    }
}

/// Lenient parse straight into a type
pub fn parse_lenient_as<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    match parse_lenient(text) {
        LenientJson::Parsed(v) => serde_json::from_value(v).map_err(|e| e.to_string()),
        LenientJson::Raw { error, .. } => Err(error),
    }
}

/// Drop markdown fence lines (```json, ```)
fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Slice from the first `{` to the last `}`
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// String-aware repair: escape raw newlines and tabs inside strings, drop
/// commas that directly precede a closing bracket.
fn repair(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_fenced_with_trailing_comma() {
        let got = parse_lenient("```json\n{\"a\":1,}\n```");
        assert_eq!(got, LenientJson::Parsed(json!({"a": 1})));
    }

    #[test]
    fn test_prose_around_object() {
        let got = parse_lenient("Voici l'analyse :\n{\"type\": \"mesomorphe\", \"score\": 7}\nBonne séance !");
        assert_eq!(got.value(), Some(&json!({"type": "mesomorphe", "score": 7})));
    }

    #[test]
    fn test_raw_newline_inside_string() {
        let got = parse_lenient("{\"notes\": \"ligne 1\nligne 2\", \"list\": [1, 2, ],}");
        assert_eq!(got.value(), Some(&json!({"notes": "ligne 1\nligne 2", "list": [1, 2]})));
    }

    #[test]
    fn test_commas_inside_strings_are_kept() {
        let got = parse_lenient("{\"a\": \"x, }\", \"b\": \"q\\\"uote,]\",}");
        assert_eq!(got.value(), Some(&json!({"a": "x, }", "b": "q\"uote,]"})));
    }

    #[test]
    fn test_unrecoverable_stays_raw() {
        let got = parse_lenient("Je ne peux pas répondre.");
        match got {
            LenientJson::Raw { text, error } => {
                assert_eq!(text, "Je ne peux pas répondre.");
                assert!(!error.is_empty());
            }
            other => panic!("expected raw, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_into_type() {
        #[derive(Deserialize)]
        struct Out {
            a: u32,
        }
        let out: Out = parse_lenient_as("```\n{\"a\": 3,}\n```").unwrap();
        assert_eq!(out.a, 3);
        assert!(parse_lenient_as::<Out>("nothing").is_err());
    }
}
