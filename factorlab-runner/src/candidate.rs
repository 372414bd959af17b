//! Factor candidates and their extraction from generator output.

use serde::{Deserialize, Serialize};

/// A proposed factor: human description plus formula text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorCandidate {
    #[serde(default)]
    pub description: String,
    pub formula: String,
}

impl FactorCandidate {
    pub fn new(description: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            formula: formula.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CandidateParseError {
    #[error("no JSON array found in generator output")]
    NoArray,

    #[error("malformed candidate array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extract the candidate list from free text.
///
/// A fenced ```json block wins; otherwise the first balanced `[...]` in the
/// text is used. Every element must carry a `formula` string.
pub fn parse_candidates(text: &str) -> Result<Vec<FactorCandidate>, CandidateParseError> {
    let json = fenced_json(text)
        .and_then(first_array)
        .or_else(|| first_array(text))
        .ok_or(CandidateParseError::NoArray)?;
    Ok(serde_json::from_str(json)?)
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let end = text[start..].find("```")?;
    Some(&text[start..start + end])
}

/// First balanced bracket span, skipping brackets inside string literals.
fn first_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_is_preferred() {
        let text = r#"Ignore [this].
```json
[{"description": "momentum", "formula": "rank(delta(close, 5))"}]
```"#;
        let got = parse_candidates(text).unwrap();
        assert_eq!(got, vec![FactorCandidate::new("momentum", "rank(delta(close, 5))")]);
    }

    #[test]
    fn bare_array_with_surrounding_prose() {
        let text = r#"Here you go: [{"formula": "ts_max(high, 20)"}, {"description": "x", "formula": "-close"}] done"#;
        let got = parse_candidates(text).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].description, "");
        assert_eq!(got[1].formula, "-close");
    }

    #[test]
    fn brackets_inside_strings_do_not_end_the_array() {
        let text = r#"[{"description": "uses ] and [", "formula": "close"}]"#;
        assert_eq!(parse_candidates(text).unwrap()[0].formula, "close");
    }

    #[test]
    fn missing_array_is_an_error() {
        assert!(matches!(
            parse_candidates("no factors today"),
            Err(CandidateParseError::NoArray)
        ));
    }

    #[test]
    fn element_without_formula_is_an_error() {
        assert!(matches!(
            parse_candidates(r#"[{"description": "oops"}]"#),
            Err(CandidateParseError::Json(_))
        ));
    }
}
