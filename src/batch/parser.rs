//! Extracts labeled fields from free-text model output.
//!
//! Convention: one `Label: value` line per field. Labels match
//! case-insensitively and may be wrapped in list bullets or markdown emphasis
//! (`- **Score:** B`). Every configured field is always present in the
//! result; anything that cannot be extracted takes the field's fallback.

use anyhow::{bail, Result};
use regex::Regex;

use super::RowResult;
use crate::config::{FieldKind, FieldSpec};

const DEFAULT_GRADES: &str = "ABCDE";
const DEFAULT_SEPARATOR: &str = ",";

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    kind: FieldKind,
    label: Regex,
    grade: Option<Regex>,
    separator: String,
    fallback: String,
}

/// Output of [`ResponseParser::parse`]: the result plus the fields that fell back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub result: RowResult,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResponseParser {
    rules: Vec<FieldRule>,
}

fn label_regex(label: &str) -> Result<Regex> {
    let pattern = format!(
        r"(?im)^[ \t>*_#-]*{}[ \t*_]*:[ \t*_]*(.*)$",
        regex::escape(label.trim())
    );
    Ok(Regex::new(&pattern)?)
}

fn grade_regex(allowed: &str) -> Result<Regex> {
    let class: String = allowed
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    if class.is_empty() {
        bail!("grade field needs at least one allowed character");
    }
    Ok(Regex::new(&format!(r"\b[{class}]\b"))?)
}

fn clean_value(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c == '*')
}

impl ResponseParser {
    pub fn new(fields: &[FieldSpec]) -> Result<Self> {
        let mut rules = Vec::with_capacity(fields.len());
        for field in fields {
            let grade = match field.kind {
                FieldKind::Grade => Some(grade_regex(
                    field.allowed.as_deref().unwrap_or(DEFAULT_GRADES),
                )?),
                _ => None,
            };
            rules.push(FieldRule {
                name: field.name.clone(),
                kind: field.kind,
                label: label_regex(field.label())?,
                grade,
                separator: field
                    .separator
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
                fallback: field.fallback.clone(),
            });
        }
        Ok(Self { rules })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Every field set to the empty string (skipped rows).
    pub fn blank(&self) -> RowResult {
        self.field_names().map(|n| (n, "")).collect()
    }

    /// Result for a failed provider call: `marker` everywhere, or each field's fallback.
    pub fn failed(&self, marker: Option<&str>) -> RowResult {
        self.rules
            .iter()
            .map(|r| (r.name.as_str(), marker.unwrap_or(&r.fallback)))
            .collect()
    }

    pub fn parse(&self, text: &str) -> Parsed {
        let mut result = RowResult::default();
        let mut missing = Vec::new();
        for rule in &self.rules {
            match rule.extract(text) {
                Some(value) => {
                    result.fields.insert(rule.name.clone(), value);
                }
                None => {
                    missing.push(rule.name.clone());
                    result
                        .fields
                        .insert(rule.name.clone(), rule.fallback.clone());
                }
            }
        }
        Parsed { result, missing }
    }
}

impl FieldRule {
    fn labeled<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.label
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| clean_value(m.as_str()))
            .filter(|v| !v.is_empty())
    }

    fn extract(&self, text: &str) -> Option<String> {
        match self.kind {
            FieldKind::Text => self.labeled(text).map(str::to_string),
            FieldKind::Grade => {
                let value = self.labeled(text)?;
                self.grade
                    .as_ref()?
                    .find(value)
                    .map(|m| m.as_str().to_string())
            }
            FieldKind::List => {
                let value = self.labeled(text)?;
                let items: Vec<&str> = value
                    .split(self.separator.as_str())
                    .map(|s| s.trim().trim_start_matches('#').trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                (!items.is_empty()).then(|| items.join(", "))
            }
            FieldKind::Whole => {
                let value = text.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_lowercase(),
            label: Some(name.to_string()),
            column: "A".into(),
            kind,
            allowed: None,
            separator: None,
            fallback: String::new(),
        }
    }

    fn parser() -> ResponseParser {
        let mut tags = field("Tags", FieldKind::List);
        tags.fallback = "untagged".into();
        ResponseParser::new(&[
            field("Score", FieldKind::Grade),
            field("Note", FieldKind::Text),
            tags,
        ])
        .unwrap()
    }

    #[test]
    fn extracts_labeled_fields() {
        let parsed = parser().parse("Score: B\nNote: fine\nTags: #vegan, gluten free , ,snack");
        assert!(parsed.missing.is_empty());
        assert_eq!(parsed.result.get("score"), Some("B"));
        assert_eq!(parsed.result.get("note"), Some("fine"));
        assert_eq!(parsed.result.get("tags"), Some("vegan, gluten free, snack"));
    }

    #[test]
    fn tolerates_case_whitespace_and_markdown() {
        let text = "Here you go:\n  - **score:** Grade C overall  \r\n   NOTE :   solid pick\n";
        let parsed = parser().parse(text);
        assert_eq!(parsed.result.get("score"), Some("C"));
        assert_eq!(parsed.result.get("note"), Some("solid pick"));
        assert_eq!(parsed.missing, vec!["tags".to_string()]);
        assert_eq!(parsed.result.get("tags"), Some("untagged"));
    }

    #[test]
    fn grade_needs_standalone_allowed_letter() {
        let parsed = parser().parse("Score: Excellent\nNote: ok");
        assert_eq!(parsed.result.get("score"), Some(""));
        assert_eq!(parsed.missing, vec!["score".to_string(), "tags".to_string()]);

        let parsed = parser().parse("Score: F\nNote: ok");
        assert_eq!(parsed.result.get("score"), Some(""));
    }

    #[test]
    fn malformed_output_yields_fallbacks_for_every_field() {
        let parsed = parser().parse("I cannot help with that.");
        assert_eq!(parsed.missing.len(), 3);
        let keys: Vec<&str> = parsed.result.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["score", "note", "tags"]);
        assert_eq!(parsed.result.get("tags"), Some("untagged"));
    }

    #[test]
    fn label_must_be_whole_word_before_colon() {
        let parsed = parser().parse("Notes: nope\nNote: yes");
        assert_eq!(parsed.result.get("note"), Some("yes"));
    }

    #[test]
    fn whole_kind_takes_everything() {
        let p = ResponseParser::new(&[field("Url", FieldKind::Whole)]).unwrap();
        let parsed = p.parse("  https://drive.google.com/uc?id=1  \n");
        assert_eq!(parsed.result.get("url"), Some("https://drive.google.com/uc?id=1"));
        assert_eq!(p.parse("   ").missing, vec!["url".to_string()]);
    }

    #[test]
    fn failed_and_blank_results_cover_all_fields() {
        let p = parser();
        let failed = p.failed(Some("Error"));
        assert!(failed.fields.values().all(|v| v == "Error"));
        let fallback = p.failed(None);
        assert_eq!(fallback.get("tags"), Some("untagged"));
        assert_eq!(fallback.get("score"), Some(""));
        assert!(p.blank().is_empty());
        assert_eq!(p.blank().fields.len(), 3);
    }

    #[test]
    fn empty_grade_class_is_rejected() {
        let mut f = field("Score", FieldKind::Grade);
        f.allowed = Some("  ".into());
        assert!(ResponseParser::new(&[f]).is_err());
    }
}
