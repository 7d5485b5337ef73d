use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Row;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Prompt text with `{column}` placeholders filled from a row's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    raw: String,
}

impl PromptTemplate {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        PLACEHOLDER
            .captures_iter(&self.raw)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
    }

    pub fn render(&self, row: &Row) -> String {
        PLACEHOLDER
            .replace_all(&self.raw, |caps: &Captures| row.get(&caps[1]).to_string())
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn row(pairs: &[(&str, &str)]) -> Row {
        let cells: IndexMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Row::new(7, cells)
    }

    #[test]
    fn fills_placeholders_from_row() {
        let tpl = PromptTemplate::new("Rate {title}.\nIngredients: {ingredients}\n{missing}");
        let out = tpl.render(&row(&[("title", "Oat Bar"), ("ingredients", "oats, honey")]));
        assert_eq!(out, "Rate Oat Bar.\nIngredients: oats, honey\n");
    }

    #[test]
    fn lists_placeholders_and_ignores_json_braces() {
        let tpl = PromptTemplate::new(r#"Answer as {"score": 1}. Title: {title} / {title}"#);
        let names: Vec<&str> = tpl.placeholders().collect();
        assert_eq!(names, vec!["title", "title"]);
    }
}
