//! Classifier evaluation.

use std::path::Path;

use tracing::debug;

use super::{CategoryDefinition, CategoryRuleSet, ClassifierError, RuleField, UNCATEGORIZED};
use crate::catalog::CatalogItem;

#[derive(Debug, Clone)]
struct CompiledRule {
    field: RuleField,
    patterns: Vec<String>,
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    name: String,
    rules: Vec<CompiledRule>,
}

/// Assigns categories to items. Stateless once built.
#[derive(Debug, Clone)]
pub struct Classifier {
    senders: Vec<String>,
    /// Sorted by descending priority.
    categories: Vec<CompiledCategory>,
}

impl Classifier {
    /// Load a rule set from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let classifier = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            categories = classifier.categories.len(),
            "Loaded category rules"
        );
        Ok(classifier)
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let rule_set: CategoryRuleSet = serde_json::from_str(json)?;
        Self::new(rule_set)
    }

    pub fn new(rule_set: CategoryRuleSet) -> Result<Self, ClassifierError> {
        let mut categories: Vec<(i64, CompiledCategory)> = Vec::new();

        for (name, CategoryDefinition { priority, rules }) in rule_set.categories {
            if name.trim().is_empty() {
                return Err(ClassifierError::Invalid("empty category name".to_string()));
            }
            if name == UNCATEGORIZED {
                return Err(ClassifierError::Invalid(format!(
                    "'{}' is reserved",
                    UNCATEGORIZED
                )));
            }

            let rules = rules
                .into_iter()
                .map(|rule| CompiledRule {
                    field: rule.field,
                    patterns: rule
                        .patterns
                        .iter()
                        .map(|p| p.to_lowercase())
                        .filter(|p| !p.is_empty())
                        .collect(),
                })
                .collect();

            categories.push((priority, CompiledCategory { name, rules }));
        }

        // Stable sort keeps name order among equal priorities.
        categories.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(Self {
            senders: rule_set.senders,
            categories: categories.into_iter().map(|(_, c)| c).collect(),
        })
    }

    /// Category name for `item`, or [`UNCATEGORIZED`].
    pub fn classify(&self, item: &CatalogItem) -> &str {
        self.categories
            .iter()
            .find(|category| category.rules.iter().any(|rule| rule_matches(rule, item)))
            .map(|category| category.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Configured channel labels.
    pub fn senders(&self) -> &[String] {
        &self.senders
    }

    /// Category names, highest priority first.
    pub fn categories(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }
}

fn field_value(item: &CatalogItem, field: RuleField) -> Option<&str> {
    match field {
        RuleField::Title => Some(item.title.as_str()),
        RuleField::Channel => item.channel.as_deref(),
        RuleField::Topic => item.topic.as_deref(),
        RuleField::Description => item.description.as_deref(),
    }
}

fn rule_matches(rule: &CompiledRule, item: &CatalogItem) -> bool {
    let Some(value) = field_value(item, rule.field).filter(|v| !v.is_empty()) else {
        return false;
    };
    let value = value.to_lowercase();
    rule.patterns.iter().any(|p| value.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_ITEM_KIND;

    const RULES: &str = r#"{
        "senders": ["ARD", "ZDF", "KiKA"],
        "categories": {
            "news": {
                "priority": 5,
                "rules": [
                    { "field": "title", "match": ["Tagesschau", "heute journal"] },
                    { "field": "topic", "match": ["Nachrichten"] }
                ]
            },
            "kids": {
                "priority": 10,
                "rules": [{ "field": "channel", "match": ["kika"] }]
            },
            "docs": {
                "priority": 1,
                "rules": [{ "field": "description", "match": ["dokumentation"] }]
            }
        }
    }"#;

    fn item(title: &str, channel: Option<&str>, topic: Option<&str>) -> CatalogItem {
        CatalogItem {
            id: "de-mvw:test".to_string(),
            kind: DEFAULT_ITEM_KIND.to_string(),
            title: title.to_string(),
            channel: channel.map(String::from),
            topic: topic.map(String::from),
            description: None,
            date_ts: None,
            duration_sec: None,
            url_video: None,
            url_website: None,
            is_hd: false,
            has_subtitles: false,
            category: None,
            poster: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_classify_case_insensitive_substring() {
        let classifier = Classifier::from_json(RULES).unwrap();
        assert_eq!(
            classifier.classify(&item("TAGESSCHAU 20 Uhr", Some("ARD"), None)),
            "news"
        );
        assert_eq!(
            classifier.classify(&item("Spätausgabe", Some("ZDF"), Some("Nachrichten"))),
            "news"
        );
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_order() {
        let classifier = Classifier::from_json(RULES).unwrap();
        // Matches both "news" (title) and "kids" (channel).
        let both = item("logo! Tagesschau für Kinder", Some("KiKA"), None);
        assert_eq!(classifier.classify(&both), "kids");
    }

    #[test]
    fn test_no_match_is_uncategorized() {
        let classifier = Classifier::from_json(RULES).unwrap();
        assert_eq!(
            classifier.classify(&item("Tatort", Some("ARD"), None)),
            UNCATEGORIZED
        );
    }

    #[test]
    fn test_absent_fields_are_skipped() {
        let classifier = Classifier::from_json(RULES).unwrap();
        let mut no_desc = item("Tatort", None, Some(""));
        no_desc.description = None;
        assert_eq!(classifier.classify(&no_desc), UNCATEGORIZED);

        no_desc.description = Some("Eine Dokumentation".to_string());
        assert_eq!(classifier.classify(&no_desc), "docs");
    }

    #[test]
    fn test_equal_priority_by_name() {
        let classifier = Classifier::from_json(
            r#"{"categories": {
                "zeta": {"priority": 1, "rules": [{"field": "title", "match": ["x"]}]},
                "alpha": {"priority": 1, "rules": [{"field": "title", "match": ["x"]}]}
            }}"#,
        )
        .unwrap();
        assert_eq!(classifier.classify(&item("x", None, None)), "alpha");
    }

    #[test]
    fn test_metadata_accessors() {
        let classifier = Classifier::from_json(RULES).unwrap();
        assert_eq!(classifier.senders(), &["ARD", "ZDF", "KiKA"]);
        assert_eq!(classifier.categories(), vec!["kids", "news", "docs"]);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            Classifier::from_json("{ not json"),
            Err(ClassifierError::Parse(_))
        ));
        assert!(matches!(
            Classifier::from_json(
                r#"{"categories": {"x": {"rules": [{"field": "url", "match": ["a"]}]}}}"#
            ),
            Err(ClassifierError::Parse(_))
        ));
        assert!(matches!(
            Classifier::from_json(r#"{"categories": {"uncategorized": {"priority": 1}}}"#),
            Err(ClassifierError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Classifier::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(ClassifierError::Io { .. })));
    }
}
