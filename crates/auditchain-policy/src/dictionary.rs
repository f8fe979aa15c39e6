//! The sensitivity dictionary: compiled regex rules, grouped by category,
//! that the classifier matches against resolved column names.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;

use auditchain_contracts::{AuditError, AuditResult};

/// A positive rule: a column-name pattern plus the set of normalized
/// column types it applies to (empty means "any type").
#[derive(Debug, Clone, Deserialize)]
struct PositiveRuleDoc {
    regex: String,
    #[serde(default)]
    expected_types: BTreeSet<String>,
    #[serde(default)]
    #[allow(dead_code)] // carried through for diagnostics/documentation, not matched on
    sample_pattern: Option<String>,
}

/// A compiled positive rule.
pub struct PositiveRule {
    pub pattern: Regex,
    pub expected_types: BTreeSet<String>,
}

/// A negative rule: a pattern that excludes a column from classification
/// entirely, with a human-readable reason for audit trails.
#[derive(Debug, Clone, Deserialize)]
struct NegativeRuleDoc {
    regex: String,
    reason: String,
}

pub struct NegativeRule {
    pub pattern: Regex,
    pub reason: String,
}

/// The dictionary's on-disk shape: a single JSON object keyed by category
/// name, each value a list of positive rules, plus one reserved key
/// `"Negative"` holding the negative-rule list — not a
/// `{"categories": [...]}` wrapper. Categories are iterated in the
/// object's own key order, which `serde_json`'s `preserve_order` feature
/// (enabled workspace-wide) makes equal to file/insertion order rather
/// than an arbitrary hash order.
const NEGATIVE_KEY: &str = "Negative";

/// The compiled sensitivity dictionary: an ordered list of
/// `(category, rules)` plus the negative-rule list, ready for matching.
pub struct SensitivityDictionary {
    categories: Vec<(String, Vec<PositiveRule>)>,
    negative: Vec<NegativeRule>,
}

impl SensitivityDictionary {
    pub fn from_json_str(s: &str) -> AuditResult<Self> {
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(s).map_err(|e| AuditError::DictionaryValidation {
                reason: format!("invalid JSON: {e}"),
            })?;

        let mut categories = Vec::new();
        let mut negative = Vec::new();

        for (key, value) in doc {
            if key == NEGATIVE_KEY {
                let rules: Vec<NegativeRuleDoc> =
                    serde_json::from_value(value).map_err(|e| AuditError::DictionaryValidation {
                        reason: format!("invalid '{NEGATIVE_KEY}' entry: {e}"),
                    })?;
                for rule in rules {
                    let pattern = Regex::new(&rule.regex).map_err(|e| AuditError::DictionaryValidation {
                        reason: format!("invalid negative regex '{}': {e}", rule.regex),
                    })?;
                    negative.push(NegativeRule {
                        pattern,
                        reason: rule.reason,
                    });
                }
                continue;
            }

            let rules: Vec<PositiveRuleDoc> =
                serde_json::from_value(value).map_err(|e| AuditError::DictionaryValidation {
                    reason: format!("category '{key}': {e}"),
                })?;
            let mut compiled = Vec::with_capacity(rules.len());
            for rule in rules {
                let pattern = Regex::new(&rule.regex).map_err(|e| AuditError::DictionaryValidation {
                    reason: format!("category '{key}': invalid regex '{}': {e}", rule.regex),
                })?;
                compiled.push(PositiveRule {
                    pattern,
                    expected_types: rule.expected_types,
                });
            }
            categories.push((key, compiled));
        }

        if categories.is_empty() {
            return Err(AuditError::DictionaryValidation {
                reason: "dictionary defines no categories".to_string(),
            });
        }

        Ok(Self { categories, negative })
    }

    /// Category names in the fixed order recorded by the dictionary file.
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Iterate `(category, rules)` in the dictionary's recorded order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[PositiveRule])> {
        self.categories.iter().map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    pub fn negative_rules(&self) -> &[NegativeRule] {
        &self.negative
    }

    /// True if `column` is excluded by any negative rule (first match
    /// wins, but for exclusion purposes only whether *any* rule matches
    /// is observable).
    pub fn is_excluded(&self, column: &str) -> Option<&str> {
        self.negative
            .iter()
            .find(|rule| rule.pattern.is_match(column))
            .map(|rule| rule.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dict_json() -> &'static str {
        r#"{
            "PII": [
                {"regex": "(?i)ssn", "expected_types": []},
                {"regex": "(?i)email", "expected_types": ["VARCHAR", "TEXT"]}
            ],
            "Financial": [
                {"regex": "(?i)card_number", "expected_types": []}
            ],
            "Negative": [
                {"regex": "(?i)ssn_format_version", "reason": "metadata, not the SSN itself"}
            ]
        }"#
    }

    #[test]
    fn loads_categories_in_file_order() {
        let dict = SensitivityDictionary::from_json_str(sample_dict_json()).unwrap();
        assert_eq!(dict.category_names(), vec!["PII", "Financial"]);
    }

    #[test]
    fn negative_rule_excludes_matching_column() {
        let dict = SensitivityDictionary::from_json_str(sample_dict_json()).unwrap();
        assert!(dict.is_excluded("ssn_format_version").is_some());
        assert!(dict.is_excluded("ssn").is_none());
    }

    #[test]
    fn rejects_invalid_regex() {
        let bad = r#"{"PII": [{"regex": "(unterminated", "expected_types": []}]}"#;
        let err = SensitivityDictionary::from_json_str(bad).unwrap_err();
        assert!(matches!(err, AuditError::DictionaryValidation { .. }));
    }

    #[test]
    fn rejects_empty_category_list() {
        let empty = r#"{}"#;
        let err = SensitivityDictionary::from_json_str(empty).unwrap_err();
        assert!(matches!(err, AuditError::DictionaryValidation { .. }));
    }

    #[test]
    fn negative_key_alone_is_not_a_category() {
        let doc = r#"{"Negative": [{"regex": "(?i)^tmp_", "reason": "scratch column"}]}"#;
        let err = SensitivityDictionary::from_json_str(doc).unwrap_err();
        assert!(matches!(err, AuditError::DictionaryValidation { .. }));
    }
}
