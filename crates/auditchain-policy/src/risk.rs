//! The risk policy: maps a set of matched sensitivity categories to a
//! `RiskLevel` via a base table, explicit combinations, and a default
//! fallback.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use auditchain_contracts::{AuditError, AuditResult, RiskLevel};

use crate::dictionary::SensitivityDictionary;

#[derive(Debug, Clone, Deserialize)]
struct RiskPolicyDoc {
    base: BTreeMap<String, String>,
    #[serde(default)]
    combinations: BTreeMap<String, String>,
    default: String,
}

/// A compiled risk policy, validated against a dictionary's known
/// categories at load time.
pub struct RiskPolicy {
    base: BTreeMap<String, RiskLevel>,
    combinations: BTreeMap<String, RiskLevel>,
    default: RiskLevel,
}

impl RiskPolicy {
    /// Parse and validate a risk policy document.
    ///
    /// Validation: every level string must be one of
    /// `low|medium|high|critical` case-sensitively, and every key in
    /// `base` must name a category the dictionary actually defines.
    pub fn from_json_str(s: &str, dictionary: &SensitivityDictionary) -> AuditResult<Self> {
        let doc: RiskPolicyDoc = serde_json::from_str(s).map_err(|e| AuditError::RiskPolicyValidation {
            reason: format!("invalid JSON: {e}"),
        })?;

        let known_categories: BTreeSet<&str> = dictionary.category_names().into_iter().collect();

        let mut base = BTreeMap::new();
        for (category, level) in doc.base {
            if !known_categories.contains(category.as_str()) {
                return Err(AuditError::RiskPolicyValidation {
                    reason: format!("base category '{category}' is not defined by the dictionary"),
                });
            }
            let level = parse_level(&level)?;
            base.insert(category, level);
        }

        let mut combinations = BTreeMap::new();
        for (key, level) in doc.combinations {
            let level = parse_level(&level)?;
            combinations.insert(key, level);
        }

        let default = parse_level(&doc.default)?;

        Ok(Self {
            base,
            combinations,
            default,
        })
    }

    /// Resolve the risk level for a set of matched categories.
    pub fn resolve(&self, categories: &BTreeSet<String>) -> RiskLevel {
        match categories.len() {
            0 => self.default,
            1 => {
                let category = categories.iter().next().expect("len == 1");
                self.base.get(category).copied().unwrap_or(self.default)
            }
            _ => {
                let key = categories.iter().cloned().collect::<Vec<_>>().join("+");
                if let Some(level) = self.combinations.get(&key) {
                    return *level;
                }
                categories
                    .iter()
                    .filter_map(|c| self.base.get(c))
                    .copied()
                    .max()
                    .unwrap_or(self.default)
            }
        }
    }
}

fn parse_level(s: &str) -> AuditResult<RiskLevel> {
    RiskLevel::from_str_strict(s).ok_or_else(|| AuditError::RiskPolicyValidation {
        reason: format!("unknown risk level '{s}' (must be low, medium, high, or critical)"),
    })
}
