//! Material classifier (C8): an ordered list of `(prefix_regex, class)`
//! rules, first match wins. Unmatched codes yield `None`, which is a
//! non-goal exclusion rather than an error (`spec.md` §4.8).

use regex::Regex;

use crate::config::MaterialClassConfig;
use crate::error::{Error, Result};
use crate::types::MaterialCode;

/// One of the three material classes the assembler (C9) routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialClass {
    Finished,
    SelfMade,
    Purchased,
}

impl MaterialClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::SelfMade => "self-made",
            Self::Purchased => "purchased",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "finished" => Some(Self::Finished),
            "self_made" => Some(Self::SelfMade),
            "purchased" => Some(Self::Purchased),
            _ => None,
        }
    }
}

struct Rule {
    pattern: Regex,
    class: MaterialClass,
}

/// Ordered `(prefix_regex, class)` rules, loaded from configuration.
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Builds a classifier from configured rules, in order. A rule whose
    /// `id` does not name one of the three recognized classes (`finished`,
    /// `self_made`, `purchased`) is rejected: the classifier has no notion
    /// of a fourth class.
    pub fn from_config(classes: &[MaterialClassConfig]) -> Result<Self> {
        let mut rules = Vec::with_capacity(classes.len());
        for entry in classes {
            let class = MaterialClass::from_id(&entry.id).ok_or_else(|| {
                Error::validation(format!("unrecognized material class id: {}", entry.id))
            })?;
            let pattern = Regex::new(&entry.pattern)
                .map_err(|e| Error::validation(format!("invalid pattern for {}: {e}", entry.id)))?;
            rules.push(Rule { pattern, class });
        }
        Ok(Self { rules })
    }

    /// The three seeded classes, for tests and as a config-free default.
    #[must_use]
    pub fn seeded() -> Self {
        Self::from_config(&crate::config::GatewayConfig::default().material_classes)
            .expect("seeded classifier patterns are valid")
    }

    /// Returns the first matching class, or `None` if no rule matches.
    #[must_use]
    pub fn classify(&self, material_code: &MaterialCode) -> Option<MaterialClass> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(material_code.as_str()))
            .map(|rule| rule.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_classes_route_by_prefix() {
        let classifier = Classifier::seeded();
        assert_eq!(
            classifier.classify(&MaterialCode::new("07.04.231")),
            Some(MaterialClass::Finished)
        );
        assert_eq!(
            classifier.classify(&MaterialCode::new("05.02.003")),
            Some(MaterialClass::SelfMade)
        );
        assert_eq!(
            classifier.classify(&MaterialCode::new("03.01.100")),
            Some(MaterialClass::Purchased)
        );
    }

    #[test]
    fn unmatched_code_yields_none() {
        let classifier = Classifier::seeded();
        assert_eq!(classifier.classify(&MaterialCode::new("99.00.000")), None);
    }

    #[test]
    fn first_rule_wins_on_overlap() {
        let classes = vec![
            MaterialClassConfig {
                id: "finished".to_string(),
                pattern: r"^07\.".to_string(),
                display_name: "Finished".to_string(),
            },
            MaterialClassConfig {
                id: "purchased".to_string(),
                pattern: r".*".to_string(),
                display_name: "Purchased".to_string(),
            },
        ];
        let classifier = Classifier::from_config(&classes).unwrap();
        assert_eq!(
            classifier.classify(&MaterialCode::new("07.04.231")),
            Some(MaterialClass::Finished)
        );
        assert_eq!(
            classifier.classify(&MaterialCode::new("anything")),
            Some(MaterialClass::Purchased)
        );
    }
}
