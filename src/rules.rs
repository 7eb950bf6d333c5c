//! Local rule matching, evaluated before any AI call

use crate::config::{ClassificationRule, MatchType, RuleConditions};
use crate::models::ExtractedContent;
use tracing::{debug, trace};

/// Prioritized rule set, immutable for the run
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<ClassificationRule>,
}

impl RuleMatcher {
    /// Sort by descending priority; `sort_by` is stable so declaration order breaks ties
    pub fn new(rules: &[ClassificationRule]) -> Self {
        let mut rules = rules.to_vec();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Return the first matching rule
    pub fn find_match(&self, content: &ExtractedContent) -> Option<&ClassificationRule> {
        let hit = self
            .rules
            .iter()
            .find(|rule| conditions_match(&rule.conditions, content));

        match hit {
            Some(rule) => debug!(
                "Rule '{}' matched (priority {}) -> {}",
                rule.name, rule.priority, rule.classification
            ),
            None => trace!("No rule matched subject '{}'", content.subject),
        }
        hit
    }

    /// Classification key of the first matching rule
    pub fn classify(&self, content: &ExtractedContent) -> Option<String> {
        self.find_match(content).map(|r| r.classification.clone())
    }
}

fn conditions_match(conditions: &RuleConditions, content: &ExtractedContent) -> bool {
    let subject = content.subject.to_lowercase();
    let sender = content.sender.to_lowercase();
    let body = content.body.to_lowercase();

    let mut results = Vec::with_capacity(4);

    if !conditions.subject_keywords.is_empty() {
        results.push(contains_any(&subject, &conditions.subject_keywords));
    }

    if !conditions.sender_domains.is_empty() {
        results.push(conditions.sender_domains.iter().any(|domain| {
            let domain = domain.trim().to_lowercase();
            !domain.is_empty()
                && (sender.ends_with(&format!("@{}", domain.trim_start_matches('@')))
                    || sender.contains(&domain))
        }));
    }

    if !conditions.sender_addresses.is_empty() {
        results.push(
            conditions
                .sender_addresses
                .iter()
                .any(|address| address.trim().to_lowercase() == sender),
        );
    }

    if !conditions.body_keywords.is_empty() {
        results.push(contains_any(&body, &conditions.body_keywords));
    }

    if results.is_empty() {
        return false;
    }

    match conditions.match_type {
        MatchType::All => results.iter().all(|&r| r),
        MatchType::Any => results.iter().any(|&r| r),
    }
}

/// `haystack` must already be lowercase
fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| {
        let needle = needle.to_lowercase();
        !needle.is_empty() && haystack.contains(&needle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(subject: &str, sender: &str, body: &str) -> ExtractedContent {
        ExtractedContent {
            subject: subject.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    fn rule(name: &str, key: &str, priority: i32, conditions: RuleConditions) -> ClassificationRule {
        ClassificationRule {
            name: name.to_string(),
            classification: key.to_string(),
            priority,
            conditions,
        }
    }

    #[test]
    fn test_sender_domain_match() {
        let matcher = RuleMatcher::new(&[rule(
            "acme",
            "FINANCE",
            100,
            RuleConditions {
                sender_domains: vec!["acme.com".to_string()],
                ..Default::default()
            },
        )]);

        let email = content("Invoice #123", "billing@acme.com", "Please pay");
        assert_eq!(matcher.classify(&email), Some("FINANCE".to_string()));

        let other = content("Invoice #123", "billing@example.org", "Please pay");
        assert_eq!(matcher.classify(&other), None);
    }

    #[test]
    fn test_higher_priority_evaluated_first() {
        let low = rule(
            "low",
            "FYI",
            10,
            RuleConditions {
                subject_keywords: vec!["report".to_string()],
                ..Default::default()
            },
        );
        let high = rule(
            "high",
            "URGENT",
            200,
            RuleConditions {
                subject_keywords: vec!["report".to_string()],
                ..Default::default()
            },
        );
        let matcher = RuleMatcher::new(&[low, high]);
        assert_eq!(
            matcher.classify(&content("Weekly REPORT", "x@y.com", "")),
            Some("URGENT".to_string())
        );
    }

    #[test]
    fn test_equal_priority_first_declared_wins() {
        let conditions = RuleConditions {
            body_keywords: vec!["deadline".to_string()],
            ..Default::default()
        };
        let matcher = RuleMatcher::new(&[
            rule("first", "ACTION", 100, conditions.clone()),
            rule("second", "URGENT", 100, conditions),
        ]);
        assert_eq!(
            matcher.classify(&content("s", "a@b.com", "The deadline is Friday")),
            Some("ACTION".to_string())
        );
    }

    #[test]
    fn test_match_all_requires_every_present_condition() {
        let matcher = RuleMatcher::new(&[rule(
            "both",
            "FINANCE",
            100,
            RuleConditions {
                match_type: MatchType::All,
                subject_keywords: vec!["invoice".to_string()],
                sender_domains: vec!["acme.com".to_string()],
                ..Default::default()
            },
        )]);

        assert!(matcher
            .classify(&content("Invoice", "ap@acme.com", ""))
            .is_some());
        assert!(matcher
            .classify(&content("Hello", "ap@acme.com", ""))
            .is_none());
    }

    #[test]
    fn test_match_any_requires_one_condition() {
        let matcher = RuleMatcher::new(&[rule(
            "either",
            "PROMO",
            100,
            RuleConditions {
                subject_keywords: vec!["sale".to_string()],
                body_keywords: vec!["unsubscribe".to_string()],
                ..Default::default()
            },
        )]);

        assert!(matcher
            .classify(&content("Hi", "a@b.com", "Click to unsubscribe"))
            .is_some());
        assert!(matcher.classify(&content("Hi", "a@b.com", "Hello")).is_none());
    }

    #[test]
    fn test_rule_without_conditions_never_matches() {
        let matcher = RuleMatcher::new(&[rule("empty", "FYI", 100, RuleConditions::default())]);
        assert_eq!(matcher.classify(&content("anything", "a@b.com", "at all")), None);
    }

    #[test]
    fn test_sender_address_exact_match() {
        let matcher = RuleMatcher::new(&[rule(
            "boss",
            "URGENT",
            100,
            RuleConditions {
                sender_addresses: vec!["Boss@Example.com".to_string()],
                ..Default::default()
            },
        )]);
        assert!(matcher
            .classify(&content("s", "boss@example.com", ""))
            .is_some());
        assert!(matcher
            .classify(&content("s", "notboss@example.com", ""))
            .is_none());
    }
}
