use regex::Regex;
use serde::{Deserialize, Serialize};

/// Vocabulary that signals the text leans on named ideas or structures
const SPECIALIZED_TERMS: &[&str] = &[
    "theory", "framework", "methodology", "concept", "model", "approach", "strategy",
];

/// Vocabulary that signals academic or investigative writing
const ACADEMIC_TERMS: &[&str] = &[
    "research", "study", "analysis", "investigation", "hypothesis", "conclusion",
];

const LIGHT_WORD_BUDGET: usize = 120;
const MODERATE_WORD_BUDGET: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Light,
    Moderate,
    Comprehensive,
}

impl AnalysisDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDepth::Light => "light",
            AnalysisDepth::Moderate => "moderate",
            AnalysisDepth::Comprehensive => "comprehensive",
        }
    }
}

/// Word budget for a response at this depth; comprehensive gets the full ceiling.
pub fn word_budget(depth: AnalysisDepth, ceiling: usize) -> usize {
    match depth {
        AnalysisDepth::Light => ceiling.min(LIGHT_WORD_BUDGET),
        AnalysisDepth::Moderate => ceiling.min(MODERATE_WORD_BUDGET),
        AnalysisDepth::Comprehensive => ceiling,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Picks how deep an originality or similarity analysis should go.
#[derive(Clone)]
pub struct DepthClassifier {
    specialized: Regex,
    academic: Regex,
}

impl DepthClassifier {
    pub fn new() -> Self {
        DepthClassifier {
            specialized: Self::whole_word_pattern(SPECIALIZED_TERMS),
            academic: Self::whole_word_pattern(ACADEMIC_TERMS),
        }
    }

    fn whole_word_pattern(terms: &[&str]) -> Regex {
        // Terms are plain ASCII words, the pattern is always valid.
        Regex::new(&format!(r"(?i)\b(?:{})\b", terms.join("|"))).unwrap()
    }

    pub fn has_specialized_vocabulary(&self, text: &str) -> bool {
        self.specialized.is_match(text)
    }

    pub fn has_academic_vocabulary(&self, text: &str) -> bool {
        self.academic.is_match(text)
    }

    fn is_question(text: &str) -> bool {
        let lowered = text.trim_start().to_lowercase();
        text.contains('?') || lowered.starts_with("what") || lowered.starts_with("how")
    }

    /// Depth for a full originality check of a passage.
    ///
    /// Vocabulary hits and long passages always get the comprehensive prompt,
    /// even when phrased as a question.
    pub fn classify_originality(&self, text: &str) -> AnalysisDepth {
        let words = word_count(text);
        let vocabulary =
            self.has_specialized_vocabulary(text) || self.has_academic_vocabulary(text);

        if vocabulary || words > 100 {
            AnalysisDepth::Comprehensive
        } else if words < 20 || Self::is_question(text) {
            AnalysisDepth::Light
        } else {
            AnalysisDepth::Moderate
        }
    }

    /// Depth for a conceptual similarity check of a short idea.
    pub fn classify_similarity(&self, text: &str) -> AnalysisDepth {
        let words = word_count(text);
        let vocabulary =
            self.has_specialized_vocabulary(text) || self.has_academic_vocabulary(text);

        if vocabulary || words > 80 {
            AnalysisDepth::Comprehensive
        } else if words < 15 {
            AnalysisDepth::Light
        } else {
            AnalysisDepth::Moderate
        }
    }
}

impl Default for DepthClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["sunset"; n].join(" ")
    }

    #[test]
    fn test_short_plain_text_is_light() {
        let classifier = DepthClassifier::new();
        assert_eq!(classifier.classify_originality("my summer skincare haul"), AnalysisDepth::Light);
        assert_eq!(classifier.classify_originality(&words(19)), AnalysisDepth::Light);
    }

    #[test]
    fn test_question_form_is_light() {
        let classifier = DepthClassifier::new();
        let question = format!("{} right?", words(30));
        assert_eq!(classifier.classify_originality(&question), AnalysisDepth::Light);

        let how = format!("How {}", words(30));
        assert_eq!(classifier.classify_originality(&how), AnalysisDepth::Light);
    }

    #[test]
    fn test_mid_length_plain_text_is_moderate() {
        let classifier = DepthClassifier::new();
        assert_eq!(classifier.classify_originality(&words(20)), AnalysisDepth::Moderate);
        assert_eq!(classifier.classify_originality(&words(75)), AnalysisDepth::Moderate);
        assert_eq!(classifier.classify_originality(&words(100)), AnalysisDepth::Moderate);
    }

    #[test]
    fn test_long_text_is_comprehensive() {
        let classifier = DepthClassifier::new();
        assert_eq!(classifier.classify_originality(&words(101)), AnalysisDepth::Comprehensive);
        let long_question = format!("What {}?", words(150));
        assert_eq!(classifier.classify_originality(&long_question), AnalysisDepth::Comprehensive);
    }

    #[test]
    fn test_vocabulary_is_comprehensive() {
        let classifier = DepthClassifier::new();
        for term in SPECIALIZED_TERMS.iter().chain(ACADEMIC_TERMS) {
            let text = format!("a short note on {}", term.to_uppercase());
            assert_eq!(
                classifier.classify_originality(&text),
                AnalysisDepth::Comprehensive,
                "term '{}' should force comprehensive",
                term
            );
        }
    }

    #[test]
    fn test_vocabulary_matches_whole_words_only() {
        let classifier = DepthClassifier::new();
        assert!(!classifier.has_specialized_vocabulary("our remodeling project"));
        assert!(!classifier.has_academic_vocabulary("studying for exams"));
        assert!(classifier.has_academic_vocabulary("a case Study."));
    }

    #[test]
    fn test_methodology_question_is_comprehensive() {
        let classifier = DepthClassifier::new();
        let text = "Can you explain the methodology behind transformer attention and its relation to prior research on recurrent models?";
        assert_eq!(classifier.classify_originality(text), AnalysisDepth::Comprehensive);
    }

    #[test]
    fn test_similarity_thresholds() {
        let classifier = DepthClassifier::new();
        assert_eq!(classifier.classify_similarity("idea"), AnalysisDepth::Light);
        assert_eq!(classifier.classify_similarity(&words(14)), AnalysisDepth::Light);
        assert_eq!(classifier.classify_similarity(&words(15)), AnalysisDepth::Moderate);
        // Question form does not matter for similarity checks
        let question = format!("What about {}?", words(20));
        assert_eq!(classifier.classify_similarity(&question), AnalysisDepth::Moderate);
        assert_eq!(classifier.classify_similarity(&words(81)), AnalysisDepth::Comprehensive);
        assert_eq!(
            classifier.classify_similarity("a loyalty model for creators"),
            AnalysisDepth::Comprehensive
        );
    }

    #[test]
    fn test_word_budget() {
        assert_eq!(word_budget(AnalysisDepth::Light, 250), 120);
        assert_eq!(word_budget(AnalysisDepth::Moderate, 250), 160);
        assert_eq!(word_budget(AnalysisDepth::Comprehensive, 250), 250);
        assert_eq!(word_budget(AnalysisDepth::Light, 90), 90);
        assert_eq!(word_budget(AnalysisDepth::Moderate, 140), 140);
    }
}
