//! # Feature: Assistant Modes
//!
//! The three handling strategies a conversation can be in, the tones content is
//! written in, and the role framing each mode hands to the completion prompt.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: General, content and plagiarism modes with tone-aware framing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::depth::AnalysisDepth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    General,
    Content,
    Plagiarism,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::General, Mode::Content, Mode::Plagiarism];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Content => "content",
            Mode::Plagiarism => "plagiarism",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::General => "Questions about the platform, collaborations and creator marketing",
            Mode::Content => "Drafts captions, bios, pitches and campaign copy",
            Mode::Plagiarism => "Checks text originality and how closely an idea resembles existing work",
        }
    }

    /// Scripted message appended to the conversation when this mode is selected.
    pub fn announcement(&self) -> &'static str {
        match self {
            Mode::General => "General mode is on. Ask me anything about finding creators, working with brands, or using the platform.",
            Mode::Content => "Content mode is on. Tell me what you need written (a caption, a bio, a pitch to a brand) and I'll draft it in your selected tone.",
            Mode::Plagiarism => "Originality mode is on. Paste a passage to check how original it reads, or describe an idea to see how it compares with existing work.",
        }
    }
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Mode::General),
            "content" => Ok(Mode::Content),
            "plagiarism" => Ok(Mode::Plagiarism),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Friendly,
    Professional,
    Casual,
    Persuasive,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Friendly, Tone::Professional, Tone::Casual, Tone::Persuasive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Friendly => "friendly",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Persuasive => "persuasive",
        }
    }

    fn style_hint(&self) -> &'static str {
        match self {
            Tone::Friendly => "warm and approachable",
            Tone::Professional => "polished and businesslike",
            Tone::Casual => "relaxed and conversational",
            Tone::Persuasive => "confident and convincing",
        }
    }

    pub fn announcement(&self) -> String {
        format!(
            "Tone set to {}. I'll keep my writing {}.",
            self.as_str(),
            self.style_hint()
        )
    }
}

impl FromStr for Tone {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "friendly" => Ok(Tone::Friendly),
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "persuasive" => Ok(Tone::Persuasive),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two plagiarism-mode analyses a prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Originality,
    ConceptualSimilarity,
}

const PLATFORM_FRAMING: &str = "You are the in-app assistant for a platform that matches content creators with brands for sponsored collaborations.";

/// Role framing placed before the user's request.
pub fn role_framing(mode: Mode) -> String {
    match mode {
        Mode::General => format!(
            "{} Answer questions about finding collaborators, pricing sponsored posts, building a media kit, and using the platform.",
            PLATFORM_FRAMING
        ),
        Mode::Content => format!(
            "{} You are a copywriter who drafts social posts, creator bios, brand pitches and campaign briefs.",
            PLATFORM_FRAMING
        ),
        Mode::Plagiarism => format!(
            "{} You review writing for originality and compare ideas with work that already exists.",
            PLATFORM_FRAMING
        ),
    }
}

/// Formatting instructions appended after the request: word target, tone, layout.
pub fn format_instructions(mode: Mode, tone: Tone, target_words: usize) -> String {
    match mode {
        Mode::General => format!(
            "Reply in a {} tone ({}). Keep the answer under {} words and avoid headings.",
            tone.as_str(),
            tone.style_hint(),
            target_words
        ),
        Mode::Content => format!(
            "Write in a {} tone ({}). Aim for about {} words. Return only the finished copy, without commentary.",
            tone.as_str(),
            tone.style_hint(),
            target_words
        ),
        Mode::Plagiarism => format!(
            "Use short labelled sections. Stay within {} words.",
            target_words
        ),
    }
}

/// Task instructions for a plagiarism-mode analysis at the given depth.
pub fn analysis_instructions(kind: AnalysisKind, depth: AnalysisDepth, text: &str) -> String {
    let task = match (kind, depth) {
        (AnalysisKind::Originality, AnalysisDepth::Light) => {
            "Give a quick originality read of the text below: one overall verdict and at most two phrases that sound generic or borrowed."
        }
        (AnalysisKind::Originality, AnalysisDepth::Moderate) => {
            "Assess the originality of the text below. Give an originality estimate as a percentage, list passages that resemble common published phrasing, and suggest how to make each one more distinctive."
        }
        (AnalysisKind::Originality, AnalysisDepth::Comprehensive) => {
            "Perform a thorough originality review of the text below. Estimate an originality percentage, identify passages that likely paraphrase existing sources, note which ideas or frameworks should be attributed, and give concrete rewriting and citation recommendations."
        }
        (AnalysisKind::ConceptualSimilarity, AnalysisDepth::Light) => {
            "Briefly say whether the idea below is common or unusual, and name one well-known example it resembles if any."
        }
        (AnalysisKind::ConceptualSimilarity, AnalysisDepth::Moderate) => {
            "Compare the idea below with existing campaigns, products or published work. Rate its conceptual similarity (low/medium/high), name the closest examples, and suggest an angle that would set it apart."
        }
        (AnalysisKind::ConceptualSimilarity, AnalysisDepth::Comprehensive) => {
            "Analyse the concept below in depth. Map it against established theories, frameworks and prior work, rate its conceptual similarity (low/medium/high) with reasons, point out what is genuinely novel, and recommend how to credit prior work."
        }
    };
    format!("{}\n\nText:\n\"\"\"\n{}\n\"\"\"", task, text)
}
