use log::{error, info};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::completion::{
    is_error_response, CompletionClient, CompletionRequest, GenerationConfig, RemoteCompletion,
};
use crate::conversation::{Conversation, Message, Role, SharedConversation};
use crate::depth::{word_budget, word_count, AnalysisDepth, DepthClassifier};
use crate::modes::{analysis_instructions, format_instructions, role_framing, AnalysisKind, Mode, Tone};
use crate::training::TrainingStore;

/// Plagiarism-mode messages shorter than this are treated as ideas, not passages.
pub const CONCEPT_WORD_LIMIT: usize = 25;

const GENERAL_SLACK: f64 = 1.2;
const CONTENT_SLACK: f64 = 1.15;
const ORIGINALITY_SLACK: f64 = 1.1;
const SIMILARITY_SLACK: f64 = 1.3;

const MIN_TYPING_DELAY_MS: u64 = 800;
const MAX_EXTRA_TYPING_DELAY_MS: u64 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "handler", content = "depth", rename_all = "snake_case")]
pub enum Route {
    General,
    Content,
    Originality(AnalysisDepth),
    ConceptualSimilarity(AnalysisDepth),
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::General => "general",
            Route::Content => "content",
            Route::Originality(_) => "originality",
            Route::ConceptualSimilarity(_) => "conceptual_similarity",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Originality(depth) | Route::ConceptualSimilarity(depth) => {
                write!(f, "{}/{}", self.as_str(), depth.as_str())
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Picks the handler for a message in the given mode.
pub fn route(classifier: &DepthClassifier, mode: Mode, text: &str) -> Route {
    match mode {
        Mode::General => Route::General,
        Mode::Content => Route::Content,
        Mode::Plagiarism if word_count(text) < CONCEPT_WORD_LIMIT => {
            Route::ConceptualSimilarity(classifier.classify_similarity(text))
        }
        Mode::Plagiarism => Route::Originality(classifier.classify_originality(text)),
    }
}

/// How long to show the typing indicator before a reply appears.
pub fn typing_delay(reply: &str) -> Duration {
    let extra = (reply.chars().count() as u64).min(MAX_EXTRA_TYPING_DELAY_MS);
    Duration::from_millis(MIN_TYPING_DELAY_MS + extra)
}

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub analysis_word_ceiling: usize,
    pub general_target_words: usize,
    pub content_target_words: usize,
    pub simulate_typing: bool,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        AssistantSettings {
            analysis_word_ceiling: 250,
            general_target_words: 150,
            content_target_words: 200,
            simulate_typing: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "route", rename_all = "snake_case")]
pub enum ReplySource {
    /// Answered from the phrase table without a remote call
    Local,
    Remote(Route),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub message: Message,
    pub source: ReplySource,
    pub failed: bool,
}

pub struct Assistant {
    training: Arc<TrainingStore>,
    completion: RemoteCompletion,
    classifier: DepthClassifier,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(client: Arc<dyn CompletionClient>, settings: AssistantSettings) -> Self {
        Self::with_training(client, settings, Arc::new(TrainingStore::new()))
    }

    pub fn with_training(
        client: Arc<dyn CompletionClient>,
        settings: AssistantSettings,
        training: Arc<TrainingStore>,
    ) -> Self {
        Assistant {
            training,
            completion: RemoteCompletion::new(client),
            classifier: DepthClassifier::new(),
            settings,
        }
    }

    pub fn training(&self) -> &TrainingStore {
        &self.training
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn route(&self, mode: Mode, text: &str) -> Route {
        route(&self.classifier, mode, text)
    }

    /// Assembles the completion request a route sends for `text`.
    pub fn build_request(&self, route: Route, text: &str, tone: Tone, context: Option<String>) -> CompletionRequest {
        match route {
            Route::General => {
                let target = self.settings.general_target_words;
                CompletionRequest {
                    context,
                    instructions: format!("{}\n\nUser: {}", role_framing(Mode::General), text),
                    format_instructions: format_instructions(Mode::General, tone, target),
                    config: GenerationConfig::GENERAL,
                    target_words: target,
                    slack: GENERAL_SLACK,
                }
            }
            Route::Content => {
                let target = self.settings.content_target_words;
                CompletionRequest {
                    context,
                    instructions: format!("{}\n\nRequest: {}", role_framing(Mode::Content), text),
                    format_instructions: format_instructions(Mode::Content, tone, target),
                    config: GenerationConfig::CONTENT,
                    target_words: target,
                    slack: CONTENT_SLACK,
                }
            }
            Route::Originality(depth) => {
                self.analysis_request(AnalysisKind::Originality, depth, text, ORIGINALITY_SLACK)
            }
            Route::ConceptualSimilarity(depth) => {
                self.analysis_request(AnalysisKind::ConceptualSimilarity, depth, text, SIMILARITY_SLACK)
            }
        }
    }

    fn analysis_request(&self, kind: AnalysisKind, depth: AnalysisDepth, text: &str, slack: f64) -> CompletionRequest {
        let target = word_budget(depth, self.settings.analysis_word_ceiling);
        CompletionRequest {
            context: None,
            instructions: format!(
                "{}\n\n{}",
                role_framing(Mode::Plagiarism),
                analysis_instructions(kind, depth, text)
            ),
            format_instructions: format_instructions(Mode::Plagiarism, Tone::Professional, target),
            config: GenerationConfig::ANALYSIS,
            target_words: target,
            slack,
        }
    }

    /// Runs one user turn against `conversation` and appends both sides.
    ///
    /// The turn runs on its own task, so dropping the returned future (a client
    /// hanging up mid-request) still lets the reply land and the typing flag
    /// clear. The lock is released while the remote call is in flight, so
    /// replies to overlapping messages land in whatever order they complete.
    pub async fn handle_message(self: &Arc<Self>, conversation: &SharedConversation, text: &str) -> Option<Reply> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let assistant = Arc::clone(self);
        let turn_conversation = Arc::clone(conversation);
        let text = text.to_string();
        let turn = tokio::spawn(async move { assistant.run_turn(&turn_conversation, &text).await });

        match turn.await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!("Turn task failed: {}", e);
                let mut conversation = conversation.lock().await;
                conversation.set_typing(false);
                None
            }
        }
    }

    async fn run_turn(&self, conversation: &Mutex<Conversation>, text: &str) -> Reply {
        let (session_id, mode, tone, context) = {
            let mut conversation = conversation.lock().await;
            conversation.append(Message::new(Role::User, text)).await;
            conversation.set_typing(true);
            (
                conversation.session_id().to_string(),
                conversation.mode(),
                conversation.tone(),
                conversation.context(),
            )
        };

        let (reply_text, source, failed) = match self.training.find_response(text).await {
            Some(local) => {
                info!("Answered locally | Session: {}", session_id);
                (local, ReplySource::Local, false)
            }
            None => {
                let route = self.route(mode, text);
                info!("Routing message | Session: {} | Mode: {} | Route: {}", session_id, mode, route);

                let request = self.build_request(route, text, tone, context);
                match self.completion.generate(&request).await {
                    Ok(reply) => {
                        if route == Route::General {
                            self.training.learn(text, &reply).await;
                        }
                        (reply, ReplySource::Remote(route), false)
                    }
                    Err(e) => {
                        error!("Completion failed for session {}: {}", session_id, e);
                        (e.user_message().to_string(), ReplySource::Remote(route), true)
                    }
                }
            }
        };

        if self.settings.simulate_typing {
            sleep(typing_delay(&reply_text)).await;
        }

        let message = Message::new(Role::Assistant, &reply_text);
        {
            let mut conversation = conversation.lock().await;
            if !failed && !is_error_response(&reply_text) {
                conversation.record_turn(text, &reply_text);
            }
            conversation.append(message.clone()).await;
            conversation.set_typing(false);
        }

        Reply {
            message,
            source,
            failed,
        }
    }
}
