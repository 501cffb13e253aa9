use anyhow::Result;
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use brandmatch::assistant::{Assistant, AssistantSettings};
use brandmatch::completion::GeminiClient;
use brandmatch::config::Config;
use brandmatch::console::{format_history, get_help_text, parse_console_command, ConsoleCommand};
use brandmatch::conversation::Conversation;
use brandmatch::database::Database;
use brandmatch::history::{HistoryStore, MemoryHistory};

const CONSOLE_SESSION: &str = "console";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let history: Arc<dyn HistoryStore> = match Database::new(&config.database_path).await {
        Ok(database) => Arc::new(database),
        Err(e) => {
            warn!("Database unavailable ({}), history will not be kept", e);
            Arc::new(MemoryHistory::new())
        }
    };

    if config.gemini_api_key.is_none() {
        warn!("⚠️ GEMINI_API_KEY is not set; only built-in replies will work");
    }
    let client = Arc::new(GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone()));
    let assistant = Arc::new(Assistant::new(
        client,
        AssistantSettings {
            analysis_word_ceiling: config.analysis_word_ceiling,
            simulate_typing: config.simulate_typing,
            ..AssistantSettings::default()
        },
    ));

    let conversation = Arc::new(Mutex::new(
        Conversation::restore(CONSOLE_SESSION, history, config.context_window_chars).await,
    ));
    info!("Console session ready");

    let mut stdout = tokio::io::stdout();
    if let Some(last) = conversation.lock().await.messages().last() {
        stdout.write_all(format!("assistant: {}\n", last.text).as_bytes()).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_console_command(&line) else {
            continue;
        };

        let output = match command {
            ConsoleCommand::Chat(text) => match assistant.handle_message(&conversation, &text).await {
                Some(reply) => format!("assistant: {}\n", reply.message.text),
                None => continue,
            },
            ConsoleCommand::Mode(Some(name)) => {
                let mut conversation = conversation.lock().await;
                if conversation.set_mode(&name).await {
                    format!("assistant: {}\n", conversation.mode().announcement())
                } else {
                    format!("Unknown mode '{}'. Try !help\n", name)
                }
            }
            ConsoleCommand::Tone(Some(name)) => {
                let mut conversation = conversation.lock().await;
                if conversation.set_tone(&name).await {
                    format!("assistant: {}\n", conversation.tone().announcement())
                } else {
                    format!("Unknown tone '{}'. Try !help\n", name)
                }
            }
            ConsoleCommand::Mode(None) => format!("Current mode: {}\n", conversation.lock().await.mode()),
            ConsoleCommand::Tone(None) => format!("Current tone: {}\n", conversation.lock().await.tone()),
            ConsoleCommand::Reset => {
                let mut conversation = conversation.lock().await;
                conversation.reset().await;
                format!("assistant: {}\n", conversation.messages()[0].text)
            }
            ConsoleCommand::History => format_history(&*conversation.lock().await),
            ConsoleCommand::Help => get_help_text(),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Unknown(name) => format!("Unknown command '!{}'. Try !help\n", name),
        };

        stdout.write_all(output.as_bytes()).await?;
    }

    info!("Console session closed");
    Ok(())
}
