use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ReplyParameters};
use tracing::{error, warn};

use crate::config::{BlockedRequestPolicy, CONFIG};
use crate::gate::AdmissionGate;
use crate::llm::{generate_image, translate_prompt, ImageGenerationError, TranslationError};
use crate::state::AppState;
use crate::utils::language::prompt_language_hint;
use crate::utils::telegram::start_upload_heartbeat;
use crate::utils::timing::{complete_request_timer, start_request_timer};

const REJECTION_TEXT: &str = "Not nice being spammed, is it? Have it right back!";
const PROMPT_FOR_TEXT: &str = "Please send a text prompt for image generation.";

#[derive(Debug, thiserror::Error)]
enum PromptError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Generation(#[from] ImageGenerationError),
}

impl PromptError {
    fn user_reply(&self) -> String {
        match self {
            PromptError::Translation(err) => {
                format!("Sorry, I couldn't translate your prompt.\n\nError: {}", err.0)
            }
            PromptError::Generation(err) => {
                format!("Sorry, I couldn't generate the image.\n\nError: {}", err.0)
            }
        }
    }

    fn stage(&self) -> &'static str {
        match self {
            PromptError::Translation(_) => "translation",
            PromptError::Generation(_) => "generation",
        }
    }
}

/// Re-arms the admission window when dropped, so the end-of-request arm runs
/// on every exit path.
struct RearmGuard {
    gate: AdmissionGate,
    user_id: i64,
    duration: Duration,
}

impl Drop for RearmGuard {
    fn drop(&mut self) {
        self.gate.block(self.user_id, self.duration);
    }
}

fn apply_style(prompt: &str, style: Option<&str>) -> String {
    match style {
        Some(style) if !style.is_empty() => format!("{prompt} in {style} style"),
        _ => prompt.to_string(),
    }
}

fn photo_file_name(bytes: &[u8]) -> String {
    let extension = infer::get(bytes)
        .map(|kind| kind.extension())
        .unwrap_or("png");
    format!("generated_image.{extension}")
}

pub async fn prompt_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let mut timer = start_request_timer("prompt", &message);
    let user_id = message
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .unwrap_or_default();

    if let Err(err) = state.registry.track(user_id) {
        error!("Failed to record user {user_id}: {err}");
    }

    if state.gate.is_blocked(user_id) {
        bot.send_message(message.chat.id, REJECTION_TEXT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        warn!("User {user_id} sent a request before the previous one finished");
        if CONFIG.blocked_request_policy == BlockedRequestPolicy::Reject {
            complete_request_timer(&mut timer, "rejected", None);
            return Ok(());
        }
    }

    state.gate.block(user_id, CONFIG.lock_duration);
    let _rearm = RearmGuard {
        gate: state.gate.clone(),
        user_id,
        duration: CONFIG.lock_duration,
    };

    let Some(prompt) = message.text() else {
        bot.send_message(message.chat.id, PROMPT_FOR_TEXT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        complete_request_timer(&mut timer, "no_text", None);
        return Ok(());
    };

    match run_pipeline(&bot, &state, &message, user_id, prompt).await {
        Ok(()) => {
            complete_request_timer(&mut timer, "success", None);
        }
        Err(err) => {
            error!("Prompt {} failed for user {user_id}: {err}", err.stage());
            let _ = bot
                .send_message(message.chat.id, err.user_reply())
                .reply_parameters(ReplyParameters::new(message.id))
                .await;
            complete_request_timer(&mut timer, "error", Some(err.stage().to_string()));
        }
    }

    Ok(())
}

async fn run_pipeline(
    bot: &Bot,
    state: &AppState,
    message: &Message,
    user_id: i64,
    prompt: &str,
) -> Result<(), PromptError> {
    let _chat_action = start_upload_heartbeat(bot.clone(), message.chat.id);

    let user_language_code = message
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());
    let language_hint = prompt_language_hint(prompt, user_language_code);

    let translated = translate_prompt(prompt, language_hint.as_deref()).await?;
    let final_prompt = apply_style(&translated, state.selected_style(user_id).as_deref());

    let images = generate_image(&final_prompt).await?;
    for image in images {
        let file_name = photo_file_name(&image);
        if let Err(err) = bot
            .send_photo(
                message.chat.id,
                InputFile::memory(image).file_name(file_name),
            )
            .reply_parameters(ReplyParameters::new(message.id))
            .await
        {
            warn!("Failed to send generated photo to user {user_id}: {err}");
        }
    }

    Ok(())
}
