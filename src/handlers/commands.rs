use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, ReplyParameters};
use tracing::{info, warn};

use crate::config::CONFIG;
use crate::handlers::notify::notify_users;
use crate::state::AppState;

pub const STYLE_CALLBACK_PREFIX: &str = "style:";

/// Fixed style menu; the first entry clears the selection.
const STYLE_OPTIONS: [(&str, &str); 4] = [
    ("", "No style"),
    ("realistic", "Realistic"),
    ("cartoon", "Cartoon"),
    ("black and white", "Black and white"),
];

const SHUTDOWN_REFUSAL_TEXT: &str = "You are not allowed to use this command.";

fn message_user_id(message: &Message) -> i64 {
    message
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .unwrap_or_default()
}

fn is_admin(user_id: i64) -> bool {
    CONFIG.admin_user_id != 0 && user_id == CONFIG.admin_user_id
}

fn build_style_keyboard() -> InlineKeyboardMarkup {
    let buttons = STYLE_OPTIONS
        .iter()
        .map(|(value, label)| {
            InlineKeyboardButton::callback(
                label.to_string(),
                format!("{STYLE_CALLBACK_PREFIX}{value}"),
            )
        })
        .collect::<Vec<_>>();

    let rows = buttons
        .chunks(2)
        .map(|chunk| chunk.to_vec())
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

fn style_label(value: &str) -> Option<&'static str> {
    STYLE_OPTIONS
        .iter()
        .find(|(option, _)| *option == value)
        .map(|(_, label)| *label)
}

pub async fn start_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    bot.send_message(
        message.chat.id,
        format!(
            "Hello! Send me a text prompt and I will generate an image for it. \
             We have {} user(s) so far!",
            state.registry.count()
        ),
    )
    .reply_parameters(ReplyParameters::new(message.id))
    .await?;
    info!("Sent greeting to chat {}", message.chat.id.0);
    Ok(())
}

#[allow(deprecated)]
pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let help_text = "
/start - Greeting and the current user count

/style - Pick a style applied to every generated image
Usage: `/style`, then tap one of the four options

/shutdown - Notify all users before the bot goes offline (admin-only)

/help - Show this help message

Any other text message is treated as an image generation prompt: it is \
translated and sent to the image model, and the result comes back as a photo.
";

    bot.send_message(message.chat.id, help_text)
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Markdown)
        .await?;
    Ok(())
}

pub async fn style_handler(bot: Bot, message: Message) -> Result<()> {
    bot.send_message(message.chat.id, "Choose an image style:")
        .reply_markup(build_style_keyboard())
        .await?;
    Ok(())
}

pub async fn style_selection_callback(
    bot: Bot,
    state: AppState,
    query: CallbackQuery,
) -> Result<()> {
    let _ = bot.answer_callback_query(query.id.clone()).await;
    let Some(data) = &query.data else {
        return Ok(());
    };

    let selected = data.trim_start_matches(STYLE_CALLBACK_PREFIX);
    let Some(label) = style_label(selected) else {
        warn!("Ignoring unknown style callback payload: {data:?}");
        return Ok(());
    };

    let user_id = i64::try_from(query.from.id.0).unwrap_or_default();
    state.set_style(user_id, selected.to_string());
    info!("User {user_id} selected style {selected:?}");

    if let Some(message) = &query.message {
        bot.edit_message_text(
            message.chat().id,
            message.id(),
            format!("Selected style: {label}"),
        )
        .await?;
    }
    Ok(())
}

pub async fn shutdown_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let user_id = message_user_id(&message);

    if !is_admin(user_id) {
        bot.send_message(message.chat.id, SHUTDOWN_REFUSAL_TEXT)
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        warn!("User {user_id} attempted /shutdown without permission");
        return Ok(());
    }

    notify_users(&bot, &state.registry, &CONFIG.shutdown_message).await;
    info!("Shutdown notice sent to all registered users");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_keyboard_lists_every_option_once() {
        let keyboard = build_style_keyboard();
        let buttons: Vec<_> = keyboard.inline_keyboard.iter().flatten().collect();
        assert_eq!(buttons.len(), STYLE_OPTIONS.len());
        assert_eq!(keyboard.inline_keyboard.len(), 2);
    }

    #[test]
    fn style_labels_resolve_known_values_only() {
        assert_eq!(style_label(""), Some("No style"));
        assert_eq!(style_label("cartoon"), Some("Cartoon"));
        assert_eq!(style_label("black and white"), Some("Black and white"));
        assert_eq!(style_label("sepia"), None);
    }
}
