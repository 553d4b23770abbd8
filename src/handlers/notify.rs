use std::fmt::Display;
use std::future::Future;

use teloxide::prelude::*;
use tracing::{error, info};

use crate::registry::UserRegistry;

/// Attempts `send` for every id, skipping over individual failures. Returns
/// how many deliveries succeeded.
pub async fn deliver_to_all<F, Fut, E>(user_ids: &[i64], mut send: F) -> usize
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut delivered = 0usize;
    for &user_id in user_ids {
        match send(user_id).await {
            Ok(()) => {
                delivered += 1;
                info!("Notification delivered to user {user_id}");
            }
            Err(err) => {
                error!("Failed to deliver notification to user {user_id}: {err}");
            }
        }
    }
    delivered
}

/// Sends `text` to every user the registry has ever seen.
pub async fn notify_users(bot: &Bot, registry: &UserRegistry, text: &str) {
    let user_ids = registry.all();
    let total = user_ids.len();
    let delivered = deliver_to_all(&user_ids, |user_id| {
        let bot = bot.clone();
        let text = text.to_string();
        async move { bot.send_message(ChatId(user_id), text).await.map(|_| ()) }
    })
    .await;
    info!("Notification fan-out finished: {delivered}/{total} delivered");
}
