use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::warn;

const UPLOAD_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

/// Keeps the "uploading a photo..." indicator visible in the chat while a
/// slow generation call runs. The indicator task is aborted on drop.
pub struct UploadHeartbeat {
    task_handle: Option<JoinHandle<()>>,
}

impl Drop for UploadHeartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

pub fn start_upload_heartbeat(bot: Bot, chat_id: ChatId) -> UploadHeartbeat {
    let task_handle = tokio::spawn(async move {
        loop {
            if let Err(err) = bot.send_chat_action(chat_id, ChatAction::UploadPhoto).await {
                warn!("send_chat_action failed: {err}");
            }
            tokio::time::sleep(UPLOAD_HEARTBEAT_INTERVAL).await;
        }
    });

    UploadHeartbeat {
        task_handle: Some(task_handle),
    }
}
