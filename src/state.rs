use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::gate::AdmissionGate;
use crate::registry::UserRegistry;

/// Shared state handed to every handler through the dispatcher. Replaces the
/// global maps the bot historically kept: admission windows, the persisted
/// user registry, and each user's chosen image style.
#[derive(Clone)]
pub struct AppState {
    pub registry: UserRegistry,
    pub gate: AdmissionGate,
    styles: Arc<Mutex<HashMap<i64, String>>>,
}

impl AppState {
    pub fn new(registry: UserRegistry) -> Self {
        AppState {
            registry,
            gate: AdmissionGate::new(),
            styles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Remembers `style` for `user_id` until the process exits, overwriting
    /// any earlier pick. An empty style means "no style".
    pub fn set_style(&self, user_id: i64, style: String) {
        self.styles.lock().insert(user_id, style);
    }

    /// The user's current style, if one was picked and it is non-empty.
    pub fn selected_style(&self, user_id: i64) -> Option<String> {
        self.styles
            .lock()
            .get(&user_id)
            .filter(|style| !style.is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(name: &str) -> AppState {
        let path = std::env::temp_dir().join(format!("state_test_{name}.txt"));
        let _ = std::fs::remove_file(&path);
        AppState::new(UserRegistry::load(path).unwrap())
    }

    #[test]
    fn style_is_overwritten_per_user() {
        let state = test_state("overwrite");
        state.set_style(1, "cartoon".to_string());
        state.set_style(1, "realistic".to_string());
        assert_eq!(state.selected_style(1).as_deref(), Some("realistic"));
        assert_eq!(state.selected_style(2), None);
    }

    #[test]
    fn empty_style_reads_as_no_style() {
        let state = test_state("empty");
        state.set_style(1, "cartoon".to_string());
        state.set_style(1, String::new());
        assert_eq!(state.selected_style(1), None);
    }
}
