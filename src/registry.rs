use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Append-only record of every user id that has ever messaged the bot,
/// persisted one id per line. The in-memory set mirrors the file and is the
/// source of truth for membership checks; the file only ever grows.
#[derive(Clone)]
pub struct UserRegistry {
    path: PathBuf,
    users: Arc<Mutex<HashSet<i64>>>,
}

impl UserRegistry {
    /// Loads the registry from `path`, creating an empty one when the file
    /// does not exist yet. Lines that do not parse as an id are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut users = HashSet::new();

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<i64>() {
                        Ok(id) => {
                            users.insert(id);
                        }
                        Err(_) => {
                            warn!("Skipping unparsable user registry line: {line:?}");
                        }
                    }
                }
                info!("Loaded {} user(s) from {}", users.len(), path.display());
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "User registry file {} not found; starting empty",
                    path.display()
                );
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read user registry {}", path.display()));
            }
        }

        Ok(UserRegistry {
            path,
            users: Arc::new(Mutex::new(users)),
        })
    }

    /// Records `user_id` if it has not been seen before. Returns `true` when
    /// the id is new. The set is updated before the append so a repeated id
    /// is never written twice, even if the append fails.
    pub fn track(&self, user_id: i64) -> Result<bool> {
        {
            let mut users = self.users.lock();
            if !users.insert(user_id) {
                return Ok(false);
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open user registry {}", self.path.display()))?;
        writeln!(file, "{user_id}")
            .with_context(|| format!("Failed to append to user registry {}", self.path.display()))?;

        info!("New user registered: {user_id}");
        Ok(true)
    }

    pub fn count(&self) -> usize {
        self.users.lock().len()
    }

    pub fn all(&self) -> Vec<i64> {
        self.users.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempRegistryFile(PathBuf);

    impl TempRegistryFile {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("registry_test_{name}.txt"));
            let _ = std::fs::remove_file(&path);
            TempRegistryFile(path)
        }
    }

    impl Drop for TempRegistryFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn starts_empty_without_a_file() {
        let file = TempRegistryFile::new("starts_empty");
        let registry = UserRegistry::load(&file.0).unwrap();
        assert_eq!(registry.count(), 0);
        assert!(registry.all().is_empty());
    }

    #[test]
    fn tracks_each_user_exactly_once() {
        let file = TempRegistryFile::new("tracks_once");
        let registry = UserRegistry::load(&file.0).unwrap();

        assert!(registry.track(111).unwrap());
        assert!(!registry.track(111).unwrap());
        assert!(registry.track(222).unwrap());
        assert!(!registry.track(111).unwrap());

        assert_eq!(registry.count(), 2);
        assert!(registry.all().contains(&111));
        assert!(registry.all().contains(&222));

        let content = std::fs::read_to_string(&file.0).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.iter().filter(|line| **line == "111").count(), 1);
    }

    #[test]
    fn survives_a_reload() {
        let file = TempRegistryFile::new("reload");
        {
            let registry = UserRegistry::load(&file.0).unwrap();
            registry.track(5).unwrap();
            registry.track(6).unwrap();
        }

        let reloaded = UserRegistry::load(&file.0).unwrap();
        assert_eq!(reloaded.count(), 2);
        assert!(reloaded.all().contains(&5));
        assert!(!reloaded.track(6).unwrap());
    }

    #[test]
    fn skips_unparsable_lines() {
        let file = TempRegistryFile::new("unparsable");
        std::fs::write(&file.0, "123\nnot-a-number\n\n456\n").unwrap();

        let registry = UserRegistry::load(&file.0).unwrap();
        assert_eq!(registry.count(), 2);
        assert!(registry.all().contains(&123));
        assert!(registry.all().contains(&456));
    }
}
