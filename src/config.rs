use crate::controller::TaskFilter;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn key_match(key: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|binding| is_match(key, binding))
}

fn is_match(key: &KeyEvent, binding: &str) -> bool {
    let binding = binding.to_lowercase();
    let mut target_modifiers = KeyModifiers::NONE;
    let mut target_code = KeyCode::Null;

    for part in binding.split('+') {
        match part {
            "ctrl" => target_modifiers.insert(KeyModifiers::CONTROL),
            "opt" | "alt" => target_modifiers.insert(KeyModifiers::ALT),
            "shift" => target_modifiers.insert(KeyModifiers::SHIFT),
            "enter" => target_code = KeyCode::Enter,
            "esc" => target_code = KeyCode::Esc,
            "backspace" => target_code = KeyCode::Backspace,
            "tab" => target_code = KeyCode::Tab,
            "backtab" => target_code = KeyCode::BackTab,
            "space" => target_code = KeyCode::Char(' '),
            "up" => target_code = KeyCode::Up,
            "down" => target_code = KeyCode::Down,
            "home" => target_code = KeyCode::Home,
            "end" => target_code = KeyCode::End,
            "delete" => target_code = KeyCode::Delete,
            c if c.chars().count() == 1 => {
                if let Some(ch) = c.chars().next() {
                    target_code = KeyCode::Char(ch);
                }
            }
            _ => {}
        }
    }

    let code_matches = match (key.code, target_code) {
        (KeyCode::Char(c), KeyCode::Char(tc)) => c.to_lowercase().next() == Some(tc),
        (code, target) => code == target,
    };
    if !code_matches {
        return false;
    }

    // Shift is ignored unless the binding asks for it, so `?` and BackTab match
    // whatever the terminal reports.
    let mut key_mods = key.modifiers;
    if let KeyCode::Char(c) = key.code
        && c.is_uppercase()
    {
        key_mods.insert(KeyModifiers::SHIFT);
    }
    if !target_modifiers.contains(KeyModifiers::SHIFT) {
        key_mods.remove(KeyModifiers::SHIFT);
    }
    key_mods == target_modifiers
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "dailytodo", "dailytodo")
}

fn default_data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("DAILYTODO_DATA_DIR") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dailytodo")
}

fn default_log_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("DAILYTODO_LOG_DIR") {
        return PathBuf::from(path);
    }
    default_data_dir().join("logs")
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("DAILYTODO_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("config.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dailytodo-config.toml")
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub firebase: FirebaseConfig,
    pub google: GoogleConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub view: ViewConfig,
    pub keybindings: KeyBindings,
    pub theme: Theme,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FirebaseConfig {
    pub api_key: String,
    /// e.g. `https://<project>-default-rtdb.firebaseio.com`
    pub database_url: String,
    pub timeout_seconds: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_url: String::new(),
            timeout_seconds: 15,
        }
    }
}

/// OAuth client of type "Desktop app"; loopback redirects need no registration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Realtime,
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ViewConfig {
    pub default_filter: TaskFilter,
    pub show_completed: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_filter: TaskFilter::All,
            show_completed: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KeyBindings {
    pub global: GlobalBindings,
    pub list: ListBindings,
    pub composer: ComposerBindings,
    pub popup: PopupBindings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalBindings {
    pub quit: Vec<String>,
    pub help: Vec<String>,
}

impl Default for GlobalBindings {
    fn default() -> Self {
        Self {
            quit: vec!["ctrl+q".to_string(), "q".to_string()],
            help: vec!["?".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ListBindings {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub top: Vec<String>,
    pub bottom: Vec<String>,
    pub toggle: Vec<String>,
    pub delete: Vec<String>,
    pub compose: Vec<String>,
    pub cycle_filter: Vec<String>,
    pub toggle_completed: Vec<String>,
    pub refresh: Vec<String>,
}

impl Default for ListBindings {
    fn default() -> Self {
        Self {
            up: vec!["k".to_string(), "up".to_string()],
            down: vec!["j".to_string(), "down".to_string()],
            top: vec!["g".to_string(), "home".to_string()],
            bottom: vec!["shift+g".to_string(), "end".to_string()],
            toggle: vec!["space".to_string(), "enter".to_string()],
            delete: vec!["d".to_string(), "delete".to_string()],
            compose: vec!["i".to_string(), "a".to_string()],
            cycle_filter: vec!["f".to_string(), "tab".to_string()],
            toggle_completed: vec!["c".to_string()],
            refresh: vec!["r".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ComposerBindings {
    pub submit: Vec<String>,
    pub cancel: Vec<String>,
    pub switch_field: Vec<String>,
}

impl Default for ComposerBindings {
    fn default() -> Self {
        Self {
            submit: vec!["enter".to_string()],
            cancel: vec!["esc".to_string()],
            switch_field: vec!["tab".to_string(), "backtab".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PopupBindings {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for PopupBindings {
    fn default() -> Self {
        Self {
            confirm: vec!["enter".to_string(), "y".to_string()],
            cancel: vec!["esc".to_string(), "n".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    pub border_default: String,
    pub border_editing: String,
    pub accent: String,
    pub muted: String,
    pub selection_bg: String,
    pub task_done: String,
    pub task_open: String,
    pub date: String,
    pub toast_info: String,
    pub toast_error: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            border_default: "Reset".to_string(),
            border_editing: "Green".to_string(),
            accent: "Cyan".to_string(),
            muted: "DarkGray".to_string(),
            selection_bg: "50,50,50".to_string(),
            task_done: "Green".to_string(),
            task_open: "Reset".to_string(),
            date: "Blue".to_string(),
            toast_info: "Cyan".to_string(),
            toast_error: "LightRed".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = config_path();

        let mut config = if let Ok(content) = fs::read_to_string(&config_path) {
            match toml::from_str::<Config>(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Failed to parse config.toml ({config_path:?}), using defaults: {e}");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        let changed = config.normalize_paths();
        if changed || !config_path.exists() {
            let _ = config.save_to_path(&config_path);
        }

        config
    }

    pub fn save_to_path(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, content)
    }

    fn normalize_paths(&mut self) -> bool {
        let mut changed = false;

        if self.logging.dir.as_os_str().is_empty() {
            self.logging.dir = default_log_dir();
            changed = true;
        }

        if self.logging.dir.is_relative() {
            self.logging.dir = default_data_dir().join(&self.logging.dir);
            changed = true;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn key_match_handles_modifiers_and_case() {
        let quit = vec!["ctrl+q".to_string(), "q".to_string()];
        assert!(key_match(&key(KeyCode::Char('q'), KeyModifiers::NONE), &quit));
        assert!(key_match(&key(KeyCode::Char('q'), KeyModifiers::CONTROL), &quit));
        assert!(!key_match(&key(KeyCode::Char('w'), KeyModifiers::CONTROL), &quit));

        let bottom = vec!["shift+g".to_string()];
        assert!(key_match(&key(KeyCode::Char('G'), KeyModifiers::SHIFT), &bottom));
        assert!(!key_match(&key(KeyCode::Char('g'), KeyModifiers::NONE), &bottom));
        assert!(key_match(&key(KeyCode::Char('G'), KeyModifiers::NONE), &bottom));

        let help = vec!["?".to_string()];
        assert!(key_match(&key(KeyCode::Char('?'), KeyModifiers::SHIFT), &help));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [firebase]
            database_url = "https://demo.firebaseio.com"

            [store]
            backend = "memory"

            [view]
            default_filter = "leftover"
            "#,
        )
        .expect("parse");

        assert_eq!(config.firebase.database_url, "https://demo.firebaseio.com");
        assert_eq!(config.firebase.timeout_seconds, 15);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.view.default_filter, TaskFilter::Leftover);
        assert!(config.view.show_completed);
        assert_eq!(config.keybindings.list.toggle_completed, vec!["c".to_string()]);
    }

    #[test]
    fn relative_log_dir_is_anchored_to_data_dir() {
        let mut config = Config::default();
        config.logging.dir = PathBuf::from("logs");
        assert!(config.normalize_paths());
        assert_ne!(config.logging.dir, PathBuf::from("logs"));
        assert!(config.logging.dir.ends_with("logs"));
    }
}
