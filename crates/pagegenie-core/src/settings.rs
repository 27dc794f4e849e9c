//! Persisted settings store with change subscription.
//!
//! [`SettingsStore`] is the only owner of the user's configuration, including
//! the stored [`Credential`]. Components receive an `Arc<SettingsStore>` at
//! construction, read a snapshot with [`SettingsStore::get`] at each use site,
//! and may [`subscribe`](SettingsStore::subscribe) to be told when it changes.
//!
//! ## Environment overlay
//!
//! | Variable | Key | Notes |
//! |----------|-----|-------|
//! | `PAGEGENIE_BACKEND_URL` | `backendUrl` | empty string unsets the backend |
//! | `PAGEGENIE_MODE` | `mode` | `auto`, `offline-only`, `online-only` |
//! | `PAGEGENIE_TARGET_LANG` | `targetLang` | |
//! | `PAGEGENIE_PERSONA` | `persona` | `general`, `student`, `researcher`, `editor` |
//! | `PAGEGENIE_SETTINGS` | n/a | settings file path used by [`SettingsStore::default_path`] |
//!
//! Overrides shape what [`SettingsStore::get`] returns but are never written
//! to the settings file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{Credential, Mode, Persona};

/// User configuration. Keys serialize exactly as the extension stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub backend_url: String,
    pub api_token: String,
    /// Token expiry in ms since the Unix epoch; `0` when no token is stored.
    pub token_exp: i64,
    pub mode: Mode,
    pub show_toolbar_on_selection: bool,
    pub target_lang: String,
    pub persona: Persona,
    pub cite_sources: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: defaults::BACKEND_URL.to_string(),
            api_token: String::new(),
            token_exp: 0,
            mode: Mode::Auto,
            show_toolbar_on_selection: true,
            target_lang: defaults::TARGET_LANG.to_string(),
            persona: Persona::General,
            cite_sources: false,
        }
    }
}

impl Settings {
    /// Backend base URL without a trailing slash, or `None` when unset.
    pub fn backend_url(&self) -> Option<&str> {
        let url = self.backend_url.trim().trim_end_matches('/');
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    /// Stored credential, expired or not. `None` when no token is stored.
    pub fn credential(&self) -> Option<Credential> {
        if self.api_token.is_empty() {
            return None;
        }
        Some(Credential {
            token: self.api_token.clone(),
            expires_at_ms: self.token_exp,
        })
    }

    /// Target language, falling back to `en` when blank.
    pub fn target_lang(&self) -> &str {
        let lang = self.target_lang.trim();
        if lang.is_empty() {
            defaults::TARGET_LANG
        } else {
            lang
        }
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PAGEGENIE_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(raw) = lookup("PAGEGENIE_MODE") {
            match raw.parse::<Mode>() {
                Ok(mode) => self.mode = mode,
                Err(e) => warn!(error = %e, "Ignoring PAGEGENIE_MODE"),
            }
        }
        if let Some(lang) = lookup("PAGEGENIE_TARGET_LANG") {
            self.target_lang = lang;
        }
        if let Some(raw) = lookup("PAGEGENIE_PERSONA") {
            match raw.parse::<Persona>() {
                Ok(persona) => self.persona = persona,
                Err(e) => warn!(error = %e, "Ignoring PAGEGENIE_PERSONA"),
            }
        }
    }

    fn clear_credential(&mut self) {
        self.api_token.clear();
        self.token_exp = 0;
    }
}

/// Environment variables that override persisted keys.
pub const OVERRIDE_VARS: [&str; 4] = [
    "PAGEGENIE_BACKEND_URL",
    "PAGEGENIE_MODE",
    "PAGEGENIE_TARGET_LANG",
    "PAGEGENIE_PERSONA",
];

/// Emitted after a settings update that changed at least one key.
#[derive(Debug, Clone)]
pub struct SettingsChange {
    pub old: Settings,
    pub new: Settings,
}

impl SettingsChange {
    pub fn credential_changed(&self) -> bool {
        self.old.api_token != self.new.api_token || self.old.token_exp != self.new.token_exp
    }
}

/// Persisted settings and the overlaid view handed to readers.
struct State {
    base: Settings,
    view: Settings,
}

/// Process-wide settings owner.
pub struct SettingsStore {
    state: RwLock<State>,
    overrides: HashMap<String, String>,
    path: Option<PathBuf>,
    tx: broadcast::Sender<SettingsChange>,
}

impl SettingsStore {
    /// Store that lives only in memory.
    pub fn in_memory(settings: Settings) -> Self {
        Self::from_parts(settings, None)
    }

    /// Store backed by a JSON file. A missing file yields defaults; the file
    /// and its parent directories are created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "Settings loaded");
        Ok(Self::from_parts(settings, Some(path)))
    }

    fn from_parts(base: Settings, path: Option<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(defaults::SETTINGS_EVENT_CAPACITY);
        Self {
            state: RwLock::new(State {
                view: base.clone(),
                base,
            }),
            overrides: HashMap::new(),
            path,
            tx,
        }
    }

    /// `PAGEGENIE_SETTINGS`, else `$HOME/.config/pagegenie/settings.json`,
    /// else `settings.json` in the working directory.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("PAGEGENIE_SETTINGS") {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        match std::env::var("HOME") {
            Ok(home) if !home.is_empty() => PathBuf::from(home)
                .join(".config")
                .join("pagegenie")
                .join(defaults::SETTINGS_FILE),
            _ => PathBuf::from(defaults::SETTINGS_FILE),
        }
    }

    /// Overlay the `PAGEGENIE_*` variables set in the process environment.
    pub fn with_env_overlay(self) -> Self {
        let overrides = OVERRIDE_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        self.with_overrides(overrides)
    }

    /// Overlay `overrides` (keyed by [`OVERRIDE_VARS`] names) on every read.
    /// Later updates keep them out of the file.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        {
            let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
            state.view = overlay(&state.base, &self.overrides);
        }
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .view
            .clone()
    }

    /// Mutate the persisted settings, write them, and notify subscribers.
    /// Returns the new overlaid view.
    ///
    /// Nothing is written or broadcast when `f` leaves the settings unchanged.
    /// The in-memory change takes effect even when writing the file fails;
    /// the write error is still returned.
    pub fn update<F>(&self, f: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut base = state.base.clone();
        f(&mut base);
        if base == state.base {
            return Ok(state.view.clone());
        }

        let view = overlay(&base, &self.overrides);
        let old = std::mem::replace(&mut state.view, view.clone());
        state.base = base;
        let persisted = self.persist(&state.base);
        drop(state);

        if let Err(e) = &persisted {
            error!(error = %e, "Failed to write settings, keeping in-memory change");
        }
        if old != view {
            let _ = self.tx.send(SettingsChange {
                old,
                new: view.clone(),
            });
        }
        persisted.map(|_| view)
    }

    /// Store a credential.
    pub fn set_credential(&self, credential: &Credential) -> Result<()> {
        self.update(|s| {
            s.api_token = credential.token.clone();
            s.token_exp = credential.expires_at_ms;
        })?;
        Ok(())
    }

    /// Reset the credential to `{token: "", exp: 0}`. No-op when already clear.
    pub fn clear_credential(&self) -> Result<()> {
        self.update(Settings::clear_credential)?;
        Ok(())
    }

    /// Receive every subsequent [`SettingsChange`].
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.tx.subscribe()
    }

    fn persist(&self, settings: &Settings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn overlay(base: &Settings, overrides: &HashMap<String, String>) -> Settings {
    let mut view = base.clone();
    if !overrides.is_empty() {
        view.apply_overrides(|key| overrides.get(key).cloned());
    }
    view
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
