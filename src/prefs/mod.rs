//! User preferences and analysis history kept in persistent storage.
//!
//! Everything here is a thin consumer of [`PersistentStore`]: reads fall
//! back to defaults, writes report success as a `bool`.

mod history;
mod info;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{PersistentStore, StorageBackend, StorageKey};

pub use history::{AnalysisKind, NewAnalysis, RecentAnalyses};
pub use info::{clear_all_data, storage_info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl Theme {
  pub fn toggled(self) -> Self {
    match self {
      Self::Light => Self::Dark,
      Self::Dark => Self::Light,
    }
  }
}

/// Source and target language for translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagePair {
  pub source: String,
  pub target: String,
  /// ISO-8601 time of the last change
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated: Option<String>,
}

impl Default for LanguagePair {
  fn default() -> Self {
    Self {
      source: "auto".to_string(),
      target: "en".to_string(),
      updated: None,
    }
  }
}

/// Combined preference document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
  pub theme: Theme,
  pub compact_mode: bool,
  pub language: LanguagePair,
  pub notifications: bool,
  pub analytics: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated: Option<String>,
}

impl Default for UserPreferences {
  fn default() -> Self {
    Self {
      theme: Theme::Light,
      compact_mode: false,
      language: LanguagePair::default(),
      notifications: true,
      analytics: true,
      updated: None,
    }
  }
}

/// Fields to overwrite in [`UserPreferences`]; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PreferencesPatch {
  pub theme: Option<Theme>,
  pub compact_mode: Option<bool>,
  pub language: Option<LanguagePair>,
  pub notifications: Option<bool>,
  pub analytics: Option<bool>,
}

fn now_iso() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accessors for the individual preference slots.
pub struct Preferences<B: ?Sized> {
  store: PersistentStore<B>,
}

impl<B: StorageBackend + ?Sized> Preferences<B> {
  pub fn new(store: PersistentStore<B>) -> Self {
    Self { store }
  }

  pub fn theme(&self) -> Theme {
    self.store.get(StorageKey::Theme.as_str(), Theme::default())
  }

  pub fn set_theme(&self, theme: Theme) -> bool {
    self.store.set(StorageKey::Theme.as_str(), &theme)
  }

  /// Flip between light and dark and return the new theme.
  pub fn toggle_theme(&self) -> Theme {
    let theme = self.theme().toggled();
    self.set_theme(theme);
    theme
  }

  pub fn compact_mode(&self) -> bool {
    self.store.get(StorageKey::CompactMode.as_str(), false)
  }

  pub fn set_compact_mode(&self, enabled: bool) -> bool {
    self.store.set(StorageKey::CompactMode.as_str(), &enabled)
  }

  pub fn languages(&self) -> LanguagePair {
    self
      .store
      .get(StorageKey::LanguagePref.as_str(), LanguagePair::default())
  }

  pub fn set_languages(&self, source: &str, target: &str) -> bool {
    let pair = LanguagePair {
      source: source.to_string(),
      target: target.to_string(),
      updated: Some(now_iso()),
    };
    self.store.set(StorageKey::LanguagePref.as_str(), &pair)
  }

  pub fn source_language(&self) -> String {
    self.languages().source
  }

  pub fn target_language(&self) -> String {
    self.languages().target
  }

  pub fn user_preferences(&self) -> UserPreferences {
    self
      .store
      .get(StorageKey::UserPreferences.as_str(), UserPreferences::default())
  }

  /// Merge `patch` over the stored preferences and stamp the update time.
  pub fn update_user_preferences(&self, patch: PreferencesPatch) -> bool {
    let mut prefs = self.user_preferences();

    if let Some(theme) = patch.theme {
      prefs.theme = theme;
    }
    if let Some(compact_mode) = patch.compact_mode {
      prefs.compact_mode = compact_mode;
    }
    if let Some(language) = patch.language {
      prefs.language = language;
    }
    if let Some(notifications) = patch.notifications {
      prefs.notifications = notifications;
    }
    if let Some(analytics) = patch.analytics {
      prefs.analytics = analytics;
    }
    prefs.updated = Some(now_iso());

    self.store.set(StorageKey::UserPreferences.as_str(), &prefs)
  }

  /// Restore the default preferences (stamped as an update).
  pub fn reset_user_preferences(&self) -> bool {
    let prefs = UserPreferences {
      updated: Some(now_iso()),
      ..UserPreferences::default()
    };
    self.store.set(StorageKey::UserPreferences.as_str(), &prefs)
  }
}
