/// Namespaced storage slots used by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
  Theme,
  LanguagePref,
  CompactMode,
  RecentAnalyses,
  Cache,
  UserPreferences,
}

impl StorageKey {
  pub const ALL: [StorageKey; 6] = [
    StorageKey::Theme,
    StorageKey::LanguagePref,
    StorageKey::CompactMode,
    StorageKey::RecentAnalyses,
    StorageKey::Cache,
    StorageKey::UserPreferences,
  ];

  /// Slot name as written to the backend.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Theme => "cm-analyzer-theme",
      Self::LanguagePref => "cm-analyzer-language-pref",
      Self::CompactMode => "cm-analyzer-compact-mode",
      Self::RecentAnalyses => "cm-analyzer-recent-analyses",
      Self::Cache => "cm-analyzer-cache",
      Self::UserPreferences => "cm-analyzer-preferences",
    }
  }

  /// Short label for reports.
  pub fn name(self) -> &'static str {
    match self {
      Self::Theme => "theme",
      Self::LanguagePref => "language_pref",
      Self::CompactMode => "compact_mode",
      Self::RecentAnalyses => "recent_analyses",
      Self::Cache => "cache",
      Self::UserPreferences => "user_preferences",
    }
  }
}
