//! Subcommands and their dispatch.

use clap::{Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::api::{AnalyzerClient, CachedAnalyzerClient};
use crate::cache::{Parameters, ResponseCache};
use crate::config::{BackendKind, Config};
use crate::prefs::{self, Preferences, PreferencesPatch, RecentAnalyses, Theme};
use crate::store::{MemoryBackend, PersistentStore, SqliteBackend, StorageBackend, UnavailableBackend};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Analyze sentiment, language and toxicity of a text
  Analyze {
    text: String,
    /// Ask for the compact response (defaults to the saved preference)
    #[arg(long)]
    compact: Option<Switch>,
  },
  /// Translate a text
  Translate {
    text: String,
    /// Source language (defaults to the saved preference)
    #[arg(long)]
    from: Option<String>,
    /// Target language (defaults to the saved preference)
    #[arg(long)]
    to: Option<String>,
  },
  /// Show backend status
  Status,
  /// Inspect and maintain the response cache
  Cache {
    #[command(subcommand)]
    command: CacheCommand,
  },
  /// Read and change preferences
  Prefs {
    #[command(subcommand)]
    command: PrefsCommand,
  },
  /// Recent analyses
  History {
    #[command(subcommand)]
    command: HistoryCommand,
  },
  /// Storage usage and wipe
  Storage {
    #[command(subcommand)]
    command: StorageCommand,
  },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Print the cache key for a request
  Key {
    /// Endpoint, e.g. /analyze
    endpoint: String,
    /// Parameters as name=value; values that parse as JSON are used as JSON
    #[arg(value_parser = parse_parameter)]
    params: Vec<(String, Value)>,
  },
  /// Print a cached response
  Get { key: String },
  /// Store a JSON value under a key
  Set {
    key: String,
    /// JSON data
    data: String,
    /// TTL in milliseconds (default: configured TTL)
    #[arg(long)]
    ttl: Option<u64>,
  },
  Remove { key: String },
  Clear,
  /// Remove expired entries
  Clean,
  Stats,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
  /// Print all preferences
  Show,
  /// Show, set or toggle the theme
  Theme {
    #[command(subcommand)]
    action: Option<ThemeAction>,
  },
  /// Show or set compact mode
  Compact { state: Option<Switch> },
  /// Show or set the translation languages
  Language {
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to: Option<String>,
  },
  /// Merge fields into the combined preferences
  Update {
    #[arg(long)]
    theme: Option<Theme>,
    #[arg(long)]
    compact: Option<Switch>,
    #[arg(long)]
    notifications: Option<Switch>,
    #[arg(long)]
    analytics: Option<Switch>,
  },
  /// Restore the default combined preferences
  Reset,
}

#[derive(Subcommand, Debug)]
pub enum ThemeAction {
  Set { theme: Theme },
  Toggle,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
  List,
  Remove { id: i64 },
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum StorageCommand {
  /// Bytes used per slot
  Info,
  /// Delete all application data
  Wipe {
    /// Clear the whole storage, not only application slots
    #[arg(long)]
    all: bool,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
  On,
  Off,
}

impl Switch {
  fn enabled(self) -> bool {
    self == Switch::On
  }
}

fn parse_parameter(s: &str) -> Result<(String, Value), String> {
  let (name, raw) = s
    .split_once('=')
    .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
  let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
  Ok((name.to_string(), value))
}

/// Storage consumers sharing one backend.
pub struct Services {
  pub config: Config,
  pub store: PersistentStore<dyn StorageBackend>,
  pub cache: ResponseCache<dyn StorageBackend>,
  pub prefs: Preferences<dyn StorageBackend>,
  pub history: RecentAnalyses<dyn StorageBackend>,
}

impl Services {
  /// Compact mode for one request; the saved preference applies only when
  /// no flag is given.
  fn compact_mode(&self, flag: Option<Switch>) -> bool {
    flag
      .map(Switch::enabled)
      .unwrap_or_else(|| self.prefs.compact_mode())
  }

  /// Open the configured backend. A backend that cannot be opened is
  /// replaced by a disabled one, so commands still run on defaults.
  pub fn open(config: Config) -> Self {
    let backend = open_backend(&config);
    let store = PersistentStore::new(backend);

    Self {
      cache: ResponseCache::new(store.clone()).with_default_ttl(config.cache.default_ttl_ms),
      prefs: Preferences::new(store.clone()),
      history: RecentAnalyses::new(store.clone()),
      store,
      config,
    }
  }

  fn client(&self) -> Result<CachedAnalyzerClient<dyn StorageBackend>> {
    let inner = AnalyzerClient::new(&self.config.api)?;
    Ok(CachedAnalyzerClient::new(
      inner,
      self.cache.clone(),
      RecentAnalyses::new(self.store.clone()),
    ))
  }
}

fn open_backend(config: &Config) -> Arc<dyn StorageBackend> {
  match config.storage.backend {
    BackendKind::Memory => Arc::new(MemoryBackend::new()),
    BackendKind::Disabled => Arc::new(UnavailableBackend),
    BackendKind::Sqlite => {
      let opened = match &config.storage.path {
        Some(path) => SqliteBackend::open(path, config.storage.quota_bytes),
        None => SqliteBackend::default_path()
          .and_then(|path| SqliteBackend::open(&path, config.storage.quota_bytes)),
      };
      match opened {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
          warn!(error = %e, "Storage unavailable, continuing without persistence");
          Arc::new(UnavailableBackend)
        }
      }
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", out);
  Ok(())
}

fn report(ok: bool, what: &str) -> Result<()> {
  if ok {
    println!("{}", what);
    Ok(())
  } else {
    Err(eyre!("Could not persist change ({}); see log for details", what))
  }
}

pub async fn run(command: Command, services: &Services) -> Result<()> {
  match command {
    Command::Analyze { text, compact } => {
      let compact_mode = services.compact_mode(compact);
      let result = services.client()?.analyze(&text, compact_mode).await?;
      if result.is_cached() {
        eprintln!("(cached)");
      }
      print_json(&result.data)
    }
    Command::Translate { text, from, to } => {
      let source = from.unwrap_or_else(|| services.prefs.source_language());
      let target = to.unwrap_or_else(|| services.prefs.target_language());
      let result = services
        .client()?
        .translate(&text, &source, &target)
        .await?;
      if result.is_cached() {
        eprintln!("(cached)");
      }
      print_json(&result.data)
    }
    Command::Status => {
      let status = services.client()?.status().await?;
      print_json(&status)
    }
    Command::Cache { command } => run_cache(command, &services.cache),
    Command::Prefs { command } => run_prefs(command, &services.prefs),
    Command::History { command } => run_history(command, &services.history),
    Command::Storage { command } => match command {
      StorageCommand::Info => print_json(&prefs::storage_info(&services.store)),
      StorageCommand::Wipe { all: false } => {
        report(prefs::clear_all_data(&services.store), "application data cleared")
      }
      StorageCommand::Wipe { all: true } => report(services.store.clear(), "storage cleared"),
    },
  }
}

fn run_cache(command: CacheCommand, cache: &ResponseCache<dyn StorageBackend>) -> Result<()> {
  match command {
    CacheCommand::Key { endpoint, params } => {
      let params: Parameters = params.into_iter().collect();
      println!("{}", ResponseCache::<dyn StorageBackend>::generate_key(&endpoint, &params));
      Ok(())
    }
    CacheCommand::Get { key } => match cache.get(&key) {
      Some(data) => print_json(&data),
      None => Err(eyre!("No valid cache entry for key")),
    },
    CacheCommand::Set { key, data, ttl } => {
      let data: Value =
        serde_json::from_str(&data).map_err(|e| eyre!("Data is not valid JSON: {}", e))?;
      report(cache.set(&key, &data, ttl), "stored")
    }
    CacheCommand::Remove { key } => report(cache.remove(&key), "removed"),
    CacheCommand::Clear => report(cache.clear(), "cache cleared"),
    CacheCommand::Clean => {
      println!("{} expired entries removed", cache.clean_expired());
      Ok(())
    }
    CacheCommand::Stats => print_json(&cache.stats()),
  }
}

fn run_prefs(command: PrefsCommand, prefs: &Preferences<dyn StorageBackend>) -> Result<()> {
  match command {
    PrefsCommand::Show => print_json(&serde_json::json!({
      "theme": prefs.theme(),
      "compactMode": prefs.compact_mode(),
      "language": prefs.languages(),
      "preferences": prefs.user_preferences(),
    })),
    PrefsCommand::Theme { action: None } => print_json(&prefs.theme()),
    PrefsCommand::Theme {
      action: Some(ThemeAction::Set { theme }),
    } => report(prefs.set_theme(theme), "theme updated"),
    PrefsCommand::Theme {
      action: Some(ThemeAction::Toggle),
    } => print_json(&prefs.toggle_theme()),
    PrefsCommand::Compact { state: None } => print_json(&prefs.compact_mode()),
    PrefsCommand::Compact { state: Some(state) } => {
      report(prefs.set_compact_mode(state.enabled()), "compact mode updated")
    }
    PrefsCommand::Language { from: None, to: None } => print_json(&prefs.languages()),
    PrefsCommand::Language { from, to } => {
      let current = prefs.languages();
      let source = from.unwrap_or(current.source);
      let target = to.unwrap_or(current.target);
      report(prefs.set_languages(&source, &target), "languages updated")
    }
    PrefsCommand::Update {
      theme,
      compact,
      notifications,
      analytics,
    } => {
      let patch = PreferencesPatch {
        theme,
        compact_mode: compact.map(Switch::enabled),
        language: None,
        notifications: notifications.map(Switch::enabled),
        analytics: analytics.map(Switch::enabled),
      };
      report(prefs.update_user_preferences(patch), "preferences updated")
    }
    PrefsCommand::Reset => report(prefs.reset_user_preferences(), "preferences reset"),
  }
}

fn run_history(command: HistoryCommand, history: &RecentAnalyses<dyn StorageBackend>) -> Result<()> {
  match command {
    HistoryCommand::List => print_json(&history.list()),
    HistoryCommand::Remove { id } => report(history.remove(id), "removed"),
    HistoryCommand::Clear => report(history.clear(), "history cleared"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn memory_services() -> Services {
    let mut config = Config::default();
    config.storage.backend = BackendKind::Memory;
    Services::open(config)
  }

  #[test]
  fn test_parse_parameter_json_and_text() {
    assert_eq!(
      parse_parameter("compact_mode=false").unwrap(),
      ("compact_mode".to_string(), json!(false))
    );
    assert_eq!(
      parse_parameter("text=Hello world").unwrap(),
      ("text".to_string(), json!("Hello world"))
    );
    assert_eq!(
      parse_parameter("source_lang=null").unwrap(),
      ("source_lang".to_string(), Value::Null)
    );
    assert!(parse_parameter("novalue").is_err());
  }

  #[test]
  fn test_services_share_one_backend() {
    let services = memory_services();
    services.cache.set("k", &json!(1), None);
    services.prefs.set_theme(Theme::Dark);

    let info = prefs::storage_info(&services.store);
    assert!(info.details.contains_key("cache"));
    assert!(info.details.contains_key("theme"));
  }

  #[test]
  fn test_configured_ttl_reaches_cache() {
    let mut config = Config::default();
    config.storage.backend = BackendKind::Memory;
    config.cache.default_ttl_ms = 0;
    let services = Services::open(config);

    services.cache.set("k", &json!(1), None);
    let raw = services
      .store
      .get("cm-analyzer-cache", Value::Null);
    assert_eq!(raw["k"]["ttl"], 0);
  }

  #[test]
  fn test_disabled_backend_commands_report_failure() {
    let mut config = Config::default();
    config.storage.backend = BackendKind::Disabled;
    let services = Services::open(config);

    assert!(run_cache(CacheCommand::Clear, &services.cache).is_err());
    assert!(run_cache(CacheCommand::Stats, &services.cache).is_ok());
  }

  #[test]
  fn test_unopenable_sqlite_falls_back() {
    let mut config = Config::default();
    // A path under a regular file cannot be created
    let file = std::env::temp_dir().join(format!("cm-analyzer-blocker-{}", std::process::id()));
    std::fs::write(&file, b"x").unwrap();
    config.storage.path = Some(file.join("storage.db"));

    let services = Services::open(config);
    assert!(!services.store.is_available());
    assert!(!services.cache.set("k", &json!(1), None));

    let _ = std::fs::remove_file(&file);
  }

  #[test]
  fn test_analyze_compact_flag_parses() {
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
      #[command(subcommand)]
      command: Command,
    }

    let cli = Cli::try_parse_from(["cm-analyzer", "analyze", "Hello", "--compact", "off"]).unwrap();
    let Command::Analyze { compact, .. } = cli.command else {
      panic!("expected analyze");
    };
    assert_eq!(compact, Some(Switch::Off));

    let cli = Cli::try_parse_from(["cm-analyzer", "analyze", "Hello"]).unwrap();
    let Command::Analyze { compact, .. } = cli.command else {
      panic!("expected analyze");
    };
    assert_eq!(compact, None);
  }

  #[test]
  fn test_compact_preference_can_be_overridden() {
    let services = memory_services();
    services.prefs.set_compact_mode(true);

    assert!(services.compact_mode(None));
    assert!(!services.compact_mode(Some(Switch::Off)));
    assert!(services.compact_mode(Some(Switch::On)));
  }
}
