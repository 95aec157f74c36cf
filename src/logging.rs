// ============================================
// src/logging.rs
// ログ出力 (画面は TUI が使うのでファイルに書く)
// ============================================

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "wordwiz.log";

/// 既定のログファイルの場所
pub fn default_log_path() -> PathBuf {
    ProjectDirs::from("jp", "Fukumoto0141", "WORD_WIZ")
        .map(|dirs| dirs.data_dir().join(LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE))
}

/// MARK:ログの初期化
///
/// `RUST_LOG` が設定されていればそちらを優先する。
pub fn init(level: &str, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log filter `{level}`"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
