// ============================================
// src/config.rs
// ゲーム設定の構造と読み込みロジック
// ============================================

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const SETTINGS_FILE: &str = "settings.json";

/// マッチ後に盤面を補充するやり方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefillPolicy {
    /// 表示中の単語数が `threshold` を下回ったら `batch` ペアまとめて補充
    LowWater { threshold: usize, batch: usize },
    /// 表示中の単語数が `floor` を下回っている間、1 ペアずつ補充
    SlidingWindow { floor: usize },
}

impl RefillPolicy {
    pub fn low_water() -> Self {
        RefillPolicy::LowWater {
            threshold: 6,
            batch: 2,
        }
    }

    pub fn sliding_window() -> Self {
        RefillPolicy::SlidingWindow { floor: 10 }
    }
}

impl Default for RefillPolicy {
    fn default() -> Self {
        Self::low_water()
    }
}

/// 盤面のルール (スロット数・補充方式・演出時間)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// 片側あたりのスロット数
    pub slot_count: usize,
    pub refill: RefillPolicy,
    /// false ならカタログの並び順のまま出題する
    pub shuffle_deck: bool,
    pub correct_delay_ms: u64,
    pub incorrect_delay_ms: u64,
    /// 難易度切り替え後、盤面を埋めるまでの待ち時間
    pub reset_delay_ms: u64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            slot_count: 5,
            refill: RefillPolicy::default(),
            shuffle_deck: true,
            correct_delay_ms: 500,
            incorrect_delay_ms: 1000,
            reset_delay_ms: 100,
        }
    }
}

impl Rules {
    pub fn correct_delay(&self) -> Duration {
        Duration::from_millis(self.correct_delay_ms)
    }

    pub fn incorrect_delay(&self) -> Duration {
        Duration::from_millis(self.incorrect_delay_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.slot_count > 0, "slot_count must be at least 1");
        match self.refill {
            RefillPolicy::LowWater { threshold, batch } => {
                ensure!(threshold > 0, "low_water threshold must be at least 1");
                ensure!(batch > 0, "low_water batch must be at least 1");
            }
            RefillPolicy::SlidingWindow { floor } => {
                ensure!(floor > 0, "sliding_window floor must be at least 1");
            }
        }
        Ok(())
    }
}

/// 設定ファイル全体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 起動時に選ぶカタログのキー
    pub start_catalog: String,
    pub rules: Rules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_catalog: "easy".to_string(),
            rules: Rules::default(),
        }
    }
}

impl Settings {
    // MARK:設定ファイルのパスを取得する関数
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("jp", "Fukumoto0141", "WORD_WIZ")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// MARK:設定を読み込む
    ///
    /// `explicit` が渡された場合は読めなければエラー。
    /// 既定の場所のファイルが壊れているときは警告を出してデフォルトに戻す。
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let settings = Self::read(path)?;
            settings.validate()?;
            return Ok(settings);
        }

        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        match Self::read(&path).and_then(|s| s.validate().map(|_| s)) {
            Ok(settings) => {
                info!(path = %path.display(), "settings loaded");
                Ok(settings)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring broken settings file");
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open settings {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse settings {}", path.display()))
    }

    /// 現在の設定を JSON で書き出す (`--write-config` 用)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.rules.validate()
    }
}
