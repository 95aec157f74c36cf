/*
 * src/words.rs
 * 単語カタログ (お題データ) を管理するモジュール
 */

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// カタログ内で単語ペアを識別する ID
pub type PairId = u32;

/// 翻訳ペア (左: 原語, 右: 訳語)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub id: PairId,
    pub source: String,
    pub target: String,
}

impl WordPair {
    pub fn new(id: PairId, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            target: target.into(),
        }
    }
}

/// 難易度ごとの単語リスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub key: String,
    pub label: String,
    /// 難易度 (1 = やさしい)
    pub stars: u8,
    pairs: Vec<WordPair>,
}

impl Catalog {
    /// ID の重複や空文字を検査してからカタログを作る
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        stars: u8,
        pairs: Vec<WordPair>,
    ) -> Result<Self> {
        let key = key.into();
        ensure!(!key.trim().is_empty(), "catalog key must not be empty");
        ensure!(!pairs.is_empty(), "catalog `{key}` has no word pairs");

        let mut seen = HashSet::new();
        for pair in &pairs {
            ensure!(
                seen.insert(pair.id),
                "catalog `{key}` uses pair id {} more than once",
                pair.id
            );
            ensure!(
                !pair.source.trim().is_empty() && !pair.target.trim().is_empty(),
                "catalog `{key}`: pair {} has an empty word",
                pair.id
            );
        }

        Ok(Self {
            key,
            label: label.into(),
            stars,
            pairs,
        })
    }

    pub fn pairs(&self) -> &[WordPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// 選択可能なカタログの供給元
///
/// ゲーム本体はこのトレイト越しにしかカタログを見ないので、
/// 新しい単語セットを足してもゲームロジックは変わらない。
pub trait CatalogProvider {
    fn catalogs(&self) -> &[Catalog];

    fn position(&self, key: &str) -> Option<usize> {
        self.catalogs().iter().position(|c| c.key == key)
    }
}

// --------------------------------------------------
// 組み込みカタログ
// --------------------------------------------------

#[derive(Copy, Clone)]
struct Entry {
    id: PairId,
    pl: &'static str,
    en: &'static str,
}

const EASY_WORDS: &[Entry] = &[
    Entry { id: 1, pl: "pies", en: "dog" },
    Entry { id: 2, pl: "kot", en: "cat" },
    Entry { id: 3, pl: "dom", en: "house" },
    Entry { id: 4, pl: "woda", en: "water" },
    Entry { id: 5, pl: "chleb", en: "bread" },
    Entry { id: 6, pl: "oko", en: "eye" },
    Entry { id: 7, pl: "ucho", en: "ear" },
    Entry { id: 8, pl: "noga", en: "leg" },
    Entry { id: 9, pl: "dziecko", en: "child" },
    Entry { id: 10, pl: "matka", en: "mother" },
];

const MEDIUM_WORDS: &[Entry] = &[
    Entry { id: 11, pl: "rower", en: "bike" },
    Entry { id: 12, pl: "krzesło", en: "chair" },
    Entry { id: 13, pl: "drzewo", en: "tree" },
    Entry { id: 14, pl: "morze", en: "sea" },
    Entry { id: 15, pl: "samochód", en: "car" },
    Entry { id: 16, pl: "zegarek", en: "watch" },
    Entry { id: 17, pl: "komputer", en: "computer" },
    Entry { id: 18, pl: "szkoła", en: "school" },
    Entry { id: 19, pl: "apteka", en: "pharmacy" },
    Entry { id: 20, pl: "ogród", en: "garden" },
];

const HARD_WORDS: &[Entry] = &[
    Entry { id: 21, pl: "przyzwoitość", en: "decency" },
    Entry { id: 22, pl: "samozaparcie", en: "willpower" },
    Entry { id: 23, pl: "odpowiedzialność", en: "responsibility" },
    Entry { id: 24, pl: "wytrzymałość", en: "endurance" },
    Entry { id: 25, pl: "nienawiść", en: "hatred" },
    Entry { id: 26, pl: "zmartwienie", en: "worry" },
    Entry { id: 27, pl: "przeznaczenie", en: "destiny" },
    Entry { id: 28, pl: "szczerość", en: "honesty" },
    Entry { id: 29, pl: "ciekawość", en: "curiosity" },
    Entry { id: 30, pl: "niedoskonałość", en: "imperfection" },
];

/// ポーランド語 → 英語の組み込みカタログ (easy / medium / hard)
pub struct BuiltinCatalogs {
    catalogs: Vec<Catalog>,
}

impl BuiltinCatalogs {
    pub fn new() -> Self {
        let table = [
            ("easy", "Easy", 1, EASY_WORDS),
            ("medium", "Medium", 2, MEDIUM_WORDS),
            ("hard", "Hard", 3, HARD_WORDS),
        ];
        let catalogs = table
            .into_iter()
            .map(|(key, label, stars, entries)| Catalog {
                key: key.to_string(),
                label: label.to_string(),
                stars,
                pairs: entries
                    .iter()
                    .map(|e| WordPair::new(e.id, e.pl, e.en))
                    .collect(),
            })
            .collect();
        Self { catalogs }
    }
}

impl Default for BuiltinCatalogs {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogProvider for BuiltinCatalogs {
    fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }
}

// --------------------------------------------------
// JSON ファイルから読むカタログ
// --------------------------------------------------

#[derive(Deserialize)]
struct CatalogFile {
    catalogs: Vec<CatalogRecord>,
}

#[derive(Deserialize)]
struct CatalogRecord {
    key: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default = "default_stars")]
    stars: u8,
    pairs: Vec<PairRecord>,
}

#[derive(Deserialize)]
struct PairRecord {
    #[serde(default)]
    id: Option<PairId>,
    source: String,
    target: String,
}

fn default_stars() -> u8 {
    1
}

/// `--words` で渡されたユーザー定義カタログ
pub struct FileCatalogs {
    catalogs: Vec<Catalog>,
}

impl FileCatalogs {
    /// MARK:JSON ファイルからカタログを読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open word file {}", path.display()))?;
        let parsed: CatalogFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse word file {}", path.display()))?;
        Self::from_file(parsed).with_context(|| format!("invalid word file {}", path.display()))
    }

    /// JSON 文字列から読み込む (テスト用にも使う)
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: CatalogFile = serde_json::from_str(json).context("failed to parse word list")?;
        Self::from_file(parsed)
    }

    fn from_file(file: CatalogFile) -> Result<Self> {
        if file.catalogs.is_empty() {
            bail!("word file contains no catalogs");
        }

        let mut keys = HashSet::new();
        let mut catalogs = Vec::with_capacity(file.catalogs.len());
        for record in file.catalogs {
            ensure!(
                keys.insert(record.key.clone()),
                "catalog key `{}` appears more than once",
                record.key
            );
            // id 省略時は 1 始まりの並び順
            let pairs = record
                .pairs
                .into_iter()
                .enumerate()
                .map(|(i, p)| WordPair::new(p.id.unwrap_or(i as PairId + 1), p.source, p.target))
                .collect();
            let label = record.label.unwrap_or_else(|| record.key.clone());
            catalogs.push(Catalog::new(record.key, label, record.stars, pairs)?);
        }
        Ok(Self { catalogs })
    }
}

impl CatalogProvider for FileCatalogs {
    fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }
}
