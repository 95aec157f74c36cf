// ============================================
// src/app.rs
// 入力 (キー・マウス) とゲーム状態の橋渡し
// ============================================

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use rand::rngs::StdRng;
use tracing::info;

use crate::config::Rules;
use crate::game::{ClickOutcome, MatchGame, Side, SlotRef};
use crate::ui::BoardLayout;
use crate::words::CatalogProvider;

/// イベント待ちの最長時間
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// アプリ全体の状態を管理する
pub struct AppState {
    provider: Box<dyn CatalogProvider>,
    /// 選択中のカタログ番号
    catalog_index: usize,
    game: MatchGame,
    /// キーボード操作用のカーソル
    cursor: SlotRef,
    should_quit: bool,
}

impl AppState {
    /// `start_catalog` のキーでゲームを開始する
    pub fn new(
        provider: Box<dyn CatalogProvider>,
        start_catalog: &str,
        rules: Rules,
        rng: StdRng,
        now: Instant,
    ) -> Result<Self> {
        let catalog_index = provider.position(start_catalog).ok_or_else(|| {
            let keys: Vec<_> = provider.catalogs().iter().map(|c| c.key.as_str()).collect();
            anyhow!(
                "unknown catalog `{start_catalog}` (available: {})",
                keys.join(", ")
            )
        })?;
        let catalog = provider.catalogs()[catalog_index].clone();
        let game = MatchGame::new(catalog, rules, rng, now)?;

        Ok(Self {
            provider,
            catalog_index,
            game,
            cursor: SlotRef::new(Side::Source, 0),
            should_quit: false,
        })
    }

    pub fn game(&self) -> &MatchGame {
        &self.game
    }

    pub fn provider(&self) -> &dyn CatalogProvider {
        self.provider.as_ref()
    }

    pub fn catalog_index(&self) -> usize {
        self.catalog_index
    }

    pub fn cursor(&self) -> SlotRef {
        self.cursor
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn tick(&mut self, now: Instant) {
        self.game.tick(now);
    }

    /// 次のタイマー期限か 50ms の短い方
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        self.game
            .next_deadline()
            .map(|due| due.saturating_duration_since(now).min(POLL_INTERVAL))
            .unwrap_or(POLL_INTERVAL)
    }

    /// MARK:難易度 (カタログ) を切り替える
    pub fn select_catalog(&mut self, index: usize, now: Instant) {
        let Some(catalog) = self.provider.catalogs().get(index) else {
            return;
        };
        info!(from = self.catalog_index, to = index, key = %catalog.key, "catalog selected");
        self.catalog_index = index;
        self.game.switch_catalog(catalog.clone(), now);
        self.cursor = SlotRef::new(Side::Source, 0);
    }

    pub fn click(&mut self, slot: SlotRef, now: Instant) -> ClickOutcome {
        self.cursor = slot;
        self.game.click(slot.side, slot.index, now)
    }

    /// キー入力の処理
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let rows = self.game.slot_count();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.cursor.index = (self.cursor.index + rows - 1) % rows,
            KeyCode::Down => self.cursor.index = (self.cursor.index + 1) % rows,
            KeyCode::Left | KeyCode::Right => self.cursor.side = self.cursor.side.opposite(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.click(self.cursor, now);
            }
            KeyCode::Tab => {
                let next = (self.catalog_index + 1) % self.provider.catalogs().len();
                self.select_catalog(next, now);
            }
            KeyCode::Char('r') => {
                self.game.restart(now);
                self.cursor = SlotRef::new(Side::Source, 0);
            }
            KeyCode::Char(c) => {
                // 1..9 でカタログを直接選ぶ
                if let Some(n) = c.to_digit(10).filter(|&n| n >= 1) {
                    self.select_catalog(n as usize - 1, now);
                }
            }
            _ => {}
        }
    }

    /// マウスの左クリックをマスか難易度ボタンに振り分ける
    pub fn handle_mouse(&mut self, mouse: MouseEvent, layout: &BoardLayout, now: Instant) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        if let Some(index) = layout.catalog_at(mouse.column, mouse.row) {
            if index != self.catalog_index {
                self.select_catalog(index, now);
            }
            return;
        }
        if let Some(slot) = layout.slot_at(mouse.column, mouse.row) {
            self.click(slot, now);
        }
    }
}
