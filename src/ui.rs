// ============================================
// src/ui.rs
// UI描画とクリック位置の判定
// ============================================

use std::time::Instant;

use ratatui::{
    layout::Position,
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::AppState;
use crate::game::{Side, SlotRef, VisualState};

/// 1 マスの高さ (枠線込み)
const CELL_HEIGHT: u16 = 3;

fn frame_block() -> Block<'static> {
    Block::default().borders(Borders::ALL).title(" WORD WiZ ! ")
}

/// 画面上の各部品の位置
///
/// 描画とマウスのヒット判定で同じ計算を使う。
#[derive(Debug, Clone)]
pub struct BoardLayout {
    catalogs: Vec<Rect>,
    source: Vec<Rect>,
    target: Vec<Rect>,
    status: Rect,
}

impl BoardLayout {
    pub fn compute(area: Rect, catalog_count: usize, slot_count: usize) -> Self {
        let inner = frame_block().inner(area);
        let chunks = Layout::vertical([
            Constraint::Length(1), // [0] 難易度の選択
            Constraint::Length(1), // [1] 空白
            Constraint::Min(1),    // [2] 盤面
            Constraint::Length(2), // [3] ステータス
        ])
        .split(inner);

        let catalogs = if catalog_count == 0 {
            Vec::new()
        } else {
            Layout::horizontal(vec![Constraint::Ratio(1, catalog_count as u32); catalog_count])
                .split(chunks[0])
                .to_vec()
        };

        let halves = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .spacing(2)
            .split(chunks[2]);
        let rows = |column: Rect| -> Vec<Rect> {
            let mut constraints = vec![Constraint::Length(CELL_HEIGHT); slot_count];
            constraints.push(Constraint::Min(0));
            let mut cells = Layout::vertical(constraints).split(column).to_vec();
            cells.truncate(slot_count);
            cells
        };

        Self {
            catalogs,
            source: rows(halves[0]),
            target: rows(halves[1]),
            status: chunks[3],
        }
    }

    pub fn slot_rect(&self, slot: SlotRef) -> Option<Rect> {
        let column = match slot.side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        };
        column.get(slot.index).copied()
    }

    pub fn catalog_rect(&self, index: usize) -> Option<Rect> {
        self.catalogs.get(index).copied()
    }

    pub fn slot_at(&self, x: u16, y: u16) -> Option<SlotRef> {
        let pos = Position::new(x, y);
        [(Side::Source, &self.source), (Side::Target, &self.target)]
            .into_iter()
            .find_map(|(side, cells)| {
                cells
                    .iter()
                    .position(|r| r.height > 0 && r.contains(pos))
                    .map(|index| SlotRef::new(side, index))
            })
    }

    pub fn catalog_at(&self, x: u16, y: u16) -> Option<usize> {
        let pos = Position::new(x, y);
        self.catalogs.iter().position(|r| r.contains(pos))
    }
}

/// 見た目ごとの配色
fn cell_style(state: VisualState) -> Style {
    match state {
        VisualState::Empty => Style::default(),
        VisualState::Normal => Style::default().fg(Color::White).bg(Color::DarkGray),
        VisualState::Selected => Style::default().fg(Color::White).bg(Color::Blue),
        VisualState::Correct => Style::default().fg(Color::White).bg(Color::Green),
        VisualState::Incorrect => Style::default().fg(Color::White).bg(Color::Red),
    }
}

pub fn draw(f: &mut Frame, app: &AppState, now: Instant) {
    let area = f.area();
    let game = app.game();
    let catalogs = app.provider().catalogs();
    let layout = BoardLayout::compute(area, catalogs.len(), game.slot_count());

    // 枠線を描画
    f.render_widget(frame_block(), area);

    // 0. 難易度ボタン (⭐ の数が難易度)
    for (i, catalog) in catalogs.iter().enumerate() {
        let Some(rect) = layout.catalog_rect(i) else {
            continue;
        };
        let text = format!("{} {}", "⭐".repeat(catalog.stars as usize), catalog.label);
        let style = if i == app.catalog_index() {
            Style::default().fg(Color::White).bg(Color::Blue).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        f.render_widget(Paragraph::new(text).style(style).centered(), rect);
    }

    // 1. 盤面
    for side in [Side::Source, Side::Target] {
        for index in 0..game.slot_count() {
            let slot = SlotRef::new(side, index);
            let Some(rect) = layout.slot_rect(slot) else {
                continue;
            };
            let view = game.slot_view(side, index);
            let is_cursor = app.cursor() == slot;

            let border = if is_cursor {
                Style::default().fg(Color::Yellow).bold()
            } else if view.state == VisualState::Empty {
                Style::default().fg(Color::Black)
            } else {
                Style::default().fg(Color::Gray)
            };
            let cell = Paragraph::new(view.text.unwrap_or(""))
                .style(cell_style(view.state))
                .block(Block::default().borders(Borders::ALL).border_style(border));
            f.render_widget(cell, rect);
        }
    }

    // 2. ステータス
    let stats = format!(
        "Score: {} / Miss: {} / Time: {}s",
        game.score(),
        game.misses(),
        game.elapsed(now).as_secs()
    );
    let help = if game.is_complete() {
        Line::from(vec![
            Span::styled("All pairs matched! ", Style::default().fg(Color::Green).bold()),
            Span::styled("r: restart / Tab: difficulty / q: quit", Style::default().fg(Color::Gray)),
        ])
    } else {
        Line::from(Span::styled(
            format!(
                "Left: {} / ←↑↓→ move / Enter select / Tab difficulty / r restart / q quit",
                game.remaining()
            ),
            Style::default().fg(Color::DarkGray),
        ))
    };
    f.render_widget(
        Paragraph::new(vec![
            Line::from(stats).style(Style::default().fg(Color::Yellow)),
            help,
        ])
        .centered(),
        layout.status,
    );
}
