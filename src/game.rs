// ============================================
// src/game.rs
// 単語マッチングの盤面と状態遷移
// ============================================

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::{RefillPolicy, Rules};
use crate::schedule::Scheduler;
use crate::words::{Catalog, PairId, WordPair};

// --------------------------------------------------
// データ構造
// --------------------------------------------------

/// 左 (原語) か右 (訳語) か
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }

    fn column(self) -> usize {
        match self {
            Side::Source => 0,
            Side::Target => 1,
        }
    }
}

/// 盤面の 1 マス
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Empty,
    Occupied { pair: PairId, text: String },
}

impl Slot {
    pub fn pair(&self) -> Option<PairId> {
        match self {
            Slot::Empty => None,
            Slot::Occupied { pair, .. } => Some(*pair),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Slot::Empty => None,
            Slot::Occupied { text, .. } => Some(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub side: Side,
    pub index: usize,
}

impl SlotRef {
    pub fn new(side: Side, index: usize) -> Self {
        Self { side, index }
    }
}

/// 現在選択中のマス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub slot: SlotRef,
    pub pair: PairId,
}

/// 一時的なハイライト (一定時間で自動的に消える)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transient {
    Correct,
    Incorrect,
}

/// 描画側に渡すマスの見た目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Empty,
    Normal,
    Selected,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView<'a> {
    pub text: Option<&'a str>,
    pub state: VisualState,
}

/// `click` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// 空きマス、ハイライト中のマス、正解演出中などで無視した
    Ignored,
    Selected,
    Deselected,
    /// 同じ側の別のマスに選択を移した
    Reselected,
    Matched(PairId),
    Mismatched,
}

/// タイマーで遅延実行する処理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    ClearIncorrect(SlotRef, SlotRef),
    ClearMatched { source: usize, target: usize, pair: PairId },
    Populate,
}

/// 片側の列
#[derive(Debug, Clone)]
struct Column {
    slots: Vec<Slot>,
    marks: Vec<Option<Transient>>,
}

impl Column {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; len],
            marks: vec![None; len],
        }
    }

    fn clear(&mut self) {
        self.slots.fill(Slot::Empty);
        self.marks.fill(None);
    }

    fn empty_positions(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }
}

// --------------------------------------------------
// ゲーム本体
// --------------------------------------------------

/// 1 セッション分のゲーム状態
///
/// 時刻はすべて引数の `now` で受け取るので、テストでは時間を自由に進められる。
pub struct MatchGame {
    rules: Rules,
    catalog: Catalog,
    /// 出題順 (catalog.pairs のインデックス)
    deck: Vec<usize>,
    cursor: usize,
    columns: [Column; 2],
    used: HashSet<PairId>,
    selection: Option<Selection>,
    /// 正解演出中のペア。これがある間は盤面全体を凍結する
    matching: Option<(usize, usize)>,
    populating: bool,
    score: u32,
    misses: u32,
    started_at: Instant,
    timers: Scheduler<Pending>,
    rng: StdRng,
}

impl MatchGame {
    /// 盤面を作り、最初のペアをすぐに並べる
    ///
    /// 補充できなくなるルール (スロット 0 や batch 0 など) はここで弾く。
    pub fn new(catalog: Catalog, rules: Rules, rng: StdRng, now: Instant) -> Result<Self> {
        rules.validate()?;
        let n = rules.slot_count;
        let mut game = Self {
            rules,
            catalog,
            deck: Vec::new(),
            cursor: 0,
            columns: [Column::new(n), Column::new(n)],
            used: HashSet::new(),
            selection: None,
            matching: None,
            populating: false,
            score: 0,
            misses: 0,
            started_at: now,
            timers: Scheduler::new(),
            rng,
        };
        game.reset_deck();
        let placed = game.fill(n);
        info!(catalog = %game.catalog.key, placed, "board initialized");
        Ok(game)
    }

    /// MARK:カタログ (難易度) を切り替える
    ///
    /// 盤面をすべて空にし、`reset_delay` 後に新しいペアを並べる。
    /// それまでに予約されていたタイマーは無効になる。
    pub fn switch_catalog(&mut self, catalog: Catalog, now: Instant) {
        self.timers.cancel_all();
        for column in &mut self.columns {
            column.clear();
        }
        self.used.clear();
        self.selection = None;
        self.matching = None;
        self.score = 0;
        self.misses = 0;
        self.started_at = now;

        self.catalog = catalog;
        self.reset_deck();
        self.populating = true;
        self.timers
            .schedule(now + self.rules.reset_delay(), Pending::Populate);
        info!(catalog = %self.catalog.key, epoch = self.timers.epoch(), "board reset");
    }

    /// 同じカタログで最初からやり直す
    pub fn restart(&mut self, now: Instant) {
        let catalog = self.catalog.clone();
        self.switch_catalog(catalog, now);
    }

    fn reset_deck(&mut self) {
        self.deck = (0..self.catalog.len()).collect();
        if self.rules.shuffle_deck {
            self.deck.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }

    /// MARK:マスのクリック処理
    pub fn click(&mut self, side: Side, index: usize, now: Instant) -> ClickOutcome {
        // 正解演出中は盤面全体を受け付けない
        if self.matching.is_some() {
            return ClickOutcome::Ignored;
        }
        let Some(pair) = self.slot(side, index).and_then(Slot::pair) else {
            return ClickOutcome::Ignored;
        };
        if self.mark(SlotRef::new(side, index)).is_some() {
            return ClickOutcome::Ignored;
        }

        let clicked = SlotRef::new(side, index);
        let Some(selected) = self.selection else {
            self.selection = Some(Selection { slot: clicked, pair });
            return ClickOutcome::Selected;
        };

        if selected.slot == clicked {
            self.selection = None;
            return ClickOutcome::Deselected;
        }
        if selected.slot.side == side {
            self.selection = Some(Selection { slot: clicked, pair });
            return ClickOutcome::Reselected;
        }

        self.selection = None;
        let (source, target) = match side {
            Side::Source => (index, selected.slot.index),
            Side::Target => (selected.slot.index, index),
        };

        if selected.pair == pair {
            self.set_mark(SlotRef::new(Side::Source, source), Some(Transient::Correct));
            self.set_mark(SlotRef::new(Side::Target, target), Some(Transient::Correct));
            self.matching = Some((source, target));
            self.score += 1;
            self.timers.schedule(
                now + self.rules.correct_delay(),
                Pending::ClearMatched {
                    source,
                    target,
                    pair,
                },
            );
            debug!(pair, source, target, score = self.score, "matched");
            ClickOutcome::Matched(pair)
        } else {
            self.set_mark(selected.slot, Some(Transient::Incorrect));
            self.set_mark(clicked, Some(Transient::Incorrect));
            self.misses += 1;
            self.timers.schedule(
                now + self.rules.incorrect_delay(),
                Pending::ClearIncorrect(selected.slot, clicked),
            );
            debug!(
                expected = selected.pair,
                got = pair,
                misses = self.misses,
                "mismatched"
            );
            ClickOutcome::Mismatched
        }
    }

    /// 期限の来たタイマーを処理する
    pub fn tick(&mut self, now: Instant) {
        for action in self.timers.take_due(now) {
            match action {
                Pending::ClearIncorrect(a, b) => {
                    for slot in [a, b] {
                        if self.mark(slot) == Some(Transient::Incorrect) {
                            self.set_mark(slot, None);
                        }
                    }
                }
                Pending::ClearMatched {
                    source,
                    target,
                    pair,
                } => self.clear_matched(source, target, pair),
                Pending::Populate => {
                    self.populating = false;
                    let placed = self.fill(self.rules.slot_count);
                    debug!(placed, "board populated");
                }
            }
        }
    }

    fn clear_matched(&mut self, source: usize, target: usize, pair: PairId) {
        debug_assert_eq!(self.columns[0].slots[source].pair(), Some(pair));
        debug_assert_eq!(self.columns[1].slots[target].pair(), Some(pair));

        for (side, index) in [(Side::Source, source), (Side::Target, target)] {
            let column = &mut self.columns[side.column()];
            column.slots[index] = Slot::Empty;
            column.marks[index] = None;
        }
        self.matching = None;
        self.replenish();
    }

    // --------------------------------------------------
    // 補充
    // --------------------------------------------------

    fn replenish(&mut self) {
        let visible = self.occupied_count();
        match self.rules.refill {
            RefillPolicy::LowWater { threshold, batch } => {
                if visible < threshold {
                    let placed = self.fill(batch);
                    debug!(visible, placed, "low-water refill");
                }
            }
            RefillPolicy::SlidingWindow { floor } => {
                if visible < floor && !self.is_exhausted() {
                    let placed = self.place_one();
                    debug!(visible, placed, "sliding-window refill");
                }
            }
        }
    }

    /// 空きマスを左右それぞれランダムに選び、最大 `n` ペア並べる
    fn fill(&mut self, n: usize) -> usize {
        let mut sources = self.columns[0].empty_positions();
        let mut targets = self.columns[1].empty_positions();
        sources.shuffle(&mut self.rng);
        targets.shuffle(&mut self.rng);

        let count = n
            .min(sources.len())
            .min(targets.len())
            .min(self.remaining());
        for (&s, &t) in sources.iter().zip(&targets).take(count) {
            if let Some(pair) = self.draw() {
                self.place(&pair, s, t);
            }
        }
        count
    }

    /// 左右それぞれ最初の空きマスに 1 ペアだけ並べる
    fn place_one(&mut self) -> usize {
        let source = self.columns[0].slots.iter().position(Slot::is_empty);
        let target = self.columns[1].slots.iter().position(Slot::is_empty);
        let (Some(s), Some(t)) = (source, target) else {
            return 0;
        };
        match self.draw() {
            Some(pair) => {
                self.place(&pair, s, t);
                1
            }
            None => 0,
        }
    }

    /// 山札から次のペアを引く。使い切ったら None
    fn draw(&mut self) -> Option<WordPair> {
        let &idx = self.deck.get(self.cursor)?;
        self.cursor += 1;
        let pair = self.catalog.pairs()[idx].clone();
        let fresh = self.used.insert(pair.id);
        debug_assert!(fresh, "pair {} drawn twice", pair.id);
        Some(pair)
    }

    fn place(&mut self, pair: &WordPair, source: usize, target: usize) {
        let [left, right] = &mut self.columns;
        debug_assert!(left.slots[source].is_empty() && right.slots[target].is_empty());
        left.slots[source] = Slot::Occupied {
            pair: pair.id,
            text: pair.source.clone(),
        };
        right.slots[target] = Slot::Occupied {
            pair: pair.id,
            text: pair.target.clone(),
        };
    }

    // --------------------------------------------------
    // 参照用
    // --------------------------------------------------

    fn mark(&self, slot: SlotRef) -> Option<Transient> {
        self.columns[slot.side.column()]
            .marks
            .get(slot.index)
            .copied()
            .flatten()
    }

    fn set_mark(&mut self, slot: SlotRef, mark: Option<Transient>) {
        self.columns[slot.side.column()].marks[slot.index] = mark;
    }

    pub fn slot(&self, side: Side, index: usize) -> Option<&Slot> {
        self.columns[side.column()].slots.get(index)
    }

    pub fn slots(&self, side: Side) -> &[Slot] {
        &self.columns[side.column()].slots
    }

    /// 描画用の投影 (文字列と見た目)
    pub fn slot_view(&self, side: Side, index: usize) -> SlotView<'_> {
        let Some(slot) = self.slot(side, index) else {
            return SlotView {
                text: None,
                state: VisualState::Empty,
            };
        };
        let here = SlotRef::new(side, index);
        let state = match (slot, self.mark(here)) {
            (Slot::Empty, _) => VisualState::Empty,
            (_, Some(Transient::Correct)) => VisualState::Correct,
            (_, Some(Transient::Incorrect)) => VisualState::Incorrect,
            _ if self.selection.is_some_and(|s| s.slot == here) => VisualState::Selected,
            _ => VisualState::Normal,
        };
        SlotView {
            text: slot.text(),
            state,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.rules.slot_count
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// 左右合わせて表示中の単語数
    pub fn occupied_count(&self) -> usize {
        self.columns.iter().map(Column::occupied).sum()
    }

    /// 山札の残り枚数
    pub fn remaining(&self) -> usize {
        self.deck.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.deck.len()
    }

    /// これまでに盤面に出したペア
    pub fn used_pairs(&self) -> &HashSet<PairId> {
        &self.used
    }

    /// 正解演出中で盤面が凍結されているか
    pub fn is_frozen(&self) -> bool {
        self.matching.is_some()
    }

    /// 全ペアを出し切って盤面が空になった
    pub fn is_complete(&self) -> bool {
        !self.populating && self.is_exhausted() && self.occupied_count() == 0
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn catalog(words: &[(&str, &str)]) -> Catalog {
        let pairs = words
            .iter()
            .enumerate()
            .map(|(i, (s, t))| WordPair::new(i as PairId + 1, *s, *t))
            .collect();
        Catalog::new("test", "Test", 1, pairs).unwrap()
    }

    fn rules(slot_count: usize, refill: RefillPolicy) -> Rules {
        Rules {
            slot_count,
            refill,
            ..Rules::default()
        }
    }

    fn game(words: &[(&str, &str)], rules: Rules, seed: u64) -> (MatchGame, Instant) {
        let now = Instant::now();
        let game = MatchGame::new(catalog(words), rules, StdRng::seed_from_u64(seed), now).unwrap();
        (game, now)
    }

    fn find(game: &MatchGame, side: Side, text: &str) -> usize {
        game.slots(side)
            .iter()
            .position(|s| s.text() == Some(text))
            .unwrap_or_else(|| panic!("{text} is not on the board"))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    const TWO: &[(&str, &str)] = &[("kot", "cat"), ("pies", "dog")];

    const TEN: &[(&str, &str)] = &[
        ("pies", "dog"),
        ("kot", "cat"),
        ("dom", "house"),
        ("woda", "water"),
        ("chleb", "bread"),
        ("oko", "eye"),
        ("ucho", "ear"),
        ("noga", "leg"),
        ("dziecko", "child"),
        ("matka", "mother"),
    ];

    /// 盤面上の正解ペアを 1 つ消す
    fn match_any(game: &mut MatchGame, now: Instant) -> PairId {
        let (s, pair) = game
            .slots(Side::Source)
            .iter()
            .enumerate()
            .find_map(|(i, slot)| slot.pair().map(|p| (i, p)))
            .expect("board is empty");
        let t = game
            .slots(Side::Target)
            .iter()
            .position(|slot| slot.pair() == Some(pair))
            .unwrap();
        assert_eq!(game.click(Side::Source, s, now), ClickOutcome::Selected);
        assert_eq!(game.click(Side::Target, t, now), ClickOutcome::Matched(pair));
        game.tick(now + ms(500));
        pair
    }

    #[test]
    fn initial_board_shows_every_pair_once() {
        let (game, _) = game(TWO, rules(2, RefillPolicy::default()), 1);
        for side in [Side::Source, Side::Target] {
            let mut pairs: Vec<_> = game.slots(side).iter().filter_map(Slot::pair).collect();
            pairs.sort();
            assert_eq!(pairs, vec![1, 2]);
        }
        assert!(game.is_exhausted());
        assert_eq!(game.used_pairs().len(), 2);
    }

    #[test]
    fn match_clears_both_slots_after_delay() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 7);
        let kot = find(&game, Side::Source, "kot");
        let cat = find(&game, Side::Target, "cat");

        assert_eq!(game.click(Side::Source, kot, t0), ClickOutcome::Selected);
        assert_eq!(game.slot_view(Side::Source, kot).state, VisualState::Selected);
        assert_eq!(game.click(Side::Target, cat, t0), ClickOutcome::Matched(1));
        assert_eq!(game.slot_view(Side::Source, kot).state, VisualState::Correct);
        assert_eq!(game.slot_view(Side::Target, cat).state, VisualState::Correct);
        assert_eq!(game.score(), 1);
        assert_eq!(game.selection(), None);

        game.tick(t0 + ms(499));
        assert_eq!(game.slot(Side::Source, kot).and_then(Slot::pair), Some(1));

        game.tick(t0 + ms(500));
        assert_eq!(game.slot(Side::Source, kot), Some(&Slot::Empty));
        assert_eq!(game.slot(Side::Target, cat), Some(&Slot::Empty));
        assert_eq!(game.slot_view(Side::Target, cat).state, VisualState::Empty);
        assert_eq!(game.score(), 1);
        assert!(!game.is_frozen());
    }

    #[test]
    fn mismatch_recovers_after_delay() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 7);
        let kot = find(&game, Side::Source, "kot");
        let dog = find(&game, Side::Target, "dog");

        game.click(Side::Source, kot, t0);
        assert_eq!(game.click(Side::Target, dog, t0), ClickOutcome::Mismatched);
        assert_eq!(game.slot_view(Side::Source, kot).state, VisualState::Incorrect);
        assert_eq!(game.slot_view(Side::Target, dog).state, VisualState::Incorrect);
        assert_eq!(game.misses(), 1);

        // ハイライト中のマスは押せない
        assert_eq!(game.click(Side::Source, kot, t0 + ms(10)), ClickOutcome::Ignored);

        game.tick(t0 + ms(1000));
        assert_eq!(game.slot_view(Side::Source, kot).state, VisualState::Normal);
        assert_eq!(game.slot_view(Side::Target, dog).state, VisualState::Normal);
        assert_eq!(game.score(), 0);
        assert_eq!(game.occupied_count(), 4);
        assert_eq!(game.click(Side::Source, kot, t0 + ms(1001)), ClickOutcome::Selected);
    }

    #[test]
    fn double_click_deselects() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 3);
        let kot = find(&game, Side::Source, "kot");
        assert_eq!(game.click(Side::Source, kot, t0), ClickOutcome::Selected);
        assert_eq!(game.click(Side::Source, kot, t0), ClickOutcome::Deselected);
        assert_eq!(game.selection(), None);
        assert_eq!(game.slot_view(Side::Source, kot).state, VisualState::Normal);
        assert_eq!(game.next_deadline(), None);
    }

    #[test]
    fn same_side_click_moves_selection() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 3);
        let kot = find(&game, Side::Source, "kot");
        let pies = find(&game, Side::Source, "pies");
        game.click(Side::Source, kot, t0);
        assert_eq!(game.click(Side::Source, pies, t0), ClickOutcome::Reselected);
        assert_eq!(game.selection().map(|s| s.pair), Some(2));
        assert_eq!(game.misses(), 0);

        // 右から選んでも同じ
        let dog = find(&game, Side::Target, "dog");
        assert_eq!(game.click(Side::Target, dog, t0), ClickOutcome::Matched(2));
    }

    #[test]
    fn exhausted_catalog_leaves_slots_empty() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 11);
        match_any(&mut game, t0);
        assert_eq!(game.occupied_count(), 2);
        assert!(!game.is_complete());

        match_any(&mut game, t0 + ms(600));
        assert_eq!(game.occupied_count(), 0);
        assert!(game.is_exhausted());
        assert!(game.is_complete());
        assert_eq!(game.score(), 2);

        assert_eq!(game.click(Side::Source, 0, t0 + ms(2000)), ClickOutcome::Ignored);
    }

    #[test]
    fn low_water_refills_two_pairs() {
        let (mut game, t0) = game(TEN, rules(5, RefillPolicy::low_water()), 5);
        assert_eq!(game.occupied_count(), 10);
        assert_eq!(game.remaining(), 5);

        match_any(&mut game, t0);
        assert_eq!(game.occupied_count(), 8);
        match_any(&mut game, t0 + ms(600));
        assert_eq!(game.occupied_count(), 6);
        assert_eq!(game.remaining(), 5);

        // 6 未満に落ちたところで 2 ペア補充される
        match_any(&mut game, t0 + ms(1200));
        assert_eq!(game.occupied_count(), 8);
        assert_eq!(game.remaining(), 3);
        assert_eq!(game.used_pairs().len(), 7);
    }

    #[test]
    fn sliding_window_draws_one_pair_per_match() {
        let (mut game, t0) = game(TEN, rules(5, RefillPolicy::sliding_window()), 9);
        let first = match_any(&mut game, t0);
        assert_eq!(game.occupied_count(), 10);
        assert_eq!(game.remaining(), 4);
        assert!(!game.slots(Side::Source).iter().any(|s| s.pair() == Some(first)));

        for i in 1..=4 {
            match_any(&mut game, t0 + ms(600 * i));
        }
        assert!(game.is_exhausted());
        assert_eq!(game.occupied_count(), 10);

        // 山札が尽きた後は減っていくだけ
        match_any(&mut game, t0 + ms(4000));
        assert_eq!(game.occupied_count(), 8);
    }

    #[test]
    fn sliding_window_uses_first_empty_slot_on_each_side() {
        let floor = RefillPolicy::SlidingWindow { floor: 6 };
        let (mut game, t0) = game(TEN, rules(5, floor), 4);
        // 10 → 8 → 6 までは補充されない
        match_any(&mut game, t0);
        match_any(&mut game, t0 + ms(600));
        assert_eq!(game.occupied_count(), 6);

        let now = t0 + ms(1200);
        let (s, pair) = game
            .slots(Side::Source)
            .iter()
            .enumerate()
            .find_map(|(i, slot)| slot.pair().map(|p| (i, p)))
            .unwrap();
        let t = game
            .slots(Side::Target)
            .iter()
            .position(|slot| slot.pair() == Some(pair))
            .unwrap();
        game.click(Side::Source, s, now);
        assert_eq!(game.click(Side::Target, t, now), ClickOutcome::Matched(pair));

        // 消えた後の空きマスのうち一番上が補充先になる
        let first_empty = |side: Side, vacated: usize| {
            game.slots(side)
                .iter()
                .enumerate()
                .filter(|(i, slot)| slot.is_empty() || *i == vacated)
                .map(|(i, _)| i)
                .min()
                .unwrap()
        };
        let expected = (first_empty(Side::Source, s), first_empty(Side::Target, t));
        let before = game.used_pairs().clone();

        game.tick(now + ms(500));
        assert_eq!(game.occupied_count(), 6);
        let fresh: Vec<_> = game.used_pairs().difference(&before).copied().collect();
        assert_eq!(fresh.len(), 1);
        let placed = |side: Side| {
            game.slots(side)
                .iter()
                .position(|slot| slot.pair() == Some(fresh[0]))
                .unwrap()
        };
        assert_eq!((placed(Side::Source), placed(Side::Target)), expected);
    }

    #[test]
    fn sides_are_shuffled_independently() {
        let mut differs = 0;
        for seed in 0..20 {
            let (game, _) = game(TEN, rules(5, RefillPolicy::default()), seed);
            let left: Vec<_> = game.slots(Side::Source).iter().filter_map(Slot::pair).collect();
            let right: Vec<_> = game.slots(Side::Target).iter().filter_map(Slot::pair).collect();

            let mut l = left.clone();
            let mut r = right.clone();
            l.sort_unstable();
            r.sort_unstable();
            assert_eq!(l, r, "seed {seed}: sides show different pairs");
            if left != right {
                differs += 1;
            }
        }
        // 左右で同じ並びになるのは偶然だけ
        assert!(differs > 15, "only {differs} of 20 boards had different orders");
    }

    #[test]
    fn rules_that_cannot_refill_are_rejected() {
        let no_batch = RefillPolicy::LowWater {
            threshold: 6,
            batch: 0,
        };
        let now = Instant::now();
        let err = MatchGame::new(
            catalog(TEN),
            rules(1, no_batch),
            StdRng::seed_from_u64(1),
            now,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("batch"));

        for bad in [
            rules(0, RefillPolicy::default()),
            rules(5, RefillPolicy::SlidingWindow { floor: 0 }),
        ] {
            let built = MatchGame::new(catalog(TEN), bad, StdRng::seed_from_u64(1), now);
            assert!(built.is_err());
        }
    }

    #[test]
    fn short_catalog_leaves_extra_slots_empty() {
        let (mut game, t0) = game(TWO, rules(5, RefillPolicy::default()), 2);
        assert_eq!(game.occupied_count(), 4);
        let empty = game
            .slots(Side::Source)
            .iter()
            .position(Slot::is_empty)
            .unwrap();
        assert_eq!(game.click(Side::Source, empty, t0), ClickOutcome::Ignored);
        assert_eq!(game.click(Side::Target, 42, t0), ClickOutcome::Ignored);
        assert_eq!(game.selection(), None);
    }

    #[test]
    fn board_is_frozen_while_match_is_shown() {
        let (mut game, t0) = game(TEN, rules(5, RefillPolicy::default()), 4);
        let pair = game.slots(Side::Source)[0].pair().unwrap();
        let target = game
            .slots(Side::Target)
            .iter()
            .position(|s| s.pair() == Some(pair))
            .unwrap();
        game.click(Side::Source, 0, t0);
        game.click(Side::Target, target, t0);
        assert!(game.is_frozen());

        assert_eq!(game.click(Side::Source, 1, t0 + ms(100)), ClickOutcome::Ignored);
        game.tick(t0 + ms(500));
        assert_eq!(game.click(Side::Source, 1, t0 + ms(501)), ClickOutcome::Selected);
    }

    #[test]
    fn other_slots_stay_live_during_mismatch() {
        let (mut game, t0) = game(TEN, rules(5, RefillPolicy::default()), 8);
        let a = game.slots(Side::Source)[0].pair().unwrap();
        let wrong = game
            .slots(Side::Target)
            .iter()
            .position(|s| s.pair().is_some_and(|p| p != a))
            .unwrap();
        game.click(Side::Source, 0, t0);
        assert_eq!(game.click(Side::Target, wrong, t0), ClickOutcome::Mismatched);

        assert_eq!(game.click(Side::Source, 1, t0 + ms(10)), ClickOutcome::Selected);
    }

    #[test]
    fn switching_catalog_discards_stale_timers() {
        let (mut game, t0) = game(TEN, rules(5, RefillPolicy::default()), 6);
        match_any(&mut game, t0);
        let pair = game.slots(Side::Source).iter().find_map(Slot::pair).unwrap();
        let s = game.slots(Side::Source).iter().position(|x| x.pair() == Some(pair)).unwrap();
        let t = game.slots(Side::Target).iter().position(|x| x.pair() == Some(pair)).unwrap();
        let t1 = t0 + ms(600);
        game.click(Side::Source, s, t1);
        game.click(Side::Target, t, t1);

        game.switch_catalog(catalog(TWO), t1 + ms(10));
        assert_eq!(game.score(), 0);
        assert_eq!(game.misses(), 0);
        assert_eq!(game.occupied_count(), 0);
        assert!(game.used_pairs().is_empty());
        assert!(!game.is_frozen());
        assert!(!game.is_complete());

        // 100ms 後に新しい盤面が並ぶ。古い ClearMatched は実行されない
        game.tick(t1 + ms(110));
        assert_eq!(game.occupied_count(), 4);
        game.tick(t1 + ms(2000));
        assert_eq!(game.occupied_count(), 4);
        assert_eq!(game.score(), 0);
        assert_eq!(game.elapsed(t1 + ms(1010)), ms(1000));
    }

    #[test]
    fn ordered_deck_follows_catalog_order() {
        let rules = Rules {
            shuffle_deck: false,
            ..rules(3, RefillPolicy::default())
        };
        let (game, _) = game(TEN, rules, 1);
        let mut shown: Vec<_> = game.slots(Side::Source).iter().filter_map(Slot::pair).collect();
        shown.sort();
        assert_eq!(shown, vec![1, 2, 3]);
    }

    #[test]
    fn restart_replays_whole_catalog() {
        let (mut game, t0) = game(TWO, rules(2, RefillPolicy::default()), 12);
        match_any(&mut game, t0);
        game.restart(t0 + ms(600));
        game.tick(t0 + ms(700));
        assert_eq!(game.occupied_count(), 4);
        assert_eq!(game.score(), 0);
        assert_eq!(game.catalog().key, "test");
    }
}
