// ============================================
// src/schedule.rs
// 遅延アクション (演出用タイマー) の管理
// ============================================

use std::time::Instant;

/// 予約済みアクション
#[derive(Debug)]
struct Entry<A> {
    due: Instant,
    epoch: u64,
    seq: u64,
    action: A,
}

/// 期限付きアクションのキュー
///
/// 実時間では動かない。呼び出し側が `take_due(now)` で期限切れのものを取り出す。
/// `cancel_all` は世代 (epoch) を進めるだけで、古い世代の予約は
/// 次の `take_due` で捨てられるまで残るが、二度と返らない。
#[derive(Debug)]
pub struct Scheduler<A> {
    epoch: u64,
    next_seq: u64,
    pending: Vec<Entry<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    /// `due` 以降に実行するアクションを予約する
    pub fn schedule(&mut self, due: Instant, action: A) {
        self.pending.push(Entry {
            due,
            epoch: self.epoch,
            seq: self.next_seq,
            action,
        });
        self.next_seq += 1;
    }

    /// 予約をすべて無効化する
    pub fn cancel_all(&mut self) {
        self.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 期限切れのアクションを期限順 (同時刻なら予約順) に取り出す
    ///
    /// 古い世代の予約は期限に関係なくここで捨てる。
    pub fn take_due(&mut self, now: Instant) -> Vec<A> {
        let epoch = self.epoch;
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|e| e.epoch == epoch)
            .partition(|e| e.due <= now);
        self.pending = rest;

        due.sort_by_key(|e| (e.due, e.seq));
        due.into_iter().map(|e| e.action).collect()
    }

    /// 一番近い期限 (イベント待ちのタイムアウト計算用)
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live().map(|e| e.due).min()
    }

    /// 有効な (現在の世代の) 予約数
    pub fn len(&self) -> usize {
        self.live().count()
    }

    pub fn is_empty(&self) -> bool {
        self.live().next().is_none()
    }

    fn live(&self) -> impl Iterator<Item = &Entry<A>> {
        self.pending.iter().filter(move |e| e.epoch == self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn returns_due_actions_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule(t0 + Duration::from_millis(300), "late");
        timers.schedule(t0 + Duration::from_millis(100), "early");
        timers.schedule(t0 + Duration::from_millis(100), "early-second");
        timers.schedule(t0 + Duration::from_millis(900), "pending");

        assert!(timers.take_due(t0).is_empty());
        assert_eq!(
            timers.take_due(t0 + Duration::from_millis(500)),
            vec!["early", "early-second", "late"]
        );
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn cancel_all_drops_old_epoch() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule(t0, 1);
        timers.cancel_all();
        assert_eq!(timers.epoch(), 1);
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);

        timers.schedule(t0, 2);
        assert_eq!(timers.take_due(t0 + Duration::from_secs(1)), vec![2]);
    }

    #[test]
    fn stale_entries_never_fire_even_when_due_later() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule(t0 + Duration::from_millis(100), "stale-early");
        timers.schedule(t0 + Duration::from_millis(900), "stale-late");
        timers.cancel_all();

        // 古い予約より後に期限が来る新しい予約
        timers.schedule(t0 + Duration::from_millis(500), "fresh");
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_millis(500)));

        // 古い予約の期限を過ぎても返らない
        assert!(timers.take_due(t0 + Duration::from_millis(200)).is_empty());
        assert_eq!(timers.take_due(t0 + Duration::from_secs(2)), vec!["fresh"]);
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);

        // 二度キャンセルしても新しい世代だけが動く
        timers.schedule(t0, "gen2");
        timers.cancel_all();
        timers.cancel_all();
        timers.schedule(t0, "gen3");
        assert_eq!(timers.epoch(), 3);
        assert_eq!(timers.take_due(t0), vec!["gen3"]);
    }
}
