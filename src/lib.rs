//! WORD WiZ: 二列の単語を結ぶ単語帳ゲームのコア
//!
//! 描画 (`ui`) 以外はすべて端末に依存しないので、テストから直接動かせる。

pub mod app;
pub mod config;
pub mod game;
pub mod logging;
pub mod schedule;
pub mod ui;
pub mod words;
