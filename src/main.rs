// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use wordwiz::app::AppState;
use wordwiz::config::{RefillPolicy, Settings};
use wordwiz::logging;
use wordwiz::ui::{self, BoardLayout};
use wordwiz::words::{BuiltinCatalogs, CatalogProvider, FileCatalogs};

// --------------------------------------------------
// コマンドライン引数
// --------------------------------------------------

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RefillKind {
    LowWater,
    SlidingWindow,
}

/// WORD WiZ: 左右の単語をつなぐ単語帳ゲーム
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// 開始時のカタログ (easy / medium / hard など)
    #[arg(short, long)]
    difficulty: Option<String>,

    /// 片側のスロット数
    #[arg(short = 'n', long)]
    slots: Option<usize>,

    /// 補充方式
    #[arg(long, value_enum)]
    refill: Option<RefillKind>,

    /// 山札をシャッフルせずカタログ順に出す
    #[arg(long)]
    ordered: bool,

    /// 乱数のシード (同じ盤面を再現したいとき)
    #[arg(long)]
    seed: Option<u64>,

    /// 単語リスト (JSON)
    #[arg(short, long, value_name = "PATH")]
    words: Option<PathBuf>,

    /// 設定ファイル (JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 現在の設定を書き出して終了
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// カタログの一覧を表示して終了
    #[arg(long)]
    list: bool,

    /// ログの出力レベル (RUST_LOG が優先)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// ログファイル
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Args {
    /// 設定ファイルの内容にコマンドラインの指定を上書きする
    fn apply(&self, settings: &mut Settings) {
        if let Some(key) = &self.difficulty {
            settings.start_catalog = key.clone();
        }
        if let Some(n) = self.slots {
            settings.rules.slot_count = n;
        }
        match self.refill {
            Some(RefillKind::LowWater) => settings.rules.refill = RefillPolicy::low_water(),
            Some(RefillKind::SlidingWindow) => {
                settings.rules.refill = RefillPolicy::sliding_window()
            }
            None => {}
        }
        if self.ordered {
            settings.rules.shuffle_deck = false;
        }
    }
}

// --------------------------------------------------
// メイン関数 (TUIセットアップと実行ループ)
// --------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    logging::init(&args.log_level, &log_path)?;

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;

    if let Some(path) = &args.write_config {
        settings.save(path)?;
        println!("{} {}", style("saved").green().bold(), path.display());
        return Ok(());
    }

    let provider: Box<dyn CatalogProvider> = match &args.words {
        Some(path) => Box::new(FileCatalogs::load(path)?),
        None => Box::new(BuiltinCatalogs::new()),
    };

    if args.list {
        print_catalogs(provider.as_ref());
        return Ok(());
    }

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let started = chrono::Local::now();
    let mut app = AppState::new(
        provider,
        &settings.start_catalog,
        settings.rules.clone(),
        rng,
        Instant::now(),
    )?;
    info!(catalog = %settings.start_catalog, rules = ?settings.rules, "session started");

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    let restored = restore_terminal();
    first_error(result, restored)?;

    print_summary(&app, started);
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(EnableMouseCapture)?;
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend).context("failed to initialize terminal")
}

fn restore_terminal() -> Result<()> {
    stdout().execute(Show)?; // カーソルを再表示
    stdout().execute(DisableMouseCapture)?;
    stdout().execute(LeaveAlternateScreen)?; // 代替スクリーンを終了
    disable_raw_mode()?;
    Ok(())
}

/// 後始末の失敗より実行中のエラーを優先して返す
fn first_error(result: Result<()>, restored: Result<()>) -> Result<()> {
    result?;
    restored
}

fn run_app(terminal: &mut Terminal<impl Backend>, app: &mut AppState) -> Result<()> {
    loop {
        let now = Instant::now();
        app.tick(now);
        terminal.draw(|f| ui::draw(f, app, now))?;

        if app.should_quit() {
            return Ok(());
        }

        if event::poll(app.poll_timeout(Instant::now()))? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key, Instant::now()),
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    let layout = BoardLayout::compute(
                        Rect::new(0, 0, size.width, size.height),
                        app.provider().catalogs().len(),
                        app.game().slot_count(),
                    );
                    app.handle_mouse(mouse, &layout, Instant::now());
                }
                _ => {}
            }
        }
    }
}

// --------------------------------------------------
// 端末への出力
// --------------------------------------------------

fn print_catalogs(provider: &dyn CatalogProvider) {
    for (i, catalog) in provider.catalogs().iter().enumerate() {
        println!(
            "{} {:<10} {} {}",
            style(format!("[{}]", i + 1)).dim(),
            style(&catalog.key).cyan().bold(),
            "⭐".repeat(catalog.stars as usize),
            style(format!("{} ({} pairs)", catalog.label, catalog.len())).dim(),
        );
    }
}

/// 終了時に今回のリザルトを表示する
fn print_summary(app: &AppState, started: chrono::DateTime<chrono::Local>) {
    let game = app.game();
    let secs = game.elapsed(Instant::now()).as_secs();
    info!(score = game.score(), misses = game.misses(), secs, "session finished");
    println!(
        "{} {}  Score: {}  Miss: {}  Time: {}s  ({})",
        style("WORD WiZ").magenta().bold(),
        style(&game.catalog().label).cyan(),
        style(game.score()).yellow().bold(),
        style(game.misses()).red(),
        secs,
        started.format("%Y-%m-%d %H:%M"),
    );
}
