use anyhow::{Context, Result, bail};
use blockpress_config::Config;
use blockpress_engine::{
    Article, BlockDocument, Level, PanelState, RenderOptions, RenderedBlock, RunPanel,
    RunSurface, render_article, render_panel, sanitize::plain_text,
};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::{
    env,
    io::{Stdout, stdout},
    path::{Path, PathBuf},
    process,
};

const USAGE: &str = "Usage: blockpress-cli [--html] [--config <config.toml>] <document.json>

  --html    print the article as markup; with execution allowed, every
            executable block is run once and its output placed after it";

#[derive(Debug, PartialEq)]
struct Args {
    html: bool,
    config_path: Option<PathBuf>,
    document_path: PathBuf,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut html = false;
    let mut config_path = None;
    let mut document_path = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--html" => html = true,
            "--config" => {
                let Some(path) = iter.next() else {
                    bail!("--config needs a path");
                };
                config_path = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path if document_path.is_none() => document_path = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}"),
        }
    }

    let Some(document_path) = document_path else {
        bail!("no document given");
    };
    Ok(Args {
        html,
        config_path,
        document_path,
    })
}

fn expanded(path: &Path) -> PathBuf {
    Config::expand_path(path).unwrap_or_else(|| path.to_path_buf())
}

fn load_options(config_path: Option<&Path>) -> Result<RenderOptions> {
    let config = match config_path {
        Some(path) => Config::load_from_path(expanded(path))?,
        None => Config::load()?,
    };
    match config {
        Some(config) => Ok(config.render_options()),
        None => {
            log::info!(
                "no config file at {}, using defaults",
                Config::config_path().display()
            );
            Ok(RenderOptions::default())
        }
    }
}

fn load_document(path: &Path) -> Result<Option<BlockDocument>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    match BlockDocument::from_json_str(&json) {
        Ok(document) => Ok(Some(document)),
        Err(e) => {
            log::warn!("{}: {e}", path.display());
            Ok(None)
        }
    }
}

/// Article markup with each run panel placed after its block.
///
/// Batch output has no run buttons, so every panel is triggered here, not
/// only the markup snippets `auto_run_markup_snippets` covers. The surface
/// is empty unless execution is allowed.
fn html_with_panels(article: &Article, surface: &mut RunSurface) -> String {
    let indices: Vec<usize> = surface.panels().map(|p| p.index).collect();
    for index in indices {
        if let Err(e) = surface.trigger(index) {
            log::warn!("{e}");
        }
    }

    let mut out = String::new();
    for block in &article.blocks {
        out.push_str(&block.html);
        if let Some(report) = surface.panel(block.index).and_then(RunPanel::report) {
            out.push_str(&render_panel(block.index, report));
        }
    }
    if article.blocks.is_empty() {
        return article.html.clone();
    }
    article.contain(out)
}

struct App {
    article: Article,
    surface: RunSurface,
    block_list_state: ListState,
    status: String,
}

impl App {
    fn new(article: Article, surface: RunSurface) -> Self {
        let mut block_list_state = ListState::default();
        if !article.blocks.is_empty() {
            block_list_state.select(Some(0));
        }
        Self {
            article,
            surface,
            block_list_state,
            status: String::new(),
        }
    }

    fn selected_block(&self) -> Option<&RenderedBlock> {
        self.block_list_state
            .selected()
            .and_then(|i| self.article.blocks.get(i))
    }

    fn next_block(&mut self) {
        if self.article.blocks.is_empty() {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(i) => (i + 1) % self.article.blocks.len(),
            None => 0,
        };
        self.block_list_state.select(Some(i));
    }

    fn previous_block(&mut self) {
        if self.article.blocks.is_empty() {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(0) | None => self.article.blocks.len() - 1,
            Some(i) => i - 1,
        };
        self.block_list_state.select(Some(i));
    }

    fn run_selected(&mut self) {
        let Some(index) = self.selected_block().map(|b| b.index) else {
            return;
        };
        self.status = match self.surface.trigger(index) {
            Ok(report) if report.is_success() => format!("Block {index} ran"),
            Ok(_) => format!("Block {index} failed"),
            Err(e) => e.to_string(),
        };
    }

    fn content_lines(&self) -> Vec<String> {
        let Some(block) = self.selected_block() else {
            return plain_text(&self.article.html)
                .lines()
                .map(str::to_string)
                .collect();
        };
        let mut lines = block_lines(block);
        if let Some(panel) = self.surface.panel(block.index) {
            lines.push(String::new());
            lines.extend(panel_lines(panel));
        }
        lines
    }
}

fn block_lines(block: &RenderedBlock) -> Vec<String> {
    match &block.executable {
        Some(executable) => executable.source.lines().map(str::to_string).collect(),
        None => plain_text(&block.html)
            .lines()
            .map(str::to_string)
            .collect(),
    }
}

fn panel_lines(panel: &RunPanel) -> Vec<String> {
    match &panel.state {
        PanelState::Idle => vec!["[press r to run]".to_string()],
        PanelState::Running => vec!["[running]".to_string()],
        PanelState::Finished(report) => {
            let mut lines = vec!["── output ──".to_string()];
            for entry in &report.entries {
                lines.push(format!("[{}] {}", entry.level, entry.message));
            }
            if let Some(value) = &report.value {
                lines.push(format!("=> {value}"));
            }
            lines
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    // stderr shares the terminal with the viewer, so keep it quiet there.
    let level = if args.html {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let options = match load_options(args.config_path.as_deref()) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let document = load_document(&expanded(&args.document_path))?;
    let article = render_article(document.as_ref(), &options);
    let mut surface = RunSurface::from_article(&article, &options);

    if args.html {
        println!("{}", html_with_panels(&article, &mut surface));
        return Ok(());
    }

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(article, surface);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next_block(),
                KeyCode::Up | KeyCode::Char('k') => app.previous_block(),
                KeyCode::Enter | KeyCode::Char('r') => app.run_selected(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(rows[0]);

    let block_items: Vec<ListItem> = app
        .article
        .blocks
        .iter()
        .map(|block| {
            let marker = match app.surface.panel(block.index) {
                Some(panel) if panel.report().is_some_and(|r| !r.is_success()) => "✗ ",
                Some(panel) if panel.report().is_some() => "✓ ",
                Some(_) => "▶ ",
                None => "  ",
            };
            ListItem::new(Line::from(vec![Span::raw(format!(
                "{marker}{:>3} {}",
                block.index, block.kind
            ))]))
        })
        .collect();

    let blocks_list = List::new(block_items)
        .block(Block::default().borders(Borders::ALL).title("Blocks"))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(blocks_list, chunks[0], &mut app.block_list_state);

    let error_style = Style::default().fg(Color::Red);
    let content_text: Vec<Line> = app
        .content_lines()
        .into_iter()
        .map(|line| {
            if line.starts_with(&format!("[{}]", Level::Error)) {
                Line::from(Span::styled(line, error_style))
            } else {
                Line::from(Span::raw(line))
            }
        })
        .collect();

    let content = Paragraph::new(content_text)
        .block(Block::default().borders(Borders::ALL).title("Content"))
        .wrap(ratatui::widgets::Wrap { trim: false });

    f.render_widget(content, chunks[1]);

    let mut help = vec![
        Span::raw("q: Quit | "),
        Span::raw("↑/k: Previous | "),
        Span::raw("↓/j: Next | "),
        Span::raw("Enter/r: Run"),
    ];
    if !app.status.is_empty() {
        help.push(Span::raw(format!(" | {}", app.status)));
    }
    f.render_widget(Paragraph::new(Line::from(help)).block(Block::default()), rows[1]);
}
