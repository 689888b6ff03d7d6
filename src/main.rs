use std::{
    fs::File,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Instant,
};

use anyhow::Context;
use anzan::{
    app::App,
    config::{Config, ConfigStore, FileConfigStore},
    narration::{CommandSpeaker, Narrator, SpeechBackend, SpeechNotify, Speaker},
    playback::Controller,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    sequence::Sequence,
};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ANZAN_LOG";

/// flash anzan mental arithmetic trainer for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Flashes a sequence of numbers one at a time, optionally reads them aloud, and checks the sum you type in."
)]
pub struct Cli {
    /// digits per number (1-9)
    #[clap(short = 'd', long)]
    digits: Option<u32>,

    /// numbers per sequence (2-25)
    #[clap(short = 'n', long)]
    count: Option<usize>,

    /// how long each number stays on screen, in milliseconds
    #[clap(long)]
    flash_ms: Option<u64>,

    /// blank pause between numbers, in milliseconds
    #[clap(long)]
    interval_ms: Option<u64>,

    /// allow negative terms while keeping every running total non-negative
    #[clap(long, overrides_with = "no_subtract")]
    subtract: bool,

    /// only positive terms, even if the config file allows subtraction
    #[clap(long, overrides_with = "subtract")]
    no_subtract: bool,

    /// loop hands-free: show the sum automatically and start the next sequence
    #[clap(long, overrides_with = "no_continuous")]
    continuous: bool,

    /// wait for typed answers, even if the config file enables continuous mode
    #[clap(long, overrides_with = "continuous")]
    no_continuous: bool,

    /// read numbers aloud through a system speech program
    #[clap(long, overrides_with = "no_narrate")]
    narrate: bool,

    /// stay silent, even if the config file enables narration
    #[clap(long, overrides_with = "narrate")]
    no_narrate: bool,

    /// BCP-47 language tag used for narration, e.g. en-US or pt-BR
    #[clap(short = 'l', long)]
    language: Option<String>,

    /// display size hint for the flashed number
    #[clap(long)]
    font_size: Option<u16>,

    /// practice a fixed sequence first, e.g. --sequence 4,7,-2
    #[clap(long, value_delimiter = ',', allow_negative_numbers = true)]
    sequence: Option<Vec<i64>>,

    /// speech program to narrate with
    #[clap(long, value_enum, default_value_t = SpeechChoice::Auto)]
    speech_backend: SpeechChoice,

    /// JSON config file to read instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// write diagnostics to this file (filter with ANZAN_LOG)
    #[clap(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SpeechChoice {
    Auto,
    Espeak,
    SpdSay,
    Say,
    None,
}

impl SpeechChoice {
    fn backend(self) -> Option<SpeechBackend> {
        match self {
            SpeechChoice::Auto => SpeechBackend::detect(),
            SpeechChoice::Espeak => Some(SpeechBackend::EspeakNg),
            SpeechChoice::SpdSay => Some(SpeechBackend::SpdSay),
            SpeechChoice::Say => Some(SpeechBackend::Say),
            SpeechChoice::None => None,
        }
    }
}

impl Cli {
    /// Layer explicit flags over the file config.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(digits) = self.digits {
            config.digit_count = digits;
        }
        if let Some(count) = self.count {
            config.item_count = count;
        }
        if let Some(ms) = self.flash_ms {
            config.flash_duration_ms = ms;
        }
        if let Some(ms) = self.interval_ms {
            config.interval_duration_ms = ms;
        }
        if let Some(on) = switch(self.subtract, self.no_subtract) {
            config.allow_subtraction = on;
        }
        if let Some(on) = switch(self.continuous, self.no_continuous) {
            config.continuous_mode = on;
        }
        if let Some(on) = switch(self.narrate, self.no_narrate) {
            config.narration_enabled = on;
        }
        if let Some(language) = &self.language {
            config.language_tag = language.clone();
        }
        if let Some(size) = self.font_size {
            config.font_size = size;
        }
        config
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        let file = match &self.config {
            Some(path) => FileConfigStore::with_path(path)
                .read()
                .with_context(|| format!("could not use config file {}", path.display()))?,
            None => FileConfigStore::new().load(),
        };
        Ok(self.apply(file))
    }

    fn practice_sequence(&self) -> anyhow::Result<Option<Sequence>> {
        self.sequence
            .as_ref()
            .map(|terms| Sequence::try_from_terms(terms.clone()).context("invalid --sequence"))
            .transpose()
    }
}

/// A `--flag` / `--no-flag` pair; `None` when neither was given.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn build_narrator(choice: SpeechChoice, notify: SpeechNotify) -> Narrator {
    let speaker = choice.backend().map(|backend| {
        info!(%backend, "narration backend");
        Box::new(CommandSpeaker::new(backend, notify)) as Box<dyn Speaker>
    });
    if speaker.is_none() {
        info!(%choice, "no speech backend, narration disabled");
    }
    Narrator::new(speaker)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = &cli.log_file {
        init_logging(path)?;
    }

    let settings = cli.load_config()?.validate();
    let practice = cli.practice_sequence()?;
    info!(?settings, "starting");

    let events = CrosstermEventSource::new();
    let narrator = build_narrator(cli.speech_backend, events.speech_notifier());
    let mut app = App::new(Controller::new(settings, narrator));
    if let Some(sequence) = practice {
        app.controller.start_with(sequence, Instant::now());
    }
    let runner = Runner::new(events, FixedTicker::default());

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.controller.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<CrosstermEventSource, FixedTicker>,
) -> anyhow::Result<()> {
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while !app.should_quit {
        let event = runner.step_until(app.controller.next_deadline());
        let now = Instant::now();
        match event {
            AppEvent::Key(key) => app.handle_key(key, now),
            AppEvent::SpeechFinished(id) => app.on_speech_finished(id, now),
            AppEvent::Resize => {}
            AppEvent::Tick => {}
        }
        // due timers fire on every wake, not only on idle ticks
        app.on_tick(now);
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}
