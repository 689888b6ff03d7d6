use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::Config;
use crate::form::SettingsForm;
use crate::input::{self, Action, Command, Focus};
use crate::narration::UtteranceId;
use crate::playback::{Controller, Stage};

#[derive(Debug, Clone)]
pub enum Overlay {
    None,
    Settings(SettingsForm),
    History { scroll: usize },
}

/// Terminal front end around the playback controller: overlays, focus and
/// key dispatch. All state changes of the run itself go through the
/// controller.
pub struct App<R = StdRng> {
    pub controller: Controller<R>,
    pub overlay: Overlay,
    pub focus: Focus,
    pub should_quit: bool,
    last_stage: Stage,
}

impl<R: Rng> App<R> {
    pub fn new(controller: Controller<R>) -> Self {
        let last_stage = controller.stage();
        Self {
            controller,
            overlay: Overlay::None,
            focus: Focus::Controls,
            should_quit: false,
            last_stage,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        match &mut self.overlay {
            Overlay::Settings(form) => {
                match key.code {
                    KeyCode::Up => form.up(),
                    KeyCode::Down => form.down(),
                    KeyCode::Left => form.decrement(),
                    KeyCode::Right => form.increment(),
                    KeyCode::Char(' ') | KeyCode::Enter => form.toggle(),
                    KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('q') => {
                        self.apply(Command::CloseOverlay, now)
                    }
                    _ => {}
                }
                return;
            }
            Overlay::History { scroll } => {
                match key.code {
                    KeyCode::Up => *scroll = scroll.saturating_sub(1),
                    KeyCode::Down => {
                        let max = self.controller.history().len().saturating_sub(1);
                        *scroll = (*scroll + 1).min(max);
                    }
                    KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => {
                        self.apply(Command::CloseOverlay, now)
                    }
                    _ => {}
                }
                return;
            }
            Overlay::None => {}
        }

        match input::resolve(key, self.controller.stage(), self.focus) {
            Some(Action::Command(command)) => self.apply(command, now),
            Some(Action::TypeAnswer(c)) => {
                self.controller.type_answer(c);
            }
            Some(Action::EraseAnswer) => {
                self.controller.erase_answer();
            }
            None => {}
        }
    }

    pub fn apply(&mut self, command: Command, now: Instant) {
        match command {
            Command::Start => self.controller.start(now),
            Command::Stop => {
                self.controller.stop();
            }
            Command::ToggleRun => self.controller.toggle(now),
            Command::Replay => {
                self.controller.replay(now);
            }
            Command::Submit => {
                self.controller.submit();
            }
            Command::OpenSettings => {
                let draft = Config::from(self.controller.settings());
                self.overlay = Overlay::Settings(SettingsForm::new(draft));
            }
            Command::OpenHistory => self.overlay = Overlay::History { scroll: 0 },
            Command::CloseOverlay => {
                if let Overlay::Settings(form) = &self.overlay {
                    self.controller.set_settings(form.draft().validate());
                }
                self.overlay = Overlay::None;
            }
            Command::FocusAnswer => {
                if self.controller.accepts_answer() {
                    self.focus = Focus::AnswerField;
                }
            }
            Command::BlurAnswer => self.focus = Focus::Controls,
            Command::Quit => self.should_quit = true,
        }
        self.sync_focus();
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.controller.on_tick(now);
        self.sync_focus();
    }

    pub fn on_speech_finished(&mut self, id: UtteranceId, now: Instant) {
        self.controller.on_speech_finished(id, now);
        self.sync_focus();
    }

    /// The answer field grabs focus when an answer becomes due and lets go
    /// once none is expected.
    fn sync_focus(&mut self) {
        let stage = self.controller.stage();
        if stage != self.last_stage && self.controller.accepts_answer() {
            self.focus = Focus::AnswerField;
        }
        if !self.controller.accepts_answer() {
            self.focus = Focus::Controls;
        }
        self.last_stage = stage;
    }
}
