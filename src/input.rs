use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::playback::Stage;

/// User intents understood by the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Start when nothing is running, stop otherwise.
    ToggleRun,
    Replay,
    Submit,
    OpenSettings,
    OpenHistory,
    CloseOverlay,
    FocusAnswer,
    BlurAnswer,
    Quit,
}

/// Where typed keys go on the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Controls,
    AnswerField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Command(Command),
    TypeAnswer(char),
    EraseAnswer,
}

/// Map a key press on the main screen to an action.
///
/// Shortcuts are suppressed while the answer field has focus, with one
/// exception: Enter submits whenever an answer is awaited.
pub fn resolve(key: KeyEvent, stage: Stage, focus: Focus) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Command(Command::Quit));
    }
    if key.code == KeyCode::Enter {
        return (stage == Stage::AwaitingAnswer).then_some(Action::Command(Command::Submit));
    }

    match focus {
        Focus::AnswerField => match key.code {
            KeyCode::Char(c) => Some(Action::TypeAnswer(c)),
            KeyCode::Backspace => Some(Action::EraseAnswer),
            KeyCode::Esc | KeyCode::Tab => Some(Action::Command(Command::BlurAnswer)),
            _ => None,
        },
        Focus::Controls => {
            let command = match key.code {
                KeyCode::Char(' ') => Command::ToggleRun,
                KeyCode::Char('r') => Command::Replay,
                KeyCode::Char('s') => Command::OpenSettings,
                KeyCode::Char('h') => Command::OpenHistory,
                KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
                KeyCode::Tab => Command::FocusAnswer,
                _ => return None,
            };
            Some(Action::Command(command))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn shortcuts_fire_with_controls_focus() {
        let f = Focus::Controls;
        assert_eq!(
            resolve(key(KeyCode::Char(' ')), Stage::Idle, f),
            Some(Action::Command(Command::ToggleRun))
        );
        assert_eq!(
            resolve(key(KeyCode::Char('r')), Stage::ShowingResult, f),
            Some(Action::Command(Command::Replay))
        );
        assert_eq!(
            resolve(key(KeyCode::Char('s')), Stage::Idle, f),
            Some(Action::Command(Command::OpenSettings))
        );
        assert_eq!(
            resolve(key(KeyCode::Char('h')), Stage::Flashing, f),
            Some(Action::Command(Command::OpenHistory))
        );
        assert_eq!(
            resolve(key(KeyCode::Esc), Stage::Idle, f),
            Some(Action::Command(Command::Quit))
        );
        assert_eq!(resolve(key(KeyCode::Char('z')), Stage::Idle, f), None);
    }

    #[test]
    fn answer_focus_swallows_shortcuts() {
        let f = Focus::AnswerField;
        let stage = Stage::AwaitingAnswer;
        assert_eq!(
            resolve(key(KeyCode::Char('r')), stage, f),
            Some(Action::TypeAnswer('r'))
        );
        assert_eq!(
            resolve(key(KeyCode::Char(' ')), stage, f),
            Some(Action::TypeAnswer(' '))
        );
        assert_eq!(
            resolve(key(KeyCode::Backspace), stage, f),
            Some(Action::EraseAnswer)
        );
        assert_eq!(
            resolve(key(KeyCode::Esc), stage, f),
            Some(Action::Command(Command::BlurAnswer))
        );
    }

    #[test]
    fn enter_submits_only_while_awaiting_answer() {
        for focus in [Focus::Controls, Focus::AnswerField] {
            assert_matches!(
                resolve(key(KeyCode::Enter), Stage::AwaitingAnswer, focus),
                Some(Action::Command(Command::Submit))
            );
            assert_eq!(resolve(key(KeyCode::Enter), Stage::Flashing, focus), None);
            assert_eq!(resolve(key(KeyCode::Enter), Stage::Idle, focus), None);
        }
    }

    #[test]
    fn ctrl_c_always_quits() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_matches!(
            resolve(ctrl_c, Stage::AwaitingAnswer, Focus::AnswerField),
            Some(Action::Command(Command::Quit))
        );
    }
}
