use std::env;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const CHILD_POLL_MS: u64 = 20;

/// Identifies one utterance handed to a [`Speaker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no speech backend available")]
    Unavailable,
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Platform text-to-speech capability.
///
/// `speak` returns as soon as speech has started; the implementation reports
/// completion of `id` out of band. `cancel_all` silences whatever is playing
/// and must not report completion for the cancelled utterance.
pub trait Speaker: Send {
    fn speak(&mut self, id: UtteranceId, text: &str, language_tag: &str) -> Result<(), SpeechError>;
    fn cancel_all(&mut self);
}

/// Completion callback shared with speech worker threads.
pub type SpeechNotify = Arc<dyn Fn(UtteranceId) + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SpeechBackend {
    EspeakNg,
    SpdSay,
    Say,
}

impl SpeechBackend {
    pub fn program(&self) -> &'static str {
        match self {
            SpeechBackend::EspeakNg => "espeak-ng",
            SpeechBackend::SpdSay => "spd-say",
            SpeechBackend::Say => "say",
        }
    }

    fn command(&self, text: &str, language_tag: &str) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            SpeechBackend::EspeakNg => {
                cmd.arg("-v").arg(language_tag.to_ascii_lowercase()).arg(text);
            }
            SpeechBackend::SpdSay => {
                let lang = language_tag.split(['-', '_']).next().unwrap_or("en");
                cmd.arg("--wait").arg("-l").arg(lang).arg(text);
            }
            SpeechBackend::Say => {
                cmd.arg(text);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// First backend whose program is found on `PATH`.
    pub fn detect() -> Option<Self> {
        let path = env::var_os("PATH")?;
        let dirs: Vec<_> = env::split_paths(&path).collect();
        [
            SpeechBackend::EspeakNg,
            SpeechBackend::SpdSay,
            SpeechBackend::Say,
        ]
        .into_iter()
        .find(|backend| dirs.iter().any(|dir| dir.join(backend.program()).is_file()))
    }
}

/// Speaks through an external TTS program, one child process per utterance.
pub struct CommandSpeaker {
    backend: SpeechBackend,
    notify: SpeechNotify,
    active: Option<Arc<AtomicBool>>,
}

impl CommandSpeaker {
    pub fn new(backend: SpeechBackend, notify: SpeechNotify) -> Self {
        Self {
            backend,
            notify,
            active: None,
        }
    }

    pub fn backend(&self) -> SpeechBackend {
        self.backend
    }

    fn watch(mut child: Child, id: UtteranceId, cancelled: Arc<AtomicBool>, notify: SpeechNotify) {
        thread::spawn(move || loop {
            if cancelled.load(Ordering::Acquire) {
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => {
                    notify(id);
                    return;
                }
                Ok(None) => thread::sleep(Duration::from_millis(CHILD_POLL_MS)),
            }
        });
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, id: UtteranceId, text: &str, language_tag: &str) -> Result<(), SpeechError> {
        self.cancel_all();
        let child = self
            .backend
            .command(text, language_tag)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.backend.program(),
                source,
            })?;
        debug!(?id, backend = %self.backend, "speaking");

        let cancelled = Arc::new(AtomicBool::new(false));
        Self::watch(child, id, Arc::clone(&cancelled), Arc::clone(&self.notify));
        self.active = Some(cancelled);
        Ok(())
    }

    fn cancel_all(&mut self) {
        if let Some(flag) = self.active.take() {
            flag.store(true, Ordering::Release);
        }
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// What a [`RecordingSpeaker`] was asked to do.
#[derive(Debug, Default)]
pub struct SpeechLog {
    pub spoken: Vec<(UtteranceId, String, String)>,
    pub cancels: usize,
}

/// In-memory speaker for headless runs and tests. Completion is never
/// reported by itself; the driver decides when an utterance finishes.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpeaker {
    log: Arc<Mutex<SpeechLog>>,
    failing: bool,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A speaker whose every `speak` call fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn log(&self) -> MutexGuard<'_, SpeechLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn texts(&self) -> Vec<String> {
        self.log().spoken.iter().map(|(_, text, _)| text.clone()).collect()
    }

    pub fn last_id(&self) -> Option<UtteranceId> {
        self.log().spoken.last().map(|(id, _, _)| *id)
    }

    pub fn last_language(&self) -> Option<String> {
        self.log().spoken.last().map(|(_, _, lang)| lang.clone())
    }

    pub fn cancel_count(&self) -> usize {
        self.log().cancels
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&mut self, id: UtteranceId, text: &str, language_tag: &str) -> Result<(), SpeechError> {
        if self.failing {
            return Err(SpeechError::Unavailable);
        }
        self.log()
            .spoken
            .push((id, text.to_string(), language_tag.to_string()));
        Ok(())
    }

    fn cancel_all(&mut self) {
        self.log().cancels += 1;
    }
}
