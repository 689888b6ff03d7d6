//! Spoken narration of sequence terms and results.
//!
//! The [`Narrator`] owns the single speech channel. Starting an utterance
//! always cancels the previous one, and a failing or missing speaker degrades
//! to an immediately completed narration so playback never waits on it.

pub mod speaker;
pub mod words;

pub use speaker::{
    CommandSpeaker, RecordingSpeaker, SpeechBackend, SpeechError, SpeechNotify, Speaker,
    UtteranceId,
};
pub use words::{english_words, phrase, spoken_number};

use tracing::warn;

/// Outcome of asking the narrator to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narration {
    /// Nothing to wait for: disabled, no speaker, or the speaker failed.
    Skipped,
    /// Speech started; completion arrives later for this id.
    Pending(UtteranceId),
}

pub struct Narrator {
    speaker: Option<Box<dyn Speaker>>,
    next_id: u64,
    in_flight: Option<UtteranceId>,
}

impl Default for Narrator {
    fn default() -> Self {
        Self::silent()
    }
}

impl Narrator {
    pub fn new(speaker: Option<Box<dyn Speaker>>) -> Self {
        Self {
            speaker,
            next_id: 0,
            in_flight: None,
        }
    }

    /// Narrator for a host without speech capability.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn is_available(&self) -> bool {
        self.speaker.is_some()
    }

    pub fn in_flight(&self) -> Option<UtteranceId> {
        self.in_flight
    }

    pub fn narrate(
        &mut self,
        value: i64,
        is_result: bool,
        enabled: bool,
        language_tag: &str,
    ) -> Narration {
        if !enabled {
            return Narration::Skipped;
        }
        let Some(speaker) = self.speaker.as_mut() else {
            return Narration::Skipped;
        };

        if self.in_flight.take().is_some() {
            speaker.cancel_all();
        }

        let id = UtteranceId(self.next_id);
        self.next_id += 1;
        let text = phrase(value, is_result, language_tag);
        match speaker.speak(id, &text, language_tag) {
            Ok(()) => {
                self.in_flight = Some(id);
                Narration::Pending(id)
            }
            Err(err) => {
                warn!(%err, "narration failed, continuing without speech");
                Narration::Skipped
            }
        }
    }

    /// Mark `id` as finished. Returns false for utterances that were already
    /// cancelled or superseded.
    pub fn finish(&mut self, id: UtteranceId) -> bool {
        if self.in_flight == Some(id) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Silence the channel.
    pub fn cancel(&mut self) {
        if self.in_flight.take().is_some() {
            if let Some(speaker) = self.speaker.as_mut() {
                speaker.cancel_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Narrator, RecordingSpeaker) {
        let recorder = RecordingSpeaker::new();
        (Narrator::new(Some(Box::new(recorder.clone()))), recorder)
    }

    #[test]
    fn disabled_or_missing_speaker_is_a_no_op() {
        let (mut narrator, recorder) = recording();
        assert_eq!(narrator.narrate(5, false, false, "en"), Narration::Skipped);
        assert!(recorder.texts().is_empty());

        let mut silent = Narrator::silent();
        assert!(!silent.is_available());
        assert_eq!(silent.narrate(5, false, true, "en"), Narration::Skipped);
    }

    #[test]
    fn speaks_phrase_and_tracks_in_flight() {
        let (mut narrator, recorder) = recording();
        let Narration::Pending(id) = narrator.narrate(-12, true, true, "en-US") else {
            panic!("expected pending narration");
        };
        assert_eq!(recorder.texts(), vec!["equals minus twelve".to_string()]);
        assert_eq!(recorder.last_language().as_deref(), Some("en-US"));
        assert_eq!(narrator.in_flight(), Some(id));
        assert!(narrator.finish(id));
        assert!(!narrator.finish(id));
    }

    #[test]
    fn new_speech_cancels_previous_utterance() {
        let (mut narrator, recorder) = recording();
        let first = narrator.narrate(1, false, true, "en");
        let second = narrator.narrate(2, false, true, "en");
        assert_ne!(first, second);
        assert_eq!(recorder.cancel_count(), 1);

        let Narration::Pending(first) = first else {
            panic!("expected pending narration");
        };
        assert!(!narrator.finish(first), "superseded utterance must be stale");
    }

    #[test]
    fn speaker_failure_is_treated_as_completion() {
        let mut narrator = Narrator::new(Some(Box::new(RecordingSpeaker::failing())));
        assert_eq!(narrator.narrate(3, false, true, "en"), Narration::Skipped);
        assert_eq!(narrator.in_flight(), None);
    }

    #[test]
    fn cancel_only_touches_speaker_when_something_plays() {
        let (mut narrator, recorder) = recording();
        narrator.cancel();
        assert_eq!(recorder.cancel_count(), 0);
        narrator.narrate(9, false, true, "en");
        narrator.cancel();
        assert_eq!(recorder.cancel_count(), 1);
        assert_eq!(narrator.in_flight(), None);
    }
}
