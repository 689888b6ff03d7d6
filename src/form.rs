//! Settings form edited from the settings overlay.

use crate::config::{Config, DIGIT_RANGE, DURATION_MS_RANGE, FONT_SIZE_RANGE, ITEM_RANGE};

const DURATION_STEP_MS: u64 = 50;
const FONT_SIZE_STEP: u16 = 10;
const LANGUAGES: [&str; 3] = ["en-US", "pt-BR", "es-ES"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SettingsField {
    #[strum(to_string = "Number of digits")]
    Digits,
    #[strum(to_string = "Numbers per sequence")]
    Count,
    #[strum(to_string = "Flash (ms)")]
    Flash,
    #[strum(to_string = "Interval (ms)")]
    Interval,
    #[strum(to_string = "Allow subtraction")]
    Subtraction,
    #[strum(to_string = "Continuous mode")]
    Continuous,
    #[strum(to_string = "Narration")]
    Narration,
    #[strum(to_string = "Language")]
    Language,
    #[strum(to_string = "Font size")]
    FontSize,
}

impl SettingsField {
    pub const ALL: [SettingsField; 9] = [
        SettingsField::Digits,
        SettingsField::Count,
        SettingsField::Flash,
        SettingsField::Interval,
        SettingsField::Subtraction,
        SettingsField::Continuous,
        SettingsField::Narration,
        SettingsField::Language,
        SettingsField::FontSize,
    ];
}

fn step_u32(value: u32, up: bool, min: u32, max: u32) -> u32 {
    let next = if up { value.saturating_add(1) } else { value.saturating_sub(1) };
    next.clamp(min, max)
}

#[derive(Debug, Clone)]
pub struct SettingsForm {
    cursor: usize,
    draft: Config,
}

impl SettingsForm {
    pub fn new(draft: Config) -> Self {
        Self { cursor: 0, draft }
    }

    pub fn draft(&self) -> &Config {
        &self.draft
    }

    pub fn selected(&self) -> SettingsField {
        SettingsField::ALL[self.cursor]
    }

    pub fn up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn down(&mut self) {
        self.cursor = (self.cursor + 1).min(SettingsField::ALL.len() - 1);
    }

    pub fn increment(&mut self) {
        self.adjust(true);
    }

    pub fn decrement(&mut self) {
        self.adjust(false);
    }

    /// Flip a boolean field; other fields step up.
    pub fn toggle(&mut self) {
        self.adjust(true);
    }

    fn adjust(&mut self, up: bool) {
        let field = self.selected();
        let d = &mut self.draft;
        match field {
            SettingsField::Digits => {
                d.digit_count = step_u32(d.digit_count, up, *DIGIT_RANGE.start(), *DIGIT_RANGE.end());
            }
            SettingsField::Count => {
                let next = if up { d.item_count + 1 } else { d.item_count.saturating_sub(1) };
                d.item_count = next.clamp(*ITEM_RANGE.start(), *ITEM_RANGE.end());
            }
            SettingsField::Flash => {
                d.flash_duration_ms = step_duration(d.flash_duration_ms, up);
            }
            SettingsField::Interval => {
                d.interval_duration_ms = step_duration(d.interval_duration_ms, up);
            }
            SettingsField::Subtraction => d.allow_subtraction = !d.allow_subtraction,
            SettingsField::Continuous => d.continuous_mode = !d.continuous_mode,
            SettingsField::Narration => d.narration_enabled = !d.narration_enabled,
            SettingsField::Language => {
                let pos = LANGUAGES
                    .iter()
                    .position(|l| l.eq_ignore_ascii_case(&d.language_tag));
                let next = match (pos, up) {
                    (None, _) => 0,
                    (Some(i), true) => (i + 1) % LANGUAGES.len(),
                    (Some(i), false) => (i + LANGUAGES.len() - 1) % LANGUAGES.len(),
                };
                d.language_tag = LANGUAGES[next].to_string();
            }
            SettingsField::FontSize => {
                let next = if up {
                    d.font_size.saturating_add(FONT_SIZE_STEP)
                } else {
                    d.font_size.saturating_sub(FONT_SIZE_STEP)
                };
                d.font_size = next.clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
            }
        }
    }

    /// Label/value pairs in display order.
    pub fn rows(&self) -> Vec<(SettingsField, String)> {
        let d = &self.draft;
        let on_off = |b: bool| if b { "on" } else { "off" }.to_string();
        SettingsField::ALL
            .iter()
            .map(|&field| {
                let value = match field {
                    SettingsField::Digits => d.digit_count.to_string(),
                    SettingsField::Count => d.item_count.to_string(),
                    SettingsField::Flash => d.flash_duration_ms.to_string(),
                    SettingsField::Interval => d.interval_duration_ms.to_string(),
                    SettingsField::Subtraction => on_off(d.allow_subtraction),
                    SettingsField::Continuous => on_off(d.continuous_mode),
                    SettingsField::Narration => on_off(d.narration_enabled),
                    SettingsField::Language => d.language_tag.clone(),
                    SettingsField::FontSize => d.font_size.to_string(),
                };
                (field, value)
            })
            .collect()
    }
}

fn step_duration(value: u64, up: bool) -> u64 {
    let next = if up {
        value.saturating_add(DURATION_STEP_MS)
    } else {
        value.saturating_sub(DURATION_STEP_MS)
    };
    next.clamp(*DURATION_MS_RANGE.start(), *DURATION_MS_RANGE.end())
}
