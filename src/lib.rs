// Library surface for the binary and the headless integration tests.
// The playback engine never touches the terminal; only app/ui/runtime do.
pub mod app;
pub mod config;
pub mod form;
pub mod history;
pub mod input;
pub mod narration;
pub mod playback;
pub mod runtime;
pub mod scheduler;
pub mod sequence;
pub mod ui;
