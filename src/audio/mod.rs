// Audio module - WAV decoding, resampling and click track rendering

pub mod click;
pub mod wav;

// Re-export commonly used types for convenience
pub use click::{generate_click_sample, render_click_track, render_clicks, ClickPattern};
pub use wav::{load_wav, resample_linear, write_wav, MonoAudio};
