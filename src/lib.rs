// Beatgrid Timing Core
// Offline timing-point generation: onset detection, tempo/anchor seeding and
// drift/jump reconciliation of a beat grid against the detected onsets

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod grid;
pub mod report;
pub mod stats;
pub mod testing;

// Re-exports for convenience
pub use analysis::{analyze_samples, AnalysisReport};
pub use config::{AppConfig, GapRejectPolicy, TimingConfig};
pub use grid::{generate_timing_points, OnsetSet, TimingPoint, TimingResult};
