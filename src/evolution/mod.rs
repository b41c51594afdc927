pub mod builder;
pub mod launcher;
pub mod logbook;
pub mod options;

pub use builder::EvolutionLauncherBuilder;
pub use launcher::{EngineState, EvolutionLauncher, EvolutionResult};
pub use logbook::{GenerationRecord, Logbook, Stats};
pub use options::{EvolutionOptions, EvolutionOptionsBuilder, LogLevel};
