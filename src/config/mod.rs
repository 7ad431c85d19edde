pub mod paths;
pub mod settings;
pub mod state;

pub use settings::{save_settings, MergedSettings, Settings, UserSettings};
pub use state::{ClaimRecord, RecordExporter};
