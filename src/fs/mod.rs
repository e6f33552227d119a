pub mod atomic;
pub mod history;
pub mod progress_store;
pub mod work_dir;

pub use atomic::write_atomic;
pub use history::{
    append_transition, latest_validation, list_validations, read_transitions, store_validation,
    TransitionRecord,
};
pub use progress_store::ProgressStore;
pub use work_dir::{load_config, load_config_required, save_config, Config, WorkDir};
