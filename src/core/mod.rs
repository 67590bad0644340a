//! Process-wide run state.

mod state;

pub use state::{register_cleanup, run_cleanup, setup_shutdown_handler, unregister_cleanup};
