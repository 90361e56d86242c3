//! Daemon entry point. Configuration is env-var driven (see
//! [`ikvm_manager::ManagerConfig::from_env`]); proper CLI argument parsing
//! is out of scope for this core.

use ikvm_manager::{Manager, ManagerConfig};

fn main() {
    tracing_subscriber::fmt::init();

    let config = ManagerConfig::from_env();

    let mut manager = match Manager::start(config) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "failed to start manager");
            std::process::exit(1);
        }
    };

    manager.run_until_signal();
}
