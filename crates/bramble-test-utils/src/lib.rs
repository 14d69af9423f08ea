#![deny(unsafe_code)]

//! Shared test utilities for the bramble workspace.
//!
//! Provides a master-under-test fixture on a temp-dir socket so individual
//! crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! bramble-test-utils = { workspace = true }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use bramble_config::AppConfig;
use bramble_core::{Master, MasterClient, MasterError};

/// A test-scoped master daemon bound to a socket in an owned temp directory.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestMaster {
    pub socket_path: PathBuf,
    task: JoinHandle<Result<(), MasterError>>,
    _temp_dir: TempDir,
}

impl TestMaster {
    /// Start a master with default config on a fresh temp-dir socket and
    /// wait until it is accepting connections.
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = temp_dir.path().join("bramble.sock");

        let mut config = AppConfig::default();
        config.daemon.socket_path = socket_path.display().to_string();

        let task = tokio::spawn(Master::new(config).run());

        for _ in 0..200 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(socket_path.exists(), "master never bound its socket");

        Self {
            socket_path,
            task,
            _temp_dir: temp_dir,
        }
    }

    /// A client targeting this master's socket.
    pub fn client(&self) -> MasterClient {
        MasterClient::new(&self.socket_path)
    }

    /// Await the master task's termination (send a stop order first).
    pub async fn join(self) -> Result<(), MasterError> {
        self.task.await.expect("master task panicked")
    }
}
