//! Test harness utilities shared by the unit and behavioural suites.

mod config_loader;
mod pool;
mod reporter;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use pool::{FakePool, PoolCall, users_columns};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world, write_users_dump};
