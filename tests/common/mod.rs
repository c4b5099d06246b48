//! Integration test infrastructure.
//!
//! Runs the real `hatcogd` binary between a fake IRC server and test
//! clients speaking the internal protocol.

pub mod client;
pub mod daemon;
pub mod upstream;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use daemon::TestDaemon;
#[allow(unused_imports)]
pub use upstream::{FakeUpstream, UpstreamConn};
