//! Names shared by the integration test crates.
//!
//! Each top-level file in `tests/` builds its own crate, so this module is
//! pulled in with a `#[path = "common/test_constants.rs"]` attribute instead
//! of being a test target itself.

#![allow(dead_code, reason = "each test crate uses a different subset")]

/// Project used by scripted backends.
pub const PROJECT: &str = "indigo-night-126317";

/// Default zone of the lifecycle scenario.
pub const ZONE: &str = "us-central1-a";

/// Instance created with a local SSD.
pub const LOCAL_SSD_INSTANCE: &str = "instance-with-local-test";

/// Instance created without a local SSD.
pub const PLAIN_INSTANCE: &str = "instance-no-local-test";
