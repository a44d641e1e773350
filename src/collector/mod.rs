//! Counter collection from `/proc` and the cgroup v2 filesystem.
//!
//! All collectors are generic over [`FileSystem`], so the same code runs
//! against the real kernel interfaces in production and against [`MockFs`]
//! in tests.

pub mod cgroup;
pub mod exits;
pub mod mock;
pub mod parser;
pub mod procfs;
pub mod traits;

pub use cgroup::CgroupCollector;
pub use exits::{ExitEventSource, ExitTracker};
pub use mock::MockFs;
pub use procfs::{CollectError, SampleCollector};
pub use traits::{FileSystem, RealFs};
