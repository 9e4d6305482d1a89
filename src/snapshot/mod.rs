pub mod briefs;
pub mod refresher;

pub use briefs::{BriefService, RefreshReport};
pub use refresher::SnapshotRefresher;
