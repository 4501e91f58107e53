mod contention;

pub use contention::{ContentionDriver, ContentionError, ContentionPlan};
