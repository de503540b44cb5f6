//! Domain types - keys, windows, quotas and decisions.

mod decision;
mod key;
mod window;

pub use decision::{BackendMode, Decision, Quota};
pub use key::RateLimitKey;
pub use window::{WindowId, WindowPolicy, unix_seconds};
