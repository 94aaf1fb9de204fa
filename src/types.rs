pub use chrono::{DateTime, Duration, Utc};
