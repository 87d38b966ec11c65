pub mod logging;

pub use logging::{log_startup, report_timestamp, truncate_text, StageTimer};
