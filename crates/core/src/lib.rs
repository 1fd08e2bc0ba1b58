pub mod config;
pub mod dates;
pub mod error;
pub mod record;

pub use config::Config;
pub use dates::{parse_flexible_date, quarter_key, DateRange};
pub use error::*;
pub use record::*;
