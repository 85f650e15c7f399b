pub mod logging;

pub use logging::{init, truncate_text};
