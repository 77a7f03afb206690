pub mod error;
pub mod reflection;
pub mod synthesis;
pub mod tasks;
pub mod util;

pub use error::*;
pub use synthesis::*;
