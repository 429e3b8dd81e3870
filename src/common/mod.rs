mod columns;
mod fs;

pub use columns::*;
pub use fs::*;
