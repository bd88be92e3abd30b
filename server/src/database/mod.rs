pub mod audit;
pub mod create;
pub mod leads;
pub mod sessions;
pub mod tokens;
pub mod users;
pub mod utils;

pub use create::{create_tables, open_database};
