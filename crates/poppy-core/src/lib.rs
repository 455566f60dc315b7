pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod io;
pub mod motor;
pub mod paths;
pub mod poppy;
pub mod request;
pub mod script;

#[cfg(test)]
mod testing;

pub use error::{PoppyError, Result};
pub use poppy::Poppy;
pub use script::Script;
