pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod traits;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use models::*;
pub use traits::*;
