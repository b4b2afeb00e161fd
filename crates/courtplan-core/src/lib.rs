// courtplan-core: squad selection and transfer planning for daily fantasy
// basketball. Pure and synchronous; the server crate supplies the data.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod lineup;
pub mod optimizer;
pub mod projection;
pub mod protocol;
pub mod selection;
pub mod squad;
pub mod transfers;

pub use error::OptimizeError;
pub use optimizer::{optimize, Snapshot};
