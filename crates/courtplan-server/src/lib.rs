// courtplan-server: HTTP front for the optimization core.

pub mod http;
pub mod source;
