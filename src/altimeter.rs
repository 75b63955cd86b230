mod authorization;
mod data;
mod replay;
mod service;
mod simulated;
mod stream_task;

pub use authorization::*;
pub use data::*;
pub use replay::*;
pub use service::*;
pub use simulated::*;
