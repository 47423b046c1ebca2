mod attachment;
mod decorators;
mod forward;
mod jwk;
mod message;
mod problem_report;
mod types;

pub use attachment::*;
pub use decorators::*;
pub use forward::*;
pub use jwk::*;
pub use message::*;
pub use problem_report::*;
pub use types::*;
