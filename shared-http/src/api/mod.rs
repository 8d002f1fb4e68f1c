//! Request and response bodies exchanged with the host-management backend.

mod requests;
mod responses;

pub use requests::*;
pub use responses::*;
