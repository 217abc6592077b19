pub mod access;
pub mod controller;

pub use access::apply;
pub use controller::{JwtAuth, Outcome};
