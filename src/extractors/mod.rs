pub mod claims;

pub use claims::{Claims, Locals, MapClaims};
