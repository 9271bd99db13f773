//! Domain models for stored emails

mod email;

pub use email::{Email, EmailId, NewEmail};
