//! User module - profile rows and the billing fields mirrored onto them.

mod profile;

pub use profile::{normalize_email, Profile};
