pub mod input;
mod message;
mod profile;

pub use message::TimelineEntry;
pub use profile::{Followee, Profile};
