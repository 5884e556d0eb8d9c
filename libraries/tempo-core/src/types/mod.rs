//! Domain types shared by every Tempo crate

mod ids;
mod track;

pub use ids::TrackId;
pub use track::Track;
