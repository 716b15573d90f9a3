pub mod beatmap;
pub mod geometry;
pub mod mods;
pub mod parsing;
pub mod pilot;
pub mod status;
pub mod stream;
pub mod timing;
pub mod trajectory;
