pub mod clock;
pub mod input;
pub mod osu_dir;
pub mod platform;
pub mod space;
