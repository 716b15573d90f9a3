pub mod locate;
pub mod osu_file;
