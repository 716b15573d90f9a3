use crate::core::osu_dir::OsuInstall;
use crate::game::beatmap::Beatmap;
use crate::game::parsing::osu_file::parse_osu_file;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

static FORBIDDEN_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex"));
static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    DirectoryNotFound(PathBuf),
    FolderNotFound(String),
    DifficultyNotFound(String),
    Io(String),
    Empty,
}

impl LocateError {
    /// Conditions worth backing off on instead of re-probing every poll.
    pub fn is_directory_missing(&self) -> bool {
        matches!(self, Self::DirectoryNotFound(_))
    }
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryNotFound(p) => write!(f, "CRITICAL: osu! directory not found ({})", p.display()),
            Self::FolderNotFound(t) => write!(f, "Beatmap folder not found for '{}'", t),
            Self::DifficultyNotFound(d) => write!(f, "Beatmap file not found for difficulty '{}'", d),
            Self::Io(e) => write!(f, "Beatmap could not be read: {}", e),
            Self::Empty => write!(f, "Beatmap has no hit objects"),
        }
    }
}

impl std::error::Error for LocateError {}

/// Resolves a foreground window title to parsed beatmap data.
pub trait BeatmapSource {
    fn locate_and_parse(&self, beatmap_title: &str) -> Result<Beatmap, LocateError>;
}

pub fn clean_filename(name: &str) -> String {
    FORBIDDEN_FILENAME_CHARS.replace_all(name, "").into_owned()
}

pub fn simplify_string(text: &str) -> String {
    NON_ALNUM.replace_all(&text.to_lowercase(), "").into_owned()
}

/// `osu!  - Artist - Title [Diff]` → `Some("Artist - Title [Diff]")`.
pub fn beatmap_title_from_window(title: &str) -> Option<&str> {
    if !title.starts_with("osu!") {
        return None;
    }
    title.split_once(" - ").map(|(_, rest)| rest)
}

/// Looks beatmaps up under `<songs_dir>/<id Artist - Title>/<... [Diff]>.osu`.
pub struct SongsFolder {
    songs_dir: PathBuf,
}

impl SongsFolder {
    pub fn new(songs_dir: PathBuf) -> Self {
        Self { songs_dir }
    }

    fn find_folder(&self, simplified_title: &str) -> Result<PathBuf, LocateError> {
        let entries = fs::read_dir(&self.songs_dir).map_err(|e| LocateError::Io(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let folder_name = entry.file_name().to_string_lossy().into_owned();
            let title_part = folder_name.split_once(' ').map_or(folder_name.as_str(), |(_, rest)| rest);
            let simplified = simplify_string(title_part);
            if !simplified.is_empty() && simplified_title.contains(&simplified) {
                info!("Found potential folder: {}", folder_name);
                return Ok(path);
            }
        }
        Err(LocateError::FolderNotFound(simplified_title.to_string()))
    }

    fn find_difficulty_file(folder: &Path, difficulty_part: &str) -> Result<PathBuf, LocateError> {
        let simplified_difficulty = simplify_string(difficulty_part);
        let entries = fs::read_dir(folder).map_err(|e| LocateError::Io(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_osu = path.extension().and_then(|s| s.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("osu"));
            if !is_osu {
                continue;
            }
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            if simplify_string(&stem).ends_with(&simplified_difficulty) {
                info!("Found .osu file: {}", path.display());
                return Ok(path);
            }
        }
        Err(LocateError::DifficultyNotFound(difficulty_part.to_string()))
    }
}

impl BeatmapSource for SongsFolder {
    fn locate_and_parse(&self, beatmap_title: &str) -> Result<Beatmap, LocateError> {
        info!("Beatmap detected: {}", beatmap_title);
        if !self.songs_dir.is_dir() {
            warn!("Songs directory not found at '{}'", self.songs_dir.display());
            return Err(LocateError::DirectoryNotFound(self.songs_dir.clone()));
        }

        let cleaned = clean_filename(beatmap_title);
        let Some(diff_start) = cleaned.rfind('[') else {
            debug!("Title '{}' carries no [difficulty] part", cleaned);
            return Err(LocateError::DifficultyNotFound(cleaned));
        };

        let folder = self.find_folder(&simplify_string(&cleaned))?;
        let file = Self::find_difficulty_file(&folder, &cleaned[diff_start..])?;
        let beatmap = parse_osu_file(&file).map_err(LocateError::Io)?;
        if beatmap.hit_objects.is_empty() {
            return Err(LocateError::Empty);
        }
        Ok(beatmap)
    }
}

impl BeatmapSource for OsuInstall {
    fn locate_and_parse(&self, beatmap_title: &str) -> Result<Beatmap, LocateError> {
        let Some(dir) = self.directory() else {
            return Err(LocateError::DirectoryNotFound(PathBuf::from("osu!")));
        };
        SongsFolder::new(dir.join("Songs")).locate_and_parse(beatmap_title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "[Difficulty]\nApproachRate:8\n[HitObjects]\n256,192,1000,1,0\n";

    fn songs_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("123456 Camellia - Exit This Earth's Atomosphere");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("Camellia - Exit This Earth's Atomosphere (Mapper) [Normal].osu"), MAP).unwrap();
        fs::write(folder.join("Camellia - Exit This Earth's Atomosphere (Mapper) [Extra].osu"), MAP).unwrap();
        fs::write(folder.join("notes.txt"), "not a beatmap").unwrap();
        dir
    }

    #[test]
    fn string_normalisation() {
        assert_eq!(clean_filename("a<b>c:d\"e/f\\g|h?i*j"), "abcdefghij");
        assert_eq!(simplify_string("Exit This Earth's [Extra]!"), "exitthisearthsextra");
    }

    #[test]
    fn window_title_detection() {
        assert_eq!(beatmap_title_from_window("osu!  - Artist - Song [Hard]"), Some("Artist - Song [Hard]"));
        assert_eq!(beatmap_title_from_window("osu!"), None);
        assert_eq!(beatmap_title_from_window("Notepad - file.txt"), None);
    }

    #[test]
    fn locates_matching_difficulty() {
        let dir = songs_fixture();
        let songs = SongsFolder::new(dir.path().to_path_buf());
        let map = songs
            .locate_and_parse("Camellia - Exit This Earth's Atomosphere [Extra]")
            .expect("difficulty should resolve");
        assert_eq!(map.difficulty.approach_rate, 8.0);
        assert_eq!(map.hit_objects.len(), 1);
    }

    #[test]
    fn reports_each_failure_kind() {
        let dir = songs_fixture();
        let songs = SongsFolder::new(dir.path().to_path_buf());
        assert!(matches!(
            songs.locate_and_parse("Camellia - Exit This Earth's Atomosphere [Insane]"),
            Err(LocateError::DifficultyNotFound(_))
        ));
        assert!(matches!(songs.locate_and_parse("Somebody - Else [Easy]"), Err(LocateError::FolderNotFound(_))));

        let missing = SongsFolder::new(dir.path().join("nope"));
        let err = missing.locate_and_parse("A - B [C]").unwrap_err();
        assert!(err.is_directory_missing());
        assert!(err.to_string().starts_with("CRITICAL"));
    }

    #[test]
    fn empty_beatmap_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("1 A - B");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("A - B [C].osu"), "[HitObjects]\n").unwrap();
        let songs = SongsFolder::new(dir.path().to_path_buf());
        assert_eq!(songs.locate_and_parse("A - B [C]"), Err(LocateError::Empty));
    }
}
