//! Profile-picture store on disk.

use std::io;
use std::path::{Path, PathBuf};

/// Directory name under the data dir, and the prefix of every recorded
/// relative path.
const PROFILE_PICS_DIR: &str = "profile_pics";

/// Writes avatar images under `<data_dir>/profile_pics/` and hands back the
/// relative path that goes into the message log.
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { root: data_dir.join(PROFILE_PICS_DIR) }
    }

    /// Create the directory if absent.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Write the avatar for a user and return the relative path,
    /// `profile_pics/<user_id>.jpg`, with forward slashes on every platform.
    pub fn store(&self, user_id: &str, bytes: &[u8]) -> io::Result<String> {
        self.ensure_dir()?;
        let filename = format!("{user_id}.jpg");
        std::fs::write(self.root.join(&filename), bytes)?;
        Ok(format!("{PROFILE_PICS_DIR}/{filename}"))
    }
}
