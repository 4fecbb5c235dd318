//! Track bulletins read from a directory, one `<family>.txt` per family.
//!
//! Whatever drops the files there (a cron job, a feed client) is outside
//! navplan.

use nav_core::TrackFamily;
use nav_tracks::{TrackProvider, TransportError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DirectoryTrackProvider {
    dir: PathBuf,
}

impl DirectoryTrackProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bulletin_path(&self, family: TrackFamily) -> PathBuf {
        self.dir.join(format!("{}.txt", family.as_str()))
    }
}

impl TrackProvider for DirectoryTrackProvider {
    async fn fetch(&self, family: TrackFamily) -> Result<String, TransportError> {
        let path = self.bulletin_path(family);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| TransportError::new(family, format!("{}: {}", path.display(), err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_family_file() {
        let dir = std::env::temp_dir().join(format!("navplan-provider-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("pacots.txt"), "TRACK 1.\n KALNA ONEMO\n")
            .await
            .unwrap();

        let provider = DirectoryTrackProvider::new(&dir);
        let text = provider.fetch(TrackFamily::Pacots).await.unwrap();
        assert!(text.starts_with("TRACK 1."));

        let err = provider.fetch(TrackFamily::Ausots).await.unwrap_err();
        assert_eq!(err.family, TrackFamily::Ausots);
        assert!(err.message.contains("ausots.txt"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
