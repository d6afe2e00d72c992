//! Учёт временных файлов прогона
//!
//! Озвучка и промежуточные дорожки живут до успешного экспорта,
//! после чего удаляются. Ошибки удаления только логируются.

use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Реестр временных файлов
#[derive(Debug, Default)]
pub struct ScratchFiles {
    files: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать файл для последующего удаления
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Удалить все файлы. Возвращает количество файлов, которые удалить не удалось
    pub fn cleanup(&mut self) -> usize {
        let mut failed = 0;
        for file in self.files.drain(..) {
            if let Err(e) = remove_quietly(&file) {
                warn!("Failed to delete temporary file {}: {}", file.display(), e);
                failed += 1;
            }
        }
        failed
    }
}

fn remove_quietly(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted temporary file {}", path.display());
            Ok(())
        }
        // Уже удалён кем-то ещё
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_tracked_files() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.mp3");
        let b = temp.path().join("b.mp3");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut scratch = ScratchFiles::new();
        scratch.track(&a);
        scratch.track(&b);
        scratch.track(&a);
        assert_eq!(scratch.len(), 2);

        assert_eq!(scratch.cleanup(), 0);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_missing_file_is_not_a_failure() {
        let temp = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFiles::new();
        scratch.track(temp.path().join("never-written.wav"));
        assert_eq!(scratch.cleanup(), 0);
    }

    #[test]
    fn test_undeletable_entry_is_counted() {
        let temp = tempfile::tempdir().unwrap();
        // каталог нельзя удалить через remove_file
        let dir = temp.path().join("dir.wav");
        std::fs::create_dir(&dir).unwrap();
        let mut scratch = ScratchFiles::new();
        scratch.track(&dir);
        assert_eq!(scratch.cleanup(), 1);
        assert!(dir.exists());
    }
}
