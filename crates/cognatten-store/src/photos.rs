//! Reference photo storage.
//!
//! One JPEG per student, named `<student id>.jpg` under a single
//! directory. The file name is the only link back to the roster, so
//! removing a student must also remove the photo or the gallery loader
//! will keep matching against a ghost entry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    /// Open the photo directory, creating it if missing.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, student_id: &str) -> PathBuf {
        self.root.join(format!("{student_id}.jpg"))
    }

    pub fn exists(&self, student_id: &str) -> bool {
        self.path_for(student_id).is_file()
    }

    /// Write a student's reference photo, replacing any previous one.
    pub fn save(&self, student_id: &str, jpeg: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(student_id);
        fs::write(&path, jpeg)?;
        tracing::debug!(student_id, path = %path.display(), "saved reference photo");
        Ok(path)
    }

    pub fn load(&self, student_id: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(student_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Remove a student's photo. Missing files are not an error.
    pub fn remove(&self, student_id: &str) -> io::Result<bool> {
        match fs::remove_file(self.path_for(student_id)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Every stored photo as `(student id, path)`, for gallery loading.
    /// Non-jpg entries in the directory are skipped.
    pub fn list(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut photos = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                photos.push((stem.to_string(), path.clone()));
            }
        }
        photos.sort();
        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path().join("faces")).unwrap();

        assert!(!store.exists("81712345"));
        store.save("81712345", b"not really a jpeg").unwrap();
        assert!(store.exists("81712345"));
        assert_eq!(
            store.load("81712345").unwrap().unwrap(),
            b"not really a jpeg"
        );

        assert!(store.remove("81712345").unwrap());
        assert!(!store.remove("81712345").unwrap());
        assert!(store.load("81712345").unwrap().is_none());
    }

    #[test]
    fn test_list_skips_non_jpg() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::open(dir.path()).unwrap();
        store.save("81711111", b"a").unwrap();
        store.save("81722222", b"b").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let listed = store.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["81711111", "81722222"]);
    }
}
