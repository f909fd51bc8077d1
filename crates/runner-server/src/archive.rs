use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0} was not a tar archive")]
    NotAnArchive(String),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract {path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn open(path: &Path) -> Result<tar::Archive<Box<dyn Read>>, ArchiveError> {
    let open_err = |source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_err)?;

    let mut magic = [0u8; 2];
    let is_gzip = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(_) => false,
    };
    file.seek(SeekFrom::Start(0)).map_err(open_err)?;

    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(tar::Archive::new(reader))
}

/// Walk every entry header. Plain and gzip-compressed tarballs are accepted;
/// an archive without entries is not.
pub fn validate(path: &Path) -> Result<usize, ArchiveError> {
    let not_archive = || ArchiveError::NotAnArchive(path.display().to_string());

    let mut archive = open(path)?;
    let entries = archive.entries().map_err(|_| not_archive())?;
    let mut count = 0usize;
    for entry in entries {
        let entry = entry.map_err(|_| not_archive())?;
        entry.path().map_err(|_| not_archive())?;
        count += 1;
    }
    if count == 0 {
        return Err(not_archive());
    }
    Ok(count)
}

/// Validate, then unpack into `dest`. Entries that would land outside `dest`
/// are skipped by the unpacker.
pub fn expand(path: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let entries = validate(path)?;
    open(path)?
        .unpack(dest)
        .map_err(|source| ArchiveError::Extract {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(archive = %path.display(), entries, "archive expanded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{plain_archive, project_archive};

    #[test]
    fn test_expand_gzip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.tar.gz");
        std::fs::write(&path, project_archive(&["proj"])).unwrap();

        expand(&path, dir.path()).unwrap();
        assert!(dir.path().join("proj/run.sh").is_file());
    }

    #[test]
    fn test_expand_uncompressed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.tar");
        std::fs::write(&path, plain_archive(&["proj"])).unwrap();

        assert_eq!(validate(&path).unwrap(), 2);
        expand(&path, dir.path()).unwrap();
        assert!(dir.path().join("proj/run.sh").is_file());
    }

    #[test]
    fn test_garbage_is_not_an_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.tar.gz");
        std::fs::write(&path, b"<html>404 not found</html>".repeat(40)).unwrap();
        assert!(matches!(validate(&path), Err(ArchiveError::NotAnArchive(_))));
    }

    #[test]
    fn test_empty_file_is_not_an_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.tar.gz");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(validate(&path), Err(ArchiveError::NotAnArchive(_))));
    }
}
