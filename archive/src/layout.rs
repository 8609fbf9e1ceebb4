use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use meridian_primitives::Epoch;

/// The three files making up one stored epoch.
#[derive(Clone, Debug)]
pub(crate) struct EpochFiles {
    pub epoch: PathBuf,
    pub primary: PathBuf,
    pub secondary: PathBuf,
}

impl EpochFiles {
    pub fn all(&self) -> [&Path; 3] {
        [&self.epoch, &self.primary, &self.secondary]
    }

    pub fn complete(&self) -> bool {
        self.all().iter().all(|path| path.is_file())
    }

    /// Deletes whichever of the three files exist.
    pub fn remove(&self) -> io::Result<()> {
        for path in self.all() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

/// Paths of the file triple of an epoch. Epoch numbers are rendered as
/// 8-digit zero-padded decimal.
pub(crate) fn epoch_files(root: &Path, epoch: Epoch) -> EpochFiles {
    let base = format!("{:08}", epoch.as_u64());
    EpochFiles {
        epoch: root.join(format!("{base}.epoch")),
        primary: root.join(format!("{base}.primary")),
        secondary: root.join(format!("{base}.secondary")),
    }
}

fn parse_file_name(name: &str) -> Option<Epoch> {
    let (stem, extension) = name.split_once('.')?;
    if !matches!(extension, "epoch" | "primary" | "secondary") {
        return None;
    }
    if stem.len() != 8 {
        return None;
    }
    stem.parse::<u64>().ok().map(Epoch::new)
}

/// All epochs for which at least one of the three files exists, ascending.
pub(crate) fn list_epochs(root: &Path) -> io::Result<Vec<Epoch>> {
    let mut epochs = BTreeSet::new();
    for dir_entry in fs::read_dir(root)? {
        let dir_entry = dir_entry?;
        if let Some(epoch) = dir_entry.file_name().to_str().and_then(parse_file_name) {
            epochs.insert(epoch);
        }
    }
    Ok(epochs.into_iter().collect())
}

pub(crate) fn file_size(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Reads exactly `length` bytes starting at `offset`.
pub(crate) fn read_exact_at(path: &Path, offset: u64, length: usize) -> io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use meridian_test_log::test;

    use super::*;

    #[test]
    fn it_renders_and_parses_file_names() {
        let files = epoch_files(Path::new("/db"), Epoch::new(7));
        assert_eq!(files.epoch, Path::new("/db/00000007.epoch"));
        assert_eq!(files.primary, Path::new("/db/00000007.primary"));
        assert_eq!(files.secondary, Path::new("/db/00000007.secondary"));

        assert_eq!(parse_file_name("00000007.epoch"), Some(Epoch::new(7)));
        assert_eq!(parse_file_name("00000123.secondary"), Some(Epoch::new(123)));
        assert_eq!(parse_file_name("123.epoch"), None);
        assert_eq!(parse_file_name("00000007.tmp"), None);
        assert_eq!(parse_file_name("lock"), None);
    }
}
