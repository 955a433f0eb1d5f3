use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tempfile::NamedTempFile;
use tessera_common::{Error, Result};

use crate::word::Word;

/// A temporary file mapped read-write, used as merge scratch space.
///
/// The file is named `sort-<start>-<end>-*.dat` and lives in the directory
/// passed to [`create`](Self::create). Dropping the guard unmaps and deletes it.
pub struct ScratchFile {
    map: Option<MmapMut>,
    file: Option<NamedTempFile>,
    words: usize,
}

impl ScratchFile {
    /// Creates a zero-filled scratch file holding `end - start` words of `W`.
    pub fn create<W: Word>(dir: &Path, start: u64, end: u64) -> Result<ScratchFile> {
        let words = end.saturating_sub(start) as usize;
        let bytes = words
            .checked_mul(W::SIZE)
            .ok_or_else(|| Error::invalid_arg("range", "scratch size overflows usize"))?;

        let file = tempfile::Builder::new()
            .prefix(&format!("sort-{start}-{end}-"))
            .suffix(".dat")
            .tempfile_in(dir)
            .map_err(|e| Error::io(dir.display().to_string(), e))?;
        file.as_file()
            .set_len(bytes as u64)
            .map_err(|e| Error::io(file.path().display().to_string(), e))?;

        let map = if bytes == 0 {
            None
        } else {
            // SAFETY: the file is private to this guard and outlives the mapping.
            let map = unsafe { MmapMut::map_mut(file.as_file()) }
                .map_err(|e| Error::io(file.path().display().to_string(), e))?;
            Some(map)
        };

        log::debug!("created scratch file {} ({bytes} bytes)", file.path().display());
        Ok(ScratchFile {
            map,
            file: Some(file),
            words,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path())
    }

    pub fn len(&self) -> usize {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    /// The mapped contents as words.
    ///
    /// # Panics
    ///
    /// Panics if `W` is not the word type the file was created for.
    pub fn words_mut<W: Word>(&mut self) -> &mut [W] {
        match self.map.as_mut() {
            Some(map) => bytemuck::cast_slice_mut(&mut map[..]),
            None => &mut [],
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // unmap before unlinking; some platforms refuse to delete mapped files
        drop(self.map.take());
        if let Some(file) = self.file.take() {
            let path: PathBuf = file.path().to_owned();
            match file.close() {
                Ok(()) => log::debug!("removed scratch file {}", path.display()),
                Err(e) => log::warn!("failed to remove scratch file {}: {e}", path.display()),
            }
        }
    }
}

impl std::fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchFile")
            .field("path", &self.path())
            .field("words", &self.words)
            .finish()
    }
}
