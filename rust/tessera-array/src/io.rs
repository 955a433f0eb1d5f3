//! Positional word transfer between files and arrays.

use std::{fs::File, io::Write};

use crate::word::Word;

/// Fills `words` from `file`, starting at word position `word_pos`.
pub fn read_words_at<W: Word>(file: &File, word_pos: u64, words: &mut [W]) -> std::io::Result<()> {
    let pos = word_pos * W::SIZE as u64;
    file_read_at_exact(file, pos, bytemuck::cast_slice_mut(words))
}

/// Appends `words` to `writer` as raw native-endian bytes.
pub fn write_words<W: Word>(writer: &mut impl Write, words: &[W]) -> std::io::Result<()> {
    writer.write_all(bytemuck::cast_slice(words))
}

#[cfg(unix)]
fn file_read_at_exact(file: &File, pos: u64, buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
fn file_read_at_exact(file: &File, mut pos: u64, mut buf: &mut [u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, pos)? {
            0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            n => {
                buf = &mut buf[n..];
                pos += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_words_at, write_words};

    #[test]
    fn test_write_then_read_at() {
        let mut file = tempfile::tempfile().unwrap();
        write_words(&mut file, &[10i32, 20, 30, 40, 50]).unwrap();

        let mut words = [0i32; 3];
        read_words_at(&file, 1, &mut words).unwrap();
        assert_eq!(words, [20, 30, 40]);

        let mut past_end = [0i32; 2];
        let err = read_words_at(&file, 4, &mut past_end).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
