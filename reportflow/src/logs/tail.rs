//! Bounded reads of the end of a log file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Returns at most the last `max_bytes` bytes of `path`, decoded lossily.
///
/// When the file is longer than `max_bytes` the cut lands inside the file.
/// If it falls mid-line, everything up to and including the next newline is
/// dropped, so the result always starts at a line boundary. A cut with no
/// newline after it yields an empty string. A missing file reads as empty.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn tail_file(path: &Path, max_bytes: usize) -> io::Result<String> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e),
    };

    let size = file.metadata()?.len();
    let max = u64::try_from(max_bytes).unwrap_or(u64::MAX);

    if size <= max {
        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
        file.read_to_end(&mut buf)?;
        return Ok(String::from_utf8_lossy(&buf).into_owned());
    }

    // Read one byte before the cut to learn whether it is a line start.
    let start = size - max;
    file.seek(SeekFrom::Start(start - 1))?;
    let mut buf = Vec::with_capacity(max_bytes.saturating_add(1));
    file.read_to_end(&mut buf)?;

    let Some((&before, rest)) = buf.split_first() else {
        return Ok(String::new());
    };
    let kept = if before == b'\n' {
        rest
    } else {
        match rest.iter().position(|&b| b == b'\n') {
            Some(i) => &rest[i + 1..],
            None => &[],
        }
    };

    Ok(String::from_utf8_lossy(kept).into_owned())
}
