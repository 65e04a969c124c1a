use crate::config::types::{CapturedFile, JudgeError, ReceiveRange, Result};
use crate::core::container::JailFilesystem;
use crate::exec::provision::ReceiveRequest;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Read `range` of a file; reads past the end are clamped
pub fn read_range(path: &Path, range: &ReceiveRange) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| JudgeError::file_io(path, e))?;
    file.seek(SeekFrom::Start(range.offset))
        .map_err(|e| JudgeError::file_io(path, e))?;

    let mut data = Vec::new();
    match range.size {
        Some(size) => file.take(size).read_to_end(&mut data),
        None => file.read_to_end(&mut data),
    }
    .map_err(|e| JudgeError::file_io(path, e))?;
    Ok(data)
}

/// Capture every requested file. Only call once the process group is gone.
pub fn capture_files(fs: &dyn JailFilesystem, requests: &[ReceiveRequest]) -> Result<Vec<CapturedFile>> {
    requests
        .iter()
        .map(|request| {
            let data = read_range(&fs.keep_in_root(&request.location), &request.range)?;
            Ok(CapturedFile {
                id: request.id.clone(),
                data,
            })
        })
        .collect()
}
