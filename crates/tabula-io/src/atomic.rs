//! Replace-by-rename file writes.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ReadError;

/// Writes through `fill` into a temporary sibling of `path`, syncs it and
/// renames it over `path`. Readers see either the old or the new file.
pub(crate) fn write_atomically<F>(path: &Path, fill: F) -> Result<(), ReadError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ReadError>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ReadError::io(parent, e))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), ReadError> {
        let file = File::create(&tmp_path).map_err(|e| ReadError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        fill(&mut writer)?;
        writer.flush().map_err(|e| ReadError::io(&tmp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| ReadError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| ReadError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        ReadError::io(path, format!("rename from {}: {e}", tmp_path.display()))
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| ReadError::io(parent, e))?;
        dir.sync_all().map_err(|e| ReadError::io(parent, e))?;
    }
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_path(prefix: &str, extension: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "tabula-io-{prefix}-{}-{unique}.{extension}",
            std::process::id()
        ))
    }

    #[test]
    fn replaces_file_contents() {
        let path = temp_path("atomic", "txt");
        write_atomically(&path, |w| {
            w.write_all(b"first").map_err(|e| ReadError::io(&path, e))
        })
        .expect("first write");
        write_atomically(&path, |w| {
            w.write_all(b"second").map_err(|e| ReadError::io(&path, e))
        })
        .expect("second write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn failed_fill_leaves_target_untouched() {
        let path = temp_path("atomic-fail", "txt");
        fs::write(&path, "kept").expect("fixture");
        let result = write_atomically(&path, |_| Err(ReadError::Serialize("boom".into())));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).expect("read"), "kept");
        let _ = fs::remove_file(path);
    }
}
