use std::io::{Cursor, Read};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use flate2::read::GzDecoder;

use super::{ArchiveError, ArchiveFormat};

/// One file inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub path: String,
    /// Uncompressed size
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Every file entry of a container, in archive order. `name` is the
///  container's own url or member path, used to name gzip members.
pub fn list(format: ArchiveFormat, data: &Bytes, name: &str) -> Result<Vec<EntryInfo>, ArchiveError> {
    match format {
        ArchiveFormat::Zip => zip_list(data),
        ArchiveFormat::Tar => tar_list(Cursor::new(data.clone())),
        ArchiveFormat::TarGz => tar_list(GzDecoder::new(Cursor::new(data.clone()))),
        ArchiveFormat::Gzip => {
            let (content, modified) = gzip_read(data)?;
            Ok(vec![EntryInfo {
                path: gzip_member_name(name),
                size: content.len() as u64,
                modified,
            }])
        }
    }
}

/// Content and metadata of the file at `path`, if present
pub fn extract(
    format: ArchiveFormat,
    data: &Bytes,
    name: &str,
    path: &str,
) -> Result<Option<(Bytes, EntryInfo)>, ArchiveError> {
    match format {
        ArchiveFormat::Zip => zip_extract(data, path),
        ArchiveFormat::Tar => tar_extract(Cursor::new(data.clone()), path, data.len()),
        ArchiveFormat::TarGz => {
            tar_extract(GzDecoder::new(Cursor::new(data.clone())), path, data.len())
        }
        ArchiveFormat::Gzip => {
            if gzip_member_name(name) != path {
                return Ok(None);
            }
            let (content, modified) = gzip_read(data)?;
            let info = EntryInfo {
                path: path.to_string(),
                size: content.len() as u64,
                modified,
            };
            Ok(Some((content, info)))
        }
    }
}

/// Whether the container holds a file at `path`. Only headers are
///  read; no entry body is decompressed.
pub fn contains(format: ArchiveFormat, data: &Bytes, name: &str, path: &str) -> Result<bool, ArchiveError> {
    match format {
        ArchiveFormat::Zip => {
            let archive = zip::ZipArchive::new(Cursor::new(data.clone()))?;
            Ok(!path.ends_with('/') && archive.index_for_name(path).is_some())
        }
        ArchiveFormat::Tar => tar_contains(Cursor::new(data.clone()), path),
        ArchiveFormat::TarGz => tar_contains(GzDecoder::new(Cursor::new(data.clone())), path),
        ArchiveFormat::Gzip => Ok(gzip_member_name(name) == path
            && GzDecoder::new(Cursor::new(data.clone())).header().is_some()),
    }
}

/// Read one entry body. The declared size comes from the archive and
///  is untrusted: the buffer hint never exceeds `hint_cap`, and a body
///  that does not match the declaration is an error.
fn read_body<R: Read>(mut reader: R, info: &EntryInfo, hint_cap: usize) -> Result<Bytes, ArchiveError> {
    let hint = usize::try_from(info.size).unwrap_or(usize::MAX).min(hint_cap);
    let mut content = Vec::with_capacity(hint);
    reader.read_to_end(&mut content)?;
    if content.len() as u64 != info.size {
        return Err(ArchiveError::SizeMismatch {
            path: info.path.clone(),
            declared: info.size,
            actual: content.len() as u64,
        });
    }
    Ok(Bytes::from(content))
}

fn zip_datetime(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32)?
        .and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32)
        .map(|naive| naive.and_utc())
}

fn zip_list(data: &Bytes) -> Result<Vec<EntryInfo>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data.clone()))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        entries.push(EntryInfo {
            path: file.name().to_string(),
            size: file.size(),
            modified: file.last_modified().and_then(zip_datetime),
        });
    }
    Ok(entries)
}

fn zip_extract(data: &Bytes, path: &str) -> Result<Option<(Bytes, EntryInfo)>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data.clone()))?;
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if file.is_dir() {
        return Ok(None);
    }
    let info = EntryInfo {
        path: file.name().to_string(),
        size: file.size(),
        modified: file.last_modified().and_then(zip_datetime),
    };
    let content = read_body(&mut file, &info, data.len())?;
    Ok(Some((content, info)))
}

fn tar_info<R: Read>(entry: &tar::Entry<'_, R>) -> Result<EntryInfo, ArchiveError> {
    let path = entry.path()?;
    let path = path.to_string_lossy();
    Ok(EntryInfo {
        path: path.trim_start_matches("./").to_string(),
        size: entry.header().size()?,
        modified: entry
            .header()
            .mtime()
            .ok()
            .and_then(|t| DateTime::from_timestamp(t as i64, 0)),
    })
}

fn tar_list<R: Read>(reader: R) -> Result<Vec<EntryInfo>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        entries.push(tar_info(&entry)?);
    }
    Ok(entries)
}

fn tar_contains<R: Read>(reader: R, path: &str) -> Result<bool, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_file() && tar_info(&entry)?.path == path {
            return Ok(true);
        }
    }
    Ok(false)
}

fn tar_extract<R: Read>(
    reader: R,
    path: &str,
    hint_cap: usize,
) -> Result<Option<(Bytes, EntryInfo)>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let info = tar_info(&entry)?;
        if info.path != path {
            continue;
        }
        let content = read_body(&mut entry, &info, hint_cap)?;
        return Ok(Some((content, info)));
    }
    Ok(None)
}

fn gzip_member_name(name: &str) -> String {
    let path = name.split('?').next().unwrap_or(name);
    let base = path.rsplit('/').next().unwrap_or(path);
    let cut = base.len().saturating_sub(3);
    if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".gz") {
        base[..cut].to_string()
    } else {
        base.to_string()
    }
}

fn gzip_read(data: &Bytes) -> Result<(Bytes, Option<DateTime<Utc>>), ArchiveError> {
    let mut decoder = GzDecoder::new(Cursor::new(data.clone()));
    let mut content = Vec::new();
    decoder.read_to_end(&mut content)?;
    let modified = decoder
        .header()
        .map(|header| header.mtime())
        .filter(|mtime| *mtime != 0)
        .and_then(|mtime| DateTime::from_timestamp(mtime as i64, 0));
    Ok((Bytes::from(content), modified))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::{gzip_bytes, tar_bytes, zip_bytes, ArchiveFixture};

    fn fixture() -> ArchiveFixture {
        ArchiveFixture::new()
            .file("a.html", "<html>a</html>")
            .file("dir/b.xml", "<b/>")
    }

    #[test]
    fn test_zip() {
        let data = zip_bytes(&fixture()).unwrap();
        let entries = list(ArchiveFormat::Zip, &data, "x.zip").unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.html", "dir/b.xml"]);
        assert_eq!(entries[0].size, 14);
        assert_eq!(entries[0].modified, Some(fixture().modified()));

        let (content, _) = extract(ArchiveFormat::Zip, &data, "x.zip", "dir/b.xml")
            .unwrap()
            .unwrap();
        assert_eq!(content, Bytes::from("<b/>"));
        assert!(extract(ArchiveFormat::Zip, &data, "x.zip", "nope").unwrap().is_none());
    }

    #[test]
    fn test_tar_and_tgz() {
        let data = tar_bytes(&fixture()).unwrap();
        let entries = list(ArchiveFormat::Tar, &data, "x.tar").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, "dir/b.xml");
        assert_eq!(entries[1].modified, Some(fixture().modified()));

        let gz = gzip_bytes(&data).unwrap();
        let (content, info) = extract(ArchiveFormat::TarGz, &gz, "x.tgz", "a.html")
            .unwrap()
            .unwrap();
        assert_eq!(content, Bytes::from("<html>a</html>"));
        assert_eq!(info.size, 14);
    }

    #[test]
    fn test_gzip_single_member() {
        let gz = gzip_bytes(b"hello").unwrap();
        let entries = list(ArchiveFormat::Gzip, &gz, "http://h/notes.txt.GZ").unwrap();
        assert_eq!(entries[0].path, "notes.txt");
        assert_eq!(entries[0].size, 5);
        assert!(extract(ArchiveFormat::Gzip, &gz, "http://h/notes.txt.gz", "other")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_contains() {
        let data = zip_bytes(&fixture()).unwrap();
        assert!(contains(ArchiveFormat::Zip, &data, "x.zip", "dir/b.xml").unwrap());
        assert!(!contains(ArchiveFormat::Zip, &data, "x.zip", "dir/").unwrap());
        assert!(!contains(ArchiveFormat::Zip, &data, "x.zip", "nope").unwrap());

        let tgz = gzip_bytes(tar_bytes(&fixture()).unwrap()).unwrap();
        assert!(contains(ArchiveFormat::TarGz, &tgz, "x.tgz", "a.html").unwrap());
        assert!(!contains(ArchiveFormat::TarGz, &tgz, "x.tgz", "b.xml").unwrap());

        let gz = gzip_bytes(b"hello").unwrap();
        assert!(contains(ArchiveFormat::Gzip, &gz, "http://h/n.txt.gz", "n.txt").unwrap());
        let junk = Bytes::from_static(b"not gzip");
        assert!(!contains(ArchiveFormat::Gzip, &junk, "http://h/n.txt.gz", "n.txt").unwrap());
    }

    #[test]
    fn test_forged_tar_size() {
        let mut header = tar::Header::new_gnu();
        header.set_size(1 << 50);
        header.set_mode(0o644);
        let mut builder = tar::Builder::new(Vec::new());
        builder
            .append_data(&mut header, "huge.bin", std::io::empty())
            .unwrap();
        let data = Bytes::from(builder.into_inner().unwrap());

        // the header alone answers existence
        assert!(contains(ArchiveFormat::Tar, &data, "x.tar", "huge.bin").unwrap());
        let err = extract(ArchiveFormat::Tar, &data, "x.tar", "huge.bin").unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::SizeMismatch {
                declared: 1_125_899_906_842_624,
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_zip() {
        let data = Bytes::from_static(b"definitely not a zip");
        assert!(list(ArchiveFormat::Zip, &data, "x.zip").is_err());
    }
}
