use std::io::{Cursor, Write};

use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Files to pack into an in-memory archive. Every entry shares one
/// modification time, kept on an even second so zip's 2s resolution
/// round-trips it exactly.
#[derive(Debug, Clone)]
pub struct ArchiveFixture {
    files: Vec<(String, Bytes)>,
    modified: DateTime<Utc>,
}

impl Default for ArchiveFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFixture {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            modified: Utc
                .with_ymd_and_hms(2020, 1, 2, 3, 4, 6)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    pub fn file(mut self, path: &str, content: impl Into<Bytes>) -> Self {
        self.files.push((path.to_string(), content.into()));
        self
    }

    pub fn modified_at(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn files(&self) -> &[(String, Bytes)] {
        &self.files
    }
}

pub fn zip_bytes(fixture: &ArchiveFixture) -> anyhow::Result<Bytes> {
    let m = fixture.modified;
    let stamp = zip::DateTime::from_date_and_time(
        m.year() as u16,
        m.month() as u8,
        m.day() as u8,
        m.hour() as u8,
        m.minute() as u8,
        m.second() as u8,
    )
    .map_err(|e| anyhow::anyhow!("zip timestamp out of range: {e:?}"))?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(stamp);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, content) in &fixture.files {
        writer.start_file(path.as_str(), options)?;
        writer.write_all(content)?;
    }
    Ok(Bytes::from(writer.finish()?.into_inner()))
}

pub fn tar_bytes(fixture: &ArchiveFixture) -> anyhow::Result<Bytes> {
    let mut builder = tar::Builder::new(Vec::new());
    let mtime = u64::try_from(fixture.modified.timestamp()).context("mtime before epoch")?;
    for (path, content) in &fixture.files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_ref())?;
    }
    Ok(Bytes::from(builder.into_inner()?))
}

pub fn gzip_bytes(data: impl AsRef<[u8]>) -> anyhow::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_ref())?;
    Ok(Bytes::from(encoder.finish()?))
}
