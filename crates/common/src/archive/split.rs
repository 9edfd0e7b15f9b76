use bytes::{Bytes, BytesMut};

use crate::store::VersionedStore;

use super::ArchiveError;

/// Marker at the start of the first part of a spanned zip archive
pub const SPANNING_SIGNATURE: [u8; 4] = *b"PK\x07\x08";

/// Part numbers are looked up at widths `1..=MAX_DIGITS`
const MAX_DIGITS: usize = 10;

/// Extension letters a part may use, in lookup order
const PART_PREFIXES: [char; 2] = ['z', 'Z'];

const EOCD_SIGNATURE: [u8; 4] = *b"PK\x05\x06";
const EOCD_LEN: usize = 22;
const ZIP64_LOCATOR_SIGNATURE: [u8; 4] = *b"PK\x06\x07";
const ZIP64_LOCATOR_LEN: usize = 20;
const CENTRAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
const CENTRAL_HEADER_LEN: usize = 46;

/// Url of part `n` of a split zip archive: the `.zip` extension
///  becomes `.<prefix><n>`, `n` zero-padded to `digits`, keeping any
///  query string
pub fn part_url(archive_url: &str, prefix: char, digits: usize, n: u64) -> Option<String> {
    let (path, query) = match archive_url.find('?') {
        Some(idx) => archive_url.split_at(idx),
        None => (archive_url, ""),
    };
    let cut = path.len().checked_sub(4)?;
    if !path.is_char_boundary(cut) || !path[cut..].eq_ignore_ascii_case(".zip") {
        return None;
    }
    Some(format!(
        "{}.{}{:0width$}{}",
        &path[..cut],
        prefix,
        n,
        query,
        width = digits
    ))
}

fn find_part(store: &VersionedStore, archive_url: &str, digits: usize, n: u64) -> Option<Bytes> {
    PART_PREFIXES.iter().find_map(|prefix| {
        let url = part_url(archive_url, *prefix, digits, n)?;
        store.open(&url).current_version().map(|v| v.content())
    })
}

/// Content of every stored part ahead of `archive_url`, in order. The
///  number width is found by looking up part one at each width; later
///  numbers widen once they outgrow it. The first missing part ends
///  the sequence.
pub fn stored_parts(store: &VersionedStore, archive_url: &str) -> Vec<Bytes> {
    let first = (1..=MAX_DIGITS)
        .find_map(|digits| find_part(store, archive_url, digits, 1).map(|part| (digits, part)));
    let Some((mut digits, first)) = first else {
        return Vec::new();
    };
    let mut parts = vec![first];
    for n in 2u64.. {
        if 10u64
            .checked_pow(digits as u32)
            .is_some_and(|limit| n >= limit)
        {
            digits += 1;
        }
        match find_part(store, archive_url, digits, n) {
            Some(part) => parts.push(part),
            None => break,
        }
    }
    parts
}

/// The logical archive behind `archive_url`: its stored parts chained
///  ahead of `last` and rebased into a single-disk zip. An archive with
///  no parts is returned as is, unless it carries the spanning marker.
pub fn join_parts(
    store: &VersionedStore,
    archive_url: &str,
    last: Bytes,
) -> Result<Bytes, ArchiveError> {
    let mut parts = stored_parts(store, archive_url);
    if parts.is_empty() && !last.starts_with(&SPANNING_SIGNATURE) {
        return Ok(last);
    }
    tracing::debug!(
        "Joining {} parts ahead of split archive {}",
        parts.len(),
        archive_url
    );
    parts.push(last);
    rebase(&parts)
}

fn split_error(message: &str) -> ArchiveError {
    ArchiveError::Split(message.to_string())
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn put_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Offset of the end-of-central-directory record, whose comment must
///  run exactly to the end of `data`
fn find_eocd(data: &[u8]) -> Option<usize> {
    let last = data.len().checked_sub(EOCD_LEN)?;
    let first = last.saturating_sub(u16::MAX as usize);
    (first..=last).rev().find(|&at| {
        data[at..].starts_with(&EOCD_SIGNATURE)
            && le_u16(data, at + 20).is_some_and(|len| at + EOCD_LEN + len as usize == data.len())
    })
}

/// Concatenate the disks of a spanned zip and rewrite the central
///  directory so every offset is relative to the joined bytes, with
///  the spanning marker dropped and all disk numbers zero
fn rebase(parts: &[Bytes]) -> Result<Bytes, ArchiveError> {
    let skip = match parts.first() {
        Some(first) if first.starts_with(&SPANNING_SIGNATURE) => SPANNING_SIGNATURE.len(),
        _ => 0,
    };
    let mut disk_starts = Vec::with_capacity(parts.len());
    let mut total = 0usize;
    for part in parts {
        disk_starts.push(total);
        total += part.len();
    }
    let mut data = BytesMut::with_capacity(total);
    for part in parts {
        data.extend_from_slice(part);
    }

    // absolute position in `data` of an offset on a given disk
    let locate = |disk: u16, offset: u32| -> Result<usize, ArchiveError> {
        let start = disk_starts
            .get(disk as usize)
            .ok_or_else(|| split_error("a part is missing"))?;
        let at = start + offset as usize;
        if at < skip || at > total {
            return Err(split_error("offset outside the joined parts"));
        }
        Ok(at)
    };
    let rebased = |at: usize| -> Result<u32, ArchiveError> {
        u32::try_from(at - skip).map_err(|_| split_error("joined archive needs zip64"))
    };

    let eocd = find_eocd(&data).ok_or_else(|| split_error("no end of central directory"))?;
    let zip64 = eocd
        .checked_sub(ZIP64_LOCATOR_LEN)
        .and_then(|at| data.get(at..))
        .is_some_and(|rest| rest.starts_with(&ZIP64_LOCATOR_SIGNATURE));
    if zip64 {
        return Err(split_error("zip64 split archives are not supported"));
    }
    let field16 = |at: usize| le_u16(&data, eocd + at).ok_or_else(|| split_error("short end record"));
    let cd_disk = field16(6)?;
    let entries = field16(10)?;
    let cd_offset = le_u32(&data, eocd + 16).ok_or_else(|| split_error("short end record"))?;
    if entries == u16::MAX || cd_offset == u32::MAX {
        return Err(split_error("zip64 split archives are not supported"));
    }
    let cd_start = locate(cd_disk, cd_offset)?;

    let mut at = cd_start;
    for _ in 0..entries {
        if !data.get(at..).is_some_and(|rest| rest.starts_with(&CENTRAL_HEADER_SIGNATURE)) {
            return Err(split_error("central directory entry not found"));
        }
        let header = |offset: usize| {
            le_u16(&data, at + offset).ok_or_else(|| split_error("short central directory entry"))
        };
        let disk = header(34)?;
        let name_len = header(28)? as usize;
        let extra_len = header(30)? as usize;
        let comment_len = header(32)? as usize;
        let local = le_u32(&data, at + 42)
            .ok_or_else(|| split_error("short central directory entry"))?;
        if disk == u16::MAX || local == u32::MAX {
            return Err(split_error("zip64 split archives are not supported"));
        }
        let local = rebased(locate(disk, local)?)?;
        put_u16(&mut data, at + 34, 0);
        put_u32(&mut data, at + 42, local);
        at += CENTRAL_HEADER_LEN + name_len + extra_len + comment_len;
    }

    put_u16(&mut data, eocd + 4, 0);
    put_u16(&mut data, eocd + 6, 0);
    put_u16(&mut data, eocd + 8, entries);
    put_u32(&mut data, eocd + 16, rebased(cd_start)?);
    Ok(data.freeze().slice(skip..))
}
