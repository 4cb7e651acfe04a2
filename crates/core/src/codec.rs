//! Compact export format for documentation sets.
//!
//! A file is one envelope tag byte followed by a length-prefixed payload:
//!
//! ```text
//! 0x00 | u32 LE json length | json
//! 0x01 | u32 LE json length | lz4 block
//! ```
//!
//! The JSON is an array of compact records with single-letter keys:
//! `{ "a": id, "b"?: body, "c"?: [{ "a": id, "b": body }] }`. Absent optional
//! fields are omitted rather than written as `null`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::CodecError;
use crate::models::{ClassDocumentation, MemberDocumentation};

/// Content type declared for exported files.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Default file extension for exported files.
pub const FILE_EXTENSION: &str = "docs";

const TAG_RAW: u8 = 0x00;
const TAG_LZ4: u8 = 0x01;
const LENGTH_PREFIX: usize = 4;

/// Payload compression applied by [`encode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Lz4,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Lz4 => write!(f, "lz4"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ClassRecord {
    a: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    b: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    c: Option<Vec<MemberRecord>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MemberRecord {
    a: u64,
    b: String,
}

impl From<&ClassDocumentation> for ClassRecord {
    fn from(doc: &ClassDocumentation) -> Self {
        let c = doc
            .functions
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| {
                f.iter()
                    .map(|m| MemberRecord {
                        a: m.id,
                        b: m.body.clone(),
                    })
                    .collect()
            });
        Self {
            a: doc.id,
            b: doc.body.clone(),
            c,
        }
    }
}

impl From<ClassRecord> for ClassDocumentation {
    fn from(record: ClassRecord) -> Self {
        ClassDocumentation {
            id: record.a,
            body: record.b,
            functions: record.c.map(|members| {
                members
                    .into_iter()
                    .map(|m| MemberDocumentation { id: m.a, body: m.b })
                    .collect()
            }),
        }
        .normalized()
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serialize `records` into a portable byte buffer.
pub fn encode(
    records: &[ClassDocumentation],
    compression: Compression,
) -> Result<Vec<u8>, CodecError> {
    let wire: Vec<ClassRecord> = records
        .iter()
        .filter(|r| !r.is_empty())
        .map(ClassRecord::from)
        .collect();
    let json = serde_json::to_vec(&wire).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let mut out = Vec::with_capacity(json.len() + LENGTH_PREFIX + 1);
    match compression {
        Compression::None => {
            out.push(TAG_RAW);
            out.extend_from_slice(&(json.len() as u32).to_le_bytes());
            out.extend_from_slice(&json);
        }
        Compression::Lz4 => {
            out.push(TAG_LZ4);
            out.extend_from_slice(&lz4_flex::compress_prepend_size(&json));
        }
    }

    debug!(
        records = wire.len(),
        json_bytes = json.len(),
        encoded_bytes = out.len(),
        %compression,
        "encoded documentation set"
    );
    Ok(out)
}

/// Parse a buffer produced by [`encode`]. Records are normalized and records
/// carrying no information are dropped. A repeated class id, or a repeated
/// member id within one class, is rejected as malformed.
pub fn decode(bytes: &[u8]) -> Result<Vec<ClassDocumentation>, CodecError> {
    let (&tag, payload) = bytes
        .split_first()
        .ok_or_else(|| CodecError::Malformed("empty file".into()))?;

    let json = match tag {
        TAG_RAW => {
            let expected = read_length(payload)? as usize;
            let body = &payload[LENGTH_PREFIX..];
            if body.len() != expected {
                return Err(CodecError::Truncated {
                    expected,
                    actual: body.len(),
                });
            }
            body.to_vec()
        }
        TAG_LZ4 => {
            read_length(payload)?;
            lz4_flex::decompress_size_prepended(payload)
                .map_err(|e| CodecError::Malformed(format!("decompression failed: {e}")))?
        }
        other => return Err(CodecError::UnknownEnvelope(other)),
    };

    let wire: Vec<ClassRecord> =
        serde_json::from_slice(&json).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let records: Vec<ClassDocumentation> =
        wire.into_iter().map(ClassDocumentation::from).collect();
    check_unique_ids(&records)?;
    let records: Vec<ClassDocumentation> = records.into_iter().filter(|r| !r.is_empty()).collect();
    debug!(records = records.len(), "decoded documentation set");
    Ok(records)
}

/// Fail when a class id repeats, or a member id repeats within one class.
pub fn check_unique_ids(records: &[ClassDocumentation]) -> Result<(), CodecError> {
    let mut classes = HashSet::with_capacity(records.len());
    for record in records {
        if !classes.insert(record.id) {
            return Err(CodecError::Malformed(format!(
                "class {} appears more than once",
                record.id
            )));
        }
        let mut members = HashSet::new();
        if let Some(member) = record.members().iter().find(|m| !members.insert(m.id)) {
            return Err(CodecError::Malformed(format!(
                "member {} appears more than once in class {}",
                member.id, record.id
            )));
        }
    }
    Ok(())
}

fn read_length(payload: &[u8]) -> Result<u32, CodecError> {
    let prefix: [u8; LENGTH_PREFIX] = payload
        .get(..LENGTH_PREFIX)
        .and_then(|p| p.try_into().ok())
        .ok_or(CodecError::Truncated {
            expected: LENGTH_PREFIX,
            actual: payload.len(),
        })?;
    Ok(u32::from_le_bytes(prefix))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Encode `records` and write them to `path`.
pub fn write_file(
    path: &Path,
    records: &[ClassDocumentation],
    compression: Compression,
) -> Result<(), CodecError> {
    let bytes = encode(records, compression)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote documentation file");
    Ok(())
}

/// Read and decode the file at `path`.
pub fn read_file(path: &Path) -> Result<Vec<ClassDocumentation>, CodecError> {
    let bytes = std::fs::read(path)?;
    info!(path = %path.display(), bytes = bytes.len(), "read documentation file");
    decode(&bytes)
}
