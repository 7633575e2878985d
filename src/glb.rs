//! GLB (binary glTF) container framing.
//!
//! Layout: 12-byte header (`glTF`, version 2, total length), then chunks of
//! `length | type | payload` padded to 4-byte alignment. The JSON chunk is
//! mandatory and first; at most one BIN chunk may follow.

use crate::error::{Error, Result};

pub const MAGIC: [u8; 4] = *b"glTF";
pub const VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
pub const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// A parsed GLB container: the JSON chunk payload and the optional BIN
/// chunk payload. Padding has already been accounted for but not stripped
/// from the payload slices (chunk lengths include it by construction).
#[derive(Debug)]
pub struct Glb {
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

/// True when the byte stream starts with the GLB magic.
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[0..4] == MAGIC
}

/// Split a GLB byte stream into its JSON and BIN chunks.
pub fn parse(bytes: &[u8]) -> Result<Glb> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::bad_container("file shorter than GLB header"));
    }
    if bytes[0..4] != MAGIC {
        return Err(Error::bad_container("magic is not 'glTF'"));
    }
    let version = read_u32(bytes, 4);
    if version != VERSION {
        return Err(Error::bad_container(format!(
            "unsupported GLB version {version}"
        )));
    }
    let total_length = read_u32(bytes, 8) as usize;
    if total_length != bytes.len() {
        return Err(Error::bad_container(format!(
            "header length {total_length} does not match file size {}",
            bytes.len()
        )));
    }

    let mut offset = HEADER_LEN;
    let mut json: Option<Vec<u8>> = None;
    let mut bin: Option<Vec<u8>> = None;

    while offset < bytes.len() {
        if bytes.len() - offset < CHUNK_HEADER_LEN {
            return Err(Error::bad_container("truncated chunk header"));
        }
        let chunk_length = read_u32(bytes, offset) as usize;
        let chunk_type = read_u32(bytes, offset + 4);
        let payload_start = offset + CHUNK_HEADER_LEN;
        let payload_end = payload_start
            .checked_add(chunk_length)
            .ok_or_else(|| Error::bad_container("chunk length overflow"))?;
        if payload_end > bytes.len() {
            return Err(Error::bad_container(format!(
                "chunk at offset {offset} overruns file ({chunk_length} bytes)"
            )));
        }
        if chunk_length % 4 != 0 {
            return Err(Error::bad_container(format!(
                "chunk length {chunk_length} is not 4-byte aligned"
            )));
        }

        match chunk_type {
            CHUNK_JSON => {
                if json.is_some() {
                    return Err(Error::bad_container("more than one JSON chunk"));
                }
                if bin.is_some() {
                    return Err(Error::bad_container("JSON chunk after BIN chunk"));
                }
                json = Some(bytes[payload_start..payload_end].to_vec());
            }
            CHUNK_BIN => {
                if json.is_none() {
                    return Err(Error::bad_container("first chunk is not JSON"));
                }
                if bin.is_some() {
                    return Err(Error::bad_container("more than one BIN chunk"));
                }
                bin = Some(bytes[payload_start..payload_end].to_vec());
            }
            // Unknown chunk types are skipped per the container spec.
            _ => {}
        }
        offset = payload_end;
    }

    let json = json.ok_or_else(|| Error::bad_container("missing JSON chunk"))?;
    Ok(Glb { json, bin })
}

/// Frame a JSON document and optional binary payload as GLB bytes.
///
/// The JSON chunk is padded with ASCII spaces, the BIN chunk with zeros,
/// both to 4-byte alignment.
pub fn assemble(json_bytes: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let json_chunk_length = json_bytes.len() + json_padding;

    let (bin_chunk_length, bin_padding) = match bin {
        Some(data) if !data.is_empty() => {
            let padding = (4 - (data.len() % 4)) % 4;
            (data.len() + padding, padding)
        }
        _ => (0, 0),
    };

    let mut total_length = HEADER_LEN + CHUNK_HEADER_LEN + json_chunk_length;
    if bin_chunk_length > 0 {
        total_length += CHUNK_HEADER_LEN + bin_chunk_length;
    }

    let mut glb = Vec::with_capacity(total_length);
    glb.extend_from_slice(&MAGIC);
    glb.extend_from_slice(&VERSION.to_le_bytes());
    glb.extend_from_slice(&(total_length as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_length as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat_n(0x20u8, json_padding));

    if bin_chunk_length > 0 {
        let data = bin.unwrap_or(&[]);
        glb.extend_from_slice(&(bin_chunk_length as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(data);
        glb.extend(std::iter::repeat_n(0u8, bin_padding));
    }

    glb
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_parse_roundtrip() {
        let json = br#"{"asset":{"version":"2.0"}}"#;
        let bin = [1u8, 2, 3];
        let glb = assemble(json, Some(&bin));

        assert!(is_glb(&glb));
        assert_eq!(read_u32(&glb, 8) as usize, glb.len());

        let parsed = parse(&glb).unwrap();
        assert_eq!(&parsed.json[..json.len()], json.as_slice());
        // JSON padding is ASCII spaces
        assert!(parsed.json[json.len()..].iter().all(|&b| b == 0x20));
        let bin_chunk = parsed.bin.unwrap();
        assert_eq!(&bin_chunk[..3], &bin);
        // BIN padding is zeros
        assert!(bin_chunk[3..].iter().all(|&b| b == 0));
        assert_eq!(bin_chunk.len() % 4, 0);
    }

    #[test]
    fn test_no_bin_chunk() {
        let glb = assemble(br#"{"asset":{"version":"2.0"}}"#, None);
        let parsed = parse(&glb).unwrap();
        assert!(parsed.bin.is_none());
    }

    #[test]
    fn test_bad_magic() {
        let err = parse(b"notglTF_0000").unwrap_err();
        assert!(matches!(err, Error::BadContainer { .. }));
    }

    #[test]
    fn test_bad_version() {
        let mut glb = assemble(br#"{}"#, None);
        glb[4] = 1;
        assert!(matches!(
            parse(&glb),
            Err(Error::BadContainer { .. })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let mut glb = assemble(br#"{}"#, None);
        glb.push(0);
        assert!(matches!(
            parse(&glb),
            Err(Error::BadContainer { .. })
        ));
    }

    #[test]
    fn test_bin_before_json_rejected() {
        let mut glb = Vec::new();
        glb.extend_from_slice(&MAGIC);
        glb.extend_from_slice(&VERSION.to_le_bytes());
        glb.extend_from_slice(&(12u32 + 8 + 4).to_le_bytes());
        glb.extend_from_slice(&4u32.to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            parse(&glb),
            Err(Error::BadContainer { .. })
        ));
    }
}
