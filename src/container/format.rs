//! Container file framing.
//!
//! | offset | field | size |
//! |--------|-------|------|
//! | 0 | magic `rab` | 3 bytes |
//! | 3 | header length | u32, little-endian |
//! | 7 | header document | header length |
//! | 7 + header length | data section | remainder |

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::catalog::Catalog;
use crate::codec::document;
use crate::error::RabError;

/// Magic marker opening every container file
pub const MAGIC: &[u8; 3] = b"rab";

/// Size of the magic marker plus the header length field
pub const PREAMBLE_SIZE: u64 = MAGIC.len() as u64 + 4;

/// Serialize the catalog into header bytes.
///
/// The YAML document is padded with a newline on both sides so the header
/// reads cleanly when the file is paged as text.
pub fn encode_header(catalog: &Catalog) -> Result<Vec<u8>, RabError> {
    let yaml = document::serialize_document(catalog)?;
    let mut header = String::with_capacity(yaml.len() + 2);
    header.push('\n');
    header.push_str(&yaml);
    header.push('\n');

    if u32::try_from(header.len()).is_err() {
        return Err(RabError::ValidationError(format!(
            "header of {} bytes exceeds the 4 GiB limit",
            header.len()
        )));
    }
    Ok(header.into_bytes())
}

/// Write magic, header length and header
pub fn write_preamble<W: Write>(writer: &mut W, header: &[u8]) -> Result<(), RabError> {
    let length = u32::try_from(header.len()).map_err(|_| {
        RabError::ValidationError(format!("header of {} bytes is too long", header.len()))
    })?;
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(length)?;
    writer.write_all(header)?;
    Ok(())
}

/// Parsed preamble of a container file
#[derive(Debug)]
pub struct Header {
    /// Entries described by the header document
    pub catalog: Catalog,
    /// Byte length of the header document
    pub header_length: u32,
}

impl Header {
    /// Absolute offset of the data section
    pub fn data_offset(&self) -> u64 {
        PREAMBLE_SIZE + u64::from(self.header_length)
    }
}

/// Read and parse the preamble; the magic is checked before anything else is read
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header, RabError> {
    let mut magic = [0u8; 3];
    reader.read_exact(&mut magic).map_err(|e| {
        RabError::FormatError(format!("file too short for the magic marker: {}", e))
    })?;
    if &magic != MAGIC {
        return Err(RabError::FormatError(format!(
            "bad magic marker {:02x?}, expected {:02x?}",
            magic, MAGIC
        )));
    }

    let header_length = reader.read_u32::<LittleEndian>().map_err(|e| {
        RabError::FormatError(format!("file too short for the header length: {}", e))
    })?;
    let mut header = vec![0u8; header_length as usize];
    reader.read_exact(&mut header).map_err(|e| {
        RabError::FormatError(format!(
            "file too short for a {} byte header: {}",
            header_length, e
        ))
    })?;

    let text = String::from_utf8(header)
        .map_err(|e| RabError::FormatError(format!("header is not valid UTF-8: {}", e)))?;
    let catalog: Catalog = document::parse_document(&text)?;

    Ok(Header {
        catalog,
        header_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DatasetEntry, StagedBlock};
    use crate::codec::{CodecMeta, Layout};
    use serde_json::json;
    use std::io::Cursor;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_entry(DatasetEntry::new(
                "greeting",
                json!({"lang": "en"}),
                CodecMeta::new(5, None, Layout::Text),
                StagedBlock::Staged("/staging/block-000000".into()),
            ))
            .unwrap();
        catalog.update_offsets();
        catalog
    }

    #[test]
    fn test_header_roundtrip() {
        let header = encode_header(&catalog()).unwrap();
        assert_eq!(header.first(), Some(&b'\n'));
        assert_eq!(header.last(), Some(&b'\n'));

        let mut file = Vec::new();
        write_preamble(&mut file, &header).unwrap();
        assert_eq!(&file[..3], b"rab");
        assert_eq!(
            u32::from_le_bytes([file[3], file[4], file[5], file[6]]) as usize,
            header.len()
        );

        let parsed = read_header(&mut Cursor::new(&file)).unwrap();
        assert_eq!(parsed.data_offset(), 7 + header.len() as u64);
        assert_eq!(parsed.catalog.list_datasets(), vec!["greeting"]);
        assert_eq!(
            parsed.catalog.get_metadata("greeting").unwrap(),
            &json!({"lang": "en"})
        );
    }

    #[test]
    fn test_bad_magic() {
        let result = read_header(&mut Cursor::new(b"PK\x03\x04\x00\x00\x00".to_vec()));
        assert!(matches!(result, Err(RabError::FormatError(_))));
    }

    #[test]
    fn test_json_header_accepted() {
        let header = br#"[{"name": "legacy", "metadata": {}, "codecMeta": {"type": "bytes", "byteOffset": 0, "byteLength": 3, "compression": null}}]"#;
        let mut file = Vec::new();
        write_preamble(&mut file, header).unwrap();

        let parsed = read_header(&mut Cursor::new(file)).unwrap();
        assert_eq!(parsed.catalog.get_dataset_type("legacy").unwrap(), "bytes");
    }

    #[test]
    fn test_truncated_header() {
        let mut file = Vec::new();
        file.extend_from_slice(MAGIC);
        file.extend_from_slice(&100u32.to_le_bytes());
        file.extend_from_slice(b"- short");

        let result = read_header(&mut Cursor::new(file));
        assert!(matches!(result, Err(RabError::FormatError(_))));
    }
}
