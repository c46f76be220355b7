//! Integration tests for the .rab container format
//!
//! These tests verify:
//! 1. Element access on written arrays
//! 2. Array and metadata round trips
//! 3. Dataframe columns survive narrowing and compression
//! 4. Files added by path are copied byte for byte
//! 5. Compressed arrays refuse element access
//! 6. Foreign files are rejected by their magic marker

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, RecordBatch,
    StringArray, UInt8Array,
};
use arrow::datatypes::{Float32Type, Float64Type, Int32Type, UInt8Type};
use ndarray::{array, Array2};
use rab::prelude::*;
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::tempdir;

fn sha256_file(path: &std::path::Path) -> String {
    let mut bytes = Vec::new();
    File::open(path).unwrap().read_to_end(&mut bytes).unwrap();
    hex::encode(Sha256::digest(&bytes))
}

fn sample_dataframe(rows: usize) -> RecordBatch {
    let words = ["alpha", "βeta", "gamma", "", "δέλτα"];
    RecordBatch::try_from_iter(vec![
        (
            "some_uint8",
            Arc::new(UInt8Array::from_iter_values((0..rows).map(|i| (i % 256) as u8))) as ArrayRef,
        ),
        (
            "some_float64",
            Arc::new(Float64Array::from_iter_values((0..rows).map(|i| i as f64 / 3.0))) as ArrayRef,
        ),
        (
            "some_float32",
            Arc::new(Float32Array::from_iter_values((0..rows).map(|i| i as f32 * 0.5))) as ArrayRef,
        ),
        (
            "some_int32",
            Arc::new(Int32Array::from_iter_values(
                (0..rows).map(|i| i as i32 * 7 - 3000),
            )) as ArrayRef,
        ),
        (
            "some_bool",
            Arc::new(BooleanArray::from(
                (0..rows).map(|i| i % 3 == 0).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
        (
            "some_str",
            Arc::new(StringArray::from(
                (0..rows).map(|i| words[i % words.len()]).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
    ])
    .unwrap()
}

#[test]
fn test_dig_single_element() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wee.rab");

    let mut container = RandomAccessBuffer::new();
    container
        .add_numerical_array(
            "my wee array",
            array![10i32, 11, 12, 13, 14, 15, 16, 17],
            json!(null),
            AddOptions::default(),
        )
        .unwrap();
    container.write(&path).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    assert_eq!(reader.dig_element("my wee array", 3).unwrap(), Scalar::Int32(13));
}

#[test]
fn test_array_and_metadata_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.rab");
    let grid = Array2::from_shape_fn((2, 8), |(i, j)| (i * 8 + j) as i32 - 5);
    let metadata = json!({"description": "a 2 by 8 grid", "tags": ["x", "y"], "scale": 0.5});

    let mut container = RandomAccessBuffer::new();
    container
        .add_numerical_array("grid", grid.clone(), metadata.clone(), AddOptions::default())
        .unwrap();
    container.write(&path).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    let (dataset, read_metadata) = reader.get_dataset("grid").unwrap();
    let array = dataset.as_numerical().unwrap().as_array::<i32>().unwrap();

    assert_eq!(array.shape(), &[2, 8]);
    assert_eq!(array, &grid.into_dyn());
    assert_eq!(read_metadata, metadata);
    assert_eq!(reader.get_dataset_type("grid").unwrap(), "int32");
}

#[test]
fn test_compressed_dataframe_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frame.rab");
    let frame = sample_dataframe(1000);

    let mut container = RandomAccessBuffer::new();
    container
        .add_dataframe("exact", frame.clone(), json!({"rows": 1000}), AddOptions::compressed())
        .unwrap();
    container
        .add_dataframe(
            "narrow",
            frame.clone(),
            json!(null),
            AddOptions::compressed().with_narrow_floats(true),
        )
        .unwrap();
    for (name, narrow_floats) in [("exact raw", false), ("narrow raw", true)] {
        container
            .add_dataframe(
                name,
                frame.clone(),
                json!(null),
                AddOptions::default().with_narrow_floats(narrow_floats),
            )
            .unwrap();
    }
    container.write(&path).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    assert_eq!(reader.get_dataset_type("exact").unwrap(), "dataframe");

    let (exact, metadata) = reader.get_dataset("exact").unwrap();
    assert_eq!(exact.as_dataframe().unwrap(), &frame);
    assert_eq!(metadata, json!({"rows": 1000}));

    let (narrow, _) = reader.get_dataset("narrow").unwrap();
    let narrow = narrow.as_dataframe().unwrap();
    assert_eq!(narrow.schema(), frame.schema());
    for name in ["some_uint8", "some_float32", "some_int32", "some_bool", "some_str"] {
        assert_eq!(
            narrow.column_by_name(name).unwrap().as_ref(),
            frame.column_by_name(name).unwrap().as_ref(),
            "column {}",
            name
        );
    }

    let original = frame.column_by_name("some_float64").unwrap().as_primitive::<Float64Type>();
    let narrowed = narrow.column_by_name("some_float64").unwrap().as_primitive::<Float64Type>();
    for row in 0..original.len() {
        assert_eq!(narrowed.value(row), original.value(row) as f32 as f64);
    }

    // The narrowed frame stores float64 as float32
    let stored_length = |name: &str| reader.catalog().entry(name).unwrap().codec_meta.byte_length;
    assert_eq!(stored_length("exact raw") - stored_length("narrow raw"), 4 * 1000);
    let (narrow_raw, _) = reader.get_dataset("narrow raw").unwrap();
    assert_eq!(narrow_raw.as_dataframe().unwrap(), narrow);
    let ints = narrow.column_by_name("some_int32").unwrap().as_primitive::<Int32Type>();
    assert_eq!(ints.value(0), -3000);
    assert_eq!(narrow.column_by_name("some_uint8").unwrap().as_primitive::<UInt8Type>().value(255), 255);
    assert_eq!(narrow.column_by_name("some_float32").unwrap().as_primitive::<Float32Type>().value(3), 1.5);
}

#[test]
fn test_file_payload_checksums() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("files.rab");

    let sources: Vec<_> = (0..3)
        .map(|index| {
            let source = dir.path().join(format!("payload-{}.bin", index));
            let content: Vec<u8> = (0..(1000 * (index + 1)))
                .map(|i| ((i * 31 + index * 7) % 251) as u8)
                .collect();
            std::fs::write(&source, content).unwrap();
            source
        })
        .collect();

    let mut container = RandomAccessBuffer::with_config(ContainerConfig::low_memory());
    for (index, source) in sources.iter().enumerate() {
        container
            .add_file(
                &format!("file {}", index),
                source,
                json!({"origin": source.file_name().unwrap().to_string_lossy()}),
            )
            .unwrap();
    }
    container.write(&path).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    for (index, source) in sources.iter().enumerate() {
        let name = format!("file {}", index);
        let (dataset, metadata) = reader.get_dataset(&name).unwrap();
        let extracted = dir.path().join(format!("extracted-{}.bin", index));
        std::fs::write(&extracted, dataset.as_bytes().unwrap()).unwrap();

        assert_eq!(sha256_file(&extracted), sha256_file(source));
        assert_eq!(
            metadata["origin"],
            json!(format!("payload-{}.bin", index))
        );
    }
}

#[test]
fn test_dig_on_compressed_array() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("packed.rab");

    let mut container = RandomAccessBuffer::new();
    container
        .add_numerical_array(
            "packed",
            array![1.0f64, 2.0, 3.0],
            json!(null),
            AddOptions::default().with_compression(Compression::Gzip),
        )
        .unwrap();
    container.write(&path).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    assert!(matches!(
        reader.dig_element("packed", 0),
        Err(RabError::OperationError(_))
    ));
    let (dataset, _) = reader.get_dataset("packed").unwrap();
    assert_eq!(dataset.as_numerical().unwrap().get(&[2]), Some(Scalar::Float64(3.0)));
}

#[test]
fn test_bad_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-a-container.zip");
    std::fs::write(&path, b"PK\x03\x04 this is a zip file, not a container").unwrap();

    assert!(matches!(
        RandomAccessBuffer::open(&path),
        Err(RabError::FormatError(_))
    ));
}

#[test]
fn test_file_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.rab");

    let mut container = RandomAccessBuffer::new();
    container
        .add_text("first", "héllo", json!(null), AddOptions::default())
        .unwrap();
    container
        .add_buffer("second", vec![0xAAu8; 5], json!(null), AddOptions::default())
        .unwrap();
    let stats = container.write(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..3], b"rab");
    let header_length = u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]) as usize;
    assert_eq!(header_length as u64, stats.header_bytes);

    let header = std::str::from_utf8(&bytes[7..7 + header_length]).unwrap();
    assert!(header.starts_with('\n') && header.ends_with('\n'));
    assert!(header.contains("codecMeta"));

    let data = &bytes[7 + header_length..];
    assert_eq!(data, [&"héllo".as_bytes()[..], &[0xAA; 5][..]].concat().as_slice());
    assert_eq!(stats.data_bytes, data.len() as u64);

    let entries = RandomAccessBuffer::open(&path).unwrap().catalog().entries().to_vec();
    assert_eq!(entries[0].codec_meta.byte_offset, Some(0));
    assert_eq!(entries[1].codec_meta.byte_offset, Some("héllo".len() as u64));
}

#[test]
fn test_json_header_from_early_writers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.rab");
    let header = r#"[
	{
		"name": "counts",
		"metadata": {"note": "no strides"},
		"codecMeta": {
			"type": "uint16",
			"byteOffset": 0,
			"byteLength": 12,
			"compression": null,
			"shape": [2, 3],
			"endianness": "little"
		}
	}
]"#;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"rab");
    bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in [1u16, 2, 3, 4, 5, 6] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(&path, bytes).unwrap();

    let reader = RandomAccessBuffer::open(&path).unwrap();
    assert_eq!(reader.get_metadata("counts").unwrap(), &json!({"note": "no strides"}));
    assert_eq!(reader.dig_element("counts", [1, 0]).unwrap(), Scalar::UInt16(4));

    let (dataset, _) = reader.get_dataset("counts").unwrap();
    let array = dataset.as_numerical().unwrap().as_array::<u16>().unwrap();
    assert_eq!(array, &array![[1u16, 2, 3], [4, 5, 6]].into_dyn());
}
