fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chunkup_protocol::{
        AdditionalFormData, ChunkData, ChunkEnvelope, FileData, ProgressData, UploadReceipt,
        decode_field,
    };
    use serde_json::Value;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn parse_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = parse_fixture(name);
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
    }

    #[test]
    fn fixture_file_data() {
        roundtrip_test::<FileData>("file_data.json");
    }

    #[test]
    fn fixture_file_data_with_checksum() {
        roundtrip_test::<FileData>("file_data_checksum.json");
    }

    #[test]
    fn fixture_chunk_data() {
        roundtrip_test::<ChunkData>("chunk_data.json");
    }

    #[test]
    fn fixture_progress_single_file() {
        roundtrip_test::<ProgressData>("progress_single.json");
    }

    #[test]
    fn fixture_progress_batch() {
        roundtrip_test::<ProgressData>("progress_batch.json");
    }

    #[test]
    fn fixture_additional_form_data() {
        roundtrip_test::<AdditionalFormData>("additional_form_data.json");
    }

    #[test]
    fn fixture_upload_receipt() {
        roundtrip_test::<UploadReceipt>("upload_receipt.json");
        let receipt: UploadReceipt = parse_fixture("upload_receipt.json");
        assert_eq!(receipt.file_path, "uploads/holiday.mp4");
        assert!(receipt.is_terminal());
    }

    #[test]
    fn envelope_fields_match_fixtures() {
        let file_data: FileData = parse_fixture("file_data.json");
        let chunk: ChunkData = parse_fixture("chunk_data.json");
        let extra: AdditionalFormData = parse_fixture("additional_form_data.json");
        let envelope = ChunkEnvelope {
            bytes: vec![0u8; chunk.len() as usize],
            file_data,
            chunk: Some(chunk),
            additional: Some(extra),
        };

        let fields = envelope.text_fields().unwrap();
        let names: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["fileData", "album", "chunkData"]);

        let sent_file_data: Value = serde_json::from_str(&fields[0].1).unwrap();
        assert_eq!(sent_file_data, load_fixture("file_data.json"));
        let sent_extra: Value = serde_json::from_str(&fields[1].1).unwrap();
        assert_eq!(sent_extra, load_fixture("additional_form_data.json")["data"]);
        let sent_chunk: ChunkData = decode_field("chunkData", &fields[2].1).unwrap();
        assert_eq!(sent_chunk, chunk);
    }
}
