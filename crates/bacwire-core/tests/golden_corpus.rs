use bacwire_core::{decode, encode, Pdu};
use std::fs;
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root should be resolvable")
}

fn parse_hex_fixture(path: &Path) -> Vec<u8> {
    let content = fs::read_to_string(path).expect("fixture must be readable");
    let mut out = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        for token in trimmed.split_whitespace() {
            let byte = u8::from_str_radix(token, 16)
                .unwrap_or_else(|_| panic!("invalid hex token '{token}' in {}", path.display()));
            out.push(byte);
        }
    }
    out
}

fn fixtures() -> Vec<PathBuf> {
    let fixture_dir = workspace_root().join("fixtures/golden");
    let mut fixture_files = fs::read_dir(&fixture_dir)
        .expect("fixtures directory should exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "hex"))
        .collect::<Vec<_>>();
    fixture_files.sort();
    assert!(
        !fixture_files.is_empty(),
        "expected at least one corpus fixture in {}",
        fixture_dir.display()
    );
    fixture_files
}

#[test]
fn golden_corpus_fixtures_decode_completely() {
    for fixture in fixtures() {
        let bytes = parse_hex_fixture(&fixture);
        let frame = decode(&bytes).unwrap_or_else(|e| {
            panic!("fixture {} failed to decode: {e}", fixture.display())
        });

        // Frames without a routed source re-encode to the exact fixture bytes.
        if frame.source.is_none() {
            let again = encode(&frame.pdu).unwrap_or_else(|e| {
                panic!("fixture {} failed to re-encode: {e}", fixture.display())
            });
            assert_eq!(again, bytes, "fixture {} re-encoded differently", fixture.display());
        }
    }
}

#[test]
fn golden_corpus_prefixes_never_decode_as_something_else() {
    for fixture in fixtures() {
        let bytes = parse_hex_fixture(&fixture);
        let full = decode(&bytes).expect("fixture decodes");
        for cut in 0..bytes.len() {
            if let Ok(partial) = decode(&bytes[..cut]) {
                // Optional trailing fields may legitimately be absent, but the
                // kind of PDU must not change.
                assert_eq!(
                    std::mem::discriminant(&partial.pdu),
                    std::mem::discriminant(&full.pdu),
                    "fixture {} prefix {cut} changed PDU kind",
                    fixture.display()
                );
                assert!(
                    matches!(partial.pdu, Pdu::WhoIs(_) | Pdu::WriteProperty(_)),
                    "fixture {} prefix {cut} decoded unexpectedly",
                    fixture.display()
                );
            }
        }
    }
}
