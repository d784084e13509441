//! End-to-end test driving the compiled binary, adapted from the teacher's
//! `tests/e2e.rs` compile-then-shell-out pattern.

use std::fs;
use std::process::Command;

const BIN_PATH: &str = "../target/debug/genozip";

fn compile_binary() {
    let status = Command::new("cargo")
        .arg("build")
        .arg("--bin")
        .arg("genozip")
        .status()
        .expect("failed to run cargo build");
    assert!(status.success(), "cargo build failed");
}

#[test]
fn zip_then_piz_round_trips_a_tab_separated_file() {
    compile_binary();
    let dir = std::env::temp_dir().join("genozip_e2e_roundtrip");
    let _ = fs::create_dir_all(&dir);
    let input_path = dir.join("input.tsv");
    let genozip_path = dir.join("input.genozip");
    let output_path = dir.join("input.tsv.out");

    fs::write(&input_path, b"chr1\t100\tA\nchr2\t200\tC\tD\n").unwrap();

    let status = Command::new(BIN_PATH)
        .arg("zip")
        .arg(&input_path)
        .arg("--out")
        .arg(&genozip_path)
        .arg("--vblock")
        .arg("1")
        .status()
        .expect("failed to run genozip zip");
    assert!(status.success());

    let status = Command::new(BIN_PATH)
        .arg("piz")
        .arg(&genozip_path)
        .arg("--out")
        .arg(&output_path)
        .status()
        .expect("failed to run genozip piz");
    assert!(status.success());

    let original = fs::read(&input_path).unwrap();
    let reconstructed = fs::read(&output_path).unwrap();
    assert_eq!(original, reconstructed);

    let _ = fs::remove_file(&input_path);
    let _ = fs::remove_file(&genozip_path);
    let _ = fs::remove_file(&output_path);
}

#[test]
fn test_flag_verifies_digest_without_writing_output() {
    compile_binary();
    let dir = std::env::temp_dir().join("genozip_e2e_test_flag");
    let _ = fs::create_dir_all(&dir);
    let input_path = dir.join("input.tsv");
    let genozip_path = dir.join("input.genozip");

    fs::write(&input_path, b"a\tb\nc\td\n").unwrap();

    Command::new(BIN_PATH)
        .arg("zip")
        .arg(&input_path)
        .arg("--out")
        .arg(&genozip_path)
        .status()
        .expect("failed to run genozip zip");

    let status = Command::new(BIN_PATH)
        .arg("piz")
        .arg(&genozip_path)
        .arg("--test")
        .status()
        .expect("failed to run genozip piz --test");
    assert!(status.success());

    let _ = fs::remove_file(&input_path);
    let _ = fs::remove_file(&genozip_path);
}
