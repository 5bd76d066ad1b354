//! `ractool` CLI integration (spec §6.2): drives the compiled binary
//! end-to-end through encode/decode/info.

use std::io::Write;
use std::process::Command;

fn ractool() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ractool"))
}

#[test]
fn encode_decode_info_round_trip_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("out.rac");
    let decoded_path = dir.path().join("decoded.txt");

    let payload = b"the ractool CLI should round-trip this text through encode and decode";
    std::fs::File::create(&input_path).unwrap().write_all(payload).unwrap();

    let encode_status = ractool()
        .args([
            "encode",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--codec",
            "lz4",
            "--d-chunk-size",
            "16",
        ])
        .status()
        .unwrap();
    assert!(encode_status.success());

    let decode_status = ractool()
        .args(["decode", output_path.to_str().unwrap(), decoded_path.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(decode_status.success());

    let decoded = std::fs::read(&decoded_path).unwrap();
    assert_eq!(decoded, payload);

    let info_output = ractool().args(["info", output_path.to_str().unwrap()]).output().unwrap();
    assert!(info_output.status.success());
    let stdout = String::from_utf8(info_output.stdout).unwrap();
    assert!(stdout.contains("DFileSize:"));
    assert!(stdout.contains("chunks:"));
}

#[test]
fn decode_with_a_range_prints_only_the_requested_slice() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("out.rac");
    std::fs::File::create(&input_path).unwrap().write_all(b"0123456789").unwrap();

    let encode_status = ractool()
        .args([
            "encode",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--codec",
            "store",
            "--d-chunk-size",
            "3",
        ])
        .status()
        .unwrap();
    assert!(encode_status.success());

    let output = ractool()
        .args(["decode", output_path.to_str().unwrap(), "--range", "2..7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, b"23456");
}

#[test]
fn decode_with_singlethreaded_flag_matches_default_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("out.rac");
    std::fs::File::create(&input_path)
        .unwrap()
        .write_all(&vec![b'a'; 20_000])
        .unwrap();

    ractool()
        .args([
            "encode",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--codec",
            "lz4",
            "--d-chunk-size",
            "256",
        ])
        .status()
        .unwrap();

    let default = ractool().args(["decode", output_path.to_str().unwrap()]).output().unwrap();
    let single = ractool()
        .args(["decode", output_path.to_str().unwrap(), "--singlethreaded"])
        .output()
        .unwrap();
    assert!(default.status.success());
    assert!(single.status.success());
    assert_eq!(default.stdout, single.stdout);
}
