use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn api_starts_and_reports_its_address() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_framesearch-api"))
        .args(["--openai-api-key", "sk-test"])
        .args(["--bind", "127.0.0.1:0"])
        .arg("--corpora")
        .arg(format!("grade6={}", fixture("ocr_004.txt")))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn api");

    let stdout = child.stdout.take().expect("stdout");
    let mut first_line = String::new();
    let read = BufReader::new(stdout).read_line(&mut first_line);
    child.kill().ok();
    let output = child.wait_with_output().expect("wait for api");
    read.expect("read stdout");

    let addr = first_line
        .trim()
        .strip_prefix("framesearch-api listening on http://127.0.0.1:")
        .unwrap_or_else(|| {
            panic!(
                "unexpected banner {first_line:?}; stderr: {}",
                String::from_utf8_lossy(&output.stderr)
            )
        });
    assert_ne!(addr, "0");
}
