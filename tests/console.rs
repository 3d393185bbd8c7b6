use std::io::Write;
use std::process::{Command, Stdio};

use framesearch::LibraryState;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn console_records_uploads_and_reports_bad_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let library = dir.path().join("state/library.json");

    let mut child = Command::new(env!("CARGO_BIN_EXE_framesearch-console"))
        .args(["--openai-api-key", "sk-test"])
        // Nothing listens here, so the background corpus load fails fast.
        .args(["--openai-base-url", "http://127.0.0.1:9/v1"])
        .args(["--max-retries", "1"])
        .arg("--corpora")
        .arg(format!("grade6={}", fixture("ocr_004.txt")))
        .args(["--corpus", "grade6"])
        .arg("--ocr-video-index")
        .arg(fixture("frame_url_ocr.txt"))
        .arg("--legacy-video-index")
        .arg(fixture("frame_url.txt"))
        .arg("--library-state")
        .arg(&library)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn console");

    child
        .stdin
        .as_mut()
        .expect("stdin")
        .write_all(
            b":bogus\n\
              :upload Lecture 1.mp4\n\
              :upload Lecture 1.mp4\n\
              :sample on\n\
              :uploads\n\
              :open 1\n\
              :quit\n",
        )
        .expect("write commands");

    let output = child.wait_with_output().expect("wait for console");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "console exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("unknown command ':bogus'"), "{stdout}");
    assert!(stdout.contains("'Lecture 1.mp4' is already listed"), "{stdout}");
    assert!(stdout.contains("  1. Lecture 1.mp4"), "{stdout}");
    assert!(stdout.contains("sample lecture available"), "{stdout}");
    assert!(stdout.contains("no result 1 (have 0)"), "{stdout}");

    let state = LibraryState::load(&library).expect("library state");
    assert_eq!(state.uploaded_videos, vec!["Lecture 1.mp4".to_string()]);
    assert!(state.has_sample_video);
}

#[test]
fn console_rejects_unknown_startup_corpus() {
    let output = Command::new(env!("CARGO_BIN_EXE_framesearch-console"))
        .args(["--openai-api-key", "sk-test"])
        .arg("--corpora")
        .arg(format!("grade6={}", fixture("ocr_004.txt")))
        .args(["--corpus", "grade12"])
        .stdin(Stdio::null())
        .output()
        .expect("run console");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown corpus 'grade12'"));
}
