//! CLI tests that run the compiled binary.
//!
//! Only the offline paths are exercised: input validation in `ask` and the
//! credential check at startup. Nothing here contacts an external service.

use std::path::PathBuf;
use std::process::Command;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

#[test]
fn ask_with_unsupported_file_prints_only_the_rejection() {
    let output = Command::new(docqa_binary())
        .env("LLAMA_CLOUD_API_KEY", "test-llama-key")
        .env("GROQ_API_KEY", "test-groq-key")
        .env("COHERE_API_KEY", "test-cohere-key")
        .args([
            "--config",
            "/nonexistent/docqa.toml",
            "ask",
            "archive.zip",
            "What is inside?",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("The parser can only parse the following file types"));
    assert!(!stdout.contains("Please upload a file first"));
}

#[test]
fn startup_fails_without_credentials() {
    let output = Command::new(docqa_binary())
        .env_remove("LLAMA_CLOUD_API_KEY")
        .env_remove("GROQ_API_KEY")
        .env_remove("COHERE_API_KEY")
        .args(["ask", "report.pdf", "What is the summary?"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("API keys not found"));
}
