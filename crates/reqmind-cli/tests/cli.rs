//! End-to-end runs of the `reqmind` binary against a mock generation server.
//!
//! The lexical hashing embedder keeps these runs offline and deterministic.

use std::fs;
use std::path::PathBuf;
use std::process::Output;

use assert_cmd::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "test/model";
const COMPLETION_PATH: &str = "/models/test/model";
const EXPORT_ANSWER: &str = "REQ-002 requires exporting monthly reports to PDF.";
const EXPORT_QUESTION: &str = "What does REQ-002 require for report export?";

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            root: TempDir::new().unwrap(),
        };
        fs::create_dir(ws.corpus()).unwrap();
        ws.write("req-001.txt", "REQ-001: Users shall log in with a username and password.");
        ws.write("req-002.txt", "REQ-002: The system shall export monthly reports to PDF format.");
        ws.write("req-003.md", "REQ-003: The dashboard shall refresh every thirty seconds.");
        ws
    }

    fn corpus(&self) -> PathBuf {
        self.root.path().join("documents")
    }

    fn index(&self) -> PathBuf {
        self.root.path().join("index")
    }

    fn write(&self, name: &str, text: &str) {
        fs::write(self.corpus().join(name), text).unwrap();
    }

    fn remove(&self, name: &str) {
        fs::remove_file(self.corpus().join(name)).unwrap();
    }

    fn command(&self, server: &MockServer) -> Command {
        let mut cmd = Command::cargo_bin("reqmind").unwrap();
        cmd.env_clear()
            .current_dir(self.root.path())
            .env("REQMIND_CORPUS_DIR", self.corpus())
            .env("REQMIND_INDEX_DIR", self.index())
            .env("REQMIND_EMBEDDING_MODEL", "lexical-hash-384")
            .env("REQMIND_GENERATOR", "huggingface")
            .env("REQMIND_GENERATOR_URL", server.uri())
            .env("REQMIND_GENERATOR_MODEL", MODEL)
            .env("REQMIND_RETRY_ATTEMPTS", "1")
            .env("HUGGINGFACE_API_KEY", "hf_test_key");
        cmd
    }
}

/// Run off the async runtime so the mock server keeps serving.
async fn run(mut cmd: Command) -> Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

async fn mount_answer(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": answer }])))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_query_cites_matching_requirement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .and(body_string_contains("REQ-002: The system shall export"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": EXPORT_ANSWER }])),
        )
        .expect(1)
        .mount(&server)
        .await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.args(["--query", EXPORT_QUESTION]);
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains(EXPORT_ANSWER))
        .stdout(contains("[1] req-002.txt"))
        .stderr(contains("Indexed 3 chunks from 3 documents"));

    assert!(ws.index().join("index.db").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_index_directory_is_built() {
    let server = MockServer::start().await;
    mount_answer(&server, EXPORT_ANSWER).await;
    let ws = Workspace::new();
    fs::create_dir(ws.index()).unwrap();
    fs::write(ws.index().join(".gitkeep"), "").unwrap();

    let mut cmd = ws.command(&server);
    cmd.args(["-v", "-q", EXPORT_QUESTION]);
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("[1] req-002.txt"))
        .stderr(contains("Indexed 3 chunks from 3 documents"))
        .stderr(contains("Index stats: 3 entries from 3 sources"));
}

#[tokio::test(flavor = "multi_thread")]
async fn word_forms_match_across_question_and_document() {
    let server = MockServer::start().await;
    mount_answer(&server, "REQ-002 covers login.").await;
    let ws = Workspace::new();
    ws.write(
        "srs.txt",
        "REQ-002: User Login. The system shall authenticate users using email and password.",
    );

    let mut cmd = ws.command(&server);
    cmd.args(["--json", "-q", "What are the authentication requirements?"]);
    let output = run(cmd).await;
    output.clone().assert().success();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let sources = value["sources"].as_array().unwrap();
    assert_eq!(sources[0]["source"], "srs.txt");
}

#[tokio::test(flavor = "multi_thread")]
async fn unrelated_question_still_answers() {
    let server = MockServer::start().await;
    let refusal = "I don't know. This question is not related to the requirements document.";
    mount_answer(&server, refusal).await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.args(["-q", "What is the capital of France?"]);
    run(cmd).await.assert().success().stdout(contains(refusal));
}

#[tokio::test(flavor = "multi_thread")]
async fn json_output_lists_sources() {
    let server = MockServer::start().await;
    mount_answer(&server, EXPORT_ANSWER).await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.args(["--json", "--top-k", "1", "-q", EXPORT_QUESTION]);
    let output = run(cmd).await;
    output.clone().assert().success();

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["answer"], EXPORT_ANSWER);
    let sources = value["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["source"], "req-002.txt");
}

#[tokio::test(flavor = "multi_thread")]
async fn interactive_session_until_exit() {
    let server = MockServer::start().await;
    mount_answer(&server, EXPORT_ANSWER).await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.write_stdin(format!("{}\nhistory\nEXIT\nnot reached\n", EXPORT_QUESTION));
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("Question: "))
        .stdout(contains(EXPORT_ANSWER))
        .stdout(contains(format!("1. Q: {}\n     A: {}", EXPORT_QUESTION, EXPORT_ANSWER)))
        .stdout(contains("Goodbye!"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn interactive_blank_lines_are_skipped() {
    let server = MockServer::start().await;
    mount_answer(&server, EXPORT_ANSWER).await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.write_stdin("\n   \nhistory\nexit\n");
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("Please provide a valid question").not())
        .stdout(contains("No questions asked yet."))
        .stdout(contains("Goodbye!"));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn interactive_session_ends_on_eof() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.write_stdin("");
    run(cmd).await.assert().success().stdout(contains("Goodbye!"));
}

#[tokio::test(flavor = "multi_thread")]
async fn interactive_error_does_not_end_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETION_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.write_stdin(format!("{}\nhistory\nquit\n", EXPORT_QUESTION));
    run(cmd)
        .await
        .assert()
        .success()
        .stderr(contains("Query failed during generation"))
        .stdout(contains("No questions asked yet."))
        .stdout(contains("Goodbye!"));
}

#[tokio::test(flavor = "multi_thread")]
async fn recreate_replaces_stale_content() {
    let server = MockServer::start().await;
    mount_answer(&server, "ok").await;
    let ws = Workspace::new();
    ws.write("legacy.txt", "REQ-900: The system shall support legacy fax transmission.");
    let question = "Is legacy fax transmission supported?";

    let mut cmd = ws.command(&server);
    cmd.args(["-q", question]);
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("[1] legacy.txt"));

    ws.remove("legacy.txt");

    // Without --recreate the existing index is reused as is.
    let mut cmd = ws.command(&server);
    cmd.args(["-q", question]);
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("legacy.txt"))
        .stderr(contains("Building index").not());

    let mut cmd = ws.command(&server);
    cmd.args(["--recreate", "-q", question]);
    run(cmd)
        .await
        .assert()
        .success()
        .stdout(contains("REQ-900").not())
        .stdout(contains("legacy.txt").not())
        .stderr(contains("Indexed 3 chunks"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_credential_fails_before_indexing() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.env_remove("HUGGINGFACE_API_KEY").args(["-q", EXPORT_QUESTION]);
    run(cmd)
        .await
        .assert()
        .failure()
        .code(1)
        .stderr(contains("HUGGINGFACE_API_KEY"));

    assert!(!ws.index().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_embedding_model_requires_rebuild() {
    let server = MockServer::start().await;
    mount_answer(&server, EXPORT_ANSWER).await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.args(["-q", EXPORT_QUESTION]);
    run(cmd).await.assert().success();

    let mut cmd = ws.command(&server);
    cmd.env("REQMIND_EMBEDDING_MODEL", "lexical-hash-256")
        .args(["-q", EXPORT_QUESTION]);
    run(cmd)
        .await
        .assert()
        .failure()
        .stderr(contains("rebuild required (run with --recreate)"));

    let mut cmd = ws.command(&server);
    cmd.env("REQMIND_EMBEDDING_MODEL", "lexical-hash-256")
        .args(["--recreate", "-q", EXPORT_QUESTION]);
    run(cmd).await.assert().success().stdout(contains(EXPORT_ANSWER));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_corpus_is_a_config_error() {
    let server = MockServer::start().await;
    let ws = Workspace::new();

    let mut cmd = ws.command(&server);
    cmd.env("REQMIND_CORPUS_DIR", ws.root.path().join("nope"))
        .args(["-q", EXPORT_QUESTION]);
    run(cmd)
        .await
        .assert()
        .failure()
        .stderr(contains("Corpus directory not found"));
}

#[test]
fn invalid_chunk_overlap_is_rejected() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("reqmind")
        .unwrap()
        .env_clear()
        .current_dir(dir.path())
        .env("HUGGINGFACE_API_KEY", "hf_test_key")
        .env("REQMIND_CHUNK_SIZE", "100")
        .env("REQMIND_CHUNK_OVERLAP", "100")
        .args(["-q", "anything"])
        .assert()
        .failure()
        .stderr(contains("chunk_overlap"));
    assert!(!dir.path().join("index").exists());
}
