use serde_json::json;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::{Builder, NamedTempFile};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use substack_relay::cli::{run_command, BodyArgs, Cli, Commands, NoteCommand};

fn config_for(server: &MockServer, continue_on_fail: bool) -> NamedTempFile {
    let config = NamedTempFile::new().expect("temp config");
    let yaml = format!(
        "publication_address: {uri}\napi_base: {uri}/api/v1\ndefaults:\n  limit: 5\ncontinue_on_fail: {continue_on_fail}\n",
        uri = server.uri()
    );
    write(config.path(), yaml).expect("write config");
    config
}

fn requests_file(suffix: &str, content: &str) -> NamedTempFile {
    let file = Builder::new().suffix(suffix).tempfile().expect("temp requests");
    write(file.path(), content).expect("write requests");
    file
}

fn run_cli(config: PathBuf, requests: PathBuf) -> Cli {
    Cli {
        command: Commands::Run { config, requests },
    }
}

#[tokio::test]
#[serial]
async fn test_run_executes_requests_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/user/writer/public_profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "name": "The Writer", "handle": "writer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reader/comment/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item": { "type": "comment", "comment": { "id": 12, "body": "hello", "user_id": 7, "handle": "writer" } }
        })))
        .mount(&server)
        .await;

    env::set_var("SUBSTACK_API_KEY", "run-sid-1");
    let config = config_for(&server, false);
    let requests = requests_file(
        ".json",
        r#"[
            { "resource": "profile", "operation": "getProfileBySlug", "params": { "slug": "@writer" } },
            { "resource": "note", "operation": "getNoteById", "params": { "noteId": "12" } }
        ]"#,
    );

    let output = run_command(run_cli(
        config.path().to_path_buf(),
        requests.path().to_path_buf(),
    ))
    .await
    .expect("run succeeds");

    let items = output.as_array().expect("array output");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["profileUrl"], json!("https://substack.com/@writer"));
    assert_eq!(items[1]["noteId"], json!(12));
    assert_eq!(items[1]["body"], json!("hello"));
}

#[tokio::test]
#[serial]
async fn test_run_continue_on_fail_reports_error_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/posts/by-id/3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    env::set_var("SUBSTACK_API_KEY", "run-sid-2");
    let config = config_for(&server, true);
    let requests = requests_file(
        ".yaml",
        "- resource: post\n  operation: getPostById\n  params:\n    postId: 3\n- resource: newsletter\n  operation: getAll\n",
    );

    let output = run_command(run_cli(
        config.path().to_path_buf(),
        requests.path().to_path_buf(),
    ))
    .await
    .expect("continue on fail never aborts");

    let items = output.as_array().expect("array output");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["success"], json!(false));
    assert!(items[0]["error"].as_str().unwrap().contains("500"));
    assert_eq!(items[1]["metadata"]["resource"], json!("newsletter"));
}

#[tokio::test]
#[serial]
async fn test_run_fails_fast_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/posts/by-id/3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    env::set_var("SUBSTACK_API_KEY", "run-sid-3");
    let config = config_for(&server, false);
    let requests = requests_file(
        ".yml",
        "resource: post\noperation: getPostById\nparams:\n  postId: 3\n",
    );

    let err = run_command(run_cli(
        config.path().to_path_buf(),
        requests.path().to_path_buf(),
    ))
    .await
    .unwrap_err();

    assert!(err.to_string().contains("item 0"), "got: {err}");
}

#[tokio::test]
#[serial]
async fn test_note_create_publishes_with_config_default_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/comment/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242, "user_id": 7, "handle": "writer", "body": "**raw**"
        })))
        .expect(1)
        .mount(&server)
        .await;

    env::set_var("SUBSTACK_API_KEY", "run-sid-4");
    let config = NamedTempFile::new().expect("temp config");
    write(
        config.path(),
        format!(
            "publication_address: {uri}\napi_base: {uri}/api/v1\ndefaults:\n  note_format: simple\n",
            uri = server.uri()
        ),
    )
    .expect("write config");

    let cli = Cli {
        command: Commands::Note {
            action: NoteCommand::Create {
                config: config.path().to_path_buf(),
                body: BodyArgs {
                    body: Some("**raw**".to_string()),
                    file: None,
                },
                format: None,
            },
        },
    };

    let created = run_command(cli).await.expect("note published");

    assert_eq!(created["success"], json!(true));
    assert_eq!(created["status"], json!("published"));
    assert_eq!(created["noteId"], json!(4242));
    assert_eq!(
        created["url"],
        json!("https://substack.com/@writer/note/c-4242")
    );
}
