//! End-to-end tests against real processes.

use std::os::unix::process::ExitStatusExt;

use tokio::io::AsyncReadExt;

use stream_xargs::source;
use stream_xargs::xargs::{
    self, CommandLine, Signal, StdioConfig, StdioMode, XargsError, XargsEvent, XargsOptions,
};

const FIXTURE_TEXT: &str = "1\n1 2\n1 2 3\n";

async fn collect_output(command: impl Into<CommandLine>, items: &[&str]) -> String {
    let channel = xargs::xargs(command, XargsOptions::default()).unwrap();
    let output = channel.pipe(Vec::new());

    let items: Vec<String> = items.iter().map(ToString::to_string).collect();
    channel.pipe_from(source::from_items(items)).unwrap();

    String::from_utf8(output.await.unwrap()).unwrap()
}

fn fixture() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("text.txt");
    std::fs::write(&path, FIXTURE_TEXT).unwrap();
    let path = path.to_str().unwrap().to_string();
    (dir, path)
}

#[tokio::test]
async fn echo_arguments_without_command() {
    let output = collect_output(None::<&str>, &["a1", "a2", "a3"]).await;
    assert_eq!(output, "a1 a2 a3\n");
}

#[tokio::test]
async fn echo_without_command_keeps_option_like_items() {
    assert_eq!(collect_output(None::<&str>, &["-n", "a1"]).await, "-n a1\n");
    assert_eq!(collect_output(None::<&str>, &["--version"]).await, "--version\n");
    assert_eq!(collect_output(None::<&str>, &["-e", "a\\tb"]).await, "-e a\\tb\n");
}

#[tokio::test]
async fn collect_arguments_and_run_command() {
    let output = collect_output(vec!["echo"], &["a1", "a2", "a3"]).await;
    assert_eq!(output, "a1 a2 a3\n");
}

#[tokio::test]
async fn pass_string_as_command() {
    let output = collect_output("echo", &["a1", "a2", "a3"]).await;
    assert_eq!(output, "a1 a2 a3\n");
}

#[tokio::test]
async fn parse_complex_command_strings() {
    let output = collect_output(r#"echo "quoted word 1" quoted\ word \2"#, &["a1", "a2", "a3"]).await;
    assert_eq!(output, "quoted word 1 quoted word 2 a1 a2 a3\n");
}

#[tokio::test]
async fn emits_exit_event() {
    let mut channel = xargs::xargs("echo", XargsOptions::default()).unwrap();
    channel.pipe_from(source::from_items(["a1", "a2"])).unwrap();

    loop {
        match channel.next_event().await {
            Some(XargsEvent::Exit(status)) => {
                assert!(status.success());
                break;
            }
            Some(XargsEvent::Close) => {}
            other => panic!("Unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn signal_forwarding() {
    let mut channel = xargs::xargs("sleep", XargsOptions::default()).unwrap();
    channel.pipe_from(source::from_items(["10"])).unwrap();

    let pid = loop {
        if let Some(pid) = channel.id().await {
            break pid;
        }
        tokio::task::yield_now().await;
    };
    assert!(pid > 0);

    channel.terminate().unwrap();
    let status = channel.wait().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
}

#[tokio::test]
async fn queues_signals() {
    let mut channel = xargs::xargs("sleep", XargsOptions::default()).unwrap();
    channel.pipe_from(source::from_items(["10"])).unwrap();
    channel.kill(Signal::SIGTERM).unwrap();

    let status = channel.wait().await.unwrap();
    assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
}

#[tokio::test]
async fn normal_spawn_with_disabled_input() {
    let channel = xargs::spawn("cat -", XargsOptions::default()).unwrap();
    channel.pipe_from(source::from_bytes("normal spawn")).unwrap();
    let output = channel.pipe(Vec::new());

    assert_eq!(output.await.unwrap(), b"normal spawn");
}

#[tokio::test]
async fn external_input_replays_buffer_before_files() {
    let (_dir, path) = fixture();

    let channel = xargs::xargs(
        "cat -",
        XargsOptions::new().external(source::from_items([path.clone()])),
    )
    .unwrap();
    channel.pipe_from(source::from_bytes("normal spawn\n")).unwrap();
    let output = channel.pipe(Vec::new());

    assert_eq!(
        String::from_utf8(output.await.unwrap()).unwrap(),
        "normal spawn\n1\n1 2\n1 2 3\n"
    );
}

#[tokio::test]
async fn external_input_appends_to_command_argv() {
    let (_dir, path) = fixture();

    let channel = xargs::xargs(
        vec!["cat".to_string(), path.clone()],
        XargsOptions::new().external(source::from_items(["-".to_string(), path])),
    )
    .unwrap();
    channel.pipe_from(source::from_bytes("normal spawn\n")).unwrap();
    let output = channel.pipe(Vec::new());

    assert_eq!(
        String::from_utf8(output.await.unwrap()).unwrap(),
        "1\n1 2\n1 2 3\nnormal spawn\n1\n1 2\n1 2 3\n"
    );
}

#[tokio::test]
async fn external_input_reads_lines_from_file() {
    let (_dir, path) = fixture();
    let list = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(list.path(), format!("-\n{path}\n")).unwrap();
    let file = tokio::fs::File::open(list.path()).await.unwrap();

    let channel = xargs::xargs("cat", XargsOptions::new().external(source::lines(file))).unwrap();
    channel.pipe_from(source::from_bytes("head\n")).unwrap();
    let output = channel.pipe(Vec::new());

    assert_eq!(
        String::from_utf8(output.await.unwrap()).unwrap(),
        "head\n1\n1 2\n1 2 3\n"
    );
}

#[tokio::test]
async fn live_writes_after_spawn_reach_stdin() {
    let stdio = StdioConfig {
        stdin: StdioMode::Piped,
        stdout: StdioMode::Piped,
        stderr: StdioMode::Inherit,
    };
    let channel = xargs::spawn("cat", XargsOptions::new().stdio(stdio)).unwrap();
    let output = channel.pipe(Vec::new());

    // Let the driver spawn before writing.
    while channel.id().await.is_none() {
        tokio::task::yield_now().await;
    }
    channel.write("live ").unwrap();
    channel.write("data").unwrap();
    channel.end().unwrap();

    assert_eq!(output.await.unwrap(), b"live data");
}

#[tokio::test]
async fn pipe_after_exit_still_drains_output() {
    let mut channel = xargs::xargs("echo", XargsOptions::default()).unwrap();
    channel.write("late").unwrap();
    channel.end().unwrap();
    channel.wait().await.unwrap();

    let output = channel.pipe(Vec::new());
    assert_eq!(output.await.unwrap(), b"late\n");
}

#[tokio::test]
async fn captured_stderr() {
    let stdio = StdioConfig {
        stdin: StdioMode::Null,
        stdout: StdioMode::Piped,
        stderr: StdioMode::Piped,
    };
    let mut channel = xargs::xargs(["sh", "-c"], XargsOptions::new().stdio(stdio)).unwrap();
    channel.write("echo oops >&2").unwrap();
    channel.end().unwrap();

    let mut stderr = channel.take_stderr().await.unwrap();
    let mut text = String::new();
    stderr.read_to_string(&mut text).await.unwrap();
    assert_eq!(text, "oops\n");
    assert!(channel.take_stderr().await.is_none());

    assert!(channel.wait().await.unwrap().success());
}

#[tokio::test]
async fn nonzero_exit_is_not_an_error() {
    let mut channel = xargs::xargs(["sh", "-c", "exit 3"], XargsOptions::default()).unwrap();
    channel.end().unwrap();

    let status = channel.wait().await.unwrap();
    assert_eq!(status.code(), Some(3));
}

#[tokio::test]
async fn missing_command_reports_spawn_error() {
    let mut channel =
        xargs::xargs("definitely-not-a-real-binary-xyz", XargsOptions::default()).unwrap();
    let output = channel.pipe(Vec::new());
    channel.end().unwrap();

    let err = channel.wait().await.unwrap_err();
    assert!(matches!(err, XargsError::Spawn(_)));
    assert!(output.await.unwrap().is_empty());
}

#[tokio::test]
async fn uncaptured_output_closes_target_immediately() {
    let stdio = StdioConfig {
        stdin: StdioMode::Null,
        stdout: StdioMode::Null,
        stderr: StdioMode::Inherit,
    };
    let mut channel = xargs::xargs("echo", XargsOptions::new().stdio(stdio)).unwrap();
    let output = channel.pipe(Vec::new());
    channel.end().unwrap();

    assert!(output.await.unwrap().is_empty());
    assert!(channel.wait().await.unwrap().success());
    assert!(matches!(channel.next_event().await, Some(XargsEvent::Close)));
}

#[tokio::test]
async fn upstream_attached_after_spawn_streams_into_stdin() {
    let (_dir, path) = fixture();

    let channel = xargs::xargs(
        "cat -",
        XargsOptions::new().external(source::from_items([path])),
    )
    .unwrap();
    let output = channel.pipe(Vec::new());
    channel.write("buffered\n").unwrap();

    while channel.id().await.is_none() {
        tokio::task::yield_now().await;
    }
    channel.pipe_from(source::from_bytes("live\n")).unwrap();

    assert_eq!(
        String::from_utf8(output.await.unwrap()).unwrap(),
        format!("buffered\nlive\n{FIXTURE_TEXT}")
    );
}

#[tokio::test]
async fn unpipe_after_spawn_detaches_target() {
    let stdio = StdioConfig {
        stdin: StdioMode::Piped,
        stdout: StdioMode::Piped,
        stderr: StdioMode::Inherit,
    };
    let mut channel = xargs::spawn("cat", XargsOptions::new().stdio(stdio)).unwrap();
    let first = channel.pipe(Vec::new());

    while channel.id().await.is_none() {
        tokio::task::yield_now().await;
    }
    channel.unpipe().unwrap();
    assert!(first.await.unwrap().is_empty());

    let second = channel.pipe(Vec::new());
    channel.write("after unpipe").unwrap();
    channel.end().unwrap();

    assert_eq!(second.await.unwrap(), b"after unpipe");
    assert!(channel.wait().await.unwrap().success());
}
