//! Xargs channel tests.


#[cfg(unix)]
mod process_test;

/// Verify the public channel types are exported from the library.
#[test]
fn test_all_channel_types_exported() {
    use stream_xargs::xargs::{
        ChildProcess, CollectTarget, Collector, CommandLine, EchoProcess, InputMode, Launcher,
        ProcessHandle, Program, SpawnError, StdioConfig, StdioMode, TokioLauncher, XargsChannel, XargsError, XargsEvent,
        XargsOptions,
    };

    fn assert_handle<T: ProcessHandle>() {}
    assert_handle::<ChildProcess>();
    assert_handle::<EchoProcess>();

    let _ = Collector::new(CollectTarget::Arguments);
    let _ = CommandLine::Default;
    let _ = Program::Echo;
    let _ = InputMode::Disabled;
    let _ = StdioConfig::resolve_default(false);
    let _ = StdioMode::Piped;
    let _ = XargsOptions::default();
    let _: &dyn Launcher = &TokioLauncher;
    let _: fn() -> XargsError = || XargsError::Closed;
    let _: fn() -> XargsEvent = || XargsEvent::Close;
    let _: Option<XargsChannel> = None;
    let _: Option<SpawnError> = None;
}
