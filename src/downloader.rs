use std::io::{self, BufRead, BufReader, PipeReader};
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::{
    process::{Child, Command},
    runtime::Handle,
    sync::mpsc::{UnboundedSender, unbounded_channel},
    task::JoinHandle,
    time::timeout,
};

use crate::command::{self, Mode};
use crate::config::Config;
use crate::error::{RequestError, ToolError};
use crate::events::EventSender;
use crate::info::VideoInfo;
use crate::model::{DownloadOptions, ProgressEvent, RunOutcome, Status};
use crate::progress::parse_progress_from_line;

const INSTALL_HINTS: [&str; 2] = [
    "Install with: pip install yt-dlp",
    "Or download from: https://github.com/yt-dlp/yt-dlp",
];

/// Runs yt-dlp on the tokio runtime and reports back through the event queue.
///
/// At most one download is in flight per supervisor; info fetches are
/// independent of it.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
    runtime: Handle,
}

struct Shared {
    config: Config,
    events: EventSender,
    running: AtomicBool,
    stop_requested: AtomicBool,
    /// Serializes `request_stop` against the run closing its stop window
    stop_gate: Mutex<()>,
    /// Download process, present between spawn and wait
    child: Mutex<Option<Child>>,
}

impl Supervisor {
    pub fn new(config: Config, events: EventSender, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                events,
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                stop_gate: Mutex::new(()),
                child: Mutex::new(None),
            }),
            runtime,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Fetches metadata for `url` in the background and logs a summary
    pub fn fetch_info(&self, url: &str) -> Result<JoinHandle<()>, RequestError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RequestError::EmptyUrl);
        }
        let url = url.to_owned();
        let shared = Arc::clone(&self.shared);
        Ok(self.runtime.spawn(async move { shared.run_info_fetch(url).await }))
    }

    /// Starts a download in the background.
    ///
    /// The handle resolves to `None` when the tool failed its availability
    /// check and nothing was launched.
    pub fn download(&self, options: DownloadOptions) -> Result<JoinHandle<Option<RunOutcome>>, RequestError> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RequestError::AlreadyRunning);
        }
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        Ok(self.runtime.spawn(async move {
            let mut guard = RunGuard::new(Arc::clone(&shared));
            if !shared.precheck().await {
                shared.close_stop_window();
                shared.events.status(Status::Error);
                return None;
            }
            guard.started = true;
            let outcome = shared.run_download(&options).await;
            guard.finish(outcome.clone());
            Some(outcome)
        }))
    }

    /// Asks the running download to stop. No-op when idle or already stopping.
    ///
    /// Never blocks: the process gets a terminate signal and the worker
    /// notices the flag before handling its next line. Once the run has
    /// settled on its outcome this does nothing.
    pub fn request_stop(&self) {
        let shared = &self.shared;
        let _gate = shared.stop_gate();
        if !shared.running.load(Ordering::SeqCst) {
            return;
        }
        if shared.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stop requested");
        shared.events.log("🛑 Stopping download...");
        shared.events.status(Status::Stopping);
        shared.terminate();
    }
}

impl Shared {
    fn child_slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_gate(&self) -> MutexGuard<'_, ()> {
        self.stop_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops accepting stop requests and reports whether one arrived.
    ///
    /// Called once the run knows how it ended, before its final status is
    /// queued, so a late `request_stop` cannot queue `Stopping` after it.
    fn close_stop_window(&self) -> bool {
        let _gate = self.stop_gate();
        self.stop_requested.swap(true, Ordering::SeqCst)
    }

    fn terminate(&self) {
        if let Some(child) = self.child_slot().as_mut() {
            if let Err(e) = send_terminate(child) {
                warn!("failed to signal yt-dlp: {e}");
            }
        }
    }

    /// Runs `<tool> --version`; on failure queues install guidance
    async fn precheck(&self) -> bool {
        match self.tool_version().await {
            Ok(version) => {
                self.events.log(format!("✅ yt-dlp version: {version}"));
                true
            }
            Err(err) => {
                warn!("yt-dlp availability check failed: {err}");
                self.events.error(err.to_string());
                if matches!(err, ToolError::NotFound) {
                    for hint in INSTALL_HINTS {
                        self.events.error(hint);
                    }
                }
                false
            }
        }
    }

    /// Runs the tool to completion, capturing its output, within `info_timeout`
    async fn run_bounded(&self, args: &[String], task: &'static str) -> Result<Output, ToolError> {
        let mut cmd = self.config.tool.command();
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let after = self.config.info_timeout;
        timeout(after, cmd.output())
            .await
            .map_err(|_| ToolError::Timeout { task, after })?
            .map_err(ToolError::from_spawn)
    }

    async fn tool_version(&self) -> Result<String, ToolError> {
        let output = self
            .run_bounded(&command::version_args(), "checking the yt-dlp version")
            .await?;
        if !output.status.success() {
            return Err(ToolError::Unusable { status: output.status });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    async fn run_info_fetch(&self, url: String) {
        if !self.precheck().await {
            self.events.status(Status::Error);
            return;
        }
        self.events.log(format!("🔍 Fetching information for: {url}"));
        self.events.status(Status::FetchingInfo);

        match self.fetch_info(&url).await {
            Ok(info) => {
                for line in info.summary_lines() {
                    self.events.log(line);
                }
                self.events.log("✅ Video information fetched successfully!");
                self.events.status(Status::Ready);
            }
            Err(err) => {
                warn!("info fetch for {url} failed: {err}");
                self.events.error(err.to_string());
                self.events.status(Status::Error);
            }
        }
    }

    async fn fetch_info(&self, url: &str) -> Result<VideoInfo, ToolError> {
        let args = command::info_args(url);
        self.events.log(format!("Running command: {}", self.config.tool.display_with(&args)));

        let output = self.run_bounded(&args, "fetching video info").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(ToolError::NonZeroExit {
                status: output.status,
                stderr: if stderr.is_empty() { "Unknown error".to_owned() } else { stderr },
            });
        }
        Ok(VideoInfo::from_json(&output.stdout)?)
    }

    async fn run_download(&self, options: &DownloadOptions) -> RunOutcome {
        let events = &self.events;
        events.log("=".repeat(50));
        events.log(format!("🚀 Starting download: {}", options.url()));
        events.log(format!("⚙️ Quality: {}", options.quality()));
        events.log(format!("🎬 Framerate: {}", options.framerate()));
        events.log(format!("📦 Format: {}", options.format()));
        events.log(format!("📁 Output: {}", options.output_dir().display()));
        events.status(Status::Downloading);

        let result = self.stream_download(options).await;
        let stopped = self.close_stop_window();
        let outcome = match result {
            Ok(code) if stopped => {
                debug!("exit code {code:?} ignored, stop was requested");
                events.log("⏹️ Download stopped by user");
                RunOutcome::Stopped
            }
            Ok(Some(0)) => {
                events.log("✅ Download completed successfully!");
                events.progress(ProgressEvent::finished());
                RunOutcome::Completed
            }
            Ok(code) => {
                let shown = code.map_or_else(|| "unknown".to_owned(), |c| c.to_string());
                events.log(format!("❌ Download failed with code: {shown}"));
                RunOutcome::Failed(code)
            }
            Err(err) => {
                events.error(format!("Download error: {err}"));
                RunOutcome::Error(err.to_string())
            }
        };
        info!("download of {} finished: {outcome:?}", options.url());
        events.status(outcome.status());
        outcome
    }

    /// Spawns the download and pumps its merged output until EOF or stop.
    /// Returns the exit code (`None` if killed by a signal).
    ///
    /// A stop that arrived while the version check ran means nothing is
    /// spawned at all.
    async fn stream_download(&self, options: &DownloadOptions) -> Result<Option<i32>, ToolError> {
        if self.stop_requested.load(Ordering::SeqCst) {
            info!("stop requested before launch, not spawning yt-dlp");
            return Ok(None);
        }
        let args = command::build(options, Mode::Download);
        info!("spawning {}", self.config.tool.display_with(&args));

        // stdout and stderr share one pipe so lines keep the order they were written in
        let (reader, writer) = io::pipe()?;
        let mut cmd: Command = self.config.tool.command();
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true);
        let spawned = cmd.spawn();
        // the command holds the parent's write ends; EOF only comes once they are gone
        drop(cmd);
        let child = spawned.map_err(ToolError::from_spawn)?;

        let (line_tx, mut lines) = unbounded_channel();
        forward_lines(reader, line_tx);
        *self.child_slot() = Some(child);
        // a stop that raced the spawn found no process to signal
        if self.stop_requested.load(Ordering::SeqCst) {
            self.terminate();
        }

        while let Some(line) = lines.recv().await {
            let line = line?;
            if self.stop_requested.load(Ordering::SeqCst) {
                self.terminate();
                break;
            }
            if let Some(event) = parse_progress_from_line(&line) {
                self.events.progress(event);
            }
            let line = line.trim();
            if !line.is_empty() {
                debug!("yt-dlp: {line}");
                self.events.log(line);
            }
        }
        drop(lines);

        let child = self.child_slot().take();
        match child {
            Some(mut child) => Ok(child.wait().await?.code()),
            None => Err(ToolError::Io(io::Error::other("yt-dlp process handle went missing"))),
        }
    }
}

/// Sends each line of `reader` to `tx`, decoding lossily, until EOF or error.
///
/// The pipe is read with blocking calls on tokio's blocking pool.
fn forward_lines(reader: PipeReader, tx: UnboundedSender<io::Result<String>>) {
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(String::from_utf8_lossy(&buf).into_owned())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
}

/// Asks `child` to exit: SIGTERM on Unix, a hard kill elsewhere
#[cfg(unix)]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    // no pid means the process was already reaped
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: plain syscall on a pid we own and have not reaped yet
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

/// Cleanup owed by every download task, however it ends.
///
/// Dropping the guard releases the process slot and the running flag, then
/// queues `ResetControls`. A run that started but never recorded an outcome
/// gets an `Error` outcome first.
struct RunGuard {
    shared: Arc<Shared>,
    started: bool,
    finished: bool,
}

impl RunGuard {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            started: false,
            finished: false,
        }
    }

    fn finish(&mut self, outcome: RunOutcome) {
        self.shared.events.finished(outcome);
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.started && !self.finished {
            self.shared.close_stop_window();
            let outcome = RunOutcome::Error("download task ended unexpectedly".to_owned());
            self.shared.events.status(outcome.status());
            self.shared.events.finished(outcome);
        }
        self.shared.child_slot().take();
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.events.reset_controls();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ToolInvocation;
    use crate::events::{EventQueue, QueueMessage, channel};
    use crate::model::{ContainerFormat, Framerate, Quality};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Shell script standing in for yt-dlp; answers `--version` itself
    fn fake_tool(body: &str) -> (TempDir, Config) {
        fake_tool_script(&format!(
            "if [ \"$1\" = \"--version\" ]; then echo 2024.08.06; exit 0; fi\n{body}"
        ))
    }

    /// Like `fake_tool`, but the script also decides how `--version` behaves
    fn fake_tool_script(script_body: &str) -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp.sh");
        std::fs::write(&script, format!("{script_body}\n")).unwrap();
        let config = Config {
            tool: ToolInvocation {
                program: "sh".to_owned(),
                args: vec![script.display().to_string()],
            },
            info_timeout: Duration::from_secs(10),
            ..Config::default()
        };
        (dir, config)
    }

    fn supervisor(config: Config) -> (Supervisor, EventQueue) {
        let (tx, queue) = channel();
        (Supervisor::new(config, tx, Handle::current()), queue)
    }

    fn options(out: &TempDir) -> DownloadOptions {
        DownloadOptions::new(
            "https://www.youtube.com/watch?v=test",
            Quality::Res720,
            Framerate::Auto,
            ContainerFormat::Mp4,
            out.path(),
        )
        .unwrap()
    }

    fn errors(msgs: &[QueueMessage]) -> Vec<&str> {
        msgs.iter()
            .filter_map(|m| match m {
                QueueMessage::ErrorReported(e) => Some(e.as_str()),
                _ => None,
            })
            .collect()
    }

    fn count(msgs: &[QueueMessage], pred: impl Fn(&QueueMessage) -> bool) -> usize {
        msgs.iter().filter(|&m| pred(m)).count()
    }

    fn log_lines(msgs: &[QueueMessage]) -> Vec<&str> {
        msgs.iter()
            .filter_map(|m| match m {
                QueueMessage::LogLine(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drains `queue` into `seen` until `pred` matches one of the messages
    async fn wait_for(queue: &mut EventQueue, seen: &mut Vec<QueueMessage>, pred: impl Fn(&QueueMessage) -> bool) {
        timeout(Duration::from_secs(10), async {
            while !seen.iter().any(&pred) {
                seen.extend(queue.drain());
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("expected message never arrived");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn successful_download_event_order() {
        let (dir, config) = fake_tool(
            r#"echo "[youtube] test: Downloading webpage"
echo "[download]  10.0% of 5.00MiB at 1.00MiB/s ETA 00:04"
echo "[download]  55.5% of 5.00MiB at 2.00MiB/s ETA 00:02" >&2
echo "[download] 100.0% of 5.00MiB at 3.00MiB/s ETA 00:00"
exit 0"#,
        );
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, Some(RunOutcome::Completed));
        assert!(!sup.is_running());

        let msgs = queue.drain();
        let progress: Vec<usize> = msgs
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m, QueueMessage::Progress(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(progress.len(), 4);
        assert_eq!(msgs[*progress.last().unwrap()], QueueMessage::Progress(ProgressEvent::finished()));

        let finished = msgs.iter().position(|m| *m == QueueMessage::Finished(RunOutcome::Completed)).unwrap();
        assert!(finished > *progress.last().unwrap());
        assert_eq!(msgs.last(), Some(&QueueMessage::ResetControls));
        assert_eq!(finished, msgs.len() - 2);
        assert_eq!(count(&msgs, |m| matches!(m, QueueMessage::Finished(_))), 1);
        assert_eq!(count(&msgs, |m| *m == QueueMessage::ResetControls), 1);
        assert!(msgs.contains(&QueueMessage::LogLine("[youtube] test: Downloading webpage".into())));
        assert!(msgs.contains(&QueueMessage::StatusChanged(Status::Completed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_kills_long_running_process() {
        let (dir, config) = fake_tool(
            r#"echo "[download]   1.0% of 50.00MiB at 1.00MiB/s ETA 00:49"
exec sleep 30"#,
        );
        let (sup, mut queue) = supervisor(config);
        let handle = sup.download(options(&dir)).unwrap();

        let mut seen = Vec::new();
        wait_for(&mut queue, &mut seen, |m| matches!(m, QueueMessage::Progress(_))).await;

        sup.request_stop();
        sup.request_stop();

        let outcome = timeout(Duration::from_secs(10), handle)
            .await
            .expect("process was not terminated")
            .unwrap();
        assert_eq!(outcome, Some(RunOutcome::Stopped));

        seen.extend(queue.drain());
        assert_eq!(count(&seen, |m| *m == QueueMessage::StatusChanged(Status::Stopping)), 1);
        assert_eq!(count(&seen, |m| *m == QueueMessage::Finished(RunOutcome::Stopped)), 1);
        assert_eq!(seen.last(), Some(&QueueMessage::ResetControls));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_sends_sigterm_the_tool_can_trap() {
        let (dir, config) = fake_tool(
            r#"trap 'echo terminated > "$(dirname "$0")/got-term"; exit 143' TERM
echo "[download]   1.0% of 50.00MiB at 1.00MiB/s ETA 00:49"
while true; do sleep 0.1; done"#,
        );
        let (sup, mut queue) = supervisor(config);
        let handle = sup.download(options(&dir)).unwrap();

        let mut seen = Vec::new();
        wait_for(&mut queue, &mut seen, |m| matches!(m, QueueMessage::Progress(_))).await;
        sup.request_stop();

        let outcome = timeout(Duration::from_secs(10), handle)
            .await
            .expect("process ignored the stop")
            .unwrap();
        assert_eq!(outcome, Some(RunOutcome::Stopped));
        let marker = std::fs::read_to_string(dir.path().join("got-term")).expect("TERM trap did not run");
        assert_eq!(marker.trim(), "terminated");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stdout_and_stderr_lines_keep_write_order() {
        let (dir, config) = fake_tool(
            r#"i=0
while [ $i -lt 200 ]; do
  echo "out $i"
  echo "err $i" >&2
  i=$((i + 1))
done"#,
        );
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, Some(RunOutcome::Completed));

        let msgs = queue.drain();
        let tool_lines: Vec<&str> = log_lines(&msgs)
            .into_iter()
            .filter(|l| l.starts_with("out ") || l.starts_with("err "))
            .collect();
        let expected: Vec<String> = (0..200).flat_map(|i| [format!("out {i}"), format!("err {i}")]).collect();
        assert_eq!(tool_lines, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_during_version_check_launches_nothing() {
        let (dir, config) = fake_tool_script(
            r#"if [ "$1" = "--version" ]; then sleep 1; echo 2024.08.06; exit 0; fi
touch "$(dirname "$0")/launched"
exit 0"#,
        );
        let (sup, mut queue) = supervisor(config);

        let handle = sup.download(options(&dir)).unwrap();
        sup.request_stop();
        let outcome = timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
        assert_eq!(outcome, Some(RunOutcome::Stopped));
        assert!(!dir.path().join("launched").exists());

        let msgs = queue.drain();
        assert_eq!(msgs.first(), Some(&QueueMessage::LogLine("🛑 Stopping download...".into())));
        assert_eq!(count(&msgs, |m| *m == QueueMessage::Finished(RunOutcome::Stopped)), 1);
        assert!(msgs.contains(&QueueMessage::LogLine("⏹️ Download stopped by user".into())));
        assert_eq!(msgs.last(), Some(&QueueMessage::ResetControls));
    }

    #[tokio::test]
    async fn stop_after_outcome_is_settled_queues_nothing() {
        let (_dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);
        // a run that has classified its result but not yet released the flag
        sup.shared.running.store(true, Ordering::SeqCst);
        assert!(!sup.shared.close_stop_window());

        sup.request_stop();
        assert!(queue.drain().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completed_run_ignores_late_stop() {
        let (dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, Some(RunOutcome::Completed));
        queue.drain();

        sup.request_stop();
        assert!(queue.drain().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn launch_failure_is_an_error_outcome() {
        let (dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);
        // a NUL byte in an argument makes the spawn itself fail
        let opts = DownloadOptions::new(
            "https://www.youtube.com/watch?v=te\0st",
            Quality::Res720,
            Framerate::Auto,
            ContainerFormat::Mp4,
            dir.path(),
        )
        .unwrap();

        let outcome = sup.download(opts).unwrap().await.unwrap();
        assert!(matches!(outcome, Some(RunOutcome::Error(_))));

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Download error:"));
        assert!(msgs.contains(&QueueMessage::StatusChanged(Status::Error)));
        assert!(matches!(msgs[msgs.len() - 2], QueueMessage::Finished(RunOutcome::Error(_))));
        assert_eq!(msgs.last(), Some(&QueueMessage::ResetControls));
        assert_eq!(count(&msgs, |m| *m == QueueMessage::ResetControls), 1);
        assert!(!sup.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn aborted_task_still_reports_an_outcome() {
        let (dir, config) = fake_tool(
            r#"echo "[download]   1.0% of 50.00MiB at 1.00MiB/s ETA 00:49"
exec sleep 30"#,
        );
        let (sup, mut queue) = supervisor(config);
        let handle = sup.download(options(&dir)).unwrap();

        let mut seen = Vec::new();
        wait_for(&mut queue, &mut seen, |m| matches!(m, QueueMessage::Progress(_))).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!sup.is_running());

        seen.extend(queue.drain());
        let expected = RunOutcome::Error("download task ended unexpectedly".to_owned());
        assert_eq!(count(&seen, |m| *m == QueueMessage::Finished(expected.clone())), 1);
        assert!(seen.contains(&QueueMessage::StatusChanged(Status::Error)));
        assert_eq!(seen.last(), Some(&QueueMessage::ResetControls));
        assert_eq!(count(&seen, |m| *m == QueueMessage::ResetControls), 1);
    }

    #[tokio::test]
    async fn dropped_guard_of_started_run_queues_error_outcome() {
        let (_dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);
        sup.shared.running.store(true, Ordering::SeqCst);

        let mut guard = RunGuard::new(Arc::clone(&sup.shared));
        guard.started = true;
        drop(guard);

        assert_eq!(
            queue.drain(),
            [
                QueueMessage::StatusChanged(Status::Error),
                QueueMessage::Finished(RunOutcome::Error("download task ended unexpectedly".to_owned())),
                QueueMessage::ResetControls,
            ]
        );
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn unusable_tool_reports_single_error() {
        let (dir, config) = fake_tool_script("exit 2");
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, None);

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("yt-dlp not found or not working properly!"));
        assert!(!msgs.iter().any(|m| matches!(m, QueueMessage::Finished(_))));
        assert!(msgs.contains(&QueueMessage::StatusChanged(Status::Error)));
        assert_eq!(msgs.last(), Some(&QueueMessage::ResetControls));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn hung_version_check_times_out_with_its_own_message() {
        let (dir, mut config) = fake_tool_script("exec sleep 30");
        config.info_timeout = Duration::from_secs(1);
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, None);

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Timeout while checking the yt-dlp version"), "{}", errs[0]);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let (_dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);
        sup.request_stop();
        sup.request_stop();
        assert!(queue.drain().is_empty());
        assert!(!sup.shared.stop_requested.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_zero_exit_is_failure() {
        let (dir, config) = fake_tool("echo 'ERROR: Video unavailable' >&2\nexit 3");
        let (sup, mut queue) = supervisor(config);

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, Some(RunOutcome::Failed(Some(3))));

        let msgs = queue.drain();
        assert!(msgs.contains(&QueueMessage::LogLine("ERROR: Video unavailable".into())));
        assert!(msgs.contains(&QueueMessage::LogLine("❌ Download failed with code: 3".into())));
        assert!(msgs.contains(&QueueMessage::StatusChanged(Status::Failed)));
        assert!(!msgs.iter().any(|m| matches!(m, QueueMessage::Progress(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_download_is_rejected_while_running() {
        let (dir, config) = fake_tool("exec sleep 30");
        let (sup, _queue) = supervisor(config);

        let handle = sup.download(options(&dir)).unwrap();
        let err = sup.download(options(&dir)).unwrap_err();
        assert_eq!(err, RequestError::AlreadyRunning);

        sup.request_stop();
        let outcome = timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
        assert_eq!(outcome, Some(RunOutcome::Stopped));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn missing_tool_gives_install_guidance() {
        let config = Config {
            tool: ToolInvocation::parse("/nonexistent/bin/yt-dlp").unwrap(),
            ..Config::default()
        };
        let (sup, mut queue) = supervisor(config);
        let dir = tempfile::tempdir().unwrap();

        let outcome = sup.download(options(&dir)).unwrap().await.unwrap();
        assert_eq!(outcome, None);

        let msgs = queue.drain();
        assert_eq!(
            errors(&msgs),
            [
                "yt-dlp not found! Please install yt-dlp first.",
                "Install with: pip install yt-dlp",
                "Or download from: https://github.com/yt-dlp/yt-dlp",
            ]
        );
        assert!(!msgs.iter().any(|m| matches!(m, QueueMessage::Finished(_))));
        assert_eq!(msgs.last(), Some(&QueueMessage::ResetControls));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn info_fetch_logs_summary() {
        let (_dir, config) = fake_tool(
            r#"echo '{"title": "Demo", "duration": 125, "uploader": "someone", "view_count": 4200, "formats": [{"fps": 24}, {"fps": 60}, {}]}'"#,
        );
        let (sup, mut queue) = supervisor(config);
        sup.fetch_info("  https://youtu.be/demo ").unwrap().await.unwrap();

        let msgs = queue.drain();
        assert!(errors(&msgs).is_empty());
        for line in ["📹 Title: Demo", "⏱️ Duration: 2:05", "👁️ Views: 4.2K", "🎬 Available Framerates: 60, 24 fps"] {
            assert!(msgs.contains(&QueueMessage::LogLine(line.into())), "missing {line}");
        }
        assert_eq!(msgs.last(), Some(&QueueMessage::StatusChanged(Status::Ready)));
    }

    #[tokio::test]
    async fn info_fetch_non_zero_exit() {
        let (_dir, config) = fake_tool("echo 'ERROR: Unsupported URL' >&2\nexit 1");
        let (sup, mut queue) = supervisor(config);
        sup.fetch_info("https://example.com/x").unwrap().await.unwrap();

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Failed to fetch video info"));
        assert!(errs[0].ends_with("ERROR: Unsupported URL"));
        assert_eq!(msgs.last(), Some(&QueueMessage::StatusChanged(Status::Error)));
    }

    #[tokio::test]
    async fn info_fetch_timeout() {
        let (_dir, mut config) = fake_tool("exec sleep 30");
        config.info_timeout = Duration::from_secs(1);
        let (sup, mut queue) = supervisor(config);
        sup.fetch_info("https://example.com/slow").unwrap().await.unwrap();

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Timeout while fetching video info"));
        assert_eq!(msgs.last(), Some(&QueueMessage::StatusChanged(Status::Error)));
    }

    #[tokio::test]
    async fn info_fetch_malformed_json() {
        let (_dir, config) = fake_tool("echo 'this is not json'");
        let (sup, mut queue) = supervisor(config);
        sup.fetch_info("https://example.com/x").unwrap().await.unwrap();

        let msgs = queue.drain();
        let errs = errors(&msgs);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Invalid response from yt-dlp"));
    }

    #[tokio::test]
    async fn blank_url_is_refused() {
        let (_dir, config) = fake_tool("exit 0");
        let (sup, mut queue) = supervisor(config);
        assert_eq!(sup.fetch_info("   ").unwrap_err(), RequestError::EmptyUrl);
        assert!(queue.drain().is_empty());
    }
}
