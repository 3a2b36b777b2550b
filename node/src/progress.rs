//! "working for ..." ticker shown while a search runs.

use std::io::Write;
use std::time::Duration;

use dave_utils::format_duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Tick period of the progress line.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Rewrites a single terminal line with the elapsed time, once per tick.
pub struct ProgressReporter;

impl ProgressReporter {
    /// Start ticking into `sink` once per second.
    pub fn start<W>(sink: W) -> ProgressHandle
    where
        W: Write + Send + 'static,
    {
        Self::start_with_interval(sink, PROGRESS_INTERVAL)
    }

    pub fn start_with_interval<W>(mut sink: W, interval: Duration) -> ProgressHandle
    where
        W: Write + Send + 'static,
    {
        let (done_tx, mut done_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval_at(started + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut done_rx => break,
                    _ = ticker.tick() => {
                        let _ = write!(sink, "\rworking for {}\x1b[0K", format_duration(started.elapsed()));
                        let _ = sink.flush();
                    }
                }
            }
            let _ = write!(sink, "\r\x1b[0K");
            let _ = sink.flush();
        });
        ProgressHandle {
            done: Some(done_tx),
            task: Some(task),
        }
    }
}

/// Stops the ticker when finished or dropped.
pub struct ProgressHandle {
    done: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressHandle {
    /// Stop the ticker and wait until its line is cleared.
    pub async fn finish(mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let sink = SharedSink::default();
        let handle = ProgressReporter::start(sink.clone());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.finish().await;

        let text = sink.text();
        assert_eq!(text.matches("working for").count(), 3);
        assert!(text.contains("\rworking for 1.0s\x1b[0K"));
        assert!(text.contains("\rworking for 3.0s\x1b[0K"));
        assert!(text.ends_with("\r\x1b[0K"));
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_early_prints_nothing_but_the_clear() {
        let sink = SharedSink::default();
        let handle = ProgressReporter::start(sink.clone());
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.finish().await;
        assert_eq!(sink.text(), "\r\x1b[0K");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_ticker() {
        let sink = SharedSink::default();
        drop(ProgressReporter::start_with_interval(
            sink.clone(),
            Duration::from_millis(100),
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!sink.text().contains("working for"));
    }
}
