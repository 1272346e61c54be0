use super::source::FrameSource;
use crate::calibration::{Calibration, CalibrationSnapshot};
use crate::errors::MeasureError;
use crate::measure::FramePipeline;
use crate::types::AnnotatedFrame;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Started,
    Stopped,
    Closed,
}

/// Bounded queue that drops the oldest item when full
struct Queue<T> {
    inner: Mutex<QueueInner<T>>,
    cv: Condvar,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

impl<T> Queue<T> {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn push_drop_oldest(&self, item: T) -> Result<(), MeasureError> {
        let mut g = self.inner.lock()?;
        if g.closed {
            return Ok(());
        }

        if g.items.len() >= g.capacity {
            g.items.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.items.push_back(item);
        self.cv.notify_one();
        Ok(())
    }

    /// Wait for at least one item, then take the newest and discard the rest
    fn pop_latest(&self, timeout: Duration) -> Result<Option<T>, MeasureError> {
        let mut g = self.inner.lock()?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_back() {
                let skipped = g.items.len() as u64;
                g.items.clear();
                g.dropped = g.dropped.saturating_add(skipped);
                return Ok(Some(item));
            }
            if g.closed {
                return Err(MeasureError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self.cv.wait_timeout(g, deadline - now)?;
            g = ng;
        }
    }

    /// Oldest item first, waiting up to `timeout`
    fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, MeasureError> {
        let mut g = self.inner.lock()?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = g.items.pop_front() {
                return Ok(Some(item));
            }
            if g.closed {
                return Err(MeasureError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (ng, _) = self.cv.wait_timeout(g, deadline - now)?;
            g = ng;
        }
    }

    fn dropped(&self) -> Result<u64, MeasureError> {
        Ok(self.inner.lock()?.dropped)
    }

    fn close(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.closed = true;
        }
        self.cv.notify_all();
    }
}

struct Inner {
    state: Mutex<SessionState>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    pipeline: FramePipeline,
    calibration: Calibration,
    queue: Queue<AnnotatedFrame>,
    processed: AtomicU64,
    capture_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    stop_flag: AtomicBool,
}

/// Capture loop that measures every frame and publishes the results.
///
/// The handle is cheap to clone; the calibration request handler and the
/// consumer of annotated frames can live on different threads.
#[derive(Clone)]
pub struct MeasurementSession {
    inner: Arc<Inner>,
}

impl MeasurementSession {
    pub fn open(
        source: Box<dyn FrameSource>,
        pipeline: FramePipeline,
        calibration: Calibration,
        buffer_capacity: usize,
    ) -> Self {
        log::info!("Opening measurement session on {}", source.describe());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::Open),
                source: Mutex::new(Some(source)),
                pipeline,
                calibration,
                queue: Queue::new(buffer_capacity),
                processed: AtomicU64::new(0),
                capture_thread: Mutex::new(None),
                stop_flag: AtomicBool::new(false),
            }),
        }
    }

    pub fn start(&self) -> Result<(), MeasureError> {
        let mut state = self.inner.state.lock()?;
        match *state {
            SessionState::Closed => return Err(MeasureError::AlreadyClosed),
            SessionState::Started => return Err(MeasureError::AlreadyStarted),
            SessionState::Stopped | SessionState::Open => {}
        }

        {
            let mut source = self.inner.source.lock()?;
            let source = source.as_mut().ok_or(MeasureError::Closed)?;
            source.start()?;
        }

        self.inner.stop_flag.store(false, Ordering::Relaxed);

        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("crabcaliper-capture".to_string())
            .spawn(move || capture_loop(inner))
            .map_err(|e| MeasureError::Initialization(format!("spawn failed: {e}")))?;

        *self.inner.capture_thread.lock()? = Some(handle);
        *state = SessionState::Started;
        log::info!("Measurement session started");
        Ok(())
    }

    /// Signal the capture loop and wait for it to finish its current frame
    pub fn stop(&self, join_timeout: Duration) -> Result<(), MeasureError> {
        let state = self.inner.state.lock()?;
        match *state {
            SessionState::Closed => return Err(MeasureError::AlreadyClosed),
            SessionState::Stopped | SessionState::Open => {
                return Err(MeasureError::AlreadyStopped)
            }
            SessionState::Started => {}
        }

        self.inner.stop_flag.store(true, Ordering::Relaxed);

        let join_handle = self.inner.capture_thread.lock()?.take();
        drop(state);

        if let Some(handle) = join_handle {
            let start = Instant::now();
            while !handle.is_finished() {
                if start.elapsed() >= join_timeout {
                    // keep the handle so a later stop/close can retry
                    *self.inner.capture_thread.lock()? = Some(handle);
                    return Err(MeasureError::Timeout);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }

        let mut state = self.inner.state.lock()?;
        if *state != SessionState::Closed {
            *state = SessionState::Stopped;
        }
        log::info!(
            "Measurement session stopped after {} frames",
            self.frames_processed()
        );
        Ok(())
    }

    pub fn close(&self, join_timeout: Duration) -> Result<(), MeasureError> {
        {
            let state = *self.inner.state.lock()?;
            if state == SessionState::Closed {
                return Err(MeasureError::AlreadyClosed);
            }
        }

        match self.stop(join_timeout) {
            Ok(()) | Err(MeasureError::AlreadyStopped) => {}
            Err(e) => log::warn!("Error stopping session during close: {}", e),
        }

        self.inner.queue.close();
        // the capture loop already stopped the stream on its way out
        if let Some(source) = self.inner.source.lock()?.take() {
            log::debug!("Releasing {}", source.describe());
        }
        *self.inner.state.lock()? = SessionState::Closed;
        Ok(())
    }

    /// Oldest pending annotated frame
    pub fn get_frame(&self, timeout: Duration) -> Result<Option<AnnotatedFrame>, MeasureError> {
        self.ensure_readable()?;
        self.inner.queue.pop_timeout(timeout)
    }

    /// Newest annotated frame; older ones still queued are discarded
    pub fn latest_frame(&self, timeout: Duration) -> Result<Option<AnnotatedFrame>, MeasureError> {
        self.ensure_readable()?;
        self.inner.queue.pop_latest(timeout)
    }

    /// Calibration request from the front end
    pub fn set_calibration_width(&self, input: &str) -> Result<f64, MeasureError> {
        self.ensure_not_closed()?;
        self.inner.calibration.set_calibration_width(input)
    }

    pub fn calibration(&self) -> &Calibration {
        &self.inner.calibration
    }

    pub fn calibration_snapshot(&self) -> Result<CalibrationSnapshot, MeasureError> {
        self.inner.calibration.snapshot()
    }

    pub fn dropped_frames(&self) -> Result<u64, MeasureError> {
        self.ensure_not_closed()?;
        self.inner.queue.dropped()
    }

    pub fn frames_processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        let started = self
            .inner
            .state
            .lock()
            .map(|s| *s == SessionState::Started)
            .unwrap_or(false);
        let alive = self
            .inner
            .capture_thread
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false);
        started && alive
    }

    fn ensure_readable(&self) -> Result<(), MeasureError> {
        match *self.inner.state.lock()? {
            SessionState::Closed => Err(MeasureError::Closed),
            // frames published before a stop can still be drained
            SessionState::Stopped | SessionState::Started => Ok(()),
            SessionState::Open => Err(MeasureError::Stopped),
        }
    }

    fn ensure_not_closed(&self) -> Result<(), MeasureError> {
        if *self.inner.state.lock()? == SessionState::Closed {
            return Err(MeasureError::Closed);
        }
        Ok(())
    }
}

fn capture_loop(inner: Arc<Inner>) {
    let mut source = match inner.source.lock() {
        Ok(mut guard) => match guard.take() {
            Some(source) => source,
            None => return,
        },
        Err(_) => {
            log::error!("Source lock poisoned, capture loop not started");
            inner.queue.close();
            return;
        }
    };

    loop {
        if inner.stop_flag.load(Ordering::Relaxed) {
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("End of stream from {}", source.describe());
                inner.queue.close();
                break;
            }
            Err(e) => {
                log::error!("Capture failed on {}: {}", source.describe(), e);
                inner.queue.close();
                break;
            }
        };

        match inner.pipeline.process(&frame, &inner.calibration) {
            Ok(annotated) => {
                inner.processed.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = inner.queue.push_drop_oldest(annotated) {
                    log::error!("Failed to publish frame: {}", e);
                    break;
                }
            }
            Err(e) => log::warn!("Dropping frame {}: {}", frame.id, e),
        }
    }

    if let Err(e) = source.stop() {
        log::warn!("Error stopping {}: {}", source.describe(), e);
    }

    // hand the source back so the session can restart or release it
    match inner.source.lock() {
        Ok(mut guard) => *guard = Some(source),
        Err(_) => log::warn!("Source lock poisoned, dropping source"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::source::FrameSequence;
    use crate::config::CrabCaliperConfig;
    use crate::testing::blank_frame;

    fn session_with(frames: usize, capacity: usize) -> MeasurementSession {
        let config = CrabCaliperConfig::default();
        let frames = (0..frames).map(|_| blank_frame(64, 48)).collect();
        MeasurementSession::open(
            Box::new(FrameSequence::new(frames)),
            FramePipeline::from_config(&config).unwrap(),
            Calibration::default(),
            capacity,
        )
    }

    #[test]
    fn test_queue_drops_oldest() {
        let queue = Queue::new(2);
        for i in 0..5 {
            queue.push_drop_oldest(i).unwrap();
        }
        assert_eq!(queue.dropped().unwrap(), 3);
        assert_eq!(queue.pop_timeout(Duration::ZERO).unwrap(), Some(3));
        assert_eq!(queue.pop_timeout(Duration::ZERO).unwrap(), Some(4));
        assert_eq!(queue.pop_timeout(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_queue_latest_discards_older() {
        let queue = Queue::new(4);
        for i in 0..3 {
            queue.push_drop_oldest(i).unwrap();
        }
        assert_eq!(queue.pop_latest(Duration::ZERO).unwrap(), Some(2));
        assert_eq!(queue.dropped().unwrap(), 2);
        assert_eq!(queue.pop_latest(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_closed_queue_errors_when_empty() {
        let queue: Queue<u8> = Queue::new(1);
        queue.close();
        assert_eq!(
            queue.pop_timeout(Duration::from_millis(10)),
            Err(MeasureError::Closed)
        );
    }

    #[test]
    fn test_lifecycle_errors() {
        let session = session_with(1, 2);
        assert_eq!(
            session.stop(Duration::from_millis(10)),
            Err(MeasureError::AlreadyStopped)
        );
        assert_eq!(
            session.get_frame(Duration::ZERO).unwrap_err(),
            MeasureError::Stopped
        );

        session.start().unwrap();
        assert_eq!(session.start(), Err(MeasureError::AlreadyStarted));

        session.close(Duration::from_secs(1)).unwrap();
        assert_eq!(
            session.close(Duration::from_secs(1)),
            Err(MeasureError::AlreadyClosed)
        );
        assert_eq!(session.start(), Err(MeasureError::AlreadyClosed));
        assert!(session.set_calibration_width("2").is_err());
    }

    #[test]
    fn test_end_of_stream_closes_queue() {
        let session = session_with(3, 8);
        session.start().unwrap();

        let mut received = 0;
        loop {
            match session.get_frame(Duration::from_secs(5)) {
                Ok(Some(_)) => received += 1,
                Ok(None) => panic!("timed out waiting for frames"),
                Err(MeasureError::Closed) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(received, 3);
        assert_eq!(session.frames_processed(), 3);
        session.close(Duration::from_secs(1)).unwrap();
    }
}
