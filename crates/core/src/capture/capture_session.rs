use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use crate::capture::domain::sample_buffer_delegate::SampleBufferDelegate;
use crate::capture::domain::video_device::{DeviceFormat, VideoDevice, VideoDeviceDiscovery};
use crate::capture::preview_feed::PreviewFeed;
use crate::orientation::domain::device_orientation::CameraPosition;
use crate::shared::constants::VIDEO_QUEUE_LABEL;
use crate::shared::sample_buffer::SampleBuffer;

/// Samples queued for a slow delegate when late frames are kept.
const DELIVERY_QUEUE_CAPACITY: usize = 8;

const READER_THREAD_NAME: &str = "capture-device";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture device: {0}")]
    DeviceOpen(String),
    #[error("session already has a video input")]
    InputAlreadyAdded,
    #[error("session already has a video data output")]
    OutputAlreadyAdded,
    #[error("cannot reconfigure a running session")]
    SessionRunning,
    #[error("failed to spawn {label} thread: {source}")]
    ThreadSpawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// An opened video device attached to a session. Closes the device on drop.
pub struct DeviceInput {
    device: Box<dyn VideoDevice>,
    format: DeviceFormat,
}

impl DeviceInput {
    pub fn new(mut device: Box<dyn VideoDevice>) -> Result<Self, CaptureError> {
        let format = device
            .open()
            .map_err(|e| CaptureError::DeviceOpen(e.to_string()))?;
        Ok(Self { device, format })
    }

    pub fn format(&self) -> &DeviceFormat {
        &self.format
    }

    pub fn position(&self) -> CameraPosition {
        self.device.position()
    }
}

impl Drop for DeviceInput {
    fn drop(&mut self) {
        self.device.close();
    }
}

/// Delivers samples to a delegate on a dedicated, named thread.
pub struct VideoDataOutput {
    delegate: Option<Box<dyn SampleBufferDelegate>>,
    queue_label: String,
    discards_late_frames: bool,
}

impl VideoDataOutput {
    pub fn new() -> Self {
        Self {
            delegate: None,
            queue_label: VIDEO_QUEUE_LABEL.to_string(),
            discards_late_frames: true,
        }
    }

    pub fn set_sample_buffer_delegate(
        &mut self,
        delegate: Box<dyn SampleBufferDelegate>,
        queue_label: &str,
    ) {
        self.delegate = Some(delegate);
        self.queue_label = queue_label.to_string();
    }

    /// When set (the default), a sample arriving while the delegate is
    /// still busy is dropped. When cleared, samples queue up and the
    /// device thread blocks once the queue is full.
    pub fn set_discards_late_frames(&mut self, discard: bool) {
        self.discards_late_frames = discard;
    }

    pub fn discards_late_frames(&self) -> bool {
        self.discards_late_frames
    }

    pub fn queue_label(&self) -> &str {
        &self.queue_label
    }
}

impl Default for VideoDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample counts since the session was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Samples read from the device.
    pub captured: usize,
    /// Samples handed to the delegate.
    pub delivered: usize,
    /// Samples discarded because the delegate was busy.
    pub dropped: usize,
}

#[derive(Default)]
struct Counters {
    captured: AtomicUsize,
    delivered: AtomicUsize,
    dropped: AtomicUsize,
}

/// Owns one video input and one video-data output and moves samples from
/// the former to the latter while running.
///
/// Layout while running: `device thread → [channel] → delivery thread`.
/// The device thread also publishes every image to the preview feed.
pub struct CaptureSession {
    input: Option<DeviceInput>,
    input_format: Option<DeviceFormat>,
    input_position: Option<CameraPosition>,
    output: Option<VideoDataOutput>,
    preview: PreviewFeed,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    reader: Option<JoinHandle<DeviceInput>>,
    delivery: Option<JoinHandle<VideoDataOutput>>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            input: None,
            input_format: None,
            input_position: None,
            output: None,
            preview: PreviewFeed::new(),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            reader: None,
            delivery: None,
        }
    }

    pub fn can_add_input(&self) -> bool {
        self.input_format.is_none() && !self.is_running()
    }

    pub fn add_input(&mut self, input: DeviceInput) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::SessionRunning);
        }
        if self.input_format.is_some() {
            return Err(CaptureError::InputAlreadyAdded);
        }
        self.input_format = Some(input.format().clone());
        self.input_position = Some(input.position());
        self.input = Some(input);
        Ok(())
    }

    /// Acquires the default device and adds it as the input.
    ///
    /// A missing device or one that fails to open is logged and skipped;
    /// the session then runs without video. Returns whether an input was
    /// added.
    pub fn attach_default_input(&mut self, discovery: &dyn VideoDeviceDiscovery) -> bool {
        let Some(device) = discovery.default_video_device() else {
            log::warn!("No default video device; session will run without video");
            return false;
        };
        let input = match DeviceInput::new(device) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Skipping video input: {e}");
                return false;
            }
        };
        let format = input.format().clone();
        match self.add_input(input) {
            Ok(()) => {
                log::info!(
                    "Video input: {} ({}x{} @ {:.1} fps)",
                    format.name,
                    format.width,
                    format.height,
                    format.fps
                );
                true
            }
            Err(e) => {
                log::warn!("Skipping video input: {e}");
                false
            }
        }
    }

    pub fn add_output(&mut self, output: VideoDataOutput) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::SessionRunning);
        }
        if self.output.is_some() {
            return Err(CaptureError::OutputAlreadyAdded);
        }
        self.output = Some(output);
        Ok(())
    }

    /// Display binding for the live preview. Holding it does not keep the
    /// session alive.
    pub fn preview_feed(&self) -> PreviewFeed {
        self.preview.clone()
    }

    pub fn input_format(&self) -> Option<&DeviceFormat> {
        self.input_format.as_ref()
    }

    /// Facing of the attached camera, stable across start and stop.
    pub fn input_position(&self) -> Option<CameraPosition> {
        self.input_position
    }

    /// Starts frame delivery. Calling it on a running session does nothing.
    pub fn start_running(&mut self) -> Result<(), CaptureError> {
        if self.is_running() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let Some(input) = self.input.take() else {
            log::warn!("Session started without a video input");
            return Ok(());
        };

        let mut sender = None;
        if let Some(output) = self.output.take() {
            let capacity = if output.discards_late_frames() {
                1
            } else {
                DELIVERY_QUEUE_CAPACITY
            };
            let (tx, rx) = crossbeam_channel::bounded::<SampleBuffer>(capacity);
            let discard = output.discards_late_frames();
            match spawn_delivery(output, rx, self.running.clone(), self.counters.clone()) {
                Ok(handle) => {
                    self.delivery = Some(handle);
                    sender = Some((tx, discard));
                }
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    self.input = Some(input);
                    return Err(e);
                }
            }
        } else {
            log::warn!("Session started without a video data output");
        }

        match spawn_reader(
            input,
            sender,
            self.preview.clone(),
            self.running.clone(),
            self.counters.clone(),
        ) {
            Ok(handle) => {
                self.reader = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.stop_running();
                Err(e)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True while samples may still reach the delegate: the device has not
    /// run dry and the delivery thread has not drained its queue.
    pub fn is_delivering(&self) -> bool {
        self.is_running() && (is_alive(&self.reader) || is_alive(&self.delivery))
    }

    /// Stops delivery and joins both threads. The input and output are
    /// reattached, so the session can be started again.
    pub fn stop_running(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.reader.take() {
            match handle.join() {
                Ok(input) => self.input = Some(input),
                Err(_) => log::error!("Capture device thread panicked"),
            }
        }
        if let Some(handle) = self.delivery.take() {
            match handle.join() {
                Ok(output) => self.output = Some(output),
                Err(_) => log::error!("Sample delivery thread panicked"),
            }
        }
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            captured: self.counters.captured.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn is_alive<T>(handle: &Option<JoinHandle<T>>) -> bool {
    handle.as_ref().is_some_and(|h| !h.is_finished())
}

fn spawn_reader(
    mut input: DeviceInput,
    sender: Option<(Sender<SampleBuffer>, bool)>,
    preview: PreviewFeed,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
) -> Result<JoinHandle<DeviceInput>, CaptureError> {
    thread::Builder::new()
        .name(READER_THREAD_NAME.to_string())
        .spawn(move || {
            for result in input.device.samples() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let sample = match result {
                    Ok(sample) => sample,
                    Err(e) => {
                        log::warn!("Capture device stopped: {e}");
                        break;
                    }
                };
                counters.captured.fetch_add(1, Ordering::Relaxed);

                if let Some(frame) = sample.image_buffer() {
                    preview.publish(frame.clone());
                }

                let Some((tx, discard)) = &sender else {
                    continue;
                };
                if *discard {
                    match tx.try_send(sample) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            counters.dropped.fetch_add(1, Ordering::Relaxed);
                            log::trace!("Delegate busy, dropped late sample");
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                } else if tx.send(sample).is_err() {
                    break;
                }
            }
            log::debug!("Capture device thread finished");
            input
        })
        .map_err(|source| CaptureError::ThreadSpawn {
            label: READER_THREAD_NAME.to_string(),
            source,
        })
}

fn spawn_delivery(
    mut output: VideoDataOutput,
    rx: Receiver<SampleBuffer>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
) -> Result<JoinHandle<VideoDataOutput>, CaptureError> {
    let label = output.queue_label().to_string();
    thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            for sample in rx {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(delegate) = output.delegate.as_mut() {
                    delegate.did_output(sample);
                }
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            output
        })
        .map_err(|source| CaptureError::ThreadSpawn { label, source })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use rstest::rstest;

    use super::*;
    use crate::shared::frame::Frame;

    /// Replays a fixed list of samples, optionally signalling once drained.
    struct ScriptedDevice {
        samples: Vec<SampleBuffer>,
        fail_open: bool,
        drained: Option<Sender<()>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedDevice {
        fn with_frames(count: usize) -> Self {
            let samples = (0..count)
                .map(|i| {
                    SampleBuffer::new(
                        Frame::new(vec![0u8; 12], 2, 2, 3, i),
                        Duration::from_millis(i as u64 * 33),
                    )
                })
                .collect();
            Self {
                samples,
                fail_open: false,
                drained: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl VideoDevice for ScriptedDevice {
        fn open(&mut self) -> Result<DeviceFormat, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("device busy".into());
            }
            Ok(DeviceFormat {
                width: 2,
                height: 2,
                fps: 30.0,
                name: "scripted".to_string(),
            })
        }

        fn samples(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<SampleBuffer, Box<dyn std::error::Error>>> + '_>
        {
            let drained = self.drained.take();
            Box::new(
                self.samples
                    .drain(..)
                    .map(Ok)
                    .chain(std::iter::from_fn(move || {
                        if let Some(tx) = &drained {
                            let _ = tx.send(());
                        }
                        None
                    })),
            )
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Produces samples until the session stops reading.
    struct EndlessDevice {
        position: CameraPosition,
        closed: Arc<AtomicBool>,
    }

    impl VideoDevice for EndlessDevice {
        fn open(&mut self) -> Result<DeviceFormat, Box<dyn std::error::Error>> {
            Ok(DeviceFormat {
                width: 2,
                height: 2,
                fps: 0.0,
                name: "endless".to_string(),
            })
        }

        fn samples(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<SampleBuffer, Box<dyn std::error::Error>>> + '_>
        {
            Box::new((0..).map(|i| {
                Ok(SampleBuffer::new(
                    Frame::new(vec![0u8; 12], 2, 2, 3, i),
                    Duration::ZERO,
                ))
            }))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn position(&self) -> CameraPosition {
            self.position
        }
    }

    /// Takes a little while over every sample.
    struct SlowDelegate;

    impl SampleBufferDelegate for SlowDelegate {
        fn did_output(&mut self, _sample: SampleBuffer) {
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Records the index of every delivered sample (`None` when imageless).
    struct RecordingDelegate {
        seen: Arc<Mutex<Vec<Option<usize>>>>,
        gate: Option<Receiver<()>>,
    }

    impl SampleBufferDelegate for RecordingDelegate {
        fn did_output(&mut self, sample: SampleBuffer) {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }
            self.seen
                .lock()
                .unwrap()
                .push(sample.image_buffer().map(|f| f.index()));
        }
    }

    fn output_with(
        seen: &Arc<Mutex<Vec<Option<usize>>>>,
        gate: Option<Receiver<()>>,
        discard: bool,
    ) -> VideoDataOutput {
        let mut output = VideoDataOutput::new();
        output.set_sample_buffer_delegate(
            Box::new(RecordingDelegate {
                seen: seen.clone(),
                gate,
            }),
            "test-queue",
        );
        output.set_discards_late_frames(discard);
        output
    }

    fn wait_until_drained(session: &CaptureSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_delivering() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_delivers_all_samples_in_order_when_keeping_late_frames() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(ScriptedDevice::with_frames(20))).unwrap())
            .unwrap();
        session.add_output(output_with(&seen, None, false)).unwrap();

        session.start_running().unwrap();
        wait_until_drained(&session);
        session.stop_running();

        let expected: Vec<Option<usize>> = (0..20).map(Some).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
        assert_eq!(
            session.stats(),
            CaptureStats {
                captured: 20,
                delivered: 20,
                dropped: 0
            }
        );
    }

    #[test]
    fn test_busy_delegate_drops_late_frames() {
        let (drained_tx, drained_rx) = crossbeam_channel::bounded(1);
        let mut device = ScriptedDevice::with_frames(10);
        device.drained = Some(drained_tx);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(device)).unwrap())
            .unwrap();
        session
            .add_output(output_with(&seen, Some(drained_rx), true))
            .unwrap();

        session.start_running().unwrap();
        wait_until_drained(&session);
        session.stop_running();

        let stats = session.stats();
        assert_eq!(stats.captured, 10);
        assert_eq!(stats.delivered + stats.dropped, 10);
        assert!(stats.dropped >= 8, "{stats:?}");
        assert_eq!(seen.lock().unwrap()[0], Some(0));
    }

    #[test]
    fn test_imageless_samples_still_reach_delegate() {
        let mut device = ScriptedDevice::with_frames(1);
        device
            .samples
            .push(SampleBuffer::without_image(Duration::from_millis(50)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(device)).unwrap())
            .unwrap();
        session.add_output(output_with(&seen, None, false)).unwrap();

        session.start_running().unwrap();
        wait_until_drained(&session);
        session.stop_running();

        assert_eq!(*seen.lock().unwrap(), vec![Some(0), None]);
    }

    #[test]
    fn test_preview_feed_receives_frames() {
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(ScriptedDevice::with_frames(3))).unwrap())
            .unwrap();
        let feed = session.preview_feed();

        session.start_running().unwrap();
        wait_until_drained(&session);
        session.stop_running();

        assert_eq!(feed.take_latest().unwrap().index(), 2);
    }

    #[test]
    fn test_missing_device_runs_without_input() {
        let discovery = || -> Option<Box<dyn VideoDevice>> { None };
        let mut session = CaptureSession::new();

        assert!(!session.attach_default_input(&discovery));
        session.start_running().unwrap();

        assert!(session.is_running());
        assert!(!session.is_delivering());
        assert_eq!(session.stats(), CaptureStats::default());
    }

    #[test]
    fn test_device_that_fails_to_open_is_skipped() {
        let discovery = || -> Option<Box<dyn VideoDevice>> {
            let mut device = ScriptedDevice::with_frames(1);
            device.fail_open = true;
            Some(Box::new(device))
        };
        let mut session = CaptureSession::new();

        assert!(!session.attach_default_input(&discovery));
        assert!(session.can_add_input());
        assert!(session.input_format().is_none());
    }

    #[test]
    fn test_second_input_is_rejected() {
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(ScriptedDevice::with_frames(1))).unwrap())
            .unwrap();
        let err = session
            .add_input(DeviceInput::new(Box::new(ScriptedDevice::with_frames(1))).unwrap())
            .unwrap_err();
        assert!(matches!(err, CaptureError::InputAlreadyAdded));
    }

    #[test]
    fn test_running_session_rejects_outputs() {
        let mut session = CaptureSession::new();
        session.start_running().unwrap();
        let err = session.add_output(VideoDataOutput::new()).unwrap_err();
        assert!(matches!(err, CaptureError::SessionRunning));
    }

    #[test]
    fn test_stop_is_idempotent_and_closes_device_on_drop() {
        let device = ScriptedDevice::with_frames(2);
        let closed = device.closed.clone();
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(device)).unwrap())
            .unwrap();

        session.start_running().unwrap();
        wait_until_drained(&session);
        session.stop_running();
        session.stop_running();
        assert!(!session.is_running());
        assert!(!closed.load(Ordering::SeqCst));

        drop(session);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_is_delivering_ends_when_source_drains() {
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(ScriptedDevice::with_frames(3))).unwrap())
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        session.add_output(output_with(&seen, None, false)).unwrap();

        session.start_running().unwrap();
        wait_until_drained(&session);

        assert!(session.is_running());
        assert!(!session.is_delivering());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_input_position_comes_from_device() {
        let mut session = CaptureSession::new();
        assert_eq!(session.input_position(), None);

        let device = EndlessDevice {
            position: CameraPosition::Front,
            closed: Arc::new(AtomicBool::new(false)),
        };
        session
            .add_input(DeviceInput::new(Box::new(device)).unwrap())
            .unwrap();
        assert_eq!(session.input_position(), Some(CameraPosition::Front));

        session.start_running().unwrap();
        assert_eq!(session.input_position(), Some(CameraPosition::Front));
        session.stop_running();
    }

    #[rstest]
    #[case::discard_late_frames(true)]
    #[case::keep_late_frames(false)]
    fn test_stop_while_streaming_joins_threads(#[case] discard: bool) {
        let closed = Arc::new(AtomicBool::new(false));
        let device = EndlessDevice {
            position: CameraPosition::Back,
            closed: closed.clone(),
        };
        let mut session = CaptureSession::new();
        session
            .add_input(DeviceInput::new(Box::new(device)).unwrap())
            .unwrap();
        let mut output = VideoDataOutput::new();
        output.set_sample_buffer_delegate(Box::new(SlowDelegate), "test-queue");
        output.set_discards_late_frames(discard);
        session.add_output(output).unwrap();

        session.start_running().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.stats().delivered < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(session.is_delivering());

        let stopping = Instant::now();
        session.stop_running();
        assert!(stopping.elapsed() < Duration::from_secs(2));
        assert!(!session.is_running());
        assert!(!session.is_delivering());

        let stats = session.stats();
        assert!(stats.delivered >= 5, "{stats:?}");
        assert!(stats.captured >= stats.delivered + stats.dropped, "{stats:?}");
        if !discard {
            assert_eq!(stats.dropped, 0);
        }

        session.stop_running();
        assert!(!closed.load(Ordering::SeqCst));
        drop(session);
        assert!(closed.load(Ordering::SeqCst));
    }
}
