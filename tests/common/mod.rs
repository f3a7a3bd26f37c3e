//! Shared fixtures: rendered QR frames, a scripted camera and scripted decoders

#![allow(dead_code)]

use rust_qr_scan::{
    DecodeResult, DeviceError, DeviceSelector, Frame, FrameDecoder, FrameError, FrameSource,
    PixelFormat, SourceOpener,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const MODULE_PX: usize = 4;
pub const QUIET_ZONE: usize = 4;

/// Render `text` as a QR symbol, `MODULE_PX` pixels per module with a
/// `QUIET_ZONE`-module white border
pub fn qr_frame(text: &str, format: PixelFormat, sequence: u64) -> Frame {
    let code = qrencode::QrCode::new(text.as_bytes()).expect("encode test payload");
    render_code(&code, format, sequence)
}

/// Same layout as [`qr_frame`] for an already encoded symbol
pub fn render_code(code: &qrencode::QrCode, format: PixelFormat, sequence: u64) -> Frame {
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;

    let mut gray = vec![255u8; side * side];
    for my in 0..modules {
        for mx in 0..modules {
            if colors[my * modules + mx] != qrencode::Color::Dark {
                continue;
            }
            let x0 = (mx + QUIET_ZONE) * MODULE_PX;
            let y0 = (my + QUIET_ZONE) * MODULE_PX;
            for y in y0..y0 + MODULE_PX {
                gray[y * side + x0..y * side + x0 + MODULE_PX].fill(0);
            }
        }
    }
    frame_from_gray(gray, side as u32, side as u32, format, sequence)
}

/// A `width` x `height` frame of `background` with the [`qr_frame`] symbol
/// for `text` pasted at (`x`, `y`)
pub fn symbol_in_scene(
    text: &str,
    (width, height): (usize, usize),
    (x, y): (usize, usize),
    background: u8,
    format: PixelFormat,
) -> Frame {
    let symbol = qr_frame(text, PixelFormat::Gray, 1);
    let side = symbol.width() as usize;
    assert!(x + side <= width && y + side <= height, "scene too small for symbol");

    let mut scene = vec![background; width * height];
    for row in 0..side {
        let src = &symbol.data()[row * side..(row + 1) * side];
        let dst = (y + row) * width + x;
        scene[dst..dst + side].copy_from_slice(src);
    }
    frame_from_gray(scene, width as u32, height as u32, format, 1)
}

/// Uniform mid-gray frame with nothing to find
pub fn blank_frame(width: u32, height: u32, sequence: u64) -> Frame {
    Frame::new(
        vec![128u8; (width * height) as usize],
        width,
        height,
        PixelFormat::Gray,
        sequence,
    )
    .expect("valid layout")
}

pub fn frame_from_gray(
    gray: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
) -> Frame {
    let data = match format {
        PixelFormat::Gray => gray,
        PixelFormat::Rgb => gray.iter().flat_map(|&v| [v, v, v]).collect(),
    };
    Frame::new(data, width, height, format, sequence).expect("valid layout")
}

/// One scripted `next_frame` result
pub enum Step {
    Frame(Frame),
    Timeout,
    Lost,
}

/// Call counters shared between a test and its [`ScriptedSource`]
#[derive(Default)]
pub struct SourceStats {
    pub next_frame_calls: AtomicUsize,
    pub calls_after_lost: AtomicUsize,
    pub closes: AtomicUsize,
    lost: AtomicBool,
}

impl SourceStats {
    pub fn next_frame_calls(&self) -> usize {
        self.next_frame_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls_after_lost(&self) -> usize {
        self.calls_after_lost.load(Ordering::SeqCst)
    }
}

/// Camera stand-in that plays a fixed script, one step per `next_frame` call,
/// pausing `interval` before each frame. After the script it times out forever.
pub struct ScriptedSource {
    steps: std::vec::IntoIter<Step>,
    interval: Duration,
    stats: Arc<SourceStats>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>, interval: Duration) -> (Self, Arc<SourceStats>) {
        let stats = Arc::new(SourceStats::default());
        let source = Self {
            steps: steps.into_iter(),
            interval,
            stats: Arc::clone(&stats),
        };
        (source, stats)
    }

    /// Source delivering `frames` then timing out
    pub fn frames(frames: Vec<Frame>, interval: Duration) -> (Self, Arc<SourceStats>) {
        Self::new(frames.into_iter().map(Step::Frame).collect(), interval)
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, FrameError> {
        self.stats.next_frame_calls.fetch_add(1, Ordering::SeqCst);
        if self.stats.lost.load(Ordering::SeqCst) {
            self.stats.calls_after_lost.fetch_add(1, Ordering::SeqCst);
        }
        match self.steps.next() {
            Some(Step::Frame(frame)) => {
                thread::sleep(self.interval);
                Ok(frame)
            }
            Some(Step::Lost) => {
                self.stats.lost.store(true, Ordering::SeqCst);
                Err(FrameError::DeviceLost {
                    reason: "unplugged".to_string(),
                })
            }
            Some(Step::Timeout) | None => {
                thread::sleep(timeout);
                Err(FrameError::Timeout)
            }
        }
    }

    fn close(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opener handing out one prepared source, or failing with a fixed error
pub struct ScriptedOpener {
    source: Option<ScriptedSource>,
    failure: Option<DeviceError>,
    pub opens: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub fn new(source: ScriptedSource) -> Self {
        Self {
            source: Some(source),
            failure: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: DeviceError) -> Self {
        Self {
            source: None,
            failure: Some(error),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SourceOpener for ScriptedOpener {
    fn open(&mut self, selector: &DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.take() {
            return Err(error);
        }
        match self.source.take() {
            Some(source) => Ok(Box::new(source)),
            None => Err(DeviceError::Busy {
                selector: selector.to_string(),
            }),
        }
    }
}

/// What a [`ScriptedDecoder`] does for one sequence number
#[derive(Clone)]
pub struct Reply {
    pub delay: Duration,
    pub result: DecodeResult,
}

impl Reply {
    pub fn decoded(text: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: DecodeResult::Decoded {
                text: text.to_string(),
            },
        }
    }

    pub fn not_found() -> Self {
        Self {
            delay: Duration::ZERO,
            result: DecodeResult::NotFound,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Decoder answering by frame sequence (unlisted sequences are `NotFound`)
/// and recording every sequence it was handed
pub struct ScriptedDecoder {
    replies: HashMap<u64, Reply>,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedDecoder {
    pub fn new(replies: impl IntoIterator<Item = (u64, Reply)>) -> (Self, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let decoder = Self {
            replies: replies.into_iter().collect(),
            seen: Arc::clone(&seen),
        };
        (decoder, seen)
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn decode(&mut self, frame: &Frame) -> DecodeResult {
        self.seen.lock().unwrap().push(frame.sequence());
        match self.replies.get(&frame.sequence()) {
            Some(reply) => {
                thread::sleep(reply.delay);
                reply.result.clone()
            }
            None => DecodeResult::NotFound,
        }
    }
}

/// Poll `cond` every few milliseconds until it holds or `within` elapses
pub fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
