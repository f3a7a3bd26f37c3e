use clap::{Args, Parser, Subcommand};
use rust_qr_scan::tools::{load_frame, load_frames, save_frame};
use rust_qr_scan::{
    CancelToken, DecodeResult, DeviceSelector, FrameDecoder, PreviewMailbox, QrDecoder,
    ReplayOpener, ScanConfig, ScanSession, SessionController, SessionOutcome, init_tracing,
    open_scan_session,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "qrtool", version, about = "RustQR scan tools")]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for the `QR_SCAN_*` environment settings
#[derive(Args)]
struct SessionArgs {
    /// Camera to open: "default", an index, or a device name
    #[arg(long, global = true)]
    device: Option<String>,
    /// Frame wait / cancellation check interval in milliseconds
    #[arg(long, global = true)]
    frame_timeout_ms: Option<u64>,
    /// Discard decodes slower than this many milliseconds
    #[arg(long, global = true)]
    decode_budget_ms: Option<u64>,
    /// Skip the contrast-stretch + Otsu retry
    #[arg(long, global = true)]
    no_enhance: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a QR code with the camera
    Scan {
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Save the last preview frame to this file
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Copy the decoded text to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Decode a single image file
    Decode {
        #[arg(long)]
        image: PathBuf,
    },
    /// Run a scan session over image files used as a virtual camera
    Replay {
        #[arg(long, required = true, num_args = 1..)]
        image: Vec<PathBuf>,
        /// Delay between frames in milliseconds
        #[arg(long, default_value_t = 33)]
        interval_ms: u64,
        /// Start over after the last image
        #[arg(long)]
        looping: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Copy the decoded text to the clipboard
        #[arg(long)]
        copy: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match build_config(&cli.session) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Scan {
            timeout_secs,
            snapshot,
            copy,
        } => scan_cmd(config, timeout_secs, snapshot, copy),
        Command::Decode { image } => decode_cmd(&config, &image),
        Command::Replay {
            image,
            interval_ms,
            looping,
            timeout_secs,
            copy,
        } => replay_cmd(config, &image, interval_ms, looping, timeout_secs, copy),
    };
    result.unwrap_or_else(|err| {
        eprintln!("{}", err);
        ExitCode::FAILURE
    })
}

fn build_config(args: &SessionArgs) -> rust_qr_scan::Result<ScanConfig> {
    let mut config = ScanConfig::from_env()?;
    if let Some(device) = &args.device {
        config = config.device(device.parse::<DeviceSelector>()?);
    }
    if let Some(ms) = args.frame_timeout_ms.filter(|ms| *ms > 0) {
        config = config.frame_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.decode_budget_ms.filter(|ms| *ms > 0) {
        config = config.decode_budget(Duration::from_millis(ms));
    }
    if args.no_enhance {
        config = config.enhance(false);
    }
    Ok(config)
}

fn scan_cmd(
    config: ScanConfig,
    timeout_secs: Option<u64>,
    snapshot: Option<PathBuf>,
    copy: bool,
) -> rust_qr_scan::Result<ExitCode> {
    let preview = PreviewMailbox::new();
    let session = open_scan_session(config, preview.clone());
    run_session(session, preview, timeout_secs, snapshot, copy)
}

fn decode_cmd(config: &ScanConfig, image: &Path) -> rust_qr_scan::Result<ExitCode> {
    let frame = load_frame(image, 1)?;

    let mut decoder = QrDecoder::from_config(config);
    let start = Instant::now();
    let result = decoder.decode(&frame);
    let elapsed = start.elapsed();
    println!(
        "Image: {} ({}x{}) decoded in {:.2?}",
        image.display(),
        frame.width(),
        frame.height(),
        elapsed
    );
    let code = match result {
        DecodeResult::Decoded { text } => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        DecodeResult::NotFound => {
            println!("No code scanned");
            ExitCode::FAILURE
        }
        DecodeResult::DecodeError { reason } => {
            println!("QR code found but could not be read: {}", reason);
            ExitCode::FAILURE
        }
    };
    Ok(code)
}

fn replay_cmd(
    config: ScanConfig,
    images: &[PathBuf],
    interval_ms: u64,
    looping: bool,
    timeout_secs: Option<u64>,
    copy: bool,
) -> rust_qr_scan::Result<ExitCode> {
    let frames = load_frames(images)?;

    let preview = PreviewMailbox::new();
    let opener = ReplayOpener::new(frames, Duration::from_millis(interval_ms)).looping(looping);
    let session = ScanSession::builder(opener)
        .decoder(QrDecoder::from_config(&config))
        .preview(preview.clone())
        .config(config)
        .build();
    run_session(session, preview, timeout_secs, None, copy)
}

fn run_session(
    mut session: SessionController,
    preview: PreviewMailbox,
    timeout_secs: Option<u64>,
    snapshot: Option<PathBuf>,
    copy: bool,
) -> rust_qr_scan::Result<ExitCode> {
    session.start()?;

    let deadline = timeout_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let display = {
        let token = session.cancel_token();
        thread::spawn(move || show_preview(preview, token, deadline, snapshot))
    };

    let outcome = session.await_outcome();
    let _ = display.join();

    if let Some(text) = text_to_copy(&outcome, copy) {
        match copy_to_clipboard(text) {
            Ok(()) => eprintln!("Copied to clipboard"),
            Err(err) => eprintln!("Could not copy to clipboard: {}", err),
        }
    }

    let code = match outcome {
        SessionOutcome::Success { text } => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        SessionOutcome::Cancelled => {
            println!("No code scanned");
            ExitCode::SUCCESS
        }
        SessionOutcome::DeviceUnavailable => {
            eprintln!("The camera could not be opened. Check that it is connected and not in use.");
            ExitCode::FAILURE
        }
        SessionOutcome::DeviceLost => {
            eprintln!("The camera stopped responding during the scan.");
            ExitCode::FAILURE
        }
    };
    Ok(code)
}

/// Text to put on the clipboard: the payload of a successful scan, when asked
fn text_to_copy(outcome: &SessionOutcome, copy: bool) -> Option<&str> {
    if copy { outcome.text() } else { None }
}

fn copy_to_clipboard(text: &str) -> Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text)
}

/// Stands in for a display surface: reports preview frames once a second and
/// enforces the optional deadline by cancelling the session.
fn show_preview(
    preview: PreviewMailbox,
    token: CancelToken,
    deadline: Option<Instant>,
    snapshot: Option<PathBuf>,
) {
    let mut shown = 0u64;
    let mut last_report = Instant::now();
    let mut latest = None;

    while !token.is_terminated() {
        if let Some(frame) = preview.wait_latest(Duration::from_millis(100)) {
            shown += 1;
            if last_report.elapsed() >= Duration::from_secs(1) {
                eprintln!(
                    "preview: frame #{} {}x{} ({} shown)",
                    frame.sequence(),
                    frame.width(),
                    frame.height(),
                    shown
                );
                last_report = Instant::now();
            }
            latest = Some(frame);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            token.cancel();
        }
    }

    if let (Some(path), Some(frame)) = (snapshot, latest) {
        match save_frame(&frame, &path) {
            Ok(()) => eprintln!("Saved preview frame to {}", path.display()),
            Err(err) => eprintln!("{}", err),
        }
    }
}
