mod tone;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use audio_rec_core::{
    CancelToken, CaptureConfiguration, CaptureDelegate, CaptureError, CaptureSession, CaptureState,
    DeviceStreamProvider, EncoderConfiguration, ExportDelegate, FileExportSink, StreamFormat, WavEncoder,
};

use crate::tone::ToneProvider;

/// Record from the microphone and export the result as audio.mp3.
#[derive(Debug, Parser)]
#[command(name = "audio-rec", version, about)]
struct Args {
    /// Seconds to record per cycle.
    #[arg(short, long, default_value_t = 3.0)]
    seconds: f64,

    /// Number of record/stop cycles to run.
    #[arg(long, default_value_t = 1)]
    cycles: u32,

    /// Directory for audio.mp3 and its metadata sidecar.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Record a synthetic tone instead of the microphone.
    #[arg(long)]
    tone: bool,

    /// Capture device ID (see --list-devices). With --tone, only "tone".
    #[arg(long)]
    device: Option<String>,

    /// List capture devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// PCM bit depth (16 or 24).
    #[arg(long, default_value_t = 16)]
    bit_depth: u16,

    /// Emit an encoder chunk every N milliseconds while recording.
    #[arg(long)]
    timeslice_ms: Option<u64>,
}

/// Prints session notifications to the console.
struct ConsoleDelegate;

impl CaptureDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        println!("state: {}", state.as_str());
    }

    fn on_error(&self, error: &CaptureError) {
        eprintln!("error: {}", error);
    }
}

fn recordings_dir() -> PathBuf {
    dirs_next::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("audio-rec Recordings")
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = if args.tone {
        run(tone_provider(), &args)
    } else {
        run_microphone(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("audio-rec: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn record_budget(seconds: f64) -> Result<Duration, CaptureError> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| CaptureError::ConfigurationFailed(format!("--seconds {}: {}", seconds, e)))
}

fn tone_provider() -> ToneProvider {
    ToneProvider::new(StreamFormat::new(48000, 2), 440.0)
}

#[cfg(target_os = "windows")]
fn run_microphone(args: &Args) -> Result<(), CaptureError> {
    run(audio_rec_windows::WasapiMicProvider::new(), args)
}

#[cfg(not(target_os = "windows"))]
fn run_microphone(args: &Args) -> Result<(), CaptureError> {
    run(audio_rec_cpal::CpalMicProvider::new(), args)
}

fn run<P: DeviceStreamProvider>(provider: P, args: &Args) -> Result<(), CaptureError> {
    if args.list_devices {
        for source in provider.available_sources()? {
            let marker = if source.is_default { "*" } else { " " };
            println!("{} {}  {}", marker, source.id, source.name);
        }
        return Ok(());
    }

    let encoder = WavEncoder::new(EncoderConfiguration {
        bit_depth: args.bit_depth,
        timeslice_ms: args.timeslice_ms,
    })?;
    let config = CaptureConfiguration {
        max_duration_secs: Some(args.seconds),
        device_id: args.device.clone(),
        ..Default::default()
    };
    let finalize_timeout = config.finalize_timeout;

    let output_dir = args.output.clone().unwrap_or_else(recordings_dir);
    let export = Arc::new(ExportDelegate::new(FileExportSink::new(output_dir)));

    let mut session = CaptureSession::new(provider, encoder, config)?;
    session.subscribe(Arc::new(ConsoleDelegate));
    session.subscribe(export.clone());

    for cycle in 1..=args.cycles {
        println!("cycle {}/{}: recording {:.1}s", cycle, args.cycles, args.seconds);
        session.start(&CancelToken::new())?;

        // max_duration_secs stops the recording; this waits through finalize.
        let budget = record_budget(args.seconds)?.saturating_add(finalize_timeout);
        let artifact = session
            .wait_until_idle(budget)?
            .ok_or_else(|| CaptureError::Unknown("recording ended without an artifact".into()))?;

        if let Some(error) = export.last_error() {
            return Err(error);
        }
        let reference = session.playable_reference();
        println!(
            "artifact {}: {} bytes, {} chunks, {:.2}s, encoded as {}",
            artifact.id(),
            artifact.len(),
            artifact.chunk_count(),
            artifact.duration_secs(),
            artifact.encoded_as()
        );
        if let Some(reference) = reference {
            println!("playable at {}", reference);
        }
        if let Some(receipt) = export.last_receipt() {
            println!("exported {} ({}, sha256 {})", receipt.path.display(), receipt.media_type, receipt.checksum);
        }
    }

    log::debug!("diagnostics: {:?}", session.diagnostics());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_budget_rejects_unrepresentable_seconds() {
        assert_eq!(record_budget(2.5), Ok(Duration::from_millis(2500)));
        assert!(matches!(record_budget(1e20), Err(CaptureError::ConfigurationFailed(_))));
        assert!(matches!(record_budget(-1.0), Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn args_parse_device_and_cycles() {
        let args = Args::parse_from(["audio-rec", "--tone", "--device", "tone", "--cycles", "2"]);
        assert!(args.tone);
        assert_eq!(args.device.as_deref(), Some("tone"));
        assert_eq!(args.cycles, 2);
        assert_eq!(args.seconds, 3.0);
    }
}
