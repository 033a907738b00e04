use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use num_complex::Complex64;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use qubit_pulse::awg::{FluxlineBuffer, FluxlineOutput};
use qubit_pulse::config::QubitConfig;
use qubit_pulse::fluxline::CompensationMode;
use qubit_pulse::qubit::{PulseSpan, Qubit, RabiPulseRequest};
use qubit_pulse::units::Radians;
use qubit_pulse::waveform::{gaussian_envelope, gaussian_envelope_with_derivative};

#[derive(Parser, Debug)]
#[command(name = "qubit-pulse", version, about)]
struct Cli {
    /// Log at debug level; `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Print the samples of a Gaussian-flanked envelope.
    Envelope {
        #[arg(long)]
        length: f64,
        #[arg(long, default_value_t = 0.0)]
        delay: f64,
        #[arg(long, default_value_t = 3.0)]
        flank: f64,
        #[arg(long, conflicts_with = "closed_form")]
        no_normalize: bool,
        /// Build the envelope in closed form, together with its derivative.
        #[arg(long)]
        closed_form: bool,
    },
    /// Generate a Rabi pulse for a configured qubit.
    Rabi {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, conflicts_with = "phase", required_unless_present = "phase")]
        length: Option<f64>,
        /// Rotation angle in radians, converted through the calibrated π pulse length.
        #[arg(long, allow_hyphen_values = true)]
        phase: Option<f64>,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        angle: f64,
        /// Sideband frequency in GHz; defaults to the configured one.
        #[arg(long, allow_hyphen_values = true)]
        sideband: Option<f64>,
        /// Print the loaded AWG buffers instead of the bare waveform.
        #[arg(long)]
        load: bool,
    },
    /// Compensate a fluxline waveform against the configured line response.
    Compensate {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON array of samples in [-1, 1].
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        sampling_interval: Option<f64>,
        #[arg(long)]
        factor: Option<f64>,
        /// Skip the range check and do not load the result.
        #[arg(long)]
        simulate: bool,
        /// Fluxline output, `awg` or `direct`; defaults to the configured one.
        #[arg(long)]
        strategy: Option<FluxlineOutput>,
    },
}

#[derive(Serialize)]
struct EnvelopeOutput {
    envelope: Vec<Complex64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    derivative: Option<Vec<Complex64>>,
}

#[derive(Serialize)]
struct CompensationOutput {
    compensated: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer: Option<FluxlineBuffer>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Envelope {
            length,
            delay,
            flank,
            no_normalize,
            closed_form,
        } => handle_envelope(length, delay, flank, !no_normalize, closed_form),
        Command::Rabi {
            config,
            length,
            phase,
            angle,
            sideband,
            load,
        } => handle_rabi(&config, length, phase, angle, sideband, load),
        Command::Compensate {
            config,
            input,
            sampling_interval,
            factor,
            simulate,
            strategy,
        } => handle_compensate(
            &config,
            &input,
            sampling_interval,
            factor,
            simulate,
            strategy,
        ),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize output.")?;
    println!("{json}");
    Ok(())
}

fn load_qubit(path: &Path) -> anyhow::Result<Qubit> {
    let config = QubitConfig::from_path(path)
        .with_context(|| format!("Failed to load qubit configuration from {}.", path.display()))?;
    Qubit::new(config).context("Qubit configuration is inconsistent.")
}

fn handle_envelope(
    length: f64,
    delay: f64,
    flank: f64,
    normalize: bool,
    closed_form: bool,
) -> anyhow::Result<()> {
    let output = if closed_form {
        anyhow::ensure!(
            delay >= 0.0 && delay.fract() == 0.0,
            "The closed-form envelope needs a whole number of delay samples, got {delay}."
        );
        let pulse = gaussian_envelope_with_derivative(length, delay as usize, flank, true)
            .context("Failed to build closed-form envelope.")?;
        EnvelopeOutput {
            envelope: pulse.envelope,
            derivative: pulse.derivative,
        }
    } else {
        EnvelopeOutput {
            envelope: gaussian_envelope(length, delay, flank, normalize)
                .context("Failed to build envelope.")?,
            derivative: None,
        }
    };
    print_json(&output)
}

fn handle_rabi(
    config: &Path,
    length: Option<f64>,
    phase: Option<f64>,
    angle: f64,
    sideband: Option<f64>,
    load: bool,
) -> anyhow::Result<()> {
    let qubit = load_qubit(config)?;
    let request = RabiPulseRequest {
        angle: Radians(angle),
        sideband_frequency: sideband,
        ..RabiPulseRequest::new(PulseSpan::from_options(length, phase)?)
    };

    if load {
        let loaded = qubit
            .load_rabi_pulse(&request)
            .context("Failed to load Rabi pulse.")?;
        print_json(&loaded)
    } else {
        let pulse = qubit
            .generator()
            .rabi_pulse(&request)
            .context("Failed to generate Rabi pulse.")?;
        print_json(&pulse)
    }
}

fn handle_compensate(
    config: &Path,
    input: &Path,
    sampling_interval: Option<f64>,
    factor: Option<f64>,
    simulate: bool,
    strategy: Option<FluxlineOutput>,
) -> anyhow::Result<()> {
    let mut qubit = load_qubit(config)?;
    let fluxline = &mut qubit.parameters_mut().fluxline;
    if let Some(sampling_interval) = sampling_interval {
        fluxline.sampling_interval = sampling_interval;
    }
    if let Some(factor) = factor {
        fluxline.compensation_factor = factor;
    }
    if let Some(strategy) = strategy {
        fluxline.output = strategy;
    }

    let samples = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read waveform from {}.", input.display()))?;
    let waveform: Vec<f64> =
        serde_json::from_str(&samples).context("Waveform must be a JSON array of numbers.")?;

    let mode = if simulate {
        CompensationMode::Simulate
    } else {
        CompensationMode::Hardware
    };
    let compensated = qubit
        .compensate_fluxline_waveform(&waveform, mode)
        .context("Failed to compensate fluxline waveform.")?;
    tracing::info!(
        samples = waveform.len(),
        compensated = compensated.len(),
        %mode,
        "compensated fluxline waveform"
    );

    let buffer = if simulate {
        None
    } else {
        let fluxline = &qubit.parameters().fluxline;
        Some(
            qubit
                .loader()
                .load_fluxline_waveform(
                    &compensated,
                    fluxline.sampling_interval,
                    fluxline.output.strategy(),
                )
                .context("Failed to load compensated fluxline waveform.")?,
        )
    };

    print_json(&CompensationOutput {
        compensated,
        buffer,
    })
}
