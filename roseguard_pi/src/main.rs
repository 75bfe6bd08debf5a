// Field runner for the Raspberry Pi 5: wires the camera, servo, relay and debug
// switch into the targeting controller and runs it until `q`, Ctrl-C, or the end
// of a replayed video.

mod camera;
mod config;
mod display;
mod gpio;
mod servo;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use roseguard::{
    Actuator, ImageDirStorage, LoopControl, Peripherals, RunSummary, SystemClock,
    TargetingController,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::camera::Camera;
use crate::config::FieldConfig;
use crate::display::Display;
use crate::gpio::{GpioDebugSwitch, GpioTrigger};
use crate::servo::SysfsPwmServo;

const DEFAULT_LOG_FILTER: &str = "roseguard=info,roseguard_pi=info";
const SERVO_TEST_STEPS: [u32; 4] = [1000, 1500, 2000, 1500];

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-triggered water deterrent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Guard the garden until 'q', Ctrl-C, or the end of a replayed video.
    Run {
        #[arg(short, long, help = "YAML config file (defaults apply when omitted)")]
        config: Option<PathBuf>,
        #[arg(short, long, help = "Camera index or video file, overrides the config")]
        source: Option<String>,
        #[arg(long, help = "Do not open a preview window")]
        headless: bool,
        #[arg(long, help = "Write the annotated feed to this video file")]
        record: Option<PathBuf>,
    },
    /// Step the servo through its range to check wiring and travel.
    ServoTest {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            source,
            headless,
            record,
        } => run(config.as_deref(), source, headless, record).await,
        Command::ServoTest { config } => servo_test(config.as_deref()).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<FieldConfig> {
    match path {
        Some(path) => FieldConfig::load(path),
        None => Ok(FieldConfig::default()),
    }
}

/// Logs to stdout and to `log_<start time>.txt` in `log_dir`.
fn init_logging(log_dir: &Path, started: DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(started.format("log_%Y_%m_%d__%H_%M_%S.txt").to_string());
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()?;
    Ok(path)
}

async fn run(
    config_path: Option<&Path>,
    source: Option<String>,
    headless: bool,
    record: Option<PathBuf>,
) -> Result<()> {
    let started = Local::now();
    let mut field = load_config(config_path)?;
    if let Some(source) = source {
        field.rig.camera_source = source;
    }

    let log_path = init_logging(&field.rig.log_dir, started)?;
    info!("Starting roseguard...");
    info!("Logging to {}", log_path.display());

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received. Stopping after the current cycle.");
            let _ = stop_tx.send(true);
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        guard(field, headless, record.as_deref(), started, stop_rx)
    })
    .await
    .context("Control loop task panicked")??;

    info!(
        "{} cycles, {} reference frames, {} shots.",
        summary.cycles, summary.refreshes, summary.total_shots
    );
    Ok(())
}

/// Brings the rig up in a safe order and runs the control loop on this thread.
/// Anything acquired before a failure is released on the way out; the
/// controller's peripherals safe the outputs when dropped.
fn guard(
    field: FieldConfig,
    headless: bool,
    record: Option<&Path>,
    started: DateTime<Local>,
    stop: watch::Receiver<bool>,
) -> Result<RunSummary> {
    let rig = &field.rig;
    let storage = ImageDirStorage::new(&rig.picture_dir, started)
        .context("Failed to create picture directory")?;

    let trigger = GpioTrigger::open(&rig.gpio_chip, rig.trigger_line)?;
    let debug_switch = GpioDebugSwitch::open(&rig.gpio_chip, rig.debug_switch_line)?;
    let servo = SysfsPwmServo::open(&rig.pwm_chip, rig.pwm_channel)?;
    info!("GPIO initialized.");

    let peripherals = Peripherals::new(
        Box::new(servo),
        Box::new(trigger),
        Box::new(debug_switch),
        Box::new(storage),
    );
    let mut controller =
        TargetingController::new(field.controller.clone(), peripherals, Box::new(SystemClock))?;

    let width = field.controller.frame_width;
    let height = field.controller.frame_height;
    let mut camera = Camera::open(&rig.camera_source, width, height)
        .context("Could not initialize camera")?;
    info!("Camera initialized. Warming up...");
    camera.warm_up(rig.camera_warmup())?;

    controller.arm().context("Could not center servo")?;
    std::thread::sleep(rig.servo_settle());

    let mut display = Display::open(headless, record, width, height)?;
    let summary = controller.run(&mut camera, |image, report| {
        if *stop.borrow() {
            return LoopControl::Quit;
        }
        display.show(image, report)
    })?;
    Ok(summary)
}

async fn servo_test(config_path: Option<&Path>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let field = load_config(config_path)?;
    let mut servo = SysfsPwmServo::open(&field.rig.pwm_chip, field.rig.pwm_channel)?;
    info!(
        "Servo on {}/pwm{} opened.",
        field.rig.pwm_chip.display(),
        field.rig.pwm_channel
    );

    let result = step_servo(&mut servo).await;
    servo.disable()?;
    info!("Servo disabled.");
    result
}

async fn step_servo(servo: &mut SysfsPwmServo) -> Result<()> {
    for pulse in SERVO_TEST_STEPS {
        info!("Servo -> {pulse}us");
        servo.set_position(pulse)?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}
