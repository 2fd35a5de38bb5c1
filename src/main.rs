use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gsender::session::{Session, SessionCommand, SessionHandle, SessionOptions};
use gsender::{init_logging, ProgramSummary, BUILD_DATE, VERSION};
use gsender_communication::{
    list_ports, Communicator, ConnectionParams, MachineProfile, OverrideDispatcher,
    ProfileApplier, RealtimeCommand, SerialCommunicator, StreamController,
};
use gsender_core::{AppEvent, Config, EventBus, EventFilter};
use gsender_gcode::{Program, TimeEstimator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::io::BufRead;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (.toml or .json); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports that look like CNC controllers
    Ports,
    /// Summarise a G-code file without sending it
    Inspect {
        file: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show, and optionally write, a machine profile's EEPROM settings
    Profile {
        file: PathBuf,
        /// Write the settings to the controller
        #[arg(long)]
        send: bool,
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Stream a G-code file to the controller
    Stream {
        file: PathBuf,
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    /// Serial port, overriding the configured one
    #[arg(long)]
    port: Option<String>,
    /// Baud rate, overriding the configured one
    #[arg(long)]
    baud: Option<u32>,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
    Config::load_or_default(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

fn connection_params(config: &Config, args: &ConnectionArgs) -> anyhow::Result<ConnectionParams> {
    let mut params = ConnectionParams::from(&config.connection);
    if let Some(port) = &args.port {
        params.port = port.clone();
    }
    if let Some(baud) = args.baud {
        params.baud_rate = baud;
    }
    if params.port.is_empty() {
        bail!("no serial port configured; pass --port or set connection.port");
    }
    Ok(params)
}

/// Open the port and build a controller wired to the event log and override pacing
fn open_controller(
    config: &Config,
    args: &ConnectionArgs,
) -> anyhow::Result<(StreamController, UnboundedReceiver<RealtimeCommand>)> {
    let params = connection_params(config, args)?;
    let mut communicator = SerialCommunicator::new();
    communicator
        .connect(&params)
        .with_context(|| format!("opening {}", params.port))?;
    tracing::info!("Connected to {} at {} baud", params.port, params.baud_rate);

    let events = Arc::new(EventBus::new());
    events.subscribe(EventFilter::All, |event: &AppEvent| {
        tracing::info!(category = %event.category(), "{}", event.description());
    });

    let (dispatcher, realtime_rx) = OverrideDispatcher::channel();
    let dispatcher = dispatcher
        .with_step_delay(Duration::from_millis(config.streaming.override_step_delay_ms))
        .with_order(config.streaming.override_step_order)
        .with_events(events.clone());

    let controller = StreamController::new(Box::new(communicator), config.rx_buffer_size())
        .with_firmware(config.machine.firmware)
        .with_events(events)
        .with_dispatcher(dispatcher);
    Ok((controller, realtime_rx))
}

/// Run a session with the operator console attached
async fn run_session(
    config: &Config,
    controller: StreamController,
    realtime_rx: UnboundedReceiver<RealtimeCommand>,
) -> anyhow::Result<StreamController> {
    let (session, handle) = Session::new(controller, SessionOptions::from(config));
    spawn_console(handle);
    Ok(session.with_realtime(realtime_rx).run().await?)
}

/// Forward stdin lines and Ctrl-C to the session
fn spawn_console(handle: SessionHandle) {
    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            let _ = ctrl_c.cancel();
        }
    });

    // Blocking stdin reads live on a plain thread so exit never waits on them
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if let Some(command) = SessionCommand::parse(&line) {
                if handle.send(command).is_err() {
                    break;
                }
            }
        }
    });
}

fn ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No controller ports found");
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

fn inspect(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let program = Program::load(file).with_context(|| format!("loading {}", file.display()))?;
    let summary = ProgramSummary::new(&program, &config.machine);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}

async fn profile(
    config: &Config,
    file: &Path,
    send: bool,
    connection: &ConnectionArgs,
) -> anyhow::Result<()> {
    let profile =
        MachineProfile::load(file).with_context(|| format!("loading {}", file.display()))?;
    for line in ProfileApplier::new(&profile).describe() {
        println!("{}", line);
    }
    if !send {
        return Ok(());
    }

    let (mut controller, realtime_rx) = open_controller(config, connection)?;
    controller.apply_profile(&profile);
    let mut controller = run_session(config, controller, realtime_rx).await?;

    let mismatches = controller.reported_settings().mismatches(&profile.settings);
    controller.disconnect()?;
    if !mismatches.is_empty() {
        let ids: Vec<String> = mismatches.iter().map(|id| format!("${}", id)).collect();
        bail!("controller reports different values for {}", ids.join(", "));
    }
    println!("Profile applied and verified");
    Ok(())
}

async fn stream(config: &Config, file: &Path, connection: &ConnectionArgs) -> anyhow::Result<()> {
    let program = Program::load(file).with_context(|| format!("loading {}", file.display()))?;
    let estimate = TimeEstimator::new(config.machine.rapid_rate, config.machine.default_feed_rate)
        .estimate(&program);

    let (mut controller, realtime_rx) = open_controller(config, connection)?;
    controller.load_program(program, Some(estimate));
    let mut controller = run_session(config, controller, realtime_rx).await?;
    let status = controller.sender().status();
    controller.disconnect()?;

    println!(
        "{} {}: {}/{} lines in {:.1}s",
        status.name,
        if status.cancelled { "cancelled" } else { "finished" },
        status.received,
        status.total,
        status.elapsed_time as f64 / 1000.0
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;
    tracing::debug!("gsender {} built {}", VERSION, BUILD_DATE);

    let config = load_config(args.config.as_deref())?;
    match &args.command {
        Command::Ports => ports(),
        Command::Inspect { file, json } => inspect(&config, file, *json),
        Command::Profile {
            file,
            send,
            connection,
        } => profile(&config, file, *send, connection).await,
        Command::Stream { file, connection } => stream(&config, file, connection).await,
    }
}
