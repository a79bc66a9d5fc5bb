mod monitor;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use smu_sim::{Config, Instrument, Session, SimError, SimulatedBoard};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

type SimSession = Session<SimulatedBoard>;

#[derive(Parser, Debug)]
#[command(name = "smu_cli", version, about = "Bench source-measure unit simulator")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port to listen on (skips the port prompt).
    #[arg(long)]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Simulated load resistance in ohms.
    #[arg(long, conflicts_with = "open")]
    load_ohms: Option<f64>,

    /// Leave the simulated output unloaded.
    #[arg(long)]
    open: bool,

    /// Peak ADC noise in volts.
    #[arg(long)]
    noise: Option<f64>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Mode {
    /// Type commands on stdin.
    Manual,
    /// Serve the protocol on a serial port.
    Serial,
    /// Full-screen view of commands, replies and board state.
    Monitor,
}

// The main entry point for the command-line simulator application.
fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config(&cli)?;

    println!("==============================");
    println!("  Bench SMU Simulator         ");
    println!("==============================");
    println!("IDN: {}", config.identity.idn);
    match config.simulation.load_ohms {
        Some(load) => println!("Simulated load: {} ohm", load),
        None => println!("Simulated load: open circuit"),
    }

    let board = SimulatedBoard::from_config(&config).with_realtime(true);
    let mut session = Session::new(Instrument::from_config(board, &config));

    if let Some(mode) = cli.mode {
        return run_mode(mode, &mut session, &config);
    }

    // Main menu loop.
    loop {
        println!("\nSelect mode:");
        println!("  1. Manual Command Input");
        println!("  2. Listen on Serial Port");
        println!("  3. Monitor");
        println!("  4. Exit");
        let choice = prompt("> ")?;

        let mode = match choice.as_str() {
            "1" => Mode::Manual,
            "2" => Mode::Serial,
            "3" => Mode::Monitor,
            "4" => break,
            _ => {
                eprintln!("[ERROR] Invalid choice. Please enter 1, 2, 3, or 4.");
                continue;
            }
        };
        if let Err(e) = run_mode(mode, &mut session, &config) {
            eprintln!("[ERROR] {:#}", e);
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(port) = &cli.port {
        config.serial.port = Some(port.clone());
    }
    if let Some(baud) = cli.baud {
        config.serial.baud = baud;
    }
    if cli.open {
        config.simulation.load_ohms = None;
    } else if let Some(load) = cli.load_ohms {
        config.simulation.load_ohms = Some(load);
    }
    if let Some(noise) = cli.noise {
        config.simulation.noise_volts = noise;
    }
    config.validate().context("Invalid command-line overrides")?;
    Ok(config)
}

fn run_mode(mode: Mode, session: &mut SimSession, config: &Config) -> Result<()> {
    match mode {
        Mode::Manual => run_manual_mode(session),
        Mode::Serial => run_serial_mode(session, config),
        Mode::Monitor => monitor::run(session).context("Monitor terminal failure"),
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

// Handles the manual command input mode.
fn run_manual_mode(session: &mut SimSession) -> Result<()> {
    println!("\n--- Manual Mode ---");
    println!("Enter commands, or type 'back' to return to the main menu.");
    print!("> ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let input = line?;
        let command = input.trim();

        if command == "back" {
            break;
        }

        if !command.is_empty() {
            process_and_display_command(session, command);
        }
        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}

// Handles the serial port listening mode.
fn run_serial_mode(session: &mut SimSession, config: &Config) -> Result<()> {
    println!("\n--- Serial Mode ---");

    let (port_name, baud_rate) = match &config.serial.port {
        Some(port) => (port.clone(), config.serial.baud),
        None => choose_port()?,
    };

    let mut port = serialport::new(&port_name, baud_rate)
        .timeout(Duration::from_millis(10))
        .open()
        .map_err(SimError::from)
        .with_context(|| format!("Failed to open port '{}'", port_name))?;

    println!(
        "\nListening on {} at {} baud. Press Ctrl+C to exit.",
        port_name, baud_rate
    );
    log::info!("Serving {} at {} baud", port_name, baud_rate);

    let mut serial_buf: Vec<u8> = vec![0; 128];
    loop {
        match session.pump(&mut port, &mut serial_buf) {
            Ok(replies) if !replies.is_empty() => {
                print!("< {}", String::from_utf8_lossy(&replies));
            }
            Ok(_) => (),
            Err(e) => eprintln!("[ERROR] {}", e),
        }
    }
}

// Lists the available ports and asks for a port and baud rate.
fn choose_port() -> Result<(String, u32)> {
    let ports = serialport::available_ports().context("Could not enumerate serial ports")?;
    if ports.is_empty() {
        bail!("No serial ports found.");
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port.port_name);
    }
    let port_index: usize = match prompt("Select a port (number): ")?.parse() {
        Ok(i) if i < ports.len() => i,
        _ => bail!("Invalid port selection."),
    };

    let baud_rates = [9600, 19200, 38400, 57600, 115200];
    println!("Available baud rates:");
    for (i, &rate) in baud_rates.iter().enumerate() {
        println!("  {}: {}", i, rate);
    }
    let baud_index: usize = match prompt("Select a baud rate (number): ")?.parse() {
        Ok(i) if i < baud_rates.len() => i,
        _ => bail!("Invalid baud rate selection."),
    };

    Ok((ports[port_index].port_name.clone(), baud_rates[baud_index]))
}

// Runs one typed command through the same framing path as the serial port
// and prints its reply.
fn process_and_display_command(session: &mut SimSession, command: &str) {
    let replies = session.receive(format!("{}\r\n", command).as_bytes());
    if !replies.is_empty() {
        print!("< {}", String::from_utf8_lossy(&replies));
    }
}
