use std::process::exit;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};

use _core::logging::init_rust_logging;
use _core::{
    list_ports, multiplier_table, LightSensor, SerialConnection, SerialSettings, Summary,
    DEFAULT_BAUD_RATE,
};

#[derive(Parser, Debug)]
#[command(name = "lightsensor", about = "Read and average light-sensor intensities")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available serial ports
    Ports,
    /// Print the gain multipliers
    Multipliers,
    /// Measure, optionally after taking a background, and print averages
    Collect {
        #[command(flatten)]
        link: Link,
        /// Seconds to collect for
        #[arg(short, long, default_value_t = 5.0)]
        duration: f64,
        /// Seconds of background to take first (light source off)
        #[arg(short, long)]
        background: Option<f64>,
    },
    /// Print every normalized sample of one run
    Raw {
        #[command(flatten)]
        link: Link,
        /// Seconds to collect for
        #[arg(short, long, default_value_t = 5.0)]
        duration: f64,
    },
}

#[derive(ClapArgs, Debug)]
struct Link {
    /// Serial port of the Arduino (e.g., /dev/ttyACM0, COM3)
    #[arg(short, long)]
    port: String,
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
    /// Read timeout per line in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

impl Link {
    fn open(&self) -> Result<LightSensor<SerialConnection>> {
        let settings = SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud,
            timeout: Duration::from_millis(self.timeout_ms),
        };
        let conn = SerialConnection::open(&settings)
            .with_context(|| format!("Failed to open serial port {}", self.port))?;
        Ok(LightSensor::new(conn))
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn secs(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid duration {value}"))
}

fn print_summary(name: &str, summary: &Summary) {
    println!("{name}");
    println!("{summary}");
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_rust_logging(args.verbose);

    match args.command {
        Command::Ports => {
            for port in list_ports().context("Failed to enumerate serial ports")? {
                println!("{port}");
            }
        }
        Command::Multipliers => {
            for (label, m) in multiplier_table() {
                println!("{label}: {m}");
            }
        }
        Command::Collect {
            link,
            duration,
            background,
        } => {
            let mut sensor = link.open()?;
            if let Some(bg) = background {
                println!("Taking background for {bg} s...");
                let summary = sensor
                    .set_background(secs(bg)?)
                    .context("Background measurement failed")?;
                print_summary("Background", &summary);
            }
            println!("Collecting for {duration} s...");
            let m = sensor
                .collect_data(secs(duration)?)
                .context("Measurement failed")?;
            if let Some(reason) = m.report.failure() {
                eprintln!("Warning: run ended early ({reason})");
            }
            print_summary("Average", &m.summary);
            sensor.into_connection().close();
        }
        Command::Raw { link, duration } => {
            let mut sensor = link.open()?;
            let report = sensor.read(secs(duration)?);
            println!("seconds\tgain\tfull\tir\tvisible");
            for s in sensor.samples().iter() {
                println!(
                    "{:.3}\t{}\t{}\t{}\t{}",
                    s.seconds, s.gain, s.values.full, s.values.ir, s.values.visible
                );
            }
            println!(
                "{} samples, {} dropped frames, {} empty reads in {:.2?}",
                report.samples, report.dropped, report.timeouts, report.elapsed
            );
            if let Some(reason) = report.failure() {
                eprintln!("Warning: run ended early ({reason})");
            }
            sensor.into_connection().close();
        }
    }
    Ok(())
}
