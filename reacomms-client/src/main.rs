use log::{info, warn};
use reacomms_core::{Comms, Config};
use structopt::StructOpt;

pub mod backends;
pub mod console;
pub mod driver;

#[derive(Debug, StructOpt)]
struct Options {
    #[structopt(long, default_value = "127.0.0.1")]
    host: String,

    #[structopt(long, default_value = "8080")]
    port: u16,

    #[structopt(long, default_value = "http")]
    backend: backends::BackendKind,

    /// Updates per second.
    #[structopt(long, default_value = "60")]
    fps: u32,

    #[structopt(long, default_value = "256")]
    command_queue_size: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::from_args();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let (command_tx, command_rx) =
        ringbuf::RingBuffer::<String>::new(options.command_queue_size).split();

    let comms = Comms::new(Config::with_fps(options.fps)?, command_rx)?;
    let backend = backends::Backend::new(options.backend, &options.host, options.port);
    let _console_thread = console::spawn(command_tx);

    info!(
        "reacomms is polling {} every {:?}.",
        backend.describe(),
        comms.min_update()
    );
    let mut driver = driver::Driver::new(comms, backend);
    driver
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await;
    warn!("Terminating reacomms.");
    Ok(())
}
