use pinger::{Pinger, PingerConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// ping - send ICMP ECHO_REQUEST to a host until interrupted
struct Args {
    #[argh(switch, short = 'v')]
    /// log debug messages
    verbose: bool,

    #[argh(positional)]
    /// host name or IP address
    host: String,
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut pinger = Pinger::new(&args.host, PingerConfig::default())?;
    tracing::info!("PING {} ({})", pinger.host(), pinger.ip_addr());

    let shutdown = pinger.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.shutdown();
    })?;

    pinger.run()?;

    for line in pinger.report().to_string().lines() {
        tracing::info!("{line}");
    }
    Ok(())
}
