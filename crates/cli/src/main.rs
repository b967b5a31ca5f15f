use clap::Parser;
use log::error;
use otpgen::{Algorithm, TotpSpec, TotpWatcher};
use std::io::BufRead;
use std::process;

/// Print a continuously refreshing TOTP until enter is pressed.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Shared secret, hex encoded (at least 16 bytes / 32 hex digits).
    #[clap(long)]
    secret: String,

    /// Number of digits of a generated passcode.
    #[clap(long, default_value_t = 6)]
    digits: u32,

    /// Period in seconds a passcode stays valid.
    #[clap(long, default_value_t = 30)]
    period: u32,

    /// HMAC hash algorithm: SHA1, SHA256 or SHA512.
    #[clap(long, default_value = "SHA1")]
    algorithm: Algorithm,
}

fn main() {
    let args = Args::parse();

    let mut log_builder = env_logger::Builder::from_default_env();
    log_builder.filter(None, log::LevelFilter::Warn);
    log_builder.target(env_logger::Target::Stderr);
    log_builder.init();

    let secret = match hex::decode(&args.secret) {
        Ok(secret) => secret,
        Err(err) => {
            error!("Secret is not valid hex: {}", err);
            process::exit(1);
        }
    };
    let spec = match TotpSpec::new(&secret, args.digits, args.algorithm, args.period) {
        Ok(spec) => spec,
        Err(err) => {
            error!("Invalid parameters: {}", err);
            process::exit(1);
        }
    };

    let handle = TotpWatcher::new(spec, |otp, spec, _| {
        println!("{}  (next in at most {}s, enter quits)", otp, spec.period());
    })
    .spawn();

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok();

    handle.cancel();
    if let Err(err) = handle.join() {
        error!("TOTP watcher failed: {}", err);
        process::exit(1);
    }
}
