use tomcast::{cli, config, telemetry};

fn main() {
    let cli = cli::parse_from(std::env::args_os());

    let mut cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    cli.apply_to(&mut cfg);

    let telemetry_cfg =
        telemetry::TelemetryConfig::new(cli.verbose, cfg.logging.clone()).with_identity(&cli.identity);
    let _telemetry_guard = telemetry::init(telemetry_cfg);

    match cli::run(&cfg) {
        Ok(stats) => {
            tracing::debug!(delivered = stats.delivered, "exiting");
        }
        Err(e) => {
            tracing::error!("error: {}", e);
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
