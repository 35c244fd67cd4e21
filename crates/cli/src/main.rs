use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rtsp_relay::config::{Credentials, RelayConfig, parse_ini};
use rtsp_relay::RelayServer;

#[derive(Parser)]
#[command(name = "rtsp-relay", version, about = "Multi-publisher RTSP relay server")]
struct Args {
    /// Comma-separated list of transports to accept: udp,tcp
    #[arg(long, value_delimiter = ',', default_value = "udp,tcp")]
    protocols: Vec<String>,

    #[arg(long, default_value_t = 8554)]
    rtsp_port: u16,

    #[arg(long, default_value_t = 8000)]
    rtp_port: u16,

    #[arg(long, default_value_t = 8001)]
    rtcp_port: u16,

    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    read_timeout: Duration,

    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    write_timeout: Duration,

    #[arg(long, default_value = "")]
    publish_user: String,

    #[arg(long, default_value = "")]
    publish_pass: String,

    #[arg(long, default_value = "")]
    read_user: String,

    #[arg(long, default_value = "")]
    read_pass: String,

    #[arg(long)]
    pre_script: Option<PathBuf>,

    #[arg(long)]
    post_script: Option<PathBuf>,

    /// Optional INI file providing `[http].port` and `[service].*` for an
    /// external HTTP/service collaborator; the relay itself only reads and
    /// logs these, it does not act on them.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Accepts `"5s"`, `"500ms"`, or a bare integer (seconds) — no ambient
/// duration-parsing crate appears in the corpus this binary draws its
/// dependencies from, so this is a small hand-rolled parser.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| e.to_string());
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return secs
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| e.to_string());
    }
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| e.to_string())
}

fn credentials(user: &str, pass: &str) -> Result<Option<Credentials>, String> {
    match (user.is_empty(), pass.is_empty()) {
        (true, true) => Ok(None),
        (false, false) => Ok(Some(Credentials {
            username: user.to_string(),
            password: pass.to_string(),
        })),
        _ => Err("username and password must both be set or both be empty".to_string()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let udp_enabled = args.protocols.iter().any(|p| p.eq_ignore_ascii_case("udp"));
    let tcp_enabled = args.protocols.iter().any(|p| p.eq_ignore_ascii_case("tcp"));
    if !udp_enabled && !tcp_enabled {
        eprintln!("--protocols must list at least one of: udp, tcp");
        return ExitCode::FAILURE;
    }

    if let Some(path) = &args.config {
        match fs::read_to_string(path) {
            Ok(text) => {
                let raw = parse_ini(&text);
                tracing::info!(?raw, "loaded auxiliary config (not acted on by the relay core)");
            }
            Err(e) => {
                eprintln!("failed to read --config {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    let publish_credentials = match credentials(&args.publish_user, &args.publish_pass) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid --publish-user/--publish-pass: {e}");
            return ExitCode::FAILURE;
        }
    };
    let read_credentials = match credentials(&args.read_user, &args.read_pass) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid --read-user/--read-pass: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = RelayConfig {
        server_agent: "rtsp-relay/0.1".to_string(),
        realm: "rtsp-relay".to_string(),
        rtsp_port: args.rtsp_port,
        rtp_port: args.rtp_port,
        rtcp_port: args.rtcp_port,
        read_timeout: args.read_timeout,
        write_timeout: args.write_timeout,
        publish_credentials,
        read_credentials,
        pre_script: args.pre_script,
        post_script: args.post_script,
        udp_enabled,
        tcp_enabled,
    };

    if let Err(e) = config.validate() {
        eprintln!("configuration error: {e}");
        return ExitCode::FAILURE;
    }

    let mut server = RelayServer::new(config);
    if let Err(e) = server.start() {
        eprintln!("failed to start: {e}");
        return ExitCode::FAILURE;
    }

    println!(
        "rtsp-relay listening on :{} (rtp :{}, rtcp :{}) — Ctrl-C to stop",
        args.rtsp_port, args.rtp_port, args.rtcp_port
    );

    if let Err(e) = wait_for_shutdown_signal() {
        tracing::warn!(error = %e, "failed to wait for shutdown signal, stopping immediately");
    }

    server.stop();
    ExitCode::SUCCESS
}

fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use std::io::Read;
    // No signal-handling crate is in this binary's dependency set; blocking
    // on stdin EOF (Ctrl-D) or a line (Ctrl-C terminates the read with an
    // error on most shells) is the simplest thing that works without one.
    let mut buf = [0u8; 1];
    std::io::stdin().read_exact(&mut buf).ok();
    Ok(())
}
