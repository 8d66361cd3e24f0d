//! Command execution.

use crate::{Commands, PayloadInput};
use colored::Colorize;
use linkframe_codec::coverage::{self, CoveragePlan, CoverageReport};
use linkframe_codec::inject::parse_positions;
use linkframe_codec::{
    bits_to_hex, bits_to_text, bytes_to_bits, hex_to_bits, segment, text_to_bits, validate,
    Address, Bits, CodecError, ErrorInjector, ErrorModel, Frame, InvalidFramePolicy, Scheme,
    Validity,
};
use linkframe_link::{receive_stream, receive_to_file, send_file, Config, TcpReceiver, TcpSender};
use std::net::SocketAddr;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub async fn execute(mut config: Config, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Send {
            file,
            peer,
            scheme,
            frame_size,
        } => {
            if let Some(peer) = peer {
                apply_peer(&mut config, peer);
            }
            apply_framing(&mut config, scheme, frame_size)?;

            let peer = config.network.peer_addr;
            let mut sender = TcpSender::connect(peer, config.network.connect_timeout())
                .await
                .map_err(|e| format!("{}: {}", "Connection failed".red(), e))?;
            let report = send_file(&mut sender, &file, &config).await?;

            Ok(format!(
                "{} {} to {} ({} frames, {}, {} bits per frame)",
                "Sent".green(),
                file.display().to_string().cyan(),
                peer,
                report.frames,
                report.scheme.to_string().yellow(),
                report.frame_bits
            ))
        }

        Commands::Receive {
            bind,
            output,
            keep_invalid,
            idle_timeout,
        } => {
            if let Some(bind) = bind {
                config.network.bind_addr = bind;
            }
            if let Some(secs) = idle_timeout {
                config.network.idle_timeout_secs = secs;
            }
            let policy = if keep_invalid {
                InvalidFramePolicy::Append
            } else {
                config.receiver.invalid_policy
            };
            let output = output.or(config.receiver.output.clone());

            let receiver = TcpReceiver::bind(config.network.bind_addr)
                .await?
                .with_idle_timeout(config.network.idle_timeout());
            tracing::info!("Listening on {}", receiver.local_addr()?);
            let (mut source, peer) = receiver.accept().await?;
            tracing::info!("Accepted connection from {}", peer);

            let report = match &output {
                Some(path) => receive_to_file(&mut source, policy, path).await?,
                None => receive_stream(&mut source, policy).await?,
            };
            let stats = report.stats;
            let status = if report.complete {
                "Received".green()
            } else {
                "Incomplete".yellow()
            };
            let mut out = format!(
                "{} {} bits from {} (valid: {}, invalid: {}, undetermined: {}, malformed: {})",
                status,
                report.payload.len(),
                peer,
                stats.valid,
                format_count(stats.invalid),
                format_count(stats.undetermined),
                format_count(report.malformed)
            );

            match output {
                Some(path) => {
                    out.push_str(&format!("\nWrote {}", path.display().to_string().cyan()));
                }
                None => {
                    out.push('\n');
                    out.push_str(&bits_to_text(&report.payload));
                }
            }
            Ok(out)
        }

        Commands::Encode {
            input,
            scheme,
            frame_size,
        } => {
            apply_framing(&mut config, scheme, frame_size)?;
            let payload = load_payload(&input)?;
            encode(&payload, &config)
        }

        Commands::Inspect { bits } => inspect(&bits),

        Commands::Corrupt {
            bits,
            model,
            positions,
            seed,
        } => {
            let bits: Bits = bits.parse()?;
            let model = resolve_model(&model, positions.as_deref())?;
            let mut injector = match seed {
                Some(seed) => ErrorInjector::seeded(seed),
                None => ErrorInjector::from_entropy(),
            };
            let corruption = injector.inject(&bits, &model)?;

            Ok(format!(
                "{}\n{} {} ({} bits): {:?}",
                corruption.bits,
                "Flipped".yellow(),
                model,
                corruption.flipped.len(),
                corruption.flipped
            ))
        }

        Commands::Simulate {
            input,
            schemes,
            models,
            positions,
            frame_size,
            trials,
            seed,
            json,
        } => {
            let payload = load_payload(&input)?;
            let mut plan = CoveragePlan {
                frame_size_bytes: frame_size,
                trials,
                seed,
                sender: config.addressing.sender,
                receiver: config.addressing.receiver,
                ..CoveragePlan::default()
            };
            if let Some(schemes) = schemes {
                plan.schemes = schemes;
            }
            if !models.is_empty() || positions.is_some() {
                plan.models = models
                    .iter()
                    .map(|m| m.parse())
                    .collect::<Result<Vec<ErrorModel>, _>>()?;
            }
            if let Some(positions) = positions {
                plan.models.push(ErrorModel::Custom(parse_positions(&positions)?));
            }

            let report = coverage::run(&payload, &plan)?;
            if json {
                Ok(serde_json::to_string_pretty(&report)?)
            } else {
                Ok(format_coverage(&report))
            }
        }
    }
}

/// Points the transport at `peer`; an IPv4 peer is also written into frame
/// headers as the receiver.
fn apply_peer(config: &mut Config, peer: SocketAddr) {
    config.network.peer_addr = peer;
    if let SocketAddr::V4(v4) = peer {
        config.addressing.receiver = Address::from(v4);
    }
}

fn apply_framing(
    config: &mut Config,
    scheme: Option<Scheme>,
    frame_size: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(scheme) = scheme {
        config.framing.scheme = scheme;
    }
    if let Some(size) = frame_size {
        config.framing.frame_size_bytes = size;
    }
    config.validate()?;
    Ok(())
}

fn load_payload(input: &PayloadInput) -> Result<Bits, Box<dyn std::error::Error>> {
    if let Some(text) = &input.text {
        Ok(text_to_bits(text))
    } else if let Some(hex) = &input.hex {
        Ok(hex_to_bits(hex)?)
    } else if let Some(bits) = &input.bits {
        Ok(bits.parse()?)
    } else if let Some(path) = &input.file {
        Ok(bytes_to_bits(&std::fs::read(path)?))
    } else {
        Err("no payload given".into())
    }
}

/// `custom` takes its positions from `--positions`; other models reject them.
fn resolve_model(model: &str, positions: Option<&str>) -> Result<ErrorModel, CodecError> {
    match positions {
        Some(list) if model.trim().eq_ignore_ascii_case("custom") => {
            Ok(ErrorModel::Custom(parse_positions(list)?))
        }
        Some(_) => Err(CodecError::InvalidErrorModel(format!(
            "--positions only applies to the custom model, not {model:?}"
        ))),
        None => model.parse(),
    }
}

fn encode(payload: &[bool], config: &Config) -> CommandResult {
    let frames = segment(
        payload,
        config.addressing.sender,
        config.addressing.receiver,
        config.framing.scheme,
        config.framing.frame_size_bytes,
    )?;
    tracing::info!(
        "{} frames of {} bits ({} payload bits each)",
        frames.frame_count(),
        frames.frame_bits(),
        frames.chunk_bits()
    );

    let lines: Vec<String> = frames.map(|frame| frame.to_string()).collect();
    Ok(lines.join("\n"))
}

fn inspect(bits: &str) -> CommandResult {
    let frame: Frame = bits.parse()?;
    let validity = validate(&frame);
    let data = frame.data();

    let mut out = String::new();
    out.push_str(&format!("{}\n", "Frame".bold()));
    out.push_str(&format!("  sender:      {}\n", frame.sender()));
    out.push_str(&format!("  receiver:    {}\n", frame.receiver()));
    out.push_str(&format!("  length:      {} bits\n", frame.payload_len()));
    out.push_str(&format!("  last:        {}\n", frame.is_last()));
    out.push_str(&format!("  scheme:      {}\n", frame.scheme()));
    out.push_str(&format!("  data:        {}\n", Bits::from(data.to_vec())));
    if data.len() % 8 == 0 && !data.is_empty() {
        out.push_str(&format!("  hex:         {}\n", bits_to_hex(data)));
        out.push_str(&format!("  text:        {:?}\n", bits_to_text(data)));
    }
    out.push_str(&format!(
        "  code:        {}\n",
        Bits::from(frame.redundancy_code().to_vec())
    ));
    out.push_str(&format!("  validity:    {}", format_validity(validity)));
    Ok(out)
}

fn format_validity(validity: Validity) -> String {
    match validity {
        Validity::Valid => validity.to_string().green().to_string(),
        Validity::Invalid => validity.to_string().red().to_string(),
        Validity::Undetermined => validity.to_string().yellow().to_string(),
    }
}

fn format_count(n: usize) -> String {
    if n == 0 {
        n.to_string()
    } else {
        n.to_string().yellow().to_string()
    }
}

fn format_coverage(report: &CoverageReport) -> String {
    let mut out = format!(
        "{} ({} payload bits, {}-byte frames, seed {})\n",
        "Detection coverage".bold(),
        report.payload_bits,
        report.frame_size_bytes,
        report.seed
    );
    out.push_str(&format!(
        "{:<10} {:<14} {:>8} {:>10} {:>8}\n",
        "SCHEME", "MODEL", "CASES", "UNDETECTED", "RATE"
    ));

    for summary in &report.summaries {
        let rate = format!("{:.1}%", summary.detection_rate * 100.0);
        let rate = if summary.undetected == 0 {
            rate.green()
        } else {
            rate.red()
        };
        out.push_str(&format!(
            "{:<10} {:<14} {:>8} {:>10} {:>8}\n",
            summary.scheme.to_string(),
            summary.model.to_string(),
            summary.total,
            summary.undetected,
            rate
        ));
    }

    let undetected = report.undetected().count();
    if undetected > 0 {
        out.push_str(&format!(
            "{} undetected corruption(s); rerun with --json for positions",
            undetected.to_string().red()
        ));
    } else {
        out.push_str(&"Every corruption was detected".green().to_string());
    }
    out
}
