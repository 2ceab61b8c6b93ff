use std::path::PathBuf;

use clap::{arg, command, ArgMatches};
use itertools::Itertools;
use serde_json::Value;

use ecamlink::config::SessionConfig;
use ecamlink::display::{display_status, initialize_display, log, LogLevel};
use ecamlink::lan::{self, KeyExchangeNonces, LanSession, SessionKeys};
use ecamlink::monitor::{MonitorProfile, MonitorView};
use ecamlink::protocol::*;
use ecamlink::util::CollectMapJoin;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn required(cmd: &ArgMatches, name: &str) -> CliResult<String> {
    cmd.get_one::<String>(name)
        .cloned()
        .ok_or_else(|| format!("--{} is required", name).into())
}

fn parse_byte(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_beverage(s: &str) -> CliResult<u8> {
    parse_byte(s)
        .or_else(|| EcamBeverageId::from_name(s).map(u8::from))
        .ok_or_else(|| {
            format!(
                "Unknown beverage '{}', expected a byte or one of: {}",
                s,
                EcamBeverageId::all().collect_map_join(", ", |b| b.name().to_owned())
            )
            .into()
        })
}

fn parse_params(cmd: &ArgMatches) -> CliResult<TlvParams> {
    let mut params = TlvParams::new();
    for param in cmd.get_many::<String>("param").into_iter().flatten() {
        let (name, value) = param
            .split_once('=')
            .ok_or_else(|| format!("Parameter '{}' should look like name=value", param))?;
        let tag = param_tag(name).ok_or_else(|| format!("Unknown parameter '{}'", name))?;
        let value: u16 = value.trim().parse()?;
        params.insert(tag, value);
    }
    Ok(params)
}

fn parse_key(s: &str) -> CliResult<Vec<u8>> {
    Ok(hex::decode(s.trim())?)
}

fn session_config(matches: &ArgMatches) -> CliResult<SessionConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(interval) = matches.get_one::<f64>("rekey-interval") {
        config.rekey_interval = *interval;
    }
    Ok(config)
}

fn nonces(cmd: &ArgMatches, config: &SessionConfig) -> CliResult<KeyExchangeNonces> {
    let exchange = lan::KeyExchange {
        random_1: required(cmd, "app-random")?,
        time_1: lan::NonceTime::Text(required(cmd, "app-time")?),
    };
    let local = match (
        cmd.get_one::<String>("device-random"),
        cmd.get_one::<String>("device-time"),
    ) {
        (Some(random), Some(time)) => (random.clone(), time.clone()),
        _ => lan::generate_local_nonce(config),
    };
    Ok(KeyExchangeNonces::from_exchange(&exchange, local))
}

fn print_keys(keys: &SessionKeys, nonces: &KeyExchangeNonces) {
    println!("device_random: {}", nonces.device_random);
    println!("device_time:   {}", nonces.device_time);
    println!("app_sign_key:      {}", hex::encode(keys.app_sign_key));
    println!("app_crypto_key:    {}", hex::encode(keys.app_crypto_key));
    println!("app_iv_seed:       {}", hex::encode(keys.app_iv_seed));
    println!("device_crypto_key: {}", hex::encode(keys.device_crypto_key));
    println!("device_iv_seed:    {}", hex::encode(keys.device_iv_seed));
}

fn decode_monitor(cmd: &ArgMatches) -> CliResult<()> {
    let profile = match cmd.get_one::<PathBuf>("profile") {
        Some(path) => MonitorProfile::load(path)?,
        None => MonitorProfile::builtin()?,
    };
    let input = required(cmd, "monitor")?;
    let snapshot = match serde_json::from_str::<Value>(&input) {
        Ok(payload @ Value::Object(_)) => MonitorSnapshot::from_payload(&payload, "cli", None),
        _ => MonitorSnapshot::from_b64(&input, "cli", None),
    };
    for warning in &snapshot.warnings {
        log(LogLevel::Warning, warning);
    }
    for error in &snapshot.errors {
        log(LogLevel::Error, error);
    }
    let view = MonitorView::new(&snapshot, &profile);
    if cmd.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&view.to_json())?);
    } else {
        display_status(&view);
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    pretty_env_logger::init();
    initialize_display();

    let lan_key = arg!(--"lan-key" <key>)
        .help("Shared LAN key")
        .env("ECAM_LAN_KEY")
        .required(true);
    let app_random = arg!(--"app-random" <random>)
        .help("random_1 from the key exchange")
        .required(true);
    let app_time = arg!(--"app-time" <time>)
        .help("time_1 from the key exchange")
        .required(true);
    let device_random =
        arg!(--"device-random" [random]).help("Local random nonce (generated if omitted)");
    let device_time = arg!(--"device-time" [time]).help("Local time nonce (generated if omitted)");
    let key = arg!(--key <hex>).help("AES-256 key as hex").required(true);
    let iv = arg!(--iv <hex>).help("16-byte IV as hex").required(true);

    let matches = command!()
        .arg(arg!(--trace).help("Trace packets"))
        .arg(
            arg!(--config [file])
                .help("Session config JSON file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"rekey-interval" [seconds])
                .help("Seconds before a LAN session must be re-keyed")
                .env("ECAM_REKEY_INTERVAL")
                .value_parser(clap::value_parser!(f64)),
        )
        .subcommand(
            command!("crc")
                .about("Compute the CRC of a hex frame body, or check a complete frame")
                .arg(arg!(<hex>)),
        )
        .subcommand(
            command!("brew")
                .about("Build a brew command frame")
                .arg(arg!(--beverage <beverage>).required(true))
                .arg(
                    arg!(--param [param])
                        .help("Recipe parameter as name=value (e.g. coffee_ml=120)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--trigger [trigger])
                        .help("Operation trigger byte")
                        .default_value("1"),
                ),
        )
        .subcommand(
            command!("stop")
                .about("Build a stop command frame")
                .arg(arg!(--beverage [beverage]).default_value("0x10")),
        )
        .subcommand(
            command!("decode-monitor")
                .about("Decode a base64 monitor frame, or a JSON payload carrying one")
                .arg(arg!(<monitor>))
                .arg(
                    arg!(--profile [file])
                        .help("Monitor profile JSON")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(arg!(--json).help("Print the view as JSON")),
        )
        .subcommand(
            command!("decode-recipe")
                .about("Decode a base64 recipe, or a JSON object of them")
                .arg(arg!(<recipe>)),
        )
        .subcommand(
            command!("decode-frame")
                .about("Decode a base64 0xd0 frame")
                .arg(arg!(<frame>)),
        )
        .subcommand(
            command!("derive-keys")
                .about("Derive LAN session keys from a key exchange")
                .arg(lan_key.clone())
                .arg(app_random.clone())
                .arg(app_time.clone())
                .arg(device_random.clone())
                .arg(device_time.clone()),
        )
        .subcommand(
            command!("seal")
                .about("Encrypt and sign a JSON command for the LAN channel")
                .arg(lan_key.clone())
                .arg(app_random.clone())
                .arg(app_time.clone())
                .arg(device_random.clone())
                .arg(device_time.clone())
                .arg(arg!(<data>)),
        )
        .subcommand(
            command!("encrypt")
                .about("AES-CBC encrypt with zero padding")
                .arg(key.clone())
                .arg(iv.clone())
                .arg(arg!(<plaintext>)),
        )
        .subcommand(
            command!("decrypt")
                .about("AES-CBC decrypt and strip zero padding")
                .arg(key.clone())
                .arg(iv.clone())
                .arg(arg!(<ciphertext>)),
        )
        .get_matches();

    if matches.get_flag("trace") {
        ecamlink::logging::enable_tracing();
    }

    match matches.subcommand() {
        Some(("crc", cmd)) => {
            let bytes = parse_key(&required(cmd, "hex")?)?;
            if bytes.first() == Some(&COMMAND_MARKER) || bytes.first() == Some(&D0_MARKER) {
                println!("frame checksum ok: {}", checksum_matches(&bytes));
            }
            println!("{}", stringify(&checksum(&bytes)));
        }
        Some(("brew", cmd)) => {
            let beverage = parse_beverage(&required(cmd, "beverage")?)?;
            let params = parse_params(cmd)?;
            let trigger = parse_byte(&required(cmd, "trigger")?).ok_or("Invalid trigger")?;
            log(
                LogLevel::Info,
                &format!(
                    "Brewing {} with {}",
                    beverage_name(beverage),
                    named_params(&params)
                        .iter()
                        .map(|(name, value)| format!("{}={}", name, value))
                        .join(" ")
                ),
            );
            println!(
                "{}",
                build_brew_command(beverage, &params, MachineEnum::decode(trigger))
            );
        }
        Some(("stop", cmd)) => {
            let beverage = parse_beverage(&required(cmd, "beverage")?)?;
            println!("{}", build_stop_command(beverage));
        }
        Some(("decode-monitor", cmd)) => decode_monitor(cmd)?,
        Some(("decode-recipe", cmd)) => {
            let input = required(cmd, "recipe")?;
            let recipes = if input.trim_start().starts_with('{') {
                decode_recipe_container(&input)
            } else {
                decode_recipe_b64(&input).into_iter().collect()
            };
            if recipes.is_empty() {
                return Err("No recipe could be decoded".into());
            }
            for recipe in recipes {
                println!("{}", serde_json::to_string_pretty(&recipe.to_json())?);
            }
        }
        Some(("decode-frame", cmd)) => {
            let frame = D0Frame::from_b64(&required(cmd, "frame")?).ok_or("Not a 0xd0 frame")?;
            println!("{:?} request={:?}", frame, frame.request_id());
        }
        Some(("derive-keys", cmd)) => {
            let config = session_config(&matches)?;
            let nonces = nonces(cmd, &config)?;
            let keys = SessionKeys::derive(&required(cmd, "lan-key")?, &nonces)?;
            print_keys(&keys, &nonces);
        }
        Some(("seal", cmd)) => {
            let config = session_config(&matches)?;
            let nonces = nonces(cmd, &config)?;
            let data: Value = serde_json::from_str(&required(cmd, "data")?)?;
            let session = LanSession::new(&required(cmd, "lan-key")?, config);
            session.rekey(&nonces)?;
            let payload = session.seal_command(data)?;
            println!("{}", serde_json::to_string(&payload)?);
        }
        Some(("encrypt", cmd)) => {
            let key = parse_key(&required(cmd, "key")?)?;
            let iv = parse_key(&required(cmd, "iv")?)?;
            let plaintext = required(cmd, "plaintext")?;
            println!("{}", lan::aes_encrypt(plaintext.as_bytes(), &key, &iv)?);
        }
        Some(("decrypt", cmd)) => {
            let key = parse_key(&required(cmd, "key")?)?;
            let iv = parse_key(&required(cmd, "iv")?)?;
            let plaintext = lan::aes_decrypt(&required(cmd, "ciphertext")?, &key, &iv)?;
            println!("{}", String::from_utf8_lossy(&plaintext));
        }
        _ => {}
    }

    Ok(())
}
