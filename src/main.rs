use std::path::PathBuf;
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;
use rdkafka::util::get_rdkafka_version;

use json_consumer::config::{BrokerConfig, OffsetReset, Secret, SecurityProtocol};
use json_consumer::formatter::Formatter;
use json_consumer::logging::setup_logger;
use json_consumer::session::Session;
use json_consumer::signal::ShutdownFlag;
use json_consumer::{ConsumerError, ConsumerResult, TerminationReason};

fn cli() -> Command {
    Command::new("json-consumer")
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or(""))
        .about("Consume a Kafka topic and pretty-print its JSON messages")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("JSON file with the broker configuration")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("brokers")
                .short('b')
                .long("brokers")
                .help("Broker list in kafka format")
                .env("KAFKA_BROKERS"),
        )
        .arg(
            Arg::new("topic")
                .short('t')
                .long("topic")
                .help("Topic to consume")
                .env("KAFKA_TOPIC")
                .required(true),
        )
        .arg(
            Arg::new("group-id")
                .short('g')
                .long("group-id")
                .help("Consumer group id, <username>-mygroup by default")
                .env("KAFKA_GROUP_ID"),
        )
        .arg(
            Arg::new("username")
                .short('u')
                .long("username")
                .help("SASL username")
                .env("KAFKA_USERNAME"),
        )
        .arg(
            Arg::new("password")
                .short('p')
                .long("password")
                .help("SASL password")
                .env("KAFKA_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("security-protocol")
                .long("security-protocol")
                .help("PLAINTEXT, SSL, SASL_PLAINTEXT or SASL_SSL")
                .value_parser(|s: &str| s.parse::<SecurityProtocol>()),
        )
        .arg(
            Arg::new("ca")
                .long("ca")
                .help("CA certificate file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("cert")
                .long("cert")
                .help("Client certificate file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("key")
                .long("key")
                .help("Client private key file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("offset-reset")
                .long("offset-reset")
                .help("Where to start without a committed offset: earliest or latest")
                .value_parser(|s: &str| s.parse::<OffsetReset>()),
        )
        .arg(
            Arg::new("metadata-timeout-ms")
                .long("metadata-timeout-ms")
                .help("Timeout of the startup metadata checks, 0 to skip them")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("set")
                .short('X')
                .long("set")
                .help("Raw librdkafka property (example: 'fetch.wait.max.ms=50')")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("log-conf")
                .long("log-conf")
                .help("Configure the logging format (example: 'rdkafka=trace')"),
        )
}

fn settings(matches: &ArgMatches) -> ConsumerResult<(BrokerConfig, String)> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => BrokerConfig::from_json_file(path)?,
        None => BrokerConfig::default(),
    };

    if let Some(brokers) = matches.get_one::<String>("brokers") {
        config.bootstrap_servers = brokers.clone();
    }
    if let Some(group_id) = matches.get_one::<String>("group-id") {
        config.group_id = Some(group_id.clone());
    }
    if let Some(username) = matches.get_one::<String>("username") {
        config.sasl_username = Some(username.clone());
    }
    if let Some(password) = matches.get_one::<String>("password") {
        config.sasl_password = Some(Secret::new(password.as_str()));
    }
    if let Some(protocol) = matches.get_one::<SecurityProtocol>("security-protocol") {
        config.security_protocol = *protocol;
    }
    if let Some(ca) = matches.get_one::<PathBuf>("ca") {
        config.ssl_ca_location = Some(ca.clone());
    }
    if let Some(cert) = matches.get_one::<PathBuf>("cert") {
        config.ssl_certificate_location = Some(cert.clone());
    }
    if let Some(key) = matches.get_one::<PathBuf>("key") {
        config.ssl_key_location = Some(key.clone());
    }
    if let Some(reset) = matches.get_one::<OffsetReset>("offset-reset") {
        config.auto_offset_reset = *reset;
    }
    if let Some(timeout) = matches.get_one::<u64>("metadata-timeout-ms") {
        config.metadata_timeout_ms = *timeout;
    }
    for property in matches.get_many::<String>("set").into_iter().flatten() {
        let (key, value) = property.split_once('=').ok_or_else(|| {
            ConsumerError::Config(format!("invalid property {}, expected KEY=VALUE", property))
        })?;
        config.set(key.trim(), value.trim());
    }

    let topic = matches
        .get_one::<String>("topic")
        .map(|t| t.trim().to_owned())
        .unwrap_or_default();
    if topic.is_empty() {
        return Err(ConsumerError::Config("no topic".to_owned()));
    }

    Ok((config, topic))
}

fn consume(matches: &ArgMatches) -> ConsumerResult<TerminationReason> {
    let (config, topic) = settings(matches)?;
    let shutdown = ShutdownFlag::install().map_err(ConsumerError::SignalSetup)?;

    let mut session = Session::connect(&config)?;
    session.subscribe(&topic)?;
    let reason = session.run(&shutdown, &mut Formatter::stdout())?;
    session.shutdown();
    Ok(reason)
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    setup_logger(true, matches.get_one::<String>("log-conf").map(String::as_str));

    let (version_n, version_s) = get_rdkafka_version();
    info!("rd_kafka_version: 0x{:08x}, {}", version_n, version_s);

    match consume(&matches) {
        Ok(reason) => {
            info!("Consumer stopped: {:?}", reason);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
