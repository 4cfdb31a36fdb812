use env_logger::Env;
use pow_ledger::protocol::{Protocol, ProtocolConfig};
use std::{env, io};

const LOGGIN_LEVEL_ENV: &str = "POW_LEDGER_DAEMON_LOGGING_LEVEL";
const FALLBACK_LOGGING_LEVEL: &str = "warn";

const NETWORK_PORT_ENV: &str = "POW_LEDGER_DAEMON_PORT";
const DEFAULT_NETWORK_PORT: u16 = 5000;

// reject malformed transactions instead of accepting anything
const STRICT_TRANSACTIONS_ENV: &str = "POW_LEDGER_STRICT_TRANSACTIONS";
const DEFAULT_STRICT_TRANSACTIONS: bool = false;

fn main() -> io::Result<()> {
    init_logger();
    let network_port = init_network_port();
    let strict_transactions = init_strict_transactions();

    log::debug!("Network port: {}", network_port);
    log::debug!("Strict transactions: {}", strict_transactions);

    let config = ProtocolConfig { network_port };

    let mut protocol = Protocol::new(strict_transactions);

    protocol.run(config)
}

fn init_logger() {
    let env = Env::new().filter_or(LOGGIN_LEVEL_ENV, FALLBACK_LOGGING_LEVEL);
    env_logger::init_from_env(env);
}

fn init_network_port() -> u16 {
    env::var(NETWORK_PORT_ENV).map_or(DEFAULT_NETWORK_PORT, |port| {
        port.parse().unwrap_or_else(|_| {
            panic!(
                "Environment variable `{}` could not be parsed as a valid port number",
                NETWORK_PORT_ENV
            )
        })
    })
}

fn init_strict_transactions() -> bool {
    env::var(STRICT_TRANSACTIONS_ENV).map_or(DEFAULT_STRICT_TRANSACTIONS, |strict| {
        strict.parse().unwrap_or_else(|_| {
            panic!(
                "Environment variable `{}` must be either `true` or `false`",
                STRICT_TRANSACTIONS_ENV
            )
        })
    })
}
