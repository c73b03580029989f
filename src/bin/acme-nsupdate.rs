use std::env;
use std::process;

use getopts::Options;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use acme_nsupdate::challenge::acme::challenge_domain;
use acme_nsupdate::challenge::config::NsupdateConfig;
use acme_nsupdate::challenge::retry::wait_for_propagation;
use acme_nsupdate::challenge::{ChallengeError, DnsChallengeHandler, NsupdateHandler};

fn print_usage(program: &str, opts: Options) {
    let brief = format!(
        "Usage: {} [options] <add|remove|verify|wait> <domain> <value>",
        program
    );
    print!("{}", opts.usage(&brief));
}

fn build_config(matches: &getopts::Matches) -> Result<NsupdateConfig, ChallengeError> {
    let mut config = match matches.opt_str("c") {
        Some(path) => NsupdateConfig::load(path)?,
        None => NsupdateConfig::default(),
    };

    if let Some(server) = matches.opt_str("s") {
        config.nsupdate_server = Some(server);
    }
    if let Some(port) = matches.opt_str("p") {
        config.nsupdate_port = port
            .parse()
            .map_err(|_| ChallengeError::configuration(format!("invalid port {}", port)))?;
    }
    if let Some(keyfile) = matches.opt_str("k") {
        config.nsupdate_keyfile = Some(keyfile.into());
    }
    if let Some(keyname) = matches.opt_str("n") {
        config.nsupdate_keyname = Some(keyname);
    }
    if let Some(keyvalue) = matches.opt_str("keyvalue") {
        config.nsupdate_keyvalue = Some(keyvalue);
    }
    if let Some(algorithm) = matches.opt_str("algorithm") {
        config.nsupdate_keyalgorithm = Some(algorithm);
    }
    if let Some(ttl) = matches.opt_str("ttl") {
        config.dns_ttl = ttl
            .parse()
            .map_err(|_| ChallengeError::configuration(format!("invalid ttl {}", ttl)))?;
    }
    if matches.opt_present("no-verify") {
        config.nsupdate_verify = false;
    }

    Ok(config)
}

fn run(command: &str, domain: &str, value: &str, config: &NsupdateConfig) -> Result<bool, ChallengeError> {
    let mut handler = NsupdateHandler::from_config(config)?;

    match command {
        "add" => handler.publish(domain, value).map(|_| true),
        "remove" => handler.retract(domain, value).map(|_| true),
        "verify" => handler.verify(domain, value),
        "wait" => {
            let mut sleep = std::thread::sleep;
            wait_for_propagation(&mut handler, domain, value, &config.wait_policy(), &mut sleep)
                .map(|_| true)
        }
        other => Err(ChallengeError::configuration(format!(
            "unknown command {}",
            other
        ))),
    }
}

/// Main entry point for the acme-nsupdate tool
fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optflag("v", "verbose", "log every query");
    opts.optopt("c", "config", "TOML configuration file", "FILE");
    opts.optopt(
        "s",
        "server",
        "Update server, by name or address (default: SOA primary)",
        "SERVER",
    );
    opts.optopt("p", "port", "DNS port of the update server", "PORT");
    opts.optopt("k", "keyfile", "TSIG key file", "FILE");
    opts.optopt("n", "keyname", "TSIG key name", "NAME");
    opts.optopt("", "keyvalue", "base64 TSIG secret", "SECRET");
    opts.optopt(
        "",
        "algorithm",
        "TSIG algorithm (default hmac-md5.sig-alg.reg.int)",
        "ALGORITHM",
    );
    opts.optopt("", "ttl", "TTL of the challenge record", "SECONDS");
    opts.optflag(
        "",
        "no-verify",
        "do not check the authoritative server in verify and wait",
    );
    opts.optflag(
        "",
        "challenge-name",
        "treat <domain> as the certificate name and derive the _acme-challenge record",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            process::exit(2);
        }
    };

    if matches.opt_present("h") || matches.free.len() != 3 {
        print_usage(&program, opts);
        return;
    }

    let level = if matches.opt_present("v") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .expect("Failed to initialize logger");

    let command = matches.free[0].as_str();
    let domain = if matches.opt_present("challenge-name") {
        challenge_domain(&matches.free[1])
    } else {
        matches.free[1].clone()
    };
    let value = matches.free[2].as_str();

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{}", err);
            process::exit(2);
        }
    };

    match run(command, &domain, value, &config) {
        Ok(true) => {}
        Ok(false) => {
            log::info!("TXT record for {} not visible yet", domain);
            process::exit(1);
        }
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    }
}
