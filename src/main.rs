//! An HTTP server that runs scripts through a FastCGI responder.
//!
//! Call it like this:
//!
//!     fcgi-http-kernel -f config.toml
//!
//! The config file is in the [TOML format][toml] because it’s commonly used in
//! the Rust ecosystem. Here is an example:
//!
//! ```toml
//! [listen]
//! port = 8000
//!
//! [kernel]
//! document_root = "/var/www"
//! front_controller = "index.php"
//!
//! [fastcgi]
//! host = "127.0.0.1"
//! port = 9000
//! timeout_secs = 30
//! ```
//!
//! Apart from `front_controller` and `timeout_secs`, which are unset, this
//! example also serves as the defaults if no config file is provided, or any
//! given key is not present. `-r` and `-c` override the document root and
//! front controller from the file. If a key is of the wrong type, the server
//! will bail, so don’t do that.
//!
//! [toml]: https://github.com/toml-lang/toml

use fcgi_http_kernel::config::parser::{self, parse_file};
use fcgi_http_kernel::config::Config;
use fcgi_http_kernel::server::serve;

use clap::{value_parser, Arg, Command};
use log::{error, info};

use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

const DEFAULT_CONFIG: &str = "/etc/fcgi-http-kernel/config.toml";

fn main() {
    let mut log_builder = env_logger::Builder::new();
    log_builder.filter_level(log::LevelFilter::Info);

    if let Ok(var) = env::var("FCGI_HTTP_KERNEL_LOG") {
        log_builder.parse_filters(&var);
    }

    if let Err(e) = log_builder.try_init() {
        eprintln!("fcgi-http-kernel: Error when initializing logging: {}", e);
        exit(1);
    }

    let matches = Command::new("fcgi-http-kernel")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Alex Hill <alexander.d.hill.89@gmail.com>")
        .arg(
            Arg::new("config_file")
                .short('f')
                .value_name("FILE")
                .help("The TOML file with server configuration")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("document_root")
                .short('r')
                .value_name("DIR")
                .help("Directory the scripts are served from")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("front_controller")
                .short('c')
                .value_name("SCRIPT")
                .help("Script that handles every path which isn't a file"),
        )
        .get_matches();

    let mut config = match matches.get_one::<PathBuf>("config_file") {
        Some(file) => load(file),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if default.exists() {
                load(&default)
            } else {
                Config::default()
            }
        }
    };

    if let Some(root) = matches.get_one::<PathBuf>("document_root") {
        config.kernel.document_root = root.clone();
    }
    if let Some(script) = matches.get_one::<String>("front_controller") {
        config.kernel.front_controller = Some(script.clone());
    }

    info!("Starting server on port {}", config.port);
    if let Err(e) = serve(config) {
        error!("Server stopped: {}", e);
        exit(1);
    }
}

fn load(config_file: &Path) -> Config {
    match parse_file(config_file) {
        Ok(c) => c,
        Err(parser::Error::Io(e)) => {
            error!("Error opening config file {:?}: {}", config_file, e);
            exit(1);
        }
        Err(parser::Error::Parse(e)) => {
            error!("Errors parsing config file {:?}", config_file);
            for error in e {
                error!(
                    "Config file error at line {} column {}: {}",
                    error.line, error.column, error.desc
                );
            }
            exit(1);
        }
        Err(parser::Error::Validation(message)) => {
            error!("Error in config file: {}", message);
            exit(1);
        }
    }
}
