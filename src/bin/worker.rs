//! Texture recompression worker process
//!
//! Spawned by a host process with the control socket path and the two
//! region backing files as arguments. Serves jobs until the host closes
//! the control channel, then exits 0.

use std::process;

use clap::{App, Arg, ArgMatches};

use texshuttle::{config, CompressionService, CpuCodec, WorkerLoop, VERSION};

fn main() {
    env_logger::init();

    let matches = App::new("texshuttle-worker")
        .version(VERSION)
        .about("Texture recompression worker, spawned and driven by a host process")
        .arg(
            Arg::with_name("control")
                .help("Path of the host's control socket")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("input")
                .help("Backing file of the container input region")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("output")
                .help("Backing file of the encoded output region")
                .required(true)
                .index(3),
        )
        .arg(
            Arg::with_name("input-capacity")
                .long("input-capacity")
                .help("Input region capacity in bytes")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output-capacity")
                .long("output-capacity")
                .help("Output region capacity in bytes")
                .takes_value(true),
        )
        .get_matches();

    let control = matches.value_of("control").unwrap();
    let input = matches.value_of("input").unwrap();
    let output = matches.value_of("output").unwrap();
    let input_capacity = capacity_arg(&matches, "input-capacity", config::DEFAULT_INPUT_CAPACITY);
    let output_capacity =
        capacity_arg(&matches, "output-capacity", config::DEFAULT_OUTPUT_CAPACITY);

    let service = CompressionService::new(Box::new(CpuCodec::new()));
    let mut worker =
        match WorkerLoop::connect(control, input, output, input_capacity, output_capacity, service)
        {
            Ok(worker) => worker,
            Err(err) => {
                log::error!("worker startup failed: {}", err);
                process::exit(2);
            }
        };

    log::info!("worker connected to {}", control);
    if let Err(err) = worker.run() {
        log::error!("worker terminated: {}", err);
        process::exit(1);
    }
}

fn capacity_arg(matches: &ArgMatches, name: &str, default: usize) -> usize {
    match matches.value_of(name) {
        Some(raw) => match raw.parse() {
            Ok(capacity) => capacity,
            Err(_) => {
                log::error!("invalid {} value: {}", name, raw);
                process::exit(2);
            }
        },
        None => default,
    }
}
