//! Supervisor: resource acquisition, worker spawning, and the
//! shutdown/join/teardown sequence that brings the whole engine down
//! cleanly on operator quit or EOF.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::sync_channel;
use std::time::Instant;

use crate::aggregator::{Aggregator, AggregatorConfig, Direction};
use crate::config::{Config, LocalSource};
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::io::{FileReader, FileWriter, InputSide, LocalIO, OutputSide, Serial2Endpoint, SplitIo};
use crate::reader::PortReader;

/// Channel capacity between a Port Reader and its Aggregator. Bounded so
/// a stalled local sink applies backpressure to the reader rather than
/// growing memory without limit; generous enough that a burst well above
/// the 16-byte read chunk never blocks the reader in practice.
const CHANNEL_CAPACITY: usize = 256;

/// Runs the full engine to completion: acquire resources, spawn workers,
/// run the Local Dispatcher on the current thread, then tear everything
/// down. Returns once the operator has quit or local input hit EOF.
pub fn run(config: Config) -> Result<(), Error> {
    let start = Instant::now();
    let read_timeout = config.msg_timeout();

    let dce = Arc::new(
        Serial2Endpoint::open(
            &config.port,
            config.baud,
            config.framing,
            config.flow_control,
            read_timeout,
        )
        .map_err(|source| Error::Acquire {
            endpoint: "DCE",
            source,
        })?,
    );

    let dte = match &config.mitm_port {
        Some(port) => Some(Arc::new(
            Serial2Endpoint::open(
                port,
                config.baud,
                config.framing,
                config.flow_control,
                read_timeout,
            )
            .map_err(|source| Error::Acquire {
                endpoint: "DTE",
                source,
            })?,
        )),
        None => None,
    };

    let local_io: Arc<dyn LocalIO> = Arc::new(build_local_io(&config)?);
    print_banner(&local_io, &config);

    let shutdown = Arc::new(AtomicBool::new(false));

    let dce_peer = if config.forward {
        dte.clone().map(|d| d as Arc<dyn crate::io::SerialEndpoint>)
    } else {
        None
    };
    let dte_peer = if config.forward {
        Some(dce.clone() as Arc<dyn crate::io::SerialEndpoint>)
    } else {
        None
    };

    let (dce_tx, dce_rx) = sync_channel(CHANNEL_CAPACITY);
    let dce_reader = PortReader::new(
        dce.clone() as Arc<dyn crate::io::SerialEndpoint>,
        dce_peer,
        dce_tx,
        shutdown.clone(),
    );
    let dce_direction = if config.is_mitm() {
        Direction::DceToLocal
    } else {
        Direction::Solo
    };
    let dce_agg = Aggregator::new(
        dce_rx,
        local_io.clone(),
        AggregatorConfig {
            encoding: config.encoding,
            timestamps: config.timestamps,
            direction: dce_direction,
            start,
            msg_timeout: read_timeout,
        },
    );
    let dce_agg_handle = std::thread::spawn(move || dce_agg.run());
    let dce_reader_handle = std::thread::spawn(move || dce_reader.run());

    let (dte_reader_handle, dte_agg_handle) = if let Some(dte) = dte.clone() {
        let (dte_tx, dte_rx) = sync_channel(CHANNEL_CAPACITY);
        let dte_reader = PortReader::new(
            dte as Arc<dyn crate::io::SerialEndpoint>,
            dte_peer,
            dte_tx,
            shutdown.clone(),
        );
        let dte_agg = Aggregator::new(
            dte_rx,
            local_io.clone(),
            AggregatorConfig {
                encoding: config.encoding,
                timestamps: config.timestamps,
                direction: Direction::DteToLocal,
                start,
                msg_timeout: read_timeout,
            },
        );
        let agg_handle = std::thread::spawn(move || dte_agg.run());
        let reader_handle = std::thread::spawn(move || dte_reader.run());
        (Some(reader_handle), Some(agg_handle))
    } else {
        (None, None)
    };

    let dispatcher = Dispatcher::new(
        local_io.clone(),
        dce.clone() as Arc<dyn crate::io::SerialEndpoint>,
        dte.map(|d| d as Arc<dyn crate::io::SerialEndpoint>),
        config.encoding,
        shutdown.clone(),
    );
    dispatcher.run();

    // Dispatcher.run() already set shutdown on return. Port Readers
    // observe it between reads (worst case one read_timeout) and drop
    // their channel senders on exit, which is what lets each Aggregator
    // notice its channel disconnect, flush any residual bytes, and
    // return. Join both stages, in that order, so the process cannot
    // exit before the final partial line has actually been written.
    if dce_reader_handle.join().is_err() {
        tracing::error!("DCE port reader thread panicked");
    }
    if let Some(handle) = dte_reader_handle {
        if handle.join().is_err() {
            tracing::error!("DTE port reader thread panicked");
        }
    }
    if dce_agg_handle.join().is_err() {
        tracing::error!("DCE aggregator thread panicked");
    }
    if let Some(handle) = dte_agg_handle {
        if handle.join().is_err() {
            tracing::error!("DTE aggregator thread panicked");
        }
    }

    Ok(())
}

fn build_local_io(config: &Config) -> Result<SplitIo, Error> {
    let input = match &config.input {
        LocalSource::Stdio => {
            InputSide::Stdin(std::sync::Mutex::new(std::io::BufReader::new(std::io::stdin())))
        }
        LocalSource::File(path) => InputSide::File(
            FileReader::open(path).map_err(|source| Error::Acquire {
                endpoint: "input file",
                source,
            })?,
        ),
    };
    let output = match &config.output {
        LocalSource::Stdio => OutputSide::Stdout(std::sync::Mutex::new(std::io::stdout())),
        LocalSource::File(path) => OutputSide::File(
            FileWriter::open_append(path).map_err(|source| Error::Acquire {
                endpoint: "output file",
                source,
            })?,
        ),
    };
    Ok(SplitIo::new(input, output))
}

fn print_banner(local_io: &Arc<dyn LocalIO>, config: &Config) {
    let mut banner = format!(
        "hexterm: {} @ {} baud, {}, flow={}, encoding={}",
        config.port,
        config.baud,
        config.framing,
        config.flow_control,
        config.encoding.name(),
    );
    if let Some(mitm) = &config.mitm_port {
        banner.push_str(&format!(
            ", mitm={mitm}, forward={}",
            if config.forward { "on" } else { "off" }
        ));
    }
    banner.push_str(&format!(", timestamps={}\n", config.timestamps));
    banner.push_str("Type 'quit' to exit\n");
    let _ = local_io.write(&banner);
    let _ = local_io.flush();
}
