//! # hippo2nmea
//! Reads the binary HIPPO GPS protocol from a serial port or file and
//! writes the translated NMEA 0183 sentences to standard output. Logs and
//! session counters go to standard error so the sentence stream stays
//! clean for downstream consumers.
mod config;

use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use hippo_nmea::Translator;

use config::BridgeCfg;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg = BridgeCfg::acquire();
    if cfg.store_config {
        match cfg.store_default() {
            Ok(()) => log::info!("stored configuration as default"),
            Err(err) => log::warn!("failed to store configuration: {err}"),
        }
    }
    let Some(source) = cfg.source.clone() else {
        log::error!("no input source given and no stored configuration found");
        std::process::exit(2);
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .expect("Failed to install Ctrl-C handler");
    }

    let mut translator = Translator::new();
    let mut stdout = std::io::stdout().lock();

    if cfg.from_file || source == "-" {
        let result = if source == "-" {
            let mut stdin = std::io::stdin().lock();
            translator.run(&mut stdin, &mut stdout)
        } else {
            match File::open(&source) {
                Ok(mut file) => translator.run(&mut file, &mut stdout),
                Err(err) => {
                    log::error!("failed to open {source}: {err}");
                    std::process::exit(1);
                }
            }
        };
        if let Err(err) = result {
            log::error!("translation aborted: {err}");
            std::process::exit(1);
        }
    } else {
        let mut port = serialport::new(&source, cfg.baud_rate)
            .open()
            .expect("Failed to open serial port");
        port.set_timeout(Duration::from_millis(cfg.timeout))
            .expect("Failed to set timeout");
        let mut buf = [0u8; 2048];
        while running.load(Ordering::SeqCst) {
            let n = match port.read(&mut buf) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::TimedOut => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::error!("serial read failed: {err}");
                    break;
                }
            };
            if n == 0 {
                continue;
            }
            let mut failed = false;
            for sentence in translator.push(&buf[..n]) {
                if let Err(err) = stdout.write_all(sentence.as_bytes()) {
                    log::error!("output sink failed: {err}");
                    failed = true;
                    break;
                }
            }
            if failed || stdout.flush().is_err() {
                break;
            }
        }
    }

    let stats = translator.stats();
    log::info!(
        "session done: {} frames, {} sentences, {} noise bytes, {} sync losses, \
         {} checksum failures, {} malformed, {} unsupported",
        stats.frames,
        stats.sentences,
        stats.noise_bytes,
        stats.sync_losses,
        stats.checksum_failures,
        stats.malformed,
        stats.unsupported
    );
}
