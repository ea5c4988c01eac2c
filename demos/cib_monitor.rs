//! Example: follow a CIB and print node membership on every change.
//!
//! Opens a CIB file (or a shadow copy when the argument has no path
//! separator), prints the current state, subscribes to updates and runs the
//! event loop. When the connection is lost the monitor waits and reconnects,
//! backing off up to a minute.
//!
//! To run:
//! ```bash
//! RUST_LOG=pacemaker_cib=debug cargo run --example cib_monitor -- testdata/cluster.xml
//! ```

use std::error::Error;
use std::time::Duration;

use pacemaker_cib::types::Document;
use pacemaker_cib::{Cib, CibEvent, ClientConfig, ConnectionOptions, FileSessionProvider};
use tracing_subscriber::EnvFilter;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn print_document(document: &Document) {
    println!("CIB version {}", document.version());
    if let Some(dc) = document.dc_uuid() {
        println!("  DC: {dc} (quorum: {})", document.have_quorum());
    }
    for node in &document.status().node_states {
        let state = if node.is_member() { "online" } else { "offline" };
        println!("  {:<20} {state}", node.uname);
    }
}

fn connection(target: &str) -> ConnectionOptions {
    if target.contains('/') {
        ConnectionOptions::from_file(target)
    } else {
        ConnectionOptions::from_shadow(target)
    }
}

/// Follow the CIB until the session ends. Returns whether it was lost.
fn monitor(options: &ConnectionOptions) -> Result<bool, Box<dyn Error>> {
    let cib = Cib::open(&FileSessionProvider::default(), options, ClientConfig::new("cib_monitor"))?;
    print_document(&*cib.decode()?);

    let subscription = cib.subscribe(|event, document| match (event, document) {
        (CibEvent::Updated, Some(document)) => print_document(&document),
        (CibEvent::ConnectionLost, _) => println!("connection lost"),
        (CibEvent::Updated, None) => {}
    })?;
    cib.run_event_loop()?;
    Ok(subscription.is_lost())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let target = std::env::args().nth(1).unwrap_or_else(|| "testdata/cluster.xml".to_string());
    let options = connection(&target);

    let mut backoff = Duration::from_secs(1);
    loop {
        match monitor(&options) {
            Ok(false) => return Ok(()),
            Ok(true) => backoff = Duration::from_secs(1),
            Err(err) => {
                eprintln!("monitor failed: {err}");
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
        std::thread::sleep(backoff);
    }
}
