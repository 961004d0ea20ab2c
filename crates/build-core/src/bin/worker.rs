//! Out-of-process node worker entry point, spawned by
//! [`build_core::node::OutOfProcNodeProvider`] and addressed over piped
//! stdio. Invoked as `build-core-worker --node-worker <node-id>`.

use build_core::node::run_out_of_proc_worker_main;

fn main() {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    )
    .ok();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--node-worker") => {
            let node_id: i32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            if let Err(err) = run_out_of_proc_worker_main(node_id) {
                log::error!("node worker {node_id} exited with error: {err}");
                std::process::exit(1);
            }
        }
        _ => {
            eprintln!("usage: build-core-worker --node-worker <node-id>");
            std::process::exit(2);
        }
    }
}
