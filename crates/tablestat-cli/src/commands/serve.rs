use super::SourceArgs;

pub fn run(host: &str, port: u16, args: &SourceArgs) {
    let (monitor, source) = super::make_monitor(args);
    let config = monitor.config().clone();

    let base = format!("http://{host}:{port}");
    println!("tablestat server v{}", tablestat_core::VERSION);
    println!("   {base}");
    println!(
        "   watching {} ({} level, every {:.1}s)",
        config.target,
        config.level,
        config.interval.as_secs_f64()
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                          API index (try: curl {base})");
    println!("     GET  /view                      Load table as HTML");
    println!("     GET  /api/v1/load               Rows, summary and flags as JSON");
    println!("     GET  /api/v1/saved              Saved baselines, most recent first");
    println!("     POST /api/v1/command/{{key}}      d c r R S p, or a sort key");
    println!("     POST /api/v1/baseline/{{index}}   Diff from a saved baseline");
    println!("     GET  /health                    Health check");
    println!();
    println!("   Examples:");
    println!("     curl -X POST {base}/api/v1/command/d");
    println!("     curl -X POST {base}/api/v1/command/1");
    println!("     curl -X POST {base}/api/v1/baseline/0");
    println!();

    let poller = super::spawn_poll_loop(&monitor, source);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    let result = rt.block_on(tablestat_server::run_server(monitor.clone(), host, port));

    monitor.stop();
    let _ = poller.join();

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
