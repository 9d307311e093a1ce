use super::SourceArgs;

pub fn run(args: &SourceArgs) {
    let (monitor, source) = super::make_monitor(args);
    let poller = super::spawn_poll_loop(&monitor, source);

    let mut app = crate::tui::app::App::new(monitor.clone());
    let result = app.run();

    monitor.stop();
    let _ = poller.join();

    if let Err(e) = result {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}
