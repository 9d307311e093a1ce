use std::time::SystemTime;

use tablestat_core::SnapshotStore;

use super::SourceArgs;

pub fn run(args: &SourceArgs) {
    let store = SnapshotStore::new(
        &args.save_dir,
        &args.target,
        args.filter.as_deref(),
        SystemTime::now(),
    );
    let saved = match store.list_saved() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error listing {}: {e}", store.dir().display());
            std::process::exit(1);
        }
    };

    if saved.is_empty() {
        println!(
            "No saved baselines for {} in {}",
            args.target,
            store.dir().display()
        );
        return;
    }

    println!("Saved baselines for {} (most recent first)", args.target);
    println!();
    for file in &saved {
        println!("  [{}] {}", file.index, file.name);
    }
    println!();
    println!("Load one with `L<index>` in the dashboard or `tablestat once --baseline <index>`.");
}
