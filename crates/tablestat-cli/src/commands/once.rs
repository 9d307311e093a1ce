use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tablestat_core::{LoadState, Metric};

use super::SourceArgs;

pub struct OnceConfig<'a> {
    pub iterations: usize,
    pub sort: Option<&'a str>,
    pub rate: bool,
    pub changed_only: bool,
    pub baseline: Option<&'a str>,
    pub save: bool,
    pub source: &'a SourceArgs,
}

pub fn run(cfg: OnceConfig<'_>) {
    let (monitor, mut source) = super::make_monitor(cfg.source);

    let running = monitor.running_flag();
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    {
        let mut state = monitor.state();
        if let Some(token) = cfg.sort
            && let Err(e) = state.sort_by_token(token)
        {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        if cfg.rate {
            state.toggle_show_rate();
        }
        if cfg.changed_only {
            state.toggle_show_changed_only();
        }
    }

    let interval = monitor.config().interval;
    for i in 0..cfg.iterations.max(1) {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if i > 0 {
            let deadline = Instant::now() + interval;
            while Instant::now() < deadline && running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        if let Err(e) = monitor.poll_once(source.as_mut()) {
            eprintln!("Error collecting from {}: {e}", source.name());
            std::process::exit(1);
        }
    }

    if let Some(selector) = cfg.baseline
        && let Err(e) = monitor.load(selector)
    {
        eprintln!("Error loading baseline {selector}: {e}");
        std::process::exit(1);
    }

    print!("{}", render_text(&monitor.state()));

    if cfg.save {
        match monitor.save() {
            Ok(path) => println!("\nSaved to {}", path.display()),
            Err(e) => {
                eprintln!("Error saving: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Plain-text table: header, one line per visible entity, then the totals.
/// Changed cells are marked with `*`.
pub fn render_text(state: &LoadState) -> String {
    let mut header = vec![state.level().column_label().to_string()];
    header.extend(Metric::ALL.iter().map(|m| format!("{}:{}", m.ordinal() % 10, m.name())));

    let mut rows: Vec<Vec<String>> = state
        .visible_entities()
        .into_iter()
        .map(|e| {
            let mut row = vec![e.to_string()];
            row.extend(Metric::ALL.iter().map(|&m| {
                let mark = if state.is_value_changed(e, m) { "*" } else { "" };
                format!("{}{mark}", state.cell_text(e, m))
            }));
            row
        })
        .collect();
    let mut total = vec!["Total".to_string()];
    total.extend(Metric::ALL.iter().map(|&m| {
        let mark = if state.is_summary_changed(m) { "*" } else { "" };
        format!("{}{mark}", state.summary_cell_text(m))
    }));
    rows.push(total);

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            rows.iter()
                .map(|r| r[col].chars().count())
                .chain(std::iter::once(header[col].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                if col == 0 {
                    format!("{cell:<w$}", w = widths[col])
                } else {
                    format!("{cell:>w$}", w = widths[col])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format!(
        "{} | sort: {} | diff from {}{}\n",
        state.level(),
        state.sort_description(),
        if state.is_diff_from_start() { "start" } else { "previous" },
        if state.is_show_rate() { " | rate" } else { "" },
    );
    out.push_str(&line(&header));
    out.push('\n');
    let last = rows.len() - 1;
    for (i, row) in rows.iter().enumerate() {
        if i == last {
            let rule: usize = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
            out.push_str(&"-".repeat(rule));
            out.push('\n');
        }
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}
