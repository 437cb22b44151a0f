use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use replibench_core::prelude::DelegatedShutdownListener;

/// Displays a progress bar while a duration bound run is in progress to show the user how long is
/// left.
pub(crate) fn start_progress(planned_runtime: Duration, shutdown_listener: DelegatedShutdownListener) {
    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let planned_secs = planned_runtime.as_secs().max(1);
            let pb = ProgressBar::new(planned_secs);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
                )
                .expect("Failed to set progress style")
                .with_key("planned_runtime", {
                    let hours = planned_secs / 3600;
                    let minutes = (planned_secs % 3600) / 60;
                    let seconds = planned_secs % 60;
                    move |_state: &ProgressState, w: &mut dyn Write| {
                        let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
                    }
                })
                .progress_chars("#>-"),
            );

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_secs);
                pb.set_position(new);
                std::thread::sleep(Duration::from_millis(250));
            }
        })
        .expect("Failed to start progress thread");
}
