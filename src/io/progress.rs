//! Progress display for long sweeps

use indicatif::{ProgressBar, ProgressStyle};

use crate::io::configuration::PROGRESS_BAR_WIDTH;

/// Single progress bar over coefficient combinations or replications
pub struct SweepProgress {
    bar: ProgressBar,
}

impl SweepProgress {
    /// Create a labelled bar with `total` ticks
    pub fn new(total: u64, label: &str) -> Self {
        let template =
            format!("{{msg}} [{{bar:{PROGRESS_BAR_WIDTH}.cyan/blue}}] {{pos}}/{{len}} ({{eta}})");
        let style = ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏ ");
        let bar = ProgressBar::new(total);
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// Advance the bar one tick
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Complete and clear the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
