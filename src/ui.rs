use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Startup stage output: spinner on an interactive terminal, plain lines otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: &str) -> Self {
        match flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    /// `auto` uses the spinner only when stderr is a terminal and the log
    /// stream is not sharing it at debug verbosity.
    pub fn new(mode: UiMode, stderr_is_tty: bool, verbose_logs: bool) -> Self {
        let pretty = stderr_is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => !verbose_logs,
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn stage(&self, name: &str) -> Stage {
        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(100));
            let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(name.to_string());
            Stage::new(name, Some(spinner))
        } else {
            eprintln!("==> {}", name);
            Stage::new(name, None)
        }
    }
}

/// A running stage. Reports success when dropped unless marked failed.
pub struct Stage {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl Stage {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Pass a stage result through, marking the stage failed on error.
    pub fn check<T, E>(mut self, result: Result<T, E>) -> Result<T, E> {
        self.failed = result.is_err();
        result
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let line = format!("{} {} ({})", mark, self.name, format_elapsed(self.started.elapsed()));
        match &self.spinner {
            Some(spinner) if self.failed => spinner.abandon_with_message(line),
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{}", line),
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed >= Duration::from_secs(1) {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_resolution() {
        assert!(!Ui::new(UiMode::Pretty, false, false).pretty);
        assert!(Ui::new(UiMode::Pretty, true, true).pretty);
        assert!(Ui::new(UiMode::Auto, true, false).pretty);
        assert!(!Ui::new(UiMode::Auto, true, true).pretty);
        assert!(!Ui::new(UiMode::Plain, true, false).pretty);
        assert_eq!(UiMode::parse("plain"), UiMode::Plain);
        assert_eq!(UiMode::parse("anything"), UiMode::Auto);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(42)), "42ms");
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
    }

    #[test]
    fn failed_stage_passes_error_through() {
        let ui = Ui::new(UiMode::Plain, false, false);
        let result: Result<(), &str> = ui.stage("Open camera").check(Err("no device"));
        assert_eq!(result, Err("no device"));
    }
}
