//! Ambient diagnostics: progress reporting and warnings, in the teacher's
//! style of talking directly to stderr rather than through a logging
//! facade (`src/main.rs`'s `ProgressBar`, `tuner.rs`'s `eprintln!`).

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// A progress bar over `total` bytes/records, drawn at 5Hz to stderr like
/// the teacher's compression progress bar.
pub fn new_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap(),
    );
    pb
}

/// Non-fatal diagnostic surfaced during a VB's processing, e.g. an
/// unrecognized codec falling back to `NONE` or a soft digest mismatch
/// warning under `--test`.
pub fn warn_section(vblock_i: u32, message: &str) {
    eprintln!("genozip: warning: vb={vblock_i}: {message}");
}

/// A warning not tied to any particular VB (header parsing, CLI option
/// interactions).
pub fn warn(message: &str) {
    eprintln!("genozip: warning: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_starts_at_zero() {
        let pb = new_progress_bar(100);
        assert_eq!(pb.position(), 0);
        pb.finish_and_clear();
    }
}
