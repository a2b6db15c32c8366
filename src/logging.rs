use std::sync::OnceLock;

/// Environment variable that enables per-call diagnostic traces.
pub const VERBOSE_ENV: &str = "RDEVELOP_VERBOSE";

static VERBOSE: OnceLock<bool> = OnceLock::new();

/// Whether verbose diagnostics are enabled for this process.
///
/// The environment is inspected once on first use and the result is latched
/// for the process lifetime. Affects only logging volume, never results.
pub fn verbose() -> bool {
    *VERBOSE.get_or_init(|| {
        let enabled = std::env::var(VERBOSE_ENV)
            .map(|raw| truthy(&raw))
            .unwrap_or(false);
        if enabled {
            log::info!("Verbose diagnostics enabled ({}=1)", VERBOSE_ENV);
        }
        enabled
    })
}

fn truthy(raw: &str) -> bool {
    let norm = raw.trim().to_ascii_lowercase();
    norm == "1" || norm == "true" || norm == "yes" || norm == "on"
}
