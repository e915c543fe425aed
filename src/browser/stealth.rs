//! Bot-detection mitigation applied once per context.
//!
//! The storefront runs the usual headless checks (`navigator.webdriver`,
//! empty plugin list, missing `window.chrome`). The init script papers over
//! those before any page script runs; the viewport gets a small random
//! jitter so contexts don't all report identical metrics.

use rand::Rng;

/// Injected via `Page.addScriptToEvaluateOnNewDocument` so it runs before
/// the page's own scripts on every navigation in the context.
pub const INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
"#;

/// Desktop-ish viewport with jitter: width 1280-1440, height 800-900.
pub fn random_viewport() -> (i64, i64) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(1280..=1440), rng.gen_range(800..=900))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_stays_in_band() {
        for _ in 0..50 {
            let (w, h) = random_viewport();
            assert!((1280..=1440).contains(&w));
            assert!((800..=900).contains(&h));
        }
    }

    #[test]
    fn test_init_script_patches_webdriver() {
        assert!(INIT_SCRIPT.contains("navigator, 'webdriver'"));
        assert!(INIT_SCRIPT.contains("window.chrome"));
    }
}
