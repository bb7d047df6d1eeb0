#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either fail to parse or validate without panicking, and a
// validated config must map onto core types.
fuzz_target!(|data: &str| {
    let Ok(cfg) = ftcal_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let _ = ftcal_core::Acquisition::from(&cfg);
        let _ = ftcal_core::RunOptions::from(&cfg);
        let _ = ftcal_core::Degree::try_from(&cfg.model);
    }
});
