#![no_main]

use faultline::faults::FaultMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Any spelling the parser accepts must display back to a spelling
    // the parser accepts, and both must name the same mode.
    if let Ok(mode) = text.parse::<FaultMode>() {
        let spelling = mode.to_string();
        let reparsed: FaultMode = spelling
            .parse()
            .unwrap_or_else(|_| panic!("displayed spelling `{spelling}` does not parse"));
        assert_eq!(reparsed, mode, "spelling `{spelling}` drifted on re-parse");
    }
});
