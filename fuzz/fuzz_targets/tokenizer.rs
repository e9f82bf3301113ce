#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfetch::Tokenizer;

fuzz_target!(|data: &[u8]| {
    // the iterator must terminate and never panic
    for event in Tokenizer::new(data) {
        if event.is_err() {
            break;
        }
    }
});
