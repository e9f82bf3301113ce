#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlfetch::{from_xml_bytes_with_config, Config};

fuzz_target!(|data: &[u8]| {
    let Some((&flags, xml)) = data.split_first() else {
        return;
    };
    let config = Config::new(flags & 1 != 0, flags & 2 != 0)
        .with_trim_text(flags & 4 == 0)
        .with_strip_namespace_prefix(flags & 8 != 0)
        .with_max_depth(64);
    if let Ok(records) = from_xml_bytes_with_config(xml, &config) {
        assert!(records.iter().all(|record| record.is_map()));
    }
});
