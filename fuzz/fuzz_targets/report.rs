#![no_main]

use libfuzzer_sys::fuzz_target;
use spamd_client::response::{parse_rules, parse_spam_header};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let _ = parse_rules(&text);
    let _ = parse_spam_header(&text);
});
