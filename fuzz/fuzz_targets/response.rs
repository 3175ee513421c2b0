#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use spamd_client::{ClientConfig, Command, deadline::Deadline, response::Decoder};

fuzz_target!(|data: &[u8]| {
    let Some((selector, wire)) = data.split_first() else {
        return;
    };

    let command = match selector % 7 {
        0 => Command::Check,
        1 => Command::Symbols,
        2 => Command::Report,
        3 => Command::ReportIfSpam,
        4 => Command::Process,
        5 => Command::Headers,
        _ => Command::Ping,
    };

    let mut config = ClientConfig::new("127.0.0.1", "fuzz");
    config.raw_body = selector & 0x80 != 0;
    config.max_response_size = 1024 * 1024;

    let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    else {
        return;
    };

    runtime.block_on(async {
        let mut reader = wire;
        let _ = Decoder::new(command, &config)
            .decode(&mut reader, Deadline::after(Duration::from_secs(1)))
            .await;
    });
});
