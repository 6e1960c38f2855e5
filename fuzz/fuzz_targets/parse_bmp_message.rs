#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use routecodec::bmp::message::{BmpExtensions, Message};

static EXTENSIONS: OnceLock<BmpExtensions> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let ext = EXTENSIONS.get_or_init(BmpExtensions::default);
    if let Ok(Message::RouteMonitoring(rm)) = Message::from_octets(data, ext) {
        let config = rm.per_peer_header().session_config();
        let _ = rm.bgp_update(&config, ext.bgp());
    }
});
