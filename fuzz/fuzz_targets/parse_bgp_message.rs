#![no_main]

use std::sync::OnceLock;

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use routecodec::bgp::extensions::{BgpExtensions, CodecContext};
use routecodec::bgp::message::{Message, SessionConfig};

static EXTENSIONS: OnceLock<BgpExtensions> = OnceLock::new();

fuzz_target!(|data: (&[u8], SessionConfig)| {
    let ext = EXTENSIONS.get_or_init(BgpExtensions::default);
    let ctx = CodecContext::new(&data.1, ext);
    if let Ok(msg) = Message::from_octets(data.0, &ctx) {
        let _ = msg.compose(&ctx, &mut BytesMut::new());
    }
});
