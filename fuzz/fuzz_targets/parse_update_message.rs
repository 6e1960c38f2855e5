#![no_main]

use std::sync::OnceLock;

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use routecodec::bgp::extensions::{BgpExtensions, CodecContext};
use routecodec::bgp::message::{SessionConfig, UpdateMessage};
use routecodec::Cursor;

static EXTENSIONS: OnceLock<BgpExtensions> = OnceLock::new();

fuzz_target!(|data: (&[u8], SessionConfig)| {
    let ext = EXTENSIONS.get_or_init(BgpExtensions::default);
    let ctx = CodecContext::new(&data.1, ext);
    let mut cursor = Cursor::new(data.0);
    if let Ok(parsed) = UpdateMessage::parse_body(&mut cursor, &ctx) {
        let upd = parsed.update;
        upd.end_of_rib();
        upd.attributes().iter().count();
        let _ = upd.compose_body(&ctx, &mut BytesMut::new());
    }
});
