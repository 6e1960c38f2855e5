#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use routecodec::bgp::extensions::BgpExtensions;
use routecodec::rsvp::SubobjectRegistries;
use routecodec::tlv::{parse_all, TlvFormat, Unrecognized};
use routecodec::Cursor;

static EXTENSIONS: OnceLock<BgpExtensions> = OnceLock::new();
static SUBOBJECTS: OnceLock<SubobjectRegistries> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    let ext = EXTENSIONS.get_or_init(BgpExtensions::default);
    let _ = parse_all(
        Cursor::new(data), TlvFormat::WIDE, ext.ls_attributes(),
        Unrecognized::Keep,
    );
    let _ = parse_all(
        Cursor::new(data), TlvFormat::NARROW, ext.capabilities(),
        Unrecognized::Keep,
    );
    let subobjects = SUBOBJECTS.get_or_init(
        SubobjectRegistries::with_defaults
    );
    let _ = subobjects.parse_ero(Cursor::new(data));
    let _ = subobjects.parse_xro(Cursor::new(data));
});
