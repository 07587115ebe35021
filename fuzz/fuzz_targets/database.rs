#![no_main]

use libfuzzer_sys::fuzz_target;
use ctxscope::prelude::*;

fuzz_target!(|data: &[u8]| {
    let mut spaces = SpaceManager::new();
    spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
    spaces.insert(AddrSpace::new("register", 2, 4, 1, true));

    for format in [StreamFormat::Packed, StreamFormat::Xml] {
        let mut db = ContextDatabase::new();
        let ctx = db.context_mut();
        let _ = ctx.register_variable("mode", 0, 0);
        let _ = ctx.register_variable("bank", 1, 7);
        let _ = ctx.register_variable("page", 32, 63);

        if db.load(data, format, &spaces).is_ok() {
            let _ = db.save(StreamFormat::Xml);
            let _ = db.save(StreamFormat::Packed);
        }
    }
});
