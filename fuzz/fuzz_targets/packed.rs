#![no_main]

use libfuzzer_sys::fuzz_target;
use ctxscope::encoding::packed;

fuzz_target!(|data: &[u8]| {
    if let Ok(root) = packed::decode(data) {
        assert_eq!(packed::decode(&packed::encode(&root)).ok(), Some(root));
    }
});
