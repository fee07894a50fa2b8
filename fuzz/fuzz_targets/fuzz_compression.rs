#![no_main]

use libfuzzer_sys::fuzz_target;
use world_session::utils::compression::{compress, decompress_with_limit, CompressionKind};

const LIMIT: usize = 4 * 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
        if let Ok(compressed) = compress(data, &kind) {
            let restored = decompress_with_limit(&compressed, &kind, LIMIT);
            if data.len() <= LIMIT {
                assert_eq!(restored.ok().as_deref(), Some(data));
            }
        }

        // Untrusted parts must respect the output limit
        let _ = decompress_with_limit(data, &kind, LIMIT);
    }
});
