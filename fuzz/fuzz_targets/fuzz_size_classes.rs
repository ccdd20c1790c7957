#![no_main]

use libfuzzer_sys::fuzz_target;

use segpool_core::{PoolError, SizeClasses};

fuzz_target!(|data: &[u8]| {
    let sizes: Vec<usize> = data
        .chunks_exact(2)
        .map(|c| usize::from(u16::from_le_bytes([c[0], c[1]])))
        .collect();

    // Should not panic; a valid table routes every request to the smallest fit.
    let Ok(classes) = SizeClasses::new(&sizes) else {
        return;
    };
    for request in [1, 16, 17, 100, 4096, classes.max_size(), classes.max_size() + 1] {
        match classes.class_for(request) {
            Ok(i) => {
                let size = classes.block_size(i).unwrap();
                assert!(size >= request);
                assert!(i == 0 || classes.block_size(i - 1).unwrap() < request);
            }
            Err(PoolError::UnknownSizeClass { size }) => {
                assert_eq!(size, request);
                assert!(request > classes.max_size());
            }
            Err(other) => panic!("unexpected error {other}"),
        }
    }
});
