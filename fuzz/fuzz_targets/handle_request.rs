//! Fuzz target for the simulated device.
//!
//! Arbitrary request frames are decoded device-side and dispatched into a
//! simulated module, interleaved with ticks. Nothing may panic and every
//! reply must encode to a single terminated line (CAEN) or echo plus answer
//! (iseg).

#![no_main]

use arbitrary::Arbitrary;
use hvps::protocol::codec::codec;
use hvps::simulation::{SimRng, SimulatedModule};
use hvps::Brand;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct SessionInput {
    iseg: bool,
    seed: u64,
    frames: Vec<(Vec<u8>, bool)>,
}

fuzz_target!(|input: SessionInput| {
    let brand = if input.iseg { Brand::Iseg } else { Brand::Caen };
    let codec = codec(brand);
    let mut rng = SimRng::new(Some(input.seed));
    let mut module = SimulatedModule::new(brand, 0, 4, 0.1);

    for (frame, tick) in input.frames.iter().take(64) {
        if *tick {
            module = module.tick(&mut rng);
        }
        let Ok(request) = codec.decode_request(frame) else {
            continue;
        };
        if let Some(reply) = module.handle(&request) {
            let encoded = codec.encode_reply(&request, &reply);
            assert!(encoded.ends_with(b"\r\n"));
        }
    }
});
