//! Criterion benchmarks for the protocol hot path.
//!
//! Every request pays for a table lookup, input validation, encoding,
//! decoding and output validation before the transport is involved. These
//! benchmarks keep that overhead visible next to the milliseconds a serial
//! round trip costs.
//!
//! Run with: cargo bench --bench codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hvps::protocol::codec::codec;
use hvps::protocol::commands::lookup;
use hvps::protocol::validate::{validate_input, validate_output};
use hvps::simulation::{SimRng, SimulatedModule};
use hvps::{Address, Brand, Direction, Entity, Value};

/// Encode a set request and decode its acknowledgement, for both brands.
fn set_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_round_trip");

    let cases = [
        (Brand::Caen, "VSET", &b"#BD:01,CMD:OK\r\n"[..]),
        (
            Brand::Iseg,
            ":VOLT",
            &b":VOLT 1.500000E+02,(@1);*OPC?\r\n1\r\n"[..],
        ),
    ];

    for (brand, name, reply) in cases {
        let board = if brand == Brand::Caen { 1 } else { 0 };
        let address = Address::channel(board, 1).unwrap();
        let codec = codec(brand);
        let value = Value::Float(150.0);

        group.bench_with_input(BenchmarkId::new("encode_decode", brand), &brand, |b, _| {
            b.iter(|| {
                let command = lookup(brand, Entity::Channel, Direction::Set, name).unwrap();
                validate_input(command, Some(&value)).unwrap();
                let frame = codec.encode_set(address, command, Some(black_box(&value)));
                let decoded = codec.decode(&frame, address, black_box(reply)).unwrap();
                validate_output(command, &decoded.fields).unwrap()
            });
        });
    }

    group.finish();
}

/// Decode a numeric monitor reply with units (iseg) and without (CAEN).
fn monitor_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor_decode");

    let caen = codec(Brand::Caen);
    let caen_addr = Address::channel(0, 2).unwrap();
    let vmon = lookup(Brand::Caen, Entity::Channel, Direction::Monitor, "VMON").unwrap();
    let caen_sent = caen.encode_monitor(caen_addr, vmon);
    group.bench_function("caen_vmon", |b| {
        b.iter(|| {
            let reply = caen
                .decode(&caen_sent, caen_addr, black_box(b"#BD:00,CMD:OK,VAL:1234.5\r\n"))
                .unwrap();
            validate_output(vmon, &reply.fields).unwrap()
        });
    });

    let iseg = codec(Brand::Iseg);
    let iseg_addr = Address::channel(0, 2).unwrap();
    let meas = lookup(Brand::Iseg, Entity::Channel, Direction::Monitor, ":MEAS:VOLT").unwrap();
    let iseg_sent = iseg.encode_monitor(iseg_addr, meas);
    let mut iseg_reply = iseg_sent.clone();
    iseg_reply.extend_from_slice(b"1.234500E+03V\r\n");
    group.bench_function("iseg_meas_volt", |b| {
        b.iter(|| {
            let reply = iseg
                .decode(&iseg_sent, iseg_addr, black_box(&iseg_reply))
                .unwrap();
            validate_output(meas, &reply.fields).unwrap()
        });
    });

    group.finish();
}

/// One simulation tick of an eight-channel module, all channels ramping.
fn simulation_tick(c: &mut Criterion) {
    let mut rng = SimRng::new(Some(1));
    let mut module = SimulatedModule::new(Brand::Caen, 0, 8, 0.0);
    for channel in &mut module.channels {
        channel.setpoint.vset = 5000.0;
        channel.turn_on();
    }

    c.bench_function("simulation_tick", |b| {
        b.iter(|| black_box(module.tick(&mut rng)));
    });
}

criterion_group!(benches, set_round_trip, monitor_decode, simulation_tick);
criterion_main!(benches);
