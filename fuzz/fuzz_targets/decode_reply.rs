//! Fuzz target for reply decoding.
//!
//! Feeds arbitrary bytes as the reply to a well-formed request and checks
//! that decoding never panics and that an accepted CAEN reply names the
//! requested board.

#![no_main]

use arbitrary::Arbitrary;
use hvps::protocol::codec::codec;
use hvps::protocol::commands::{table, CommandTable};
use hvps::{Address, Brand, Direction, Entity};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct ReplyInput {
    iseg: bool,
    board: u8,
    channel: Option<u8>,
    command: u8,
    raw: Vec<u8>,
}

fuzz_target!(|input: ReplyInput| {
    let brand = if input.iseg { Brand::Iseg } else { Brand::Caen };
    let board = if input.iseg { 0 } else { input.board % 32 };
    let (address, entity) = match input.channel {
        Some(ch) => match Address::channel(board, ch % 8) {
            Ok(a) => (a, Entity::Channel),
            Err(_) => return,
        },
        None => match Address::module(board) {
            Ok(a) => (a, Entity::Module),
            Err(_) => return,
        },
    };
    let commands: &CommandTable = table(brand, entity, Direction::Monitor);
    let Some(command) = commands
        .commands
        .get(usize::from(input.command) % commands.commands.len().max(1))
    else {
        return;
    };

    let codec = codec(brand);
    let sent = codec.encode_monitor(address, command);
    if let Ok(reply) = codec.decode(&sent, address, &input.raw) {
        if let Some(echoed) = reply.board {
            assert_eq!(echoed, board);
        }
    }
});
