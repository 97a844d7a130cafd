//! Decodes one application packet from a hex string and dumps its
//! structure, including any wrapped PD events.
//!
//! ```sh
//! cargo run --example decode_hex -- 410200000100080000112233445566778899aabbccddeeff
//! ```

use km003c_capture::events::{extract_events, pd_event_region, PdEvent};
use km003c_capture::packet::{decode_packet, Attribute, Packet};

fn main() {
    simplelog::TermLogger::init(
        log::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let arg = std::env::args().nth(1).expect("usage: decode_hex <packet-hex>");
    let bytes = hex::decode(arg.trim()).expect("argument must be hex");

    match decode_packet(&bytes) {
        Ok(Packet::Ctrl { header, payload }) => {
            println!(
                "{:?} id={} attribute={:?} payload={}",
                header.packet_type,
                header.id,
                header.attribute(),
                hex::encode(payload)
            );
        }
        Ok(Packet::SimpleData { header, payload }) => {
            println!(
                "{:?} id={} payload={}",
                header.packet_type,
                header.id,
                hex::encode(payload)
            );
        }
        Ok(Packet::Data {
            header,
            logical_packets,
        }) => {
            println!(
                "{:?} id={} with {} logical packet(s)",
                header.packet_type,
                header.id,
                logical_packets.len()
            );
            for lp in &logical_packets {
                println!(
                    "  {:?} chunk={} {} bytes: {}",
                    lp.attribute(),
                    lp.chunk,
                    lp.payload.len(),
                    hex::encode(&lp.payload)
                );
                if lp.attribute() == Attribute::PdPacket {
                    let extraction = extract_events(pd_event_region(&lp.payload));
                    for event in &extraction.events {
                        match event {
                            PdEvent::Status(status) => {
                                println!("    status t={} sop={:#04x}", status.timestamp, status.sop)
                            }
                            PdEvent::Wire(wire) => println!(
                                "    pd t={} sop={:#04x} wire={}",
                                wire.timestamp,
                                wire.sop,
                                hex::encode(&wire.wire)
                            ),
                        }
                    }
                    if !extraction.is_complete() {
                        println!("    (stopped early: {:?})", extraction.stop);
                    }
                }
            }
        }
        Err(error) => eprintln!("decode failed: {error}"),
    }
}
