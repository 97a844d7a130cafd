//! Reconstructs transactions from a small built-in frame sequence and
//! prints the grouping, as a smoke test of the matching rules.

use km003c_capture::capture::{CaptureFrame, TransferType, UrbType};
use km003c_capture::transaction::{reconstruct, TransactionStats};

fn frame(
    frame_number: u64,
    urb_id: u64,
    urb_type: UrbType,
    transfer_type: TransferType,
    endpoint_address: u8,
    data_length: u32,
) -> CaptureFrame {
    CaptureFrame {
        frame_number,
        timestamp: frame_number as f64 * 0.000125,
        urb_id,
        urb_type,
        transfer_type,
        endpoint_address,
        urb_status: 0,
        data_length,
        payload_hex: String::new(),
    }
}

fn main() {
    simplelog::TermLogger::init(
        log::LevelFilter::Trace,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let frames = vec![
        frame(1, 0x10, UrbType::Submit, TransferType::Control, 0x80, 0),
        frame(2, 0x10, UrbType::Complete, TransferType::Control, 0x80, 18),
        frame(3, 0xA0, UrbType::Submit, TransferType::Bulk, 0x01, 4),
        frame(4, 0xA0, UrbType::Complete, TransferType::Bulk, 0x01, 4),
        frame(5, 0xB0, UrbType::Complete, TransferType::Bulk, 0x81, 52),
        frame(6, 0xB0, UrbType::Submit, TransferType::Bulk, 0x81, 0),
        frame(7, 0xA1, UrbType::Submit, TransferType::Bulk, 0x01, 4),
    ];

    let transactions = reconstruct(&frames);
    for transaction in &transactions {
        let numbers: Vec<u64> = transaction
            .frames(&frames)
            .map(|f| f.frame_number)
            .collect();
        println!(
            "transaction {} {:?}{} frames {:?}",
            transaction.id,
            transaction.kind,
            if transaction.cancelled { " (cancelled)" } else { "" },
            numbers
        );
    }

    println!("{:?}", TransactionStats::collect(&transactions));
}
