//! Reconstruction of logical request/response transactions from a flat URB
//! frame stream.
//!
//! The capture is a chronological interleaving of submits and completions.
//! Control exchanges pair an `S` with the `C` carrying the same URB id,
//! possibly separated by unrelated frames. Bulk command exchanges follow a
//! fixed 4-frame shape: the command submit and its completion on the
//! host-to-device endpoint, the data response completion on the
//! device-to-host endpoint, then the zero-length submit that re-arms the
//! receive buffer. [`reconstruct`] groups every input frame into exactly one
//! [`Transaction`]; frames matching neither pattern become `Unmatched`
//! singletons rather than being dropped.

use log::{debug, trace};

use crate::capture::{CaptureFrame, TransferType, UrbType};

/// URB completion status of a cancelled transfer (`-ENOENT`).
pub const STATUS_CANCELLED: i32 = -2;

/// The endpoint pair used by bulk command/response matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BulkEndpoints {
    /// Command endpoint (host to device).
    pub host_to_device: u8,
    /// Data response endpoint (device to host).
    pub device_to_host: u8,
}

impl Default for BulkEndpoints {
    fn default() -> Self {
        Self {
            host_to_device: 0x01,
            device_to_host: 0x81,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransactionKind {
    /// A paired control submit and completion.
    Control,
    /// A bulk command exchange, possibly a prefix of the full 4-frame shape.
    Bulk,
    /// A single frame matching no pattern.
    Unmatched,
}

/// An ordered, non-empty group of frames belonging to one logical exchange.
///
/// Frames are referenced by index into the input slice passed to
/// [`reconstruct`]; the slice itself is never modified. Ids are 1-based and
/// sequential in chronological order of each transaction's first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transaction {
    pub id: u32,
    pub kind: TransactionKind,
    /// Indices into the input slice, in original relative order.
    pub frame_indices: Vec<usize>,
    /// Set on an unmatched bulk completion with status
    /// [`STATUS_CANCELLED`].
    pub cancelled: bool,
}

impl Transaction {
    /// Resolves the member frames against the input slice the transaction
    /// was reconstructed from.
    pub fn frames<'a>(
        &'a self,
        input: &'a [CaptureFrame],
    ) -> impl Iterator<Item = &'a CaptureFrame> + 'a {
        self.frame_indices.iter().map(move |&i| &input[i])
    }

    pub fn first_frame<'a>(&self, input: &'a [CaptureFrame]) -> Option<&'a CaptureFrame> {
        input.get(*self.frame_indices.first()?)
    }
}

/// Groups frames into transactions using the default [`BulkEndpoints`].
///
/// The input must already be sorted by timestamp/frame number; this is not
/// re-checked (see [`is_sorted`]). Reconstruction is deterministic and
/// idempotent: the same input always produces the same grouping and id
/// assignment.
pub fn reconstruct(frames: &[CaptureFrame]) -> Vec<Transaction> {
    reconstruct_with(frames, BulkEndpoints::default())
}

/// Groups frames into transactions, matching bulk patterns against the given
/// endpoint pair.
pub fn reconstruct_with(frames: &[CaptureFrame], endpoints: BulkEndpoints) -> Vec<Transaction> {
    let mut consumed = vec![false; frames.len()];
    let mut transactions = Vec::new();

    for i in 0..frames.len() {
        if consumed[i] {
            continue;
        }
        let frame = &frames[i];

        let (kind, frame_indices, cancelled) = match (frame.transfer_type, frame.urb_type) {
            (TransferType::Control, UrbType::Submit) => match_control(frames, &consumed, i),
            (TransferType::Bulk, UrbType::Submit) if is_bulk_command(frame, endpoints) => {
                match_bulk(frames, &consumed, i, endpoints)
            }
            (TransferType::Bulk, UrbType::Complete) if frame.urb_status == STATUS_CANCELLED => {
                debug!(
                    "frame {}: cancelled bulk completion (urb {:#x})",
                    frame.frame_number, frame.urb_id
                );
                (TransactionKind::Unmatched, vec![i], true)
            }
            _ => (TransactionKind::Unmatched, vec![i], false),
        };

        for &index in &frame_indices {
            consumed[index] = true;
        }
        transactions.push(Transaction {
            id: transactions.len() as u32 + 1,
            kind,
            frame_indices,
            cancelled,
        });
    }

    transactions
}

fn is_bulk_command(frame: &CaptureFrame, endpoints: BulkEndpoints) -> bool {
    frame.endpoint_address == endpoints.host_to_device && frame.data_length > 0
}

/// Pairs a control submit with the first later completion carrying the same
/// URB id. The scan may step over unrelated frames; an unanswered submit is
/// retained as an unmatched singleton, never dropped.
fn match_control(
    frames: &[CaptureFrame],
    consumed: &[bool],
    start: usize,
) -> (TransactionKind, Vec<usize>, bool) {
    let submit = &frames[start];

    for j in start + 1..frames.len() {
        if consumed[j] {
            continue;
        }
        let frame = &frames[j];
        if frame.transfer_type == TransferType::Control
            && frame.urb_type == UrbType::Complete
            && frame.urb_id == submit.urb_id
        {
            trace!(
                "control pair: frames {} and {} (urb {:#x})",
                submit.frame_number,
                frame.frame_number,
                submit.urb_id
            );
            return (TransactionKind::Control, vec![start, j], false);
        }
    }

    debug!(
        "frame {}: control submit with no completion (urb {:#x})",
        submit.frame_number, submit.urb_id
    );
    (TransactionKind::Unmatched, vec![start], false)
}

/// Matches the bulk command shape S(OUT), C(OUT), C(IN), S(IN) starting at a
/// command submit. Each step must be the next remaining frame; the pattern
/// closes at the first step that does not match, so a partial exchange at
/// the end of a capture still becomes a (shorter) bulk transaction instead
/// of stalling the scan. A lone submit with nothing matched stays unmatched.
fn match_bulk(
    frames: &[CaptureFrame],
    consumed: &[bool],
    start: usize,
    endpoints: BulkEndpoints,
) -> (TransactionKind, Vec<usize>, bool) {
    let submit = &frames[start];

    let command_ack = |f: &CaptureFrame| {
        f.transfer_type == TransferType::Bulk
            && f.urb_type == UrbType::Complete
            && f.endpoint_address == endpoints.host_to_device
            && f.urb_id == submit.urb_id
            && f.urb_status != STATUS_CANCELLED
    };
    let data_response = |f: &CaptureFrame| {
        f.transfer_type == TransferType::Bulk
            && f.urb_type == UrbType::Complete
            && f.endpoint_address == endpoints.device_to_host
            && f.urb_status != STATUS_CANCELLED
    };
    let buffer_reissue = |f: &CaptureFrame| {
        f.transfer_type == TransferType::Bulk
            && f.urb_type == UrbType::Submit
            && f.endpoint_address == endpoints.device_to_host
            && f.data_length == 0
    };
    let steps: [&dyn Fn(&CaptureFrame) -> bool; 3] = [&command_ack, &data_response, &buffer_reissue];

    let mut frame_indices = vec![start];
    let mut at = start;
    for step in steps {
        let Some(j) = next_unconsumed(consumed, at) else {
            break;
        };
        if !step(&frames[j]) {
            break;
        }
        frame_indices.push(j);
        at = j;
    }

    if frame_indices.len() == 1 {
        debug!(
            "frame {}: bulk command with no matching completion (urb {:#x})",
            submit.frame_number, submit.urb_id
        );
        return (TransactionKind::Unmatched, frame_indices, false);
    }

    trace!(
        "bulk exchange of {} frames starting at frame {}",
        frame_indices.len(),
        submit.frame_number
    );
    (TransactionKind::Bulk, frame_indices, false)
}

fn next_unconsumed(consumed: &[bool], after: usize) -> Option<usize> {
    (after + 1..consumed.len()).find(|&j| !consumed[j])
}

/// Per-frame transaction tags for downstream serialization: element `i` is
/// the id of the transaction containing input frame `i` (0 if the frame
/// index is outside every transaction, which cannot happen for output of
/// [`reconstruct`] over the same input).
pub fn transaction_ids(frame_count: usize, transactions: &[Transaction]) -> Vec<u32> {
    let mut ids = vec![0u32; frame_count];
    for transaction in transactions {
        for &i in &transaction.frame_indices {
            if let Some(slot) = ids.get_mut(i) {
                *slot = transaction.id;
            }
        }
    }
    ids
}

/// Whether the frame stream satisfies the sorted-input precondition of
/// [`reconstruct`].
pub fn is_sorted(frames: &[CaptureFrame]) -> bool {
    frames
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp && w[0].frame_number <= w[1].frame_number)
}

/// Checks the session-level property that all control traffic happens up
/// front: returns the frame number of the first control frame appearing
/// after a non-control frame, or `None` if the capture holds the property.
///
/// This is a property of observed captures, not something reconstruction
/// enforces, so it is checked after the fact.
pub fn first_control_phase_violation(frames: &[CaptureFrame]) -> Option<u64> {
    let mut seen_non_control = false;
    for frame in frames {
        match frame.transfer_type {
            TransferType::Control if seen_non_control => return Some(frame.frame_number),
            TransferType::Control => {}
            _ => seen_non_control = true,
        }
    }
    None
}

/// Summary of a reconstruction run, mirroring what capture reports print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionStats {
    pub transactions: usize,
    pub frames: usize,
    /// Transactions holding a single frame.
    pub singletons: usize,
    /// Transactions holding 2 to 4 frames.
    pub small: usize,
    /// Transactions holding 5 or more frames.
    pub large: usize,
    pub largest: usize,
}

impl TransactionStats {
    pub fn collect(transactions: &[Transaction]) -> Self {
        let mut stats = Self {
            transactions: transactions.len(),
            frames: 0,
            singletons: 0,
            small: 0,
            large: 0,
            largest: 0,
        };
        for transaction in transactions {
            let len = transaction.frame_indices.len();
            stats.frames += len;
            match len {
                1 => stats.singletons += 1,
                2..=4 => stats.small += 1,
                _ => stats.large += 1,
            }
            stats.largest = stats.largest.max(len);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::{
        first_control_phase_violation, is_sorted, reconstruct, transaction_ids, TransactionKind,
        TransactionStats, STATUS_CANCELLED,
    };
    use crate::capture::{CaptureFrame, TransferType, UrbType};

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
            timestamp: frame_number as f64 * 0.001,
            urb_id,
            urb_type,
            transfer_type,
            endpoint_address,
            urb_status: 0,
            data_length,
            payload_hex: String::new(),
        }
    }

    fn control(frame_number: u64, urb_id: u64, urb_type: UrbType) -> CaptureFrame {
        frame(frame_number, urb_id, urb_type, TransferType::Control, 0x80, 0)
    }

    fn bulk_exchange(first_frame: u64, urb_out: u64, urb_in: u64) -> Vec<CaptureFrame> {
        vec![
            frame(first_frame, urb_out, UrbType::Submit, TransferType::Bulk, 0x01, 4),
            frame(first_frame + 1, urb_out, UrbType::Complete, TransferType::Bulk, 0x01, 4),
            frame(first_frame + 2, urb_in, UrbType::Complete, TransferType::Bulk, 0x81, 52),
            frame(first_frame + 3, urb_in, UrbType::Submit, TransferType::Bulk, 0x81, 0),
        ]
    }

    #[test]
    fn control_pair_and_trailing_unmatched_submit() {
        let frames = vec![
            control(1, 1, UrbType::Submit),
            control(2, 1, UrbType::Complete),
            control(3, 2, UrbType::Submit),
        ];

        let transactions = reconstruct(&frames);
        assert_eq!(transactions.len(), 2);

        assert_eq!(transactions[0].kind, TransactionKind::Control);
        assert_eq!(transactions[0].id, 1);
        assert_eq!(transactions[0].frame_indices, &[0, 1]);

        assert_eq!(transactions[1].kind, TransactionKind::Unmatched);
        assert_eq!(transactions[1].id, 2);
        assert_eq!(transactions[1].frame_indices, &[2]);
        assert!(!transactions[1].cancelled);
    }

    #[test]
    fn control_completion_is_found_across_unrelated_frames() {
        let frames = vec![
            control(1, 7, UrbType::Submit),
            control(2, 8, UrbType::Submit),
            control(3, 7, UrbType::Complete),
            control(4, 8, UrbType::Complete),
        ];

        let transactions = reconstruct(&frames);
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].frame_indices, &[0, 2]);
        assert_eq!(transactions[1].frame_indices, &[1, 3]);
    }

    #[test]
    fn full_bulk_exchange_closes_as_one_transaction() {
        let frames = bulk_exchange(10, 0xA0, 0xB0);
        let transactions = reconstruct(&frames);

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Bulk);
        assert_eq!(transactions[0].frame_indices, &[0, 1, 2, 3]);
    }

    #[test]
    fn bulk_prefix_still_closes() {
        let frames = bulk_exchange(10, 0xA0, 0xB0)[..2].to_vec();
        let transactions = reconstruct(&frames);

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Bulk);
        assert_eq!(transactions[0].frame_indices, &[0, 1]);
    }

    #[test]
    fn lone_bulk_command_stays_unmatched() {
        let frames = vec![frame(1, 0xA0, UrbType::Submit, TransferType::Bulk, 0x01, 4)];
        let transactions = reconstruct(&frames);

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Unmatched);
    }

    #[test]
    fn cancelled_completion_is_surfaced_not_matched() {
        let mut frames = bulk_exchange(10, 0xA0, 0xB0);
        // the device never answered: the IN completion reports a cancel
        frames[2].urb_status = STATUS_CANCELLED;
        frames[2].data_length = 0;

        let transactions = reconstruct(&frames);
        assert_eq!(transactions.len(), 3);

        assert_eq!(transactions[0].kind, TransactionKind::Bulk);
        assert_eq!(transactions[0].frame_indices, &[0, 1]);

        assert_eq!(transactions[1].kind, TransactionKind::Unmatched);
        assert!(transactions[1].cancelled);
        assert_eq!(transactions[1].frame_indices, &[2]);

        assert_eq!(transactions[2].kind, TransactionKind::Unmatched);
        assert!(!transactions[2].cancelled);
    }

    #[test]
    fn every_frame_lands_in_exactly_one_transaction() {
        let mut frames = vec![
            control(1, 1, UrbType::Submit),
            control(2, 1, UrbType::Complete),
        ];
        frames.extend(bulk_exchange(3, 0xA0, 0xB0));
        frames.push(frame(7, 0xC0, UrbType::Complete, TransferType::Interrupt, 0x82, 8));
        frames.extend(bulk_exchange(8, 0xA1, 0xB1));

        let transactions = reconstruct(&frames);
        let ids = transaction_ids(frames.len(), &transactions);
        assert!(ids.iter().all(|&id| id != 0));

        let total: usize = transactions.iter().map(|t| t.frame_indices.len()).sum();
        assert_eq!(total, frames.len());

        let mut seen = vec![false; frames.len()];
        for transaction in &transactions {
            for &i in &transaction.frame_indices {
                assert!(!seen[i], "frame {i} appears twice");
                seen[i] = true;
            }
        }
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let mut frames = bulk_exchange(1, 0xA0, 0xB0);
        frames.push(control(5, 9, UrbType::Submit));
        frames.push(control(6, 9, UrbType::Complete));

        let first = reconstruct(&frames);
        let second = reconstruct(&frames);
        assert_eq!(first, second);
    }

    #[test]
    fn transactions_are_ordered_by_first_frame() {
        let mut frames = vec![control(1, 1, UrbType::Submit)];
        frames.extend(bulk_exchange(2, 0xA0, 0xB0));
        frames.push(control(6, 1, UrbType::Complete));

        let transactions = reconstruct(&frames);
        assert_eq!(transactions.len(), 2);
        // the control pair opened first even though it closed last
        assert_eq!(transactions[0].kind, TransactionKind::Control);
        assert_eq!(transactions[0].frame_indices, &[0, 5]);
        assert_eq!(transactions[1].kind, TransactionKind::Bulk);
    }

    #[test]
    fn control_phase_checker_flags_the_first_violation() {
        let mut frames = vec![
            control(1, 1, UrbType::Submit),
            control(2, 1, UrbType::Complete),
        ];
        frames.extend(bulk_exchange(3, 0xA0, 0xB0));
        assert_eq!(first_control_phase_violation(&frames), None);

        frames.push(control(7, 2, UrbType::Submit));
        frames.push(control(8, 2, UrbType::Complete));
        assert_eq!(first_control_phase_violation(&frames), Some(7));
    }

    #[test]
    fn sortedness_probe() {
        let mut frames = bulk_exchange(1, 0xA0, 0xB0);
        assert!(is_sorted(&frames));
        frames.swap(0, 3);
        assert!(!is_sorted(&frames));
    }

    #[test]
    fn stats_summarize_size_distribution() {
        let mut frames = bulk_exchange(1, 0xA0, 0xB0);
        frames.push(control(5, 9, UrbType::Submit));

        let transactions = reconstruct(&frames);
        let stats = TransactionStats::collect(&transactions);
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.frames, 5);
        assert_eq!(stats.singletons, 1);
        assert_eq!(stats.small, 1);
        assert_eq!(stats.large, 0);
        assert_eq!(stats.largest, 4);
    }
}
