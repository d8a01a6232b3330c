use crosslock_core::constants::{
    LEGACY_INPUT_VBYTES, OUTPUT_VBYTES, TX_BASE_VBYTES, WITNESS_INPUT_VBYTES,
};

/// Estimated virtual size (vbytes) of a transaction with the given shape.
///
/// Linear model: base overhead plus a fixed cost per input and per output,
/// with witness inputs at their discounted size. Used for fees only.
pub fn estimate_transaction_size(input_count: usize, output_count: usize, is_witness: bool) -> u64 {
    let per_input = if is_witness {
        WITNESS_INPUT_VBYTES
    } else {
        LEGACY_INPUT_VBYTES
    };
    TX_BASE_VBYTES + input_count as u64 * per_input + output_count as u64 * OUTPUT_VBYTES
}

/// Fee in satoshis for `vbytes` at `fee_rate` sat/vB.
pub fn fee_for(vbytes: u64, fee_rate: u64) -> u64 {
    vbytes.saturating_mul(fee_rate)
}
