//! Basic usage example for the ACN PDU layers.

use acn_wire::{
    Cid, DataPdu, HeaderSet, Inflator, LayerInflator, NoHeader, PayloadHandler, PduBlock,
    RootInflator, RootPdu, VectorSize, VECTOR_ROOT_E131_DATA,
};
use bytes::BytesMut;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ACN PDU Layering Example ===\n");

    // 1. Build two payload PDUs and collect them in a block
    println!("1. Building a block of two payload PDUs...");
    let first = DataPdu::new(VectorSize::Two, 0x0001, b"dimmer levels");
    let second = DataPdu::new(VectorSize::Two, 0x0002, b"sync");

    let mut block: PduBlock = PduBlock::new();
    block.add_pdu(&first);
    block.add_pdu(&second);
    println!("   Block holds {} PDUs, {} bytes", block.len(), block.size());

    // 2. Wrap the block in a root layer envelope
    println!("\n2. Wrapping it in a root PDU...");
    let cid = Cid::generate();
    let root = RootPdu::new(cid, VECTOR_ROOT_E131_DATA).with_block(&block);

    let mut envelope: PduBlock = PduBlock::new();
    envelope.add_pdu(&root);

    let mut buf = BytesMut::new();
    let written = envelope.pack(&mut buf);
    println!("   Sender CID: {}", cid);
    println!("   Packed {} bytes: {:02x?}...", written, &buf[..8]);

    // 3. Decode it again through a chain of inflators
    println!("\n3. Inflating the packet...");
    let mut e131 = LayerInflator::new(VECTOR_ROOT_E131_DATA, VectorSize::Two, NoHeader);
    e131.add_inflator(Box::new(PayloadHandler::new(
        0x0001,
        |headers: &HeaderSet, data: &[u8]| {
            println!(
                "   vector path {:?}: {:?}",
                headers.vectors(),
                String::from_utf8_lossy(data)
            );
        },
    )))?;
    e131.add_inflator(Box::new(PayloadHandler::new(
        0x0002,
        |headers: &HeaderSet, data: &[u8]| {
            let sender = headers.root_header().map(|h| h.cid);
            println!("   sync from {:?}: {} bytes", sender, data.len());
        },
    )))?;

    let mut root_inflator = RootInflator::root();
    root_inflator.add_inflator(Box::new(e131))?;

    let mut headers = HeaderSet::new();
    let consumed = root_inflator.inflate_pdu_block(&mut headers, &buf);
    println!("   Consumed {} of {} bytes", consumed, buf.len());

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
