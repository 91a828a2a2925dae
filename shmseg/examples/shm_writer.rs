//! Writer example: creates a segment and fills it until Enter is pressed
//!
//! Run `shm_reader` in another terminal while this one waits.

use shmseg::{AccessMode, LogLevel, SegmentOptions, SharedSegment, ShmResult};
use std::io;

const SEGMENT_NAME: &str = "example_segment";

fn main() -> ShmResult<()> {
    shmseg::init_tracing(LogLevel::Debug);

    println!("Shared Memory Writer Example");
    println!("============================");

    let mut segment = SharedSegment::with_options(
        SEGMENT_NAME,
        4096u64,
        SegmentOptions::new()
            .access(AccessMode::ReadWrite)
            .unlink_on_close(true),
    )?;

    println!("✓ Segment '{}' open ({:?})", segment.name(), segment.origin());
    println!("  Mapped size: {} bytes", segment.mapped_len());

    let data = b"Hello, Shared Memory!";
    segment.write_at(0, data)?;
    println!("✓ Wrote {:?}", std::str::from_utf8(data).unwrap_or("<binary>"));

    println!("\nPress Enter to exit (this will remove the segment)...");
    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();

    segment.close()
}
