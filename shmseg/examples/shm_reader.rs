//! Reader example: maps the writer's segment read-only and prints it

use shmseg::{LogLevel, SharedSegment, ShmError, ShmResult};

const SEGMENT_NAME: &str = "example_segment";

fn main() -> ShmResult<()> {
    shmseg::init_tracing(LogLevel::Debug);

    let mut segment = SharedSegment::new(SEGMENT_NAME, 0u64);
    match segment.open() {
        Ok(()) => {}
        Err(err @ ShmError::MappingCreation { .. }) => {
            eprintln!("Segment '{}' not found - start shm_writer first", SEGMENT_NAME);
            return Err(err);
        }
        Err(err) => return Err(err),
    }

    let bytes = segment.as_slice().unwrap_or_default();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    println!("Read {} bytes: {}", end, String::from_utf8_lossy(&bytes[..end]));

    segment.close()
}
