use super::ScopedRegion;
use crate::{lifecycle, Observer, RingBufferHandle};
use std::thread;

const CAPACITY: usize = 10_000;
const COUNT: i32 = 100_000;

/// Writer and readers in separate threads, each with its own mapping of the region.
#[test]
fn concurrent_readers_see_everything() {
    const READERS: usize = 2;

    let region = ScopedRegion::with_buffers::<i32>(&[(CAPACITY, READERS)]);
    let name = region.buffer("stream");
    lifecycle::construct::<i32>(&name, &region, CAPACITY, READERS).unwrap();
    let (region, name) = (&region, name.as_str());

    thread::scope(|s| {
        let readers = (0..READERS)
            .map(|id| {
                s.spawn(move || {
                    let region = region.reopen();
                    let rb = RingBufferHandle::<i32>::open(name, &region).unwrap();
                    let mut received = Vec::with_capacity(COUNT as usize);
                    let mut buf = [0; 777];
                    while received.len() < COUNT as usize {
                        let count = rb.read(id, &mut buf).unwrap();
                        if count == 0 {
                            thread::yield_now();
                        }
                        received.extend_from_slice(&buf[..count]);
                    }
                    received
                })
            })
            .collect::<Vec<_>>();

        let writer = s.spawn(move || {
            let region = region.reopen();
            let rb = RingBufferHandle::<i32>::open(name, &region).unwrap();
            assert_eq!(rb.write(&(0..77).collect::<Vec<_>>()).unwrap(), 77);
            for x in 77..COUNT {
                // Keep readers from being overrun, so that nothing is lost.
                while (0..READERS).any(|id| rb.read_available(id).unwrap() > CAPACITY / 2) {
                    thread::yield_now();
                }
                rb.write_one(x).unwrap();
            }
        });

        writer.join().unwrap();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), (0..COUNT).collect::<Vec<_>>());
        }
    });
}

/// Reader that does not keep up still gets the most recent items in order.
#[test]
fn slow_reader_skips_ahead() {
    let region = ScopedRegion::with_buffers::<i32>(&[(CAPACITY, 1)]);
    let name = region.buffer("stream");
    lifecycle::construct::<i32>(&name, &region, CAPACITY, 1).unwrap();
    let (region, name) = (&region, name.as_str());

    thread::scope(|s| {
        s.spawn(move || {
            let region = region.reopen();
            let rb = RingBufferHandle::<i32>::open(name, &region).unwrap();
            for chunk in (0..COUNT).collect::<Vec<_>>().chunks(1000) {
                rb.write(chunk).unwrap();
            }
        })
        .join()
        .unwrap();
    });

    let rb = RingBufferHandle::<i32>::open(name, region).unwrap();
    assert!(rb.is_saturated(0).unwrap());
    let mut received = vec![0; CAPACITY + 1];
    assert_eq!(rb.read(0, &mut received).unwrap(), CAPACITY);
    assert_eq!(received[..CAPACITY], ((COUNT - CAPACITY as i32)..COUNT).collect::<Vec<_>>());
}

/// Received items are always increasing even if the reader is overrun in the middle of the stream.
#[test]
fn overrun_keeps_order() {
    const SMALL: usize = 64;

    let region = ScopedRegion::with_buffers::<i32>(&[(SMALL, 1)]);
    let name = region.buffer("stream");
    lifecycle::construct::<i32>(&name, &region, SMALL, 1).unwrap();
    let (region, name) = (&region, name.as_str());

    thread::scope(|s| {
        s.spawn(move || {
            let region = region.reopen();
            let rb = RingBufferHandle::<i32>::open(name, &region).unwrap();
            for x in 0..COUNT {
                rb.write_one(x).unwrap();
            }
        });

        let reader = s.spawn(move || {
            let region = region.reopen();
            let rb = RingBufferHandle::<i32>::open(name, &region).unwrap();
            let mut last = -1;
            let mut buf = [0; 16];
            while last != COUNT - 1 {
                let count = rb.read(0, &mut buf).unwrap();
                for &x in &buf[..count] {
                    assert!(x > last);
                    last = x;
                }
            }
        });
        reader.join().unwrap();
    });
}
