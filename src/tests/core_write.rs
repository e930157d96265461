use super::HeapCore;
use crate::Observer;

#[test]
fn empty() {
    let rb = HeapCore::<i32>::new(4, 1);
    assert_eq!(rb.capacity().get(), 4);
    assert_eq!(rb.readers(), 1);
    assert_eq!(rb.write_cursor(), 0);
    assert_eq!(rb.read_available(0).unwrap(), 0);
    assert!(rb.is_caught_up(0).unwrap());

    assert_eq!(rb.write(&[]), 0);
    assert_eq!(rb.write_cursor(), 0);
    assert_eq!(rb.read_available(0).unwrap(), 0);
}

#[test]
fn write_advances_cursor() {
    let rb = HeapCore::<i32>::new(4, 2);

    assert_eq!(rb.write(&[0, 1, 2]), 3);
    assert_eq!(rb.write_cursor(), 3);
    assert_eq!(rb.read_available(0).unwrap(), 3);
    assert_eq!(rb.read_available(1).unwrap(), 3);

    assert_eq!(rb.write(&[3]), 1);
    assert_eq!(rb.write_cursor(), 0);
    assert_eq!(rb.read_available(0).unwrap(), 4);
    assert!(rb.is_saturated(0).unwrap());
}

#[test]
fn write_clamps_to_capacity() {
    let rb = HeapCore::<i32>::new(4, 1);

    assert_eq!(rb.write(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]), 4);
    assert_eq!(rb.write_cursor(), 0);
    assert_eq!(rb.read_available(0).unwrap(), 4);
    assert_eq!(rb.read_all(0), [6, 7, 8, 9]);
}

#[test]
fn write_keeps_last_items() {
    for capacity in [1, 2, 3, 5, 8] {
        for prefix in 0..capacity {
            for n in capacity + 1..3 * capacity {
                let items = (0..n as i32).collect::<Vec<_>>();
                let last = &items[n - capacity..];
                let full = HeapCore::<i32>::new(capacity, 2);
                let clamped = HeapCore::<i32>::new(capacity, 2);
                full.write(&vec![-1; prefix]);
                clamped.write(&vec![-1; prefix]);

                assert_eq!(full.write(&items), capacity);
                assert_eq!(clamped.write(last), capacity);
                assert_eq!(full.write_cursor(), clamped.write_cursor());
                for id in 0..2 {
                    assert_eq!(full.read_cursor(id).unwrap(), clamped.read_cursor(id).unwrap());
                    assert_eq!(full.read_available(id).unwrap(), capacity);
                    assert_eq!(clamped.read_available(id).unwrap(), capacity);
                }
                assert_eq!(full.read_all(0), last);
                assert_eq!(clamped.read_all(0), last);
            }
        }
    }
}

#[test]
fn write_wraps() {
    let rb = HeapCore::<u8>::new(5, 1);

    assert_eq!(rb.write(&[0, 1, 2]), 3);
    assert_eq!(rb.read_all(0), [0, 1, 2]);

    assert_eq!(rb.write(&[3, 4, 5, 6]), 4);
    assert_eq!(rb.write_cursor(), 2);
    assert_eq!(rb.read_cursor(0).unwrap(), 3);
    assert_eq!(rb.read_all(0), [3, 4, 5, 6]);
    assert_eq!(rb.read_cursor(0).unwrap(), 2);
}

#[test]
fn capacity_one() {
    let rb = HeapCore::<u64>::new(1, 1);

    assert_eq!(rb.write(&[1]), 1);
    assert_eq!(rb.write(&[2]), 1);
    assert_eq!(rb.write(&[3, 4]), 1);
    assert_eq!(rb.write_cursor(), 0);
    assert_eq!(rb.read_available(0).unwrap(), 1);
    assert_eq!(rb.read_all(0), [4]);
}

#[test]
fn array_items() {
    let rb = HeapCore::<[f32; 3]>::new(2, 1);

    assert_eq!(rb.write(&[[0.0, 0.5, 1.0], [1.0, 1.5, 2.0], [2.0, 2.5, 3.0]]), 2);
    assert_eq!(rb.read_all(0), [[1.0, 1.5, 2.0], [2.0, 2.5, 3.0]]);
}
