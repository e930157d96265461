use super::{unique_name, ScopedRegion};
use crate::{
    region::{object_name, EntryState, ALLOC_ALIGN, MAX_ENTRIES},
    CoreLayout, Error, NamedLock, ShmRegion,
};
use std::thread;

#[test]
fn names() {
    assert_eq!(object_name("abc").unwrap(), "/abc");
    assert_eq!(object_name("/abc").unwrap(), "/abc");
    assert!(matches!(object_name(""), Err(Error::InvalidName(_))));
    assert!(object_name("/").is_err());
    assert!(object_name("a/b").is_err());
    assert!(object_name("a\0b").is_err());
    assert!(object_name(&"x".repeat(300)).is_err());
}

#[test]
fn create_open_remove() {
    let name = unique_name("region");
    let size = ShmRegion::required_size([1000]);

    assert!(ShmRegion::open(&name).unwrap_err().is_not_found());
    let region = ShmRegion::create(&name, size).unwrap();
    assert_eq!(region.name(), name);
    assert_eq!(region.size(), size);
    assert!(matches!(ShmRegion::create(&name, size), Err(Error::AlreadyExists(_))));

    let other = ShmRegion::open(&name).unwrap();
    assert_eq!(other.size(), size);
    assert_eq!(other.free_len().unwrap(), region.free_len().unwrap());
    assert!(region.entries().unwrap().is_empty());

    assert!(ShmRegion::remove(&name).unwrap());
    assert!(!ShmRegion::remove(&name).unwrap());
    assert!(ShmRegion::open(&name).unwrap_err().is_not_found());

    // Mappings outlive the name.
    assert_eq!(region.free_len().unwrap(), other.free_len().unwrap());
}

#[test]
fn open_or_create() {
    let name = unique_name("region");
    let first = ShmRegion::open_or_create(&name, ShmRegion::required_size([256])).unwrap();
    let second = ShmRegion::open_or_create(&name, 1).unwrap();
    assert_eq!(second.size(), first.size());
    ShmRegion::remove(&name).unwrap();
}

#[test]
fn open_while_creating() {
    let size = ShmRegion::required_size([1000]);
    for _ in 0..200 {
        let name = unique_name("region");
        let opener = {
            let name = name.clone();
            thread::spawn(move || loop {
                match ShmRegion::open(&name) {
                    Err(Error::NotFound(_)) => thread::yield_now(),
                    other => break other.map(|region| region.size()),
                }
            })
        };
        let region = ShmRegion::create(&name, size).unwrap();
        assert_eq!(opener.join().unwrap().unwrap(), size);
        drop(region);
        ShmRegion::remove(&name).unwrap();
    }
}

#[test]
fn allocations_fit_core_alignment() {
    assert_eq!(ALLOC_ALIGN % 128, 0);
    for layout in [
        CoreLayout::new::<u8>(1, 1).unwrap(),
        CoreLayout::new::<f64>(1000, 3).unwrap(),
        CoreLayout::new::<u128>(7, 2).unwrap(),
    ] {
        assert_eq!(ALLOC_ALIGN % layout.align(), 0);
    }
}

#[test]
fn not_a_region() {
    let name = unique_name("region");
    let lock = NamedLock::create(&name).unwrap();
    assert!(matches!(ShmRegion::open(&name), Err(Error::CorruptRegion(_))));
    drop(lock);
    NamedLock::remove(&name).unwrap();
}

#[test]
fn allocations() {
    let region = ScopedRegion::new(ShmRegion::required_size([1000, 1000, 1000]));
    let free = region.free_len().unwrap();

    let mut dir = region.directory().unwrap();
    let a = dir.begin("a", 1000).unwrap();
    let b = dir.begin("b", 1000).unwrap();
    assert_eq!(a.offset % ALLOC_ALIGN, 0);
    assert_eq!(b.offset % ALLOC_ALIGN, 0);
    assert!(b.offset >= a.offset + a.size);
    assert_eq!(dir.lookup("a"), Some((EntryState::Constructing, a)));
    dir.commit("a");
    dir.commit("b");
    assert_eq!(dir.lookup("a"), Some((EntryState::Live, a)));
    assert!(matches!(dir.begin("a", 10), Err(Error::AlreadyExists(_))));
    drop(dir);

    assert_eq!(region.find("b").unwrap(), Some(b));
    assert_eq!(region.state("c").unwrap(), EntryState::Absent);
    assert!(region.free_len().unwrap() < free - 2000);

    let names = region.entries().unwrap().into_iter().map(|e| e.name).collect::<Vec<_>>();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn released_space_is_reused() {
    let region = ScopedRegion::new(ShmRegion::required_size([1000, 1000]));
    let free = region.free_len().unwrap();
    let mut dir = region.directory().unwrap();

    let a = dir.begin("a", 1000).unwrap();
    let b = dir.begin("b", 1000).unwrap();

    // Middle extent is kept for reuse.
    assert!(dir.release("a"));
    assert!(!dir.release("a"));
    assert_eq!(dir.lookup("a"), None);
    let c = dir.begin("c", 500).unwrap();
    assert_eq!(c.offset, a.offset);

    // Last extent is returned to the allocator.
    assert!(dir.release("b"));
    let d = dir.begin("d", 1000).unwrap();
    assert_eq!(d, b);
    dir.release("d");
    dir.release("c");
    drop(dir);
    assert!(region.free_len().unwrap() < free);
}

#[test]
fn region_full() {
    let region = ScopedRegion::new(ShmRegion::required_size([]));
    let mut dir = region.directory().unwrap();
    assert!(matches!(
        dir.begin("big", MAX_ENTRIES * ALLOC_ALIGN + 1),
        Err(Error::RegionFull { .. })
    ));
    assert!(dir.begin("fits", MAX_ENTRIES * ALLOC_ALIGN).is_ok());
}

#[test]
fn directory_full() {
    let region = ScopedRegion::new(ShmRegion::required_size([1; MAX_ENTRIES + 1]));
    let mut dir = region.directory().unwrap();
    for i in 0..MAX_ENTRIES {
        dir.begin(&format!("entry{i}"), 1).unwrap();
    }
    assert!(matches!(dir.begin("extra", 1), Err(Error::DirectoryFull(_))));
    assert!(matches!(dir.begin(&"n".repeat(65), 1), Err(Error::InvalidName(_))));
}

#[test]
fn shared_between_mappings() {
    let region = ScopedRegion::new(ShmRegion::required_size([64]));
    let other = region.reopen();

    let allocation = {
        let mut dir = region.directory().unwrap();
        let allocation = dir.begin("data", 64).unwrap();
        dir.commit("data");
        allocation
    };
    assert_eq!(other.find("data").unwrap(), Some(allocation));
    assert_eq!(allocation.size, 64);

    unsafe { region.ptr_at(allocation).as_ptr().write_bytes(0xAB, 64) };
    assert_eq!(unsafe { *other.ptr_at(allocation).as_ptr().add(63) }, 0xAB);
}
