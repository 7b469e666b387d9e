mod common;

use common::{CountingJournal, MemFile, PAGE, Ram, TablePages, patterned, peek, poke};
use kernel_info::memory::MMAP_TOP;
use kernel_memory_addresses::VirtualAddress;
use kernel_mmap::{Access, FileError, MmapError, MmapSpace, MunmapError, Protection, Sharing};

const RW: Protection = Protection::READ.union(Protection::WRITE);

fn null() -> VirtualAddress {
    VirtualAddress::new(0)
}

#[test]
fn private_mapping_over_a_short_file() {
    let mut ram = Ram::new(16);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let data = patterned(2);
    let file = MemFile::open(data.clone(), true, false);
    let free_before = pool.free_frames();

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 3 * PAGE, RW, Sharing::Private, &file, 0).unwrap();
    assert_eq!(a.as_u64(), MMAP_TOP - 3 * PAGE);
    assert_eq!(file.refs(), 2);
    assert!(pt.entries.is_empty(), "mmap must not touch the page table");

    for i in 0..3 {
        space.handle_fault(a + i * PAGE, Access::Read, &pool, &mut pt).unwrap();
    }
    assert_eq!(pool.free_frames(), free_before - 3);

    assert_eq!(peek(&pool, &pt, a), Some(data[0]));
    assert_eq!(peek(&pool, &pt, a + PAGE + 5), Some(data[PAGE as usize + 5]));
    assert!((0..PAGE).all(|off| peek(&pool, &pt, a + 2 * PAGE + off) == Some(0)));

    let flags = pt.flags(a).unwrap();
    assert!(flags.valid() && flags.user() && flags.readable() && flags.writable());
    assert!(!flags.executable());

    // Private stores never reach the file.
    poke(&pool, &pt, a, 0xEE);

    space.munmap(a, 3 * PAGE, &pool, &mut pt, &journal).unwrap();
    assert_eq!(journal.transactions(), 0);
    assert!(file.writes().is_empty());
    assert_eq!(file.data(), data);
    assert!(pt.entries.is_empty());
    assert!(space.is_empty());
    assert_eq!(pool.free_frames(), free_before);
    assert_eq!(file.refs(), 1);
}

#[test]
fn shared_prefix_unmap_writes_back_and_advances_the_region() {
    let mut ram = Ram::new(16);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let data = patterned(2);
    let file = MemFile::open(data.clone(), true, true);

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 2 * PAGE, Protection::WRITE, Sharing::Shared, &file, 0).unwrap();

    space.handle_fault(a, Access::Write, &pool, &mut pt).unwrap();
    let flags = pt.flags(a).unwrap();
    assert!(flags.writable() && flags.readable(), "W without R is a reserved leaf encoding");
    poke(&pool, &pt, a, 0x99);

    space.munmap(a, PAGE, &pool, &mut pt, &journal).unwrap();
    assert_eq!(journal.transactions(), 1);
    assert_eq!(file.writes(), vec![(0, PAGE as usize)]);
    assert_eq!(file.data()[0], 0x99);
    assert_eq!(file.data()[1..], data[1..]);

    let (_, vma) = space.iter().next().unwrap();
    assert_eq!(vma.addr(), a + PAGE);
    assert_eq!(vma.length(), PAGE);
    assert_eq!(vma.offset(), PAGE);
    assert_eq!(space.len(), 1);

    // The remaining page still maps the second page of the file.
    space.handle_fault(a + PAGE, Access::Write, &pool, &mut pt).unwrap();
    assert_eq!(peek(&pool, &pt, a + PAGE), Some(data[PAGE as usize]));
    assert!(space.find(a).is_none());
}

#[test]
fn untouched_mapping_unmaps_without_writeback() {
    let mut ram = Ram::new(4);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(1), true, true);

    let mut space: MmapSpace<MemFile, 1> = MmapSpace::new();
    let a = space.mmap(null(), 2 * PAGE, RW, Sharing::Shared, &file, 0).unwrap();
    space.munmap(a, 2 * PAGE, &pool, &mut pt, &journal).unwrap();

    assert_eq!(journal.transactions(), 0);
    assert!(file.writes().is_empty());
    assert!(space.is_empty());
    assert_eq!(file.refs(), 1);

    // The only slot is free again.
    assert!(space.mmap(null(), PAGE, RW, Sharing::Shared, &file, 0).is_ok());
}

#[test]
fn shared_writable_mapping_of_read_only_file_keeps_the_slot() {
    let ro = MemFile::open(patterned(1), true, false);
    let mut space: MmapSpace<MemFile, 1> = MmapSpace::new();

    let err = space.mmap(null(), PAGE, Protection::WRITE, Sharing::Shared, &ro, 0);
    assert_eq!(err, Err(MmapError::NotWritable));
    assert!(space.is_empty());
    assert_eq!(space.watermark().as_u64(), MMAP_TOP);
    assert_eq!(ro.refs(), 1);

    assert!(space.mmap(null(), PAGE, Protection::READ, Sharing::Shared, &ro, 0).is_ok());
}

#[test]
fn ranges_outside_every_region_are_rejected() {
    let mut ram = Ram::new(4);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(2), true, true);

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 2 * PAGE, RW, Sharing::Shared, &file, 0).unwrap();
    space.handle_fault(a, Access::Read, &pool, &mut pt).unwrap();

    let starts_below = space.munmap(a - PAGE, 2 * PAGE, &pool, &mut pt, &journal);
    assert_eq!(
        starts_below,
        Err(MunmapError::NoMatchingVma {
            begin: a - PAGE,
            end: a + PAGE
        })
    );
    let runs_past = space.munmap(a + PAGE, 2 * PAGE, &pool, &mut pt, &journal);
    assert!(matches!(runs_past, Err(MunmapError::NoMatchingVma { .. })));
    let empty = space.munmap(a, 0, &pool, &mut pt, &journal);
    assert_eq!(empty, Err(MunmapError::InvalidRange(a)));

    let (_, vma) = space.iter().next().unwrap();
    assert_eq!((vma.addr(), vma.length(), vma.offset()), (a, 2 * PAGE, 0));
    assert!(pt.translate_resident(a));
    assert_eq!(journal.transactions(), 0);
}

#[test]
#[should_panic(expected = "would split")]
fn unmapping_the_middle_of_a_region_panics() {
    let mut ram = Ram::new(4);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(3), true, false);

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 3 * PAGE, Protection::READ, Sharing::Private, &file, 0).unwrap();
    let _ = space.munmap(a + PAGE, PAGE, &pool, &mut pt, &journal);
}

#[test]
fn suffix_trims_clip_writeback_to_the_region_length() {
    let mut ram = Ram::new(8);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(3), true, true);
    let free_before = pool.free_frames();

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let length = 2 * PAGE + 100;
    let a = space.mmap(null(), length, RW, Sharing::Shared, &file, 0).unwrap();
    for i in 0..3 {
        space.handle_fault(a + i * PAGE, Access::Write, &pool, &mut pt).unwrap();
    }

    // Last, partial page: only the 100 mapped bytes go back to the file.
    space.munmap(a + 2 * PAGE, 1, &pool, &mut pt, &journal).unwrap();
    assert_eq!(file.writes(), vec![(2 * PAGE, 100)]);
    assert_eq!(space.iter().next().unwrap().1.length(), 2 * PAGE);

    space.munmap(a + PAGE, PAGE, &pool, &mut pt, &journal).unwrap();
    assert_eq!(space.iter().next().unwrap().1.length(), PAGE);

    // What is left is the whole region.
    space.munmap(a, PAGE, &pool, &mut pt, &journal).unwrap();
    assert!(space.is_empty());
    assert_eq!(
        file.writes(),
        vec![(2 * PAGE, 100), (PAGE, PAGE as usize), (0, PAGE as usize)]
    );
    assert_eq!(journal.transactions(), 3);
    assert_eq!(pool.free_frames(), free_before);
    assert_eq!(file.refs(), 1);
}

#[test]
fn writeback_failure_leaves_a_written_prefix() {
    let mut ram = Ram::new(8);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(3), true, true);
    let free_before = pool.free_frames();

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 3 * PAGE, RW, Sharing::Shared, &file, 0).unwrap();
    for i in 0..3 {
        space.handle_fault(a + i * PAGE, Access::Write, &pool, &mut pt).unwrap();
    }

    file.fail_writes_after(1);
    let err = space.munmap(a, 3 * PAGE, &pool, &mut pt, &journal);
    assert_eq!(
        err,
        Err(MunmapError::Writeback {
            page: a + PAGE,
            source: FileError::Io
        })
    );

    assert!(!pt.translate_resident(a));
    assert!(pt.translate_resident(a + PAGE));
    assert!(pt.translate_resident(a + 2 * PAGE));
    assert_eq!(pool.free_frames(), free_before - 2);
    assert_eq!(journal.transactions(), 2);

    let (_, vma) = space.iter().next().unwrap();
    assert_eq!((vma.addr(), vma.length()), (a, 3 * PAGE));
    assert_eq!(file.refs(), 2);
}

#[test]
fn unmap_honours_shared_frame_counts() {
    let mut ram = Ram::new(4);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let file = MemFile::open(patterned(1), true, false);

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), PAGE, Protection::READ, Sharing::Private, &file, 0).unwrap();
    let frame = space.handle_fault(a, Access::Read, &pool, &mut pt).unwrap();

    // Another owner (e.g. a copy-on-write child) still holds the frame.
    pool.share([frame]);
    space.munmap(a, PAGE, &pool, &mut pt, &journal).unwrap();

    assert_eq!(pool.ref_counts().get(frame), 1);
    assert_eq!(pool.free_frames(), 3);
    pool.free(frame);
    assert_eq!(pool.free_frames(), 4);
}

#[test]
fn process_exit_releases_every_region() {
    let mut ram = Ram::new(8);
    let pool = ram.pool();
    let mut pt = TablePages::default();
    let journal = CountingJournal::default();
    let shared = MemFile::open(patterned(2), true, true);
    let private = MemFile::open(patterned(1), true, false);
    let free_before = pool.free_frames();

    let mut space: MmapSpace<MemFile> = MmapSpace::new();
    let a = space.mmap(null(), 2 * PAGE, RW, Sharing::Shared, &shared, 0).unwrap();
    let b = space.mmap(null(), PAGE, RW, Sharing::Private, &private, 0).unwrap();
    space.handle_fault(a + PAGE, Access::Write, &pool, &mut pt).unwrap();
    space.handle_fault(b, Access::Write, &pool, &mut pt).unwrap();
    poke(&pool, &pt, a + PAGE + 1, 0x42);

    space.unmap_all(&pool, &mut pt, &journal).unwrap();

    assert!(space.is_empty());
    assert!(pt.entries.is_empty());
    assert_eq!(pool.free_frames(), free_before);
    assert_eq!(shared.writes(), vec![(PAGE, PAGE as usize)]);
    assert_eq!(shared.data()[PAGE as usize + 1], 0x42);
    assert!(private.writes().is_empty());
    assert_eq!((shared.refs(), private.refs()), (1, 1));
}

#[test]
fn forked_child_refaults_from_the_file() {
    let mut ram = Ram::new(8);
    let pool = ram.pool();
    let journal = CountingJournal::default();
    let data = patterned(1);
    let file = MemFile::open(data.clone(), true, true);

    let mut parent: MmapSpace<MemFile> = MmapSpace::new();
    let mut parent_pt = TablePages::default();
    let a = parent.mmap(null(), PAGE, RW, Sharing::Shared, &file, 0).unwrap();
    parent.handle_fault(a, Access::Write, &pool, &mut parent_pt).unwrap();
    poke(&pool, &parent_pt, a, 0x77);

    let mut child = parent.fork();
    let mut child_pt = TablePages::default();
    assert_eq!(file.refs(), 3);
    assert_eq!(child.watermark(), parent.watermark());

    child.handle_fault(a, Access::Read, &pool, &mut child_pt).unwrap();
    assert_eq!(peek(&pool, &child_pt, a), Some(data[0]));
    assert_ne!(child_pt.translate_frame(a), parent_pt.translate_frame(a));

    child.unmap_all(&pool, &mut child_pt, &journal).unwrap();
    assert_eq!(file.refs(), 2);
    assert_eq!(peek(&pool, &parent_pt, a), Some(0x77));
}
