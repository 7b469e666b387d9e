//! Host stand-ins for the kernel pieces around the mapping layer.

#![allow(dead_code)]

use kernel_alloc::{Frame, HhdmPhysMapper, PageAllocator};
use kernel_info::MemoryLayout;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_mmap::{FileError, Journal, MapError, MappedFile, Page, PageMapper, PteFlags};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const PAGE: u64 = 4096;

#[repr(align(4096))]
struct RawPage([u8; 4096]);

/// Aligned host buffer acting as physical RAM.
pub struct Ram {
    pages: Vec<RawPage>,
}

impl Ram {
    pub fn new(frames: usize) -> Self {
        Self {
            pages: (0..frames).map(|_| RawPage([0; 4096])).collect(),
        }
    }

    pub fn pool(&mut self) -> PageAllocator<HhdmPhysMapper> {
        let base = PhysicalAddress::from_ptr(self.pages.as_mut_ptr());
        let top = base + self.pages.len() as u64 * PAGE;
        let layout = MemoryLayout::new(base, base, top);
        unsafe { PageAllocator::new(layout, HhdmPhysMapper::identity()) }
    }
}

/// User page table as a plain map.
#[derive(Default)]
pub struct TablePages {
    pub entries: BTreeMap<Page, (Frame, PteFlags)>,
    pub fail_next_map: bool,
}

impl TablePages {
    pub fn flags(&self, va: VirtualAddress) -> Option<PteFlags> {
        self.entries.get(&Page::containing(va)).map(|(_, flags)| *flags)
    }

    pub fn translate_frame(&self, va: VirtualAddress) -> Option<Frame> {
        self.translate(Page::containing(va))
    }

    pub fn translate_resident(&self, va: VirtualAddress) -> bool {
        self.translate_frame(va).is_some()
    }
}

impl PageMapper for TablePages {
    fn translate(&self, page: Page) -> Option<Frame> {
        self.entries.get(&page).map(|(frame, _)| *frame)
    }

    fn map(&mut self, page: Page, frame: Frame, flags: PteFlags) -> Result<(), MapError> {
        if std::mem::take(&mut self.fail_next_map) {
            return Err(MapError::OutOfMemory);
        }
        if self.entries.contains_key(&page) {
            return Err(MapError::AlreadyMapped(page.base()));
        }
        self.entries.insert(page, (frame, flags));
        Ok(())
    }

    fn unmap(&mut self, page: Page) -> Option<Frame> {
        self.entries.remove(&page).map(|(frame, _)| frame)
    }
}

/// Shared state of one open file.
#[derive(Default)]
pub struct FileState {
    pub data: Mutex<Vec<u8>>,
    pub refs: AtomicU32,
    pub readable: bool,
    pub writable: bool,
    /// `(offset, len)` of every `write_at`.
    pub writes: Mutex<Vec<(u64, usize)>>,
    /// Number of writes to accept before failing with an I/O error.
    pub writes_before_error: Mutex<Option<usize>>,
    pub fail_reads: bool,
}

/// Handle to an in-memory file; each handle is one reference.
pub struct MemFile {
    pub state: Arc<FileState>,
}

impl MemFile {
    pub fn open(data: Vec<u8>, readable: bool, writable: bool) -> Self {
        Self::with_state(FileState {
            data: Mutex::new(data),
            readable,
            writable,
            ..FileState::default()
        })
    }

    pub fn with_state(state: FileState) -> Self {
        state.refs.store(1, Ordering::SeqCst);
        Self { state: Arc::new(state) }
    }

    pub fn refs(&self) -> u32 {
        self.state.refs.load(Ordering::SeqCst)
    }

    pub fn data(&self) -> Vec<u8> {
        self.state.data.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.state.writes.lock().unwrap().clone()
    }

    pub fn fail_writes_after(&self, n: usize) {
        *self.state.writes_before_error.lock().unwrap() = Some(n);
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.state.refs.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MappedFile for MemFile {
    fn readable(&self) -> bool {
        self.state.readable
    }

    fn writable(&self) -> bool {
        self.state.writable
    }

    fn dup(&self) -> Self {
        self.state.refs.fetch_add(1, Ordering::SeqCst);
        Self {
            state: Arc::clone(&self.state),
        }
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, FileError> {
        if self.state.fail_reads {
            return Err(FileError::Io);
        }
        let data = self.state.data.lock().unwrap();
        let start = usize::try_from(offset).unwrap().min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize, FileError> {
        {
            let mut budget = self.state.writes_before_error.lock().unwrap();
            if let Some(left) = budget.as_mut() {
                if *left == 0 {
                    return Err(FileError::Io);
                }
                *left -= 1;
            }
        }
        let mut data = self.state.data.lock().unwrap();
        let start = usize::try_from(offset).unwrap();
        if data.len() < start + buf.len() {
            data.resize(start + buf.len(), 0);
        }
        data[start..start + buf.len()].copy_from_slice(buf);
        self.state.writes.lock().unwrap().push((offset, buf.len()));
        Ok(buf.len())
    }
}

/// Counts transactions and tracks nesting depth.
#[derive(Default)]
pub struct CountingJournal {
    pub begun: AtomicU32,
    pub ended: AtomicU32,
    pub depth: AtomicI32,
}

impl CountingJournal {
    pub fn transactions(&self) -> u32 {
        assert_eq!(self.depth.load(Ordering::SeqCst), 0, "transaction left open");
        assert_eq!(self.begun.load(Ordering::SeqCst), self.ended.load(Ordering::SeqCst));
        self.ended.load(Ordering::SeqCst)
    }
}

impl Journal for CountingJournal {
    fn begin_op(&self) {
        let prev = self.depth.fetch_add(1, Ordering::SeqCst);
        assert_eq!(prev, 0, "writeback transactions must not nest");
        self.begun.fetch_add(1, Ordering::SeqCst);
    }

    fn end_op(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}

/// File contents where every byte encodes its page index and position.
pub fn patterned(pages: usize) -> Vec<u8> {
    (0..pages * PAGE as usize)
        .map(|i| (i / PAGE as usize * 0x10 + i % 7 + 1) as u8)
        .collect()
}

/// Byte visible to the user at `va`, if the page is resident.
pub fn peek(pool: &PageAllocator<HhdmPhysMapper>, pt: &TablePages, va: VirtualAddress) -> Option<u8> {
    let frame = pt.translate(Page::containing(va))?;
    let off = (va.as_u64() % PAGE) as usize;
    Some(unsafe { pool.frame_bytes(frame)[off] })
}

/// Store a byte as the user would after the page is resident.
pub fn poke(pool: &PageAllocator<HhdmPhysMapper>, pt: &TablePages, va: VirtualAddress, value: u8) {
    let frame = pt.translate(Page::containing(va)).expect("page must be resident");
    let off = (va.as_u64() % PAGE) as usize;
    unsafe { pool.frame_bytes(frame)[off] = value };
}
