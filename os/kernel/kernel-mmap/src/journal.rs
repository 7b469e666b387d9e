/// The file system's crash-consistency log.
///
/// Every file write issued from inside the kernel must sit between a
/// `begin_op` and its `end_op`. `begin_op` may block until the log has room.
pub trait Journal {
    fn begin_op(&self);
    fn end_op(&self);
}

/// One open file-system transaction. Ends on drop.
#[must_use]
pub struct Transaction<'a, J: Journal + ?Sized> {
    journal: &'a J,
}

impl<'a, J: Journal + ?Sized> Transaction<'a, J> {
    pub fn begin(journal: &'a J) -> Self {
        journal.begin_op();
        Self { journal }
    }
}

impl<J: Journal + ?Sized> Drop for Transaction<'_, J> {
    fn drop(&mut self) {
        self.journal.end_op();
    }
}
