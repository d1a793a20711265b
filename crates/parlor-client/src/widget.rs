//! The toolkit side of the message list.
//!
//! [`MessageList`](crate::list::MessageList) mirrors every store mutation
//! into a [`ListWidget`] at the same index, so a toolkit binding only has to
//! translate these calls into its own list box operations.

use crate::row::MessageRow;

pub trait ListWidget {
    fn insert(&mut self, index: usize, row: &MessageRow);
    fn remove(&mut self, index: usize);
    /// The row's content or decorations changed.
    fn update(&mut self, index: usize, row: &MessageRow);
    /// The row at `index` was rebuilt as another variant.
    fn swap(&mut self, index: usize, row: &MessageRow);
    fn scroll_to(&mut self, index: usize);
    fn scroll_to_bottom(&mut self);
    fn grab_focus(&mut self, index: usize);
    fn set_selected(&mut self, index: Option<usize>);
}

/// A widget that discards everything, for headless use.
#[derive(Debug, Default)]
pub struct NullWidget;

impl ListWidget for NullWidget {
    fn insert(&mut self, _: usize, _: &MessageRow) {}
    fn remove(&mut self, _: usize) {}
    fn update(&mut self, _: usize, _: &MessageRow) {}
    fn swap(&mut self, _: usize, _: &MessageRow) {}
    fn scroll_to(&mut self, _: usize) {}
    fn scroll_to_bottom(&mut self) {}
    fn grab_focus(&mut self, _: usize) {}
    fn set_selected(&mut self, _: Option<usize>) {}
}
