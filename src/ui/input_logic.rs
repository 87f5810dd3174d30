/// Move selection cursor one item up.
pub fn select_prev(selected: usize) -> usize {
    selected.saturating_sub(1)
}

/// Move selection cursor one item down if another item exists.
pub fn select_next(selected: usize, item_count: usize) -> usize {
    if selected + 1 < item_count {
        selected + 1
    } else {
        selected
    }
}

/// Move up in a paged list: first the cursor, then the page offset.
///
/// Returns the new `(selected, offset)`.
pub fn scroll_up(selected: usize, offset: usize) -> (usize, usize) {
    if selected > 0 {
        (select_prev(selected), offset)
    } else {
        (selected, offset.saturating_sub(1))
    }
}

/// Move down in a paged list showing `window` rows of `item_count`.
///
/// The cursor walks to the last visible row, after which the offset
/// advances until the last item is on screen.
pub fn scroll_down(selected: usize, offset: usize, item_count: usize, window: usize) -> (usize, usize) {
    let visible = item_count.saturating_sub(offset).min(window);
    if selected + 1 < visible {
        (select_next(selected, visible), offset)
    } else if selected + 1 == window && offset + window < item_count {
        (selected, offset + 1)
    } else {
        (selected, offset)
    }
}

/// Pull the cursor and offset back inside a list that shrank to
/// `item_count` items.
pub fn clamp(selected: usize, offset: usize, item_count: usize, window: usize) -> (usize, usize) {
    let offset = offset.min(item_count.saturating_sub(window));
    let visible = item_count.saturating_sub(offset).min(window);
    (selected.min(visible.saturating_sub(1)), offset)
}
