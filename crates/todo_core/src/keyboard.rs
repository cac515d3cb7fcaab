//! Reply keyboard offered while the user picks a task to mark done.

use crate::model::{CalendarDate, Task};

pub const NO_UNDONE_JOBS: &str = "There are no undone jobs in this day.";
const SELECTION_HEADER: &str = "To choose completed job press appropriate key or 0 for cancel.\n";
const BUTTONS_PER_ROW: usize = 3;

/// What the transport should do with the interactive keyboard on the next reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardDirective {
    /// Attach a keyboard with these button rows.
    Show(Vec<Vec<String>>),
    /// Remove a keyboard shown earlier.
    Hide,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionKeyboard {
    date: Option<CalendarDate>,
    items: Vec<usize>,
    visible: bool,
    previously_sent: bool,
}

impl SelectionKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers the not-done tasks of `date`.
    ///
    /// Returns the prompt and whether anything can be selected. When nothing
    /// is selectable the keyboard stays hidden.
    pub fn build(&mut self, date: CalendarDate, tasks: &[Task]) -> (String, bool) {
        self.date = Some(date);
        self.items = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| !task.done)
            .map(|(index, _)| index)
            .collect();

        if self.items.is_empty() {
            return (NO_UNDONE_JOBS.to_string(), false);
        }

        let mut prompt = String::from(SELECTION_HEADER);
        prompt.push_str("0. Cancel\n");
        for (position, index) in self.items.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", position + 1, tasks[*index].description));
        }
        self.visible = true;
        (prompt, true)
    }

    pub fn items_count(&self) -> usize {
        self.items.len()
    }

    pub fn date(&self) -> Option<CalendarDate> {
        self.date
    }

    /// Maps a 1-based selection onto the index in the full task list.
    ///
    /// `selection` must already be within `1..=items_count()`.
    pub fn resolve_index(&self, selection: usize) -> Option<usize> {
        selection
            .checked_sub(1)
            .and_then(|position| self.items.get(position))
            .copied()
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    #[cfg(test)]
    fn is_visible(&self) -> bool {
        self.previously_sent
    }

    pub fn must_show_now(&self) -> bool {
        self.visible && !self.previously_sent
    }

    pub fn must_hide_now(&self) -> bool {
        !self.visible && self.previously_sent
    }

    pub fn directive(&self) -> KeyboardDirective {
        if self.must_show_now() {
            KeyboardDirective::Show(self.buttons())
        } else if self.must_hide_now() {
            KeyboardDirective::Hide
        } else {
            KeyboardDirective::None
        }
    }

    /// Records that the last directive reached the transport.
    pub fn commit(&mut self) {
        self.previously_sent = self.visible;
    }

    /// Button labels `0..=items_count()`, three per row.
    pub fn buttons(&self) -> Vec<Vec<String>> {
        let labels: Vec<String> = (0..=self.items.len()).map(|n| n.to_string()).collect();
        labels
            .chunks(BUTTONS_PER_ROW)
            .map(|row| row.to_vec())
            .collect()
    }
}
