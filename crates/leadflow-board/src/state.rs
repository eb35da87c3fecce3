use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use leadflow_core::{Lead, LeadId, LeadStatus};
use leadflow_store::LeadSnapshot;
use ratatui::layout::Rect;

pub const COLUMNS: usize = LeadStatus::ALL.len();
/// Rows per card inside a column: name, company, value.
pub const CARD_HEIGHT: u16 = 3;

/// What the board asks the store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Move { id: LeadId, status: LeadStatus },
    Refetch,
    ClearError,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub lead_id: LeadId,
    pub from: LeadStatus,
    pub hover: Option<LeadStatus>,
}

/// Kanban view state. Holds no store handle; input turns into [`Intent`]s and
/// published snapshots come back through [`Board::apply_snapshot`].
#[derive(Debug, Default)]
pub struct Board {
    pub snapshot: LeadSnapshot,
    pub selected_column: usize,
    pub drag: Option<Drag>,
    pub show_help: bool,
    columns: [Vec<LeadId>; COLUMNS],
    rows: [usize; COLUMNS],
    offsets: [usize; COLUMNS],
    // Card the user just moved; selection tracks it across the optimistic
    // jump and a possible rollback.
    follow: Option<LeadId>,
    column_areas: Vec<Rect>,
}

impl Board {
    pub fn apply_snapshot(&mut self, snapshot: LeadSnapshot) {
        let previous: Vec<Option<LeadId>> = (0..COLUMNS)
            .map(|column| self.lead_at(column, self.rows[column]))
            .collect();

        let mut columns: [Vec<LeadId>; COLUMNS] = Default::default();
        for lead in &snapshot.leads {
            columns[lead.status.column()].push(lead.id);
        }
        self.columns = columns;
        self.snapshot = snapshot;

        for (column, prev) in previous.into_iter().enumerate() {
            let kept = prev.and_then(|id| self.position(column, id));
            let row = kept.unwrap_or(self.rows[column]);
            self.rows[column] = row.min(self.columns[column].len().saturating_sub(1));
        }

        if let Some(id) = self.follow {
            match self.snapshot.lead(id).map(|lead| lead.status.column()) {
                Some(column) => {
                    self.selected_column = column;
                    if let Some(row) = self.position(column, id) {
                        self.rows[column] = row;
                    }
                }
                None => self.follow = None,
            }
        }

        if let Some(drag) = self.drag {
            if self.snapshot.lead(drag.lead_id).is_none() {
                self.drag = None;
            }
        }
    }

    pub fn update_layout(&mut self, column_areas: Vec<Rect>) {
        self.column_areas = column_areas;
    }

    pub fn cards(&self, column: usize) -> impl Iterator<Item = &Lead> {
        let ids = self.columns.get(column).map(Vec::as_slice).unwrap_or(&[]);
        ids.iter().filter_map(|id| self.snapshot.lead(*id))
    }

    pub fn count(&self, column: usize) -> usize {
        self.columns.get(column).map_or(0, Vec::len)
    }

    pub fn selected_row(&self, column: usize) -> usize {
        self.rows.get(column).copied().unwrap_or(0)
    }

    pub fn selected_lead(&self) -> Option<&Lead> {
        let id = self.lead_at(self.selected_column, self.selected_row(self.selected_column))?;
        self.snapshot.lead(id)
    }

    /// First visible card of `column` given room for `capacity` cards,
    /// scrolled so the selected card stays on screen.
    pub fn scroll_window(&mut self, column: usize, capacity: usize) -> usize {
        if column >= COLUMNS {
            return 0;
        }
        let capacity = capacity.max(1);
        let row = self.rows[column];
        let mut offset = self.offsets[column];
        if row < offset {
            offset = row;
        } else if row >= offset + capacity {
            offset = row + 1 - capacity;
        }
        offset = offset.min(self.columns[column].len().saturating_sub(capacity));
        self.offsets[column] = offset;
        offset
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Intent> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Intent::Quit);
        }
        match key.code {
            KeyCode::Char('q') => Some(Intent::Quit),
            KeyCode::Esc => {
                if self.drag.take().is_none() {
                    self.show_help = false;
                }
                None
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.move_column(-1);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.move_column(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_row(1);
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_row(-1);
                None
            }
            KeyCode::Char('H') | KeyCode::Char('<') => self.move_selected(-1),
            KeyCode::Char('L') | KeyCode::Char('>') => self.move_selected(1),
            KeyCode::Char('r') => Some(Intent::Refetch),
            KeyCode::Char('c') => Some(Intent::ClearError),
            _ => None,
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) -> Option<Intent> {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.press(event.column, event.row);
                None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let hover = self
                    .column_at(event.column, event.row)
                    .and_then(LeadStatus::from_column);
                if let Some(drag) = self.drag.as_mut() {
                    drag.hover = hover;
                }
                None
            }
            MouseEventKind::Up(MouseButton::Left) => self.release(event.column, event.row),
            MouseEventKind::ScrollUp => {
                self.scroll(event.column, event.row, -1);
                None
            }
            MouseEventKind::ScrollDown => {
                self.scroll(event.column, event.row, 1);
                None
            }
            _ => None,
        }
    }

    fn press(&mut self, x: u16, y: u16) {
        let Some(column) = self.column_at(x, y) else {
            return;
        };
        self.selected_column = column;
        self.follow = None;
        let Some(row) = self.card_at(column, y) else {
            return;
        };
        self.rows[column] = row;
        self.drag = self.selected_lead().map(|lead| Drag {
            lead_id: lead.id,
            from: lead.status,
            hover: Some(lead.status),
        });
    }

    fn release(&mut self, x: u16, y: u16) -> Option<Intent> {
        let drag = self.drag.take()?;
        let target = self.column_at(x, y).and_then(LeadStatus::from_column)?;
        // A push may have moved the card while it was held.
        let current = self.snapshot.lead(drag.lead_id)?.status;
        if target == current {
            return None;
        }
        self.follow = Some(drag.lead_id);
        Some(Intent::Move {
            id: drag.lead_id,
            status: target,
        })
    }

    fn scroll(&mut self, x: u16, y: u16, delta: isize) {
        if let Some(column) = self.column_at(x, y) {
            self.selected_column = column;
        }
        self.move_row(delta);
    }

    fn move_column(&mut self, delta: isize) {
        let next = (self.selected_column as isize + delta).clamp(0, COLUMNS as isize - 1);
        self.selected_column = next as usize;
        self.follow = None;
    }

    fn move_row(&mut self, delta: isize) {
        let column = self.selected_column;
        let len = self.count(column);
        if len == 0 {
            return;
        }
        let next = (self.rows[column] as isize + delta).clamp(0, len as isize - 1);
        self.rows[column] = next as usize;
        self.follow = None;
    }

    fn move_selected(&mut self, delta: isize) -> Option<Intent> {
        let lead = self.selected_lead()?;
        let status = lead
            .status
            .column()
            .checked_add_signed(delta)
            .and_then(LeadStatus::from_column)?;
        let id = lead.id;
        self.follow = Some(id);
        Some(Intent::Move { id, status })
    }

    fn lead_at(&self, column: usize, row: usize) -> Option<LeadId> {
        self.columns.get(column)?.get(row).copied()
    }

    fn position(&self, column: usize, id: LeadId) -> Option<usize> {
        self.columns.get(column)?.iter().position(|candidate| *candidate == id)
    }

    fn column_at(&self, x: u16, y: u16) -> Option<usize> {
        self.column_areas
            .iter()
            .position(|area| contains(*area, x, y))
    }

    fn card_at(&self, column: usize, y: u16) -> Option<usize> {
        let area = self.column_areas.get(column)?;
        let top = area.y.saturating_add(1);
        let bottom = area.y.saturating_add(area.height.saturating_sub(1));
        if y < top || y >= bottom {
            return None;
        }
        let index = self.offsets[column] + ((y - top) / CARD_HEIGHT) as usize;
        (index < self.count(column)).then_some(index)
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(id: LeadId, status: LeadStatus) -> Lead {
        let mut lead = Lead::new(id, format!("Lead {id}"));
        lead.status = status;
        lead
    }

    fn snapshot(leads: Vec<Lead>) -> LeadSnapshot {
        LeadSnapshot {
            leads,
            ..LeadSnapshot::default()
        }
    }

    // Columns 20 wide starting at y=2; cards start one row below the border.
    fn board_with(leads: Vec<Lead>) -> Board {
        let mut board = Board::default();
        board.apply_snapshot(snapshot(leads));
        board.update_layout(
            (0..COLUMNS as u16)
                .map(|i| Rect::new(i * 20, 2, 20, 20))
                .collect(),
        );
        board
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn shift_keys_move_selected_card_one_column() {
        let mut board = board_with(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]);
        assert_eq!(board.handle_key(key(KeyCode::Char('H'))), None);
        assert_eq!(board.handle_key(key(KeyCode::Char('j'))), None);
        assert_eq!(board.selected_lead().map(|l| l.id), Some(2));
        assert_eq!(
            board.handle_key(key(KeyCode::Char('L'))),
            Some(Intent::Move {
                id: 2,
                status: LeadStatus::InitialContact
            })
        );
    }

    #[test]
    fn last_column_cannot_move_right() {
        let mut board = board_with(vec![lead(1, LeadStatus::Lost)]);
        for _ in 0..COLUMNS {
            board.handle_key(key(KeyCode::Char('l')));
        }
        assert_eq!(board.selected_column, COLUMNS - 1);
        assert_eq!(board.handle_key(key(KeyCode::Char('>'))), None);
        assert_eq!(
            board.handle_key(key(KeyCode::Char('<'))),
            Some(Intent::Move {
                id: 1,
                status: LeadStatus::Won
            })
        );
    }

    #[test]
    fn selection_follows_moved_card_through_rollback() {
        let mut board = board_with(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]);
        board.handle_key(key(KeyCode::Down));
        board.handle_key(key(KeyCode::Char('L')));

        board.apply_snapshot(snapshot(vec![
            lead(1, LeadStatus::New),
            lead(2, LeadStatus::InitialContact),
        ]));
        assert_eq!(board.selected_column, 1);
        assert_eq!(board.selected_lead().map(|l| l.id), Some(2));

        board.apply_snapshot(snapshot(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]));
        assert_eq!(board.selected_column, 0);
        assert_eq!(board.selected_lead().map(|l| l.id), Some(2));
    }

    #[test]
    fn mouse_drag_between_columns_moves_card() {
        let mut board = board_with(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]);
        // Second card occupies rows 6..9 of the first column.
        board.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 7));
        assert_eq!(board.drag.map(|d| d.lead_id), Some(2));

        board.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 45, 10));
        assert_eq!(
            board.drag.and_then(|d| d.hover),
            Some(LeadStatus::Qualifying)
        );

        let intent = board.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 45, 10));
        assert_eq!(
            intent,
            Some(Intent::Move {
                id: 2,
                status: LeadStatus::Qualifying
            })
        );
        assert!(board.drag.is_none());
    }

    #[test]
    fn drop_on_same_column_or_outside_does_nothing() {
        let mut board = board_with(vec![lead(1, LeadStatus::New)]);
        board.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 3, 4));
        assert!(board.drag.is_some());
        assert_eq!(
            board.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 10, 12)),
            None
        );

        board.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 3, 4));
        assert_eq!(
            board.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 30, 0)),
            None
        );
        assert!(board.drag.is_none());
    }

    #[test]
    fn press_on_empty_space_selects_column_without_drag() {
        let mut board = board_with(vec![lead(1, LeadStatus::New)]);
        board.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 65, 15));
        assert_eq!(board.selected_column, 3);
        assert!(board.drag.is_none());
    }

    #[test]
    fn removed_card_clamps_selection() {
        let mut board = board_with(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]);
        board.handle_key(key(KeyCode::Char('j')));
        board.apply_snapshot(snapshot(vec![lead(1, LeadStatus::New)]));
        assert_eq!(board.selected_row(0), 0);
        assert_eq!(board.selected_lead().map(|l| l.id), Some(1));
    }

    #[test]
    fn selection_stays_on_same_card_when_others_arrive() {
        let mut board = board_with(vec![lead(1, LeadStatus::New), lead(2, LeadStatus::New)]);
        board.handle_key(key(KeyCode::Char('j')));
        board.apply_snapshot(snapshot(vec![
            lead(3, LeadStatus::New),
            lead(1, LeadStatus::New),
            lead(2, LeadStatus::New),
        ]));
        assert_eq!(board.selected_row(0), 2);
        assert_eq!(board.selected_lead().map(|l| l.id), Some(2));
    }

    #[test]
    fn command_keys_map_to_intents() {
        let mut board = board_with(Vec::new());
        assert_eq!(board.handle_key(key(KeyCode::Char('r'))), Some(Intent::Refetch));
        assert_eq!(
            board.handle_key(key(KeyCode::Char('c'))),
            Some(Intent::ClearError)
        );
        assert_eq!(board.handle_key(key(KeyCode::Char('q'))), Some(Intent::Quit));
        assert_eq!(
            board.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Intent::Quit)
        );
        board.handle_key(key(KeyCode::Char('?')));
        assert!(board.show_help);
        board.handle_key(key(KeyCode::Esc));
        assert!(!board.show_help);
    }

    #[test]
    fn scroll_window_keeps_selection_visible() {
        let leads = (1..=10).map(|id| lead(id, LeadStatus::New)).collect();
        let mut board = board_with(leads);
        for _ in 0..7 {
            board.handle_key(key(KeyCode::Char('j')));
        }
        assert_eq!(board.scroll_window(0, 3), 5);
        for _ in 0..7 {
            board.handle_key(key(KeyCode::Char('k')));
        }
        assert_eq!(board.scroll_window(0, 3), 0);
        assert_eq!(board.scroll_window(1, 3), 0);
    }
}
