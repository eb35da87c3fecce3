use crate::state::{Board, Intent};
use crossterm::event::{KeyEvent, MouseEvent};
use leadflow_core::LeadFilters;
use leadflow_store::{LeadSnapshot, StoreHandle};
use tokio::sync::watch;
use tracing::{info, warn};

pub struct App {
    pub board: Board,
    store: StoreHandle,
    snapshots: watch::Receiver<LeadSnapshot>,
    filters: LeadFilters,
    should_quit: bool,
}

impl App {
    pub fn new(store: StoreHandle, filters: LeadFilters) -> Self {
        let mut snapshots = store.subscribe();
        let mut board = Board::default();
        board.apply_snapshot(snapshots.borrow_and_update().clone());
        Self {
            board,
            store,
            snapshots,
            filters,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Pick up the latest published snapshot, if any. Returns whether the
    /// board changed.
    pub fn sync_snapshot(&mut self) -> bool {
        match self.snapshots.has_changed() {
            Ok(true) => {
                let next = self.snapshots.borrow_and_update().clone();
                self.board.apply_snapshot(next);
                true
            }
            Ok(false) => false,
            Err(_) => {
                warn!(event = "board_store_closed");
                self.should_quit = true;
                false
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if let Some(intent) = self.board.handle_key(key) {
            self.apply(intent);
        }
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        if let Some(intent) = self.board.handle_mouse(event) {
            self.apply(intent);
        }
    }

    fn apply(&mut self, intent: Intent) {
        let sent = match intent {
            Intent::Quit => {
                self.should_quit = true;
                return;
            }
            Intent::Move { id, status } => {
                info!(event = "board_move", lead_id = id, to = %status);
                self.store.dispatch_change_status(id, status)
            }
            Intent::Refetch => self.store.dispatch_fetch_all(self.filters.clone()),
            Intent::ClearError => self.store.dispatch_clear_error(),
        };
        if let Err(err) = sent {
            warn!(event = "board_dispatch_failed", error = %err);
            self.should_quit = true;
        }
    }
}
