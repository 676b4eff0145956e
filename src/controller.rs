use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, RTVConfig, RTVError};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &RTVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self) -> Result<Option<Message>, RTVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => self.handle_key(key),
                Event::Resize(width, height) => {
                    Some(Message::Resize(width as usize, height as usize))
                }
                _ => None,
            });
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j') | KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k') | KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::Char('g') | KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G') | KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Char('w'), _) => Some(Message::ToggleWide),
            (KeyCode::Char('>'), _) => Some(Message::SortNextColumn),
            (KeyCode::Char('<'), _) => Some(Message::SortPreviousColumn),
            (KeyCode::Char('o'), _) => Some(Message::FlipSortOrder),
            (KeyCode::Char('r'), _) => Some(Message::ResetSort),
            (KeyCode::Char('c'), _) => Some(Message::CopyRowId),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    #[test]
    fn key_mapping() {
        let c = Controller::new(&RTVConfig::default());
        let key = |code, modifiers| c.handle_key(KeyEvent::new(code, modifiers));

        assert_eq!(key(KeyCode::Char('q'), KeyModifiers::NONE), Some(Message::Quit));
        assert_eq!(key(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Message::Quit));
        assert_eq!(key(KeyCode::Char('c'), KeyModifiers::NONE), Some(Message::CopyRowId));
        assert_eq!(key(KeyCode::Char('G'), KeyModifiers::SHIFT), Some(Message::MoveEnd));
        assert_eq!(key(KeyCode::Char('>'), KeyModifiers::SHIFT), Some(Message::SortNextColumn));
        assert_eq!(key(KeyCode::Esc, KeyModifiers::NONE), Some(Message::Exit));
        assert_eq!(key(KeyCode::Char('x'), KeyModifiers::NONE), None);
    }
}
