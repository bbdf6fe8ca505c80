use crossterm::event::KeyEvent;
use std::path::PathBuf;

use crate::error::SaveError;

/// Direction for cursor movement.
#[derive(Debug, Clone, Copy)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    LineStart,
    LineEnd,
}

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize(u16, u16),

    // -- Item edits
    InsertChar(char),
    DeleteChar,
    NewLine,
    MoveCursor(Direction),

    // -- Mode
    SetMode(crate::model::mode::Mode),

    // -- Autosave
    SaveNow,
    SetFrequency(i64),
    SaveFinished(Result<(), SaveError>),
    ConfigChanged(PathBuf),

    // -- System
    ShowInterfaces,
    Tick,
    Quit,
}
